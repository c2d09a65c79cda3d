use crate::types::constants::phoenix_events;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Type-safe channel events
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelEvent {
    /// Protocol events (phx_*, heartbeat)
    System(SystemEvent),

    /// Application-defined event (e.g. "shout")
    Custom(String),
}

impl ChannelEvent {
    /// Parse a wire string into a ChannelEvent
    pub fn parse(s: &str) -> Self {
        if s.starts_with("phx_") || s == phoenix_events::HEARTBEAT {
            Self::System(SystemEvent::parse(s))
        } else {
            Self::Custom(s.to_string())
        }
    }

    /// Convert event to its wire string
    pub fn as_str(&self) -> &str {
        match self {
            Self::System(sys) => sys.as_str(),
            Self::Custom(s) => s,
        }
    }
}

impl From<&str> for ChannelEvent {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for ChannelEvent {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<SystemEvent> for ChannelEvent {
    fn from(event: SystemEvent) -> Self {
        Self::System(event)
    }
}

impl std::fmt::Display for ChannelEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Events travel as bare strings on the wire, so serde goes through
// as_str/parse rather than the derived enum representation.
impl Serialize for ChannelEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ChannelEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// Phoenix system events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemEvent {
    /// Join channel
    Join,

    /// Leave channel
    Leave,

    /// Reply to a push
    Reply,

    /// Close channel
    Close,

    /// Error event
    Error,

    /// Heartbeat
    Heartbeat,
}

impl SystemEvent {
    pub fn parse(s: &str) -> Self {
        match s {
            phoenix_events::JOIN => Self::Join,
            phoenix_events::LEAVE => Self::Leave,
            phoenix_events::REPLY => Self::Reply,
            phoenix_events::CLOSE => Self::Close,
            phoenix_events::ERROR => Self::Error,
            phoenix_events::HEARTBEAT => Self::Heartbeat,
            _ => Self::Error, // Default to error for unknown system events
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Join => phoenix_events::JOIN,
            Self::Leave => phoenix_events::LEAVE,
            Self::Reply => phoenix_events::REPLY,
            Self::Close => phoenix_events::CLOSE,
            Self::Error => phoenix_events::ERROR,
            Self::Heartbeat => phoenix_events::HEARTBEAT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_event_parse() {
        assert_eq!(
            ChannelEvent::parse("phx_join"),
            ChannelEvent::System(SystemEvent::Join)
        );
        assert_eq!(
            ChannelEvent::parse("heartbeat"),
            ChannelEvent::System(SystemEvent::Heartbeat)
        );
        assert_eq!(
            ChannelEvent::parse("shout"),
            ChannelEvent::Custom("shout".to_string())
        );
    }

    #[test]
    fn test_system_event_round_trip() {
        let events = vec![
            SystemEvent::Join,
            SystemEvent::Leave,
            SystemEvent::Reply,
            SystemEvent::Close,
            SystemEvent::Error,
            SystemEvent::Heartbeat,
        ];

        for event in events {
            let s = event.as_str();
            assert_eq!(SystemEvent::parse(s), event);
        }
    }

    #[test]
    fn test_event_serde_is_the_wire_string() {
        let json = serde_json::to_string(&ChannelEvent::System(SystemEvent::Join)).unwrap();
        assert_eq!(json, r#""phx_join""#);

        let json = serde_json::to_string(&ChannelEvent::Custom("shout".to_string())).unwrap();
        assert_eq!(json, r#""shout""#);

        let event: ChannelEvent = serde_json::from_str(r#""phx_reply""#).unwrap();
        assert_eq!(event, ChannelEvent::System(SystemEvent::Reply));
    }
}

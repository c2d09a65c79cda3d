use super::SystemEvent;
use crate::ChannelEvent;
use crate::client::ClientState;
use crate::types::constants::PHOENIX_TOPIC;
use crate::types::message::PhoenixMessage;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Routes incoming frames to the owning channel.
///
/// Runs on the single read task, so per-channel delivery order matches wire
/// arrival order. A frame for a topic nobody joined is dropped with a log,
/// never an error.
pub struct MessageRouter {
    state: Arc<RwLock<ClientState>>,
}

impl MessageRouter {
    pub fn new_with_state(state: Arc<RwLock<ClientState>>) -> Self {
        Self { state }
    }

    /// Routes a message to the appropriate handler(s)
    pub async fn route(&self, message: PhoenixMessage) {
        // Heartbeat replies live on the reserved topic and never reach channels
        if self.handle_heartbeat_ack(&message).await {
            return;
        }

        let channel = {
            let state = self.state.read().await;
            state
                .channels
                .iter()
                .find(|channel| channel.topic() == message.topic)
                .cloned()
        };

        let Some(channel) = channel else {
            tracing::debug!(
                "Dropping frame for unjoined topic: {} ({})",
                message.topic,
                message.event.as_str()
            );
            return;
        };

        match &message.event {
            ChannelEvent::System(SystemEvent::Reply) => {
                let Some(ref_id) = message.r#ref.clone() else {
                    tracing::debug!("Reply without ref on topic {}", message.topic);
                    return;
                };
                let (status, response) = split_reply(&message.payload);

                if channel
                    .resolve_join_reply(&ref_id, &status, response.clone())
                    .await
                {
                    return;
                }
                if channel.resolve_push_reply(&ref_id, &status, response).await {
                    tracing::debug!("Handled push reply for ref {} with status {}", ref_id, status);
                    return;
                }
                tracing::debug!("Reply with no pending push: ref={}", ref_id);
            }
            ChannelEvent::System(SystemEvent::Error) => {
                channel.mark_errored(message.payload).await;
            }
            ChannelEvent::System(SystemEvent::Close) => {
                channel.acknowledge_close().await;
            }
            _ => {
                channel._trigger(message.event.clone(), message.payload).await;
            }
        }
    }

    /// Checks for a heartbeat acknowledgment and clears the pending ref.
    /// Returns true when the frame belongs to the reserved heartbeat topic.
    async fn handle_heartbeat_ack(&self, message: &PhoenixMessage) -> bool {
        if message.topic != PHOENIX_TOPIC {
            return false;
        }

        if let Some(ref msg_ref) = message.r#ref {
            let state = self.state.read().await;
            if state.pending_heartbeat_ref.as_ref() == Some(msg_ref) {
                drop(state);
                self.state.write().await.pending_heartbeat_ref = None;
                tracing::debug!("Received heartbeat ack for ref {}", msg_ref);
            }
        }
        true
    }
}

/// Pulls `{status, response}` out of a reply payload, defaulting missing
/// status to "error" so a malformed reply still resolves its push.
fn split_reply(payload: &serde_json::Value) -> (String, serde_json::Value) {
    let status = payload
        .get("status")
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| {
            tracing::debug!("Push reply missing 'status' field, defaulting to 'error'");
            "error"
        })
        .to_string();

    let response = payload
        .get("response")
        .cloned()
        .unwrap_or(serde_json::Value::Null);

    (status, response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_reply() {
        let (status, response) =
            split_reply(&serde_json::json!({"status": "ok", "response": {"n": 1}}));
        assert_eq!(status, "ok");
        assert_eq!(response, serde_json::json!({"n": 1}));
    }

    #[test]
    fn test_split_reply_defaults_to_error() {
        let (status, response) = split_reply(&serde_json::json!({}));
        assert_eq!(status, "error");
        assert_eq!(response, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_heartbeat_ack_clears_pending_ref() {
        let state = Arc::new(RwLock::new(ClientState::new()));
        state.write().await.pending_heartbeat_ref = Some("7".to_string());

        let router = MessageRouter::new_with_state(Arc::clone(&state));
        let ack = PhoenixMessage::new(
            PHOENIX_TOPIC.to_string(),
            ChannelEvent::System(SystemEvent::Reply),
            serde_json::json!({"status": "ok", "response": {}}),
        )
        .with_ref("7".to_string());

        router.route(ack).await;
        assert_eq!(state.read().await.pending_heartbeat_ref, None);
    }

    #[tokio::test]
    async fn test_mismatched_heartbeat_ref_is_kept() {
        let state = Arc::new(RwLock::new(ClientState::new()));
        state.write().await.pending_heartbeat_ref = Some("7".to_string());

        let router = MessageRouter::new_with_state(Arc::clone(&state));
        let stale = PhoenixMessage::new(
            PHOENIX_TOPIC.to_string(),
            ChannelEvent::System(SystemEvent::Reply),
            serde_json::json!({"status": "ok", "response": {}}),
        )
        .with_ref("6".to_string());

        router.route(stale).await;
        assert_eq!(
            state.read().await.pending_heartbeat_ref,
            Some("7".to_string())
        );
    }
}

use crate::types::{error::Result, message::PhoenixMessage};
use crate::PhoenixError;
use tokio::sync::{RwLock, mpsc};
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
    Closing,
}

/// Owns the single outbound queue all frames funnel through.
///
/// Channels never touch the socket directly; every write goes through
/// `send_message`, which serializes the frame onto one mpsc queue drained by
/// the write pump. That single consumer is what preserves framing order
/// across concurrently pushing channels.
pub struct ConnectionManager {
    outbound: RwLock<Option<mpsc::Sender<Message>>>,
    state: RwLock<ConnectionState>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            outbound: RwLock::new(None),
            state: RwLock::new(ConnectionState::Closed),
        }
    }

    /// Installs the outbound queue (called after a successful handshake)
    pub(crate) async fn set_outbound(&self, sender: mpsc::Sender<Message>) {
        let mut outbound = self.outbound.write().await;
        *outbound = Some(sender);
    }

    /// Gets the current connection state
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Sets the connection state
    pub(crate) async fn set_state(&self, new_state: ConnectionState) {
        let mut state = self.state.write().await;
        *state = new_state;
    }

    /// Checks if currently connected
    pub async fn is_connected(&self) -> bool {
        *self.state.read().await == ConnectionState::Open
    }

    /// Serializes a frame onto the outbound queue
    pub(crate) async fn send_message(&self, msg: &PhoenixMessage) -> Result<()> {
        let json = serde_json::to_string(msg)?;
        let message = Message::Text(json.into());

        let outbound = self.outbound.read().await;
        let sender = outbound.as_ref().ok_or(PhoenixError::NotConnected)?;

        sender
            .send(message)
            .await
            .map_err(|e| PhoenixError::Connection(format!("Failed to queue frame: {}", e)))?;

        Ok(())
    }

    /// Closes the connection gracefully. Dropping the queue sender ends the
    /// write pump, which closes the socket sink behind it.
    pub(crate) async fn close(&self) -> Result<()> {
        self.set_state(ConnectionState::Closing).await;

        let mut outbound = self.outbound.write().await;
        *outbound = None;
        drop(outbound);

        self.set_state(ConnectionState::Closed).await;

        Ok(())
    }

    /// Drops the outbound queue without the close handshake (used when the
    /// socket already died under us)
    pub(crate) async fn clear_outbound(&self) {
        let mut outbound = self.outbound.write().await;
        *outbound = None;
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChannelEvent;

    #[tokio::test]
    async fn test_send_without_outbound_queue_fails() {
        let connection = ConnectionManager::new();
        let msg = PhoenixMessage::new(
            "general:lobby".to_string(),
            ChannelEvent::Custom("shout".to_string()),
            serde_json::json!({}),
        );

        assert!(matches!(
            connection.send_message(&msg).await,
            Err(PhoenixError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_send_queues_serialized_frame() {
        let connection = ConnectionManager::new();
        let (tx, mut rx) = mpsc::channel(8);
        connection.set_outbound(tx).await;

        let msg = PhoenixMessage::new(
            "general:lobby".to_string(),
            ChannelEvent::Custom("shout".to_string()),
            serde_json::json!({"data": "1234567890"}),
        )
        .with_ref("1".to_string());

        connection.send_message(&msg).await.unwrap();

        let Some(Message::Text(text)) = rx.recv().await else {
            panic!("expected a text frame");
        };
        let decoded: PhoenixMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, msg);
    }

    #[tokio::test]
    async fn test_close_drops_queue_and_reports_closed() {
        let connection = ConnectionManager::new();
        let (tx, mut rx) = mpsc::channel(8);
        connection.set_outbound(tx).await;
        connection.set_state(ConnectionState::Open).await;

        connection.close().await.unwrap();

        assert_eq!(connection.state().await, ConnectionState::Closed);
        // Queue sender dropped: the pump side observes end-of-stream
        assert!(rx.recv().await.is_none());
    }
}

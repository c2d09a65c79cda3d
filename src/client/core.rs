use super::{
    ClientState, ConnectionManager, ConnectionState, PhoenixClientBuilder, PhoenixClientOptions,
};
use crate::PhoenixChannel;
use crate::infrastructure::{HeartbeatManager, Timer};
use crate::messaging::MessageRouter;
use crate::types::constants::{HEARTBEAT_INTERVAL, OUTBOUND_QUEUE_CAPACITY, RECONNECT_MAX_ATTEMPTS, VSN};
use crate::types::{PhoenixError, PhoenixMessage, Result};
use crate::websocket::WebSocketFactory;
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use url::Url;

/// The main entry point for talking to a Phoenix server.
///
/// `PhoenixClient` owns the WebSocket connection, keeps it alive with
/// heartbeats, reconnects with backoff when it drops, and hands out
/// channels multiplexed over it.
///
/// # Example
///
/// ```no_run
/// use phoenix_channels_rs::{PhoenixClient, PhoenixClientOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = PhoenixClient::new(
///     "ws://localhost:4000/socket/websocket",
///     PhoenixClientOptions::default(),
/// )?;
///
/// client.connect().await?;
/// // Use the client...
/// client.disconnect().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PhoenixClient {
    pub(crate) endpoint: String,
    pub(crate) options: PhoenixClientOptions,

    // Connection manager
    pub(crate) connection: Arc<ConnectionManager>,

    // Consolidated mutable state
    pub(crate) state: Arc<RwLock<ClientState>>,
}

impl PhoenixClient {
    /// Creates a new client without connecting; call
    /// [`connect()`](Self::connect) to open the socket.
    ///
    /// # Errors
    ///
    /// Returns [`PhoenixError::UrlParse`](crate::types::PhoenixError::UrlParse)
    /// when the endpoint is not a valid URL, or
    /// [`PhoenixError::Connection`](crate::types::PhoenixError::Connection)
    /// when it is not a `ws://`/`wss://` one.
    pub fn new(endpoint: impl Into<String>, options: PhoenixClientOptions) -> Result<Self> {
        PhoenixClientBuilder::new(endpoint, options).map(|builder| builder.build())
    }

    /// Set connection state and notify watchers
    async fn set_state(&self, new_state: ConnectionState) {
        self.connection.set_state(new_state).await;

        let state = self.state.read().await;
        state.notify_state_change(new_state, state.was_manual_disconnect);
    }

    /// Set manual disconnect flag and notify watchers
    async fn set_manual_disconnect(&self, manual: bool) {
        let mut state = self.state.write().await;
        state.was_manual_disconnect = manual;

        let conn_state = self.connection.state().await;
        state.notify_state_change(conn_state, manual);
    }

    /// Rejoin every channel that was subscribed before the connection went
    /// away. Bindings registered on those channels keep firing afterwards.
    pub async fn resubscribe_all_channels(&self) -> Result<()> {
        let channels = self.state.read().await.channels.clone();
        for channel in channels.iter() {
            channel.rejoin().await?;
        }
        Ok(())
    }

    pub async fn try_reconnect(&self) -> Result<()> {
        if self.state.read().await.was_manual_disconnect {
            tracing::info!("Manual disconnect detected, will not attempt to reconnect");
            return Ok(());
        }

        let max_attempts = self
            .options
            .reconnect_max_attempts
            .unwrap_or(RECONNECT_MAX_ATTEMPTS);
        let mut timer = Timer::default().with_max_attempts(Some(max_attempts));

        loop {
            {
                let state = self.connection.state().await;
                if state == ConnectionState::Open || state == ConnectionState::Connecting {
                    tracing::info!(
                        "Already connected or connecting, stopping reconnection attempts"
                    );
                    break;
                }
            }

            tracing::info!("Attempting to reconnect...");
            match self.connect().await {
                Ok(_) => {
                    tracing::info!("Reconnected successfully");
                    break;
                }
                Err(e) => {
                    tracing::error!("Reconnection attempt failed: {}", e);
                    if timer.exhausted() {
                        self.fail_all_channels(serde_json::json!({
                            "reason": "reconnect attempts exhausted"
                        }))
                        .await;
                        return Err(PhoenixError::Connection(format!(
                            "Giving up after {} reconnection attempts",
                            max_attempts
                        )));
                    }
                    timer.schedule_timeout().await;
                }
            }
        }
        Ok(())
    }

    /// Opens the WebSocket connection and starts the background tasks.
    ///
    /// After connecting successfully, the client will automatically:
    /// - Send periodic heartbeat frames
    /// - Attempt reconnection if the connection drops (unless manually disconnected)
    /// - Route incoming frames to subscribed channels
    /// - Rejoin channels that were subscribed before a disconnect
    ///
    /// If already connected, this method returns immediately without error.
    ///
    /// # Errors
    ///
    /// Returns an error if the WebSocket handshake fails or the endpoint URL
    /// is invalid.
    pub async fn connect(&self) -> Result<()> {
        {
            let state = self.connection.state().await;
            if state == ConnectionState::Open || state == ConnectionState::Connecting {
                return Ok(());
            }
        }
        self.set_state(ConnectionState::Connecting).await;

        // Build WebSocket URL with query parameters
        let url = self.build_endpoint_url()?;
        tracing::info!("Connecting to {}", &self.endpoint);

        let ws_stream = match WebSocketFactory::create(&url).await {
            Ok(stream) => stream,
            Err(e) => {
                self.connection.set_state(ConnectionState::Closed).await;
                return Err(e);
            }
        };
        let (mut write_half, mut read_half) = ws_stream.split();

        // Install the single outbound queue and the pump draining it; the
        // pump being the sole writer preserves framing order.
        let (outbound_tx, mut outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        self.connection.set_outbound(outbound_tx).await;

        let epoch = {
            let mut state = self.state.write().await;
            state.connection_epoch += 1;
            state.connection_epoch
        };

        {
            let mut state = self.state.write().await;
            state.task_manager.spawn(async move {
                while let Some(msg) = outbound_rx.recv().await {
                    if let Err(e) = write_half.send(msg).await {
                        tracing::error!("WebSocket write error: {}", e);
                        break;
                    }
                }
                let _ = write_half.close().await;
                tracing::debug!("Write task finished");
            });
        }

        // Spawn read task feeding the router
        let router = MessageRouter::new_with_state(Arc::clone(&self.state));
        let self_cloned = self.clone();
        {
            let mut state = self.state.write().await;
            state.task_manager.spawn(async move {
                tracing::debug!("Starting read task");
                while let Some(msg_result) = read_half.next().await {
                    match msg_result {
                        Ok(msg) => {
                            use tokio_tungstenite::tungstenite::Message;

                            match msg {
                                Message::Text(text) => {
                                    match serde_json::from_str::<PhoenixMessage>(&text) {
                                        Ok(phoenix_msg) => {
                                            tracing::debug!(
                                                "Received frame: topic={}, event={}",
                                                phoenix_msg.topic,
                                                phoenix_msg.event.as_str()
                                            );
                                            router.route(phoenix_msg).await;
                                        }
                                        Err(e) => {
                                            // Malformed frames are dropped, never fatal
                                            tracing::error!(
                                                "Failed to parse frame: {} - Raw: {}",
                                                e,
                                                text
                                            );
                                        }
                                    }
                                }
                                Message::Close(frame) => {
                                    if let Some(close_frame) = frame {
                                        tracing::warn!(
                                            "Server closed connection: code={:?}, reason='{}'",
                                            close_frame.code,
                                            close_frame.reason
                                        );
                                    } else {
                                        tracing::warn!(
                                            "Server closed connection without close frame"
                                        );
                                    }
                                    break;
                                }
                                Message::Ping(data) => {
                                    tracing::debug!("Received ping ({} bytes)", data.len());
                                }
                                Message::Pong(data) => {
                                    tracing::debug!("Received pong ({} bytes)", data.len());
                                }
                                Message::Binary(data) => {
                                    tracing::warn!(
                                        "Received unexpected binary frame ({} bytes)",
                                        data.len()
                                    );
                                }
                                Message::Frame(_) => {
                                    tracing::debug!("Received raw frame (internal)");
                                }
                            }
                        }
                        Err(e) => {
                            tracing::error!("WebSocket read error: {}", e);
                            break;
                        }
                    }
                }
                // Whatever ended the stream, tear down this connection —
                // unless a newer one already replaced it.
                self_cloned.handle_connection_lost(epoch).await;
            });
        }

        // Spawn heartbeat task
        let heartbeat_interval = self
            .options
            .heartbeat_interval
            .unwrap_or(HEARTBEAT_INTERVAL);
        HeartbeatManager::new(Arc::downgrade(&self.connection), Arc::clone(&self.state))
            .with_interval(std::time::Duration::from_millis(heartbeat_interval))
            .spawn()
            .await;

        self.set_manual_disconnect(false).await;
        self.set_state(ConnectionState::Open).await;

        tracing::info!("Connected to WebSocket server");

        // Flush join intents: channels subscribed before/across the outage
        self.resubscribe_all_channels().await?;

        Ok(())
    }

    /// Creates or retrieves the channel for a topic.
    ///
    /// One channel exists per topic: asking again for an active topic returns
    /// the existing handle (its original options stay in effect).
    ///
    /// # Errors
    ///
    /// Returns [`PhoenixError::Channel`](crate::types::PhoenixError::Channel)
    /// for an empty topic.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use phoenix_channels_rs::{PhoenixClient, PhoenixClientOptions};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let client = PhoenixClient::new("ws://localhost:4000/socket/websocket", PhoenixClientOptions::default())?;
    /// # client.connect().await?;
    /// let channel = client.channel("general:lobby", Default::default()).await?;
    /// channel.subscribe().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn channel(
        &self,
        topic: &str,
        options: crate::channel::PhoenixChannelOptions,
    ) -> Result<Arc<PhoenixChannel>> {
        if topic.is_empty() {
            return Err(PhoenixError::Channel("Topic must not be empty".to_string()));
        }

        let state = self.state.read().await;
        for existing_channel in state.channels.iter() {
            if existing_channel.topic() == topic {
                return Ok(Arc::clone(existing_channel));
            }
        }
        drop(state);

        let new_channel = Arc::new(PhoenixChannel::new(
            topic.to_string(),
            Arc::new(self.clone()),
            options,
        ));
        self.state
            .write()
            .await
            .channels
            .push(Arc::clone(&new_channel));

        Ok(new_channel)
    }

    /// Gracefully disconnects and stops all background tasks.
    ///
    /// A manual disconnect never auto-reconnects; call
    /// [`connect()`](Self::connect) again to come back. Subscribed channels
    /// observe the disconnect as a `phx_error` event and rejoin on the next
    /// connect.
    pub async fn disconnect(&self) -> Result<()> {
        {
            let state = self.connection.state().await;
            if state == ConnectionState::Closed {
                return Ok(());
            }
        }

        self.set_manual_disconnect(true).await;
        tracing::info!("Disconnecting from WebSocket server");

        let channels = {
            let mut state = self.state.write().await;
            state.task_manager.abort_all();
            state.pending_heartbeat_ref = None;
            state.channels.clone()
        };

        for channel in channels {
            channel
                .mark_errored(serde_json::json!({"reason": "client disconnected"}))
                .await;
        }

        self.connection.close().await?;
        self.set_state(ConnectionState::Closed).await;

        tracing::info!("Disconnected from WebSocket server");
        Ok(())
    }

    /// Checks whether the client is currently connected to the server.
    pub async fn is_connected(&self) -> bool {
        self.connection.is_connected().await
    }

    /// Tear-down path for a connection that died under us: drop the outbound
    /// queue, let subscribed channels observe the drop, then notify the state
    /// watcher so reconnection starts. The epoch makes a stale task from an
    /// already-replaced connection a no-op.
    pub(crate) async fn handle_connection_lost(&self, epoch: u64) {
        {
            let state = self.state.read().await;
            if state.connection_epoch != epoch {
                return;
            }
        }
        {
            let state = self.connection.state().await;
            if state == ConnectionState::Closed {
                return;
            }
        }

        self.connection.clear_outbound().await;

        let channels = {
            let mut state = self.state.write().await;
            state.pending_heartbeat_ref = None;
            state.channels.clone()
        };
        for channel in channels {
            channel
                .mark_errored(serde_json::json!({"reason": "connection lost"}))
                .await;
        }

        self.set_state(ConnectionState::Closed).await;

        // Kill the leftover tasks last; when the caller is the read task
        // itself, everything above has already run by the time the abort
        // flag can take effect.
        self.state.write().await.task_manager.abort_all();
    }

    /// Deliver a permanent-failure signal to every channel (reconnect gave up)
    async fn fail_all_channels(&self, reason: serde_json::Value) {
        let channels = self.state.read().await.channels.clone();
        for channel in channels {
            channel._trigger("phx_error".into(), reason.clone()).await;
        }
    }

    /// Build the WebSocket endpoint URL with query parameters
    fn build_endpoint_url(&self) -> Result<String> {
        let mut url = Url::parse(&self.endpoint)?;

        {
            let mut query = url.query_pairs_mut();
            for (key, value) in &self.options.params {
                query.append_pair(key, value);
            }
            query.append_pair("vsn", VSN);
        }

        Ok(url.to_string())
    }

    /// Generate next frame reference
    pub async fn make_ref(&self) -> String {
        let mut state = self.state.write().await;
        state.make_ref()
    }

    /// Queue a frame for transmission
    pub async fn push(&self, message: PhoenixMessage) -> Result<()> {
        if !self.is_connected().await {
            return Err(PhoenixError::NotConnected);
        }

        self.connection.send_message(&message).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_options() -> PhoenixClientOptions {
        PhoenixClientOptions {
            params: vec![("token".to_string(), "abc".to_string())],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_rejects_non_websocket_endpoint() {
        let result = PhoenixClient::new("http://localhost:4000", PhoenixClientOptions::default());
        assert!(matches!(result, Err(PhoenixError::Connection(_))));

        let result = PhoenixClient::new("not a url", PhoenixClientOptions::default());
        assert!(matches!(result, Err(PhoenixError::UrlParse(_))));
    }

    #[tokio::test]
    async fn test_endpoint_url_carries_params_and_vsn() {
        let client =
            PhoenixClient::new("ws://localhost:4000/socket/websocket", test_options()).unwrap();

        let url = client.build_endpoint_url().unwrap();
        assert!(url.contains("token=abc"));
        assert!(url.contains("vsn=1.0.0"));
    }

    #[tokio::test]
    async fn test_channel_is_deduplicated_by_topic() {
        let client = PhoenixClient::new(
            "ws://localhost:4000/socket/websocket",
            PhoenixClientOptions::default(),
        )
        .unwrap();

        let a = client
            .channel("general:lobby", Default::default())
            .await
            .unwrap();
        let b = client
            .channel("general:lobby", Default::default())
            .await
            .unwrap();
        let c = client
            .channel("general:other", Default::default())
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn test_empty_topic_is_rejected() {
        let client = PhoenixClient::new(
            "ws://localhost:4000/socket/websocket",
            PhoenixClientOptions::default(),
        )
        .unwrap();

        assert!(matches!(
            client.channel("", Default::default()).await,
            Err(PhoenixError::Channel(_))
        ));
    }

    #[tokio::test]
    async fn test_make_ref_is_monotonic() {
        let client = PhoenixClient::new(
            "ws://localhost:4000/socket/websocket",
            PhoenixClientOptions::default(),
        )
        .unwrap();

        assert_eq!(client.make_ref().await, "1");
        assert_eq!(client.make_ref().await, "2");
        assert_eq!(client.make_ref().await, "3");
    }

    #[tokio::test]
    async fn test_push_while_disconnected_fails() {
        let client = PhoenixClient::new(
            "ws://localhost:4000/socket/websocket",
            PhoenixClientOptions::default(),
        )
        .unwrap();

        let message = PhoenixMessage::new(
            "general:lobby".to_string(),
            "shout".into(),
            serde_json::json!({}),
        );
        assert!(matches!(
            client.push(message).await,
            Err(PhoenixError::NotConnected)
        ));
    }
}

use crate::ChannelEvent;
use crate::client::{ClientState, ConnectionManager, ConnectionState};
use crate::messaging::SystemEvent;
use crate::types::constants::{HEARTBEAT_INTERVAL, PHOENIX_TOPIC};
use crate::types::message::PhoenixMessage;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time;

/// Periodic keepalive on the reserved `"phoenix"` topic.
///
/// Every interval a heartbeat frame goes out with a fresh ref; the router
/// clears `pending_heartbeat_ref` when the matching ack arrives. Finding the
/// previous ref still pending at the next tick means the server went quiet,
/// so the connection is closed and the reconnection watcher takes over.
pub struct HeartbeatManager {
    interval: Duration,
    connection: Weak<ConnectionManager>,
    state: Arc<RwLock<ClientState>>,
}

impl HeartbeatManager {
    pub fn new(connection: Weak<ConnectionManager>, state: Arc<RwLock<ClientState>>) -> Self {
        Self {
            interval: Duration::from_millis(HEARTBEAT_INTERVAL),
            connection,
            state,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Registers the heartbeat loop with the client's task manager
    pub async fn spawn(self) {
        let state = Arc::clone(&self.state);
        let mut guard = state.write().await;
        guard.task_manager.spawn(self.run());
    }

    async fn run(self) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
        // The first tick completes immediately; consume it so the first
        // heartbeat goes out one full interval after connect.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(connection) = self.connection.upgrade() else {
                break;
            };

            // The loop dies with the connection; connect() spawns a new one
            if connection.state().await != ConnectionState::Open {
                break;
            }

            let missed_ack = self.state.read().await.pending_heartbeat_ref.is_some();
            if missed_ack {
                tracing::warn!("Heartbeat ack missing, closing connection");
                self.close_silent_connection(&connection).await;
                break;
            }

            let heartbeat_ref = {
                let mut state = self.state.write().await;
                let heartbeat_ref = state.make_ref();
                state.pending_heartbeat_ref = Some(heartbeat_ref.clone());
                heartbeat_ref
            };

            let heartbeat_message = PhoenixMessage::new(
                PHOENIX_TOPIC.to_string(),
                ChannelEvent::System(SystemEvent::Heartbeat),
                serde_json::json!({}),
            )
            .with_ref(heartbeat_ref.clone());

            match connection.send_message(&heartbeat_message).await {
                Ok(()) => tracing::debug!("Sent heartbeat with ref {}", heartbeat_ref),
                Err(e) => tracing::error!("Failed to send heartbeat: {}", e),
            }
        }
        tracing::debug!("Heartbeat task finished");
    }

    /// Tear down a connection whose heartbeat went unanswered and notify the
    /// state watcher so reconnection kicks in.
    async fn close_silent_connection(&self, connection: &Arc<ConnectionManager>) {
        let channels = {
            let mut state = self.state.write().await;
            state.pending_heartbeat_ref = None;
            state.channels.clone()
        };

        if let Err(e) = connection.close().await {
            tracing::debug!("Error closing silent connection: {}", e);
        }

        for channel in channels {
            channel
                .mark_errored(serde_json::json!({"reason": "heartbeat timeout"}))
                .await;
        }

        let state = self.state.read().await;
        state.notify_state_change(ConnectionState::Closed, state.was_manual_disconnect);
    }
}

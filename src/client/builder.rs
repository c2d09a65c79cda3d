use super::{ClientState, ConnectionManager, ConnectionState, PhoenixClient};
use crate::types::{PhoenixError, Result};
use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use url::Url;

#[derive(Debug, Clone, Default)]
pub struct PhoenixClientOptions {
    /// Connect params appended to the endpoint URL query string
    pub params: Vec<(String, String)>,
    /// Default push/join acknowledgement window in milliseconds
    pub timeout: Option<u64>,
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: Option<u64>,
    /// Reconnect attempts before giving up; `None` uses the built-in cap
    pub reconnect_max_attempts: Option<u32>,
}

/// Builder for PhoenixClient that handles initialization
pub struct PhoenixClientBuilder {
    endpoint: String,
    options: PhoenixClientOptions,
}

impl PhoenixClientBuilder {
    /// Create a new builder
    pub fn new(endpoint: impl Into<String>, options: PhoenixClientOptions) -> Result<Self> {
        let endpoint = endpoint.into();

        // Catch malformed endpoints before any background task exists
        let url = Url::parse(&endpoint)?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(PhoenixError::Connection(format!(
                "Endpoint must use ws:// or wss://, got {}",
                url.scheme()
            )));
        }

        Ok(Self { endpoint, options })
    }

    /// Build the client and spawn the reconnection watcher
    pub fn build(self) -> PhoenixClient {
        let mut client_state = ClientState::new();

        // Initialize state watcher channel
        let (state_tx, state_rx) = watch::channel((ConnectionState::Closed, false));
        client_state.state_change_tx = Some(state_tx);

        let client = PhoenixClient {
            endpoint: self.endpoint,
            options: self.options,
            connection: Arc::new(ConnectionManager::new()),
            state: Arc::new(RwLock::new(client_state)),
        };

        // Spawn reconnection watcher task
        let client_for_watcher = client.clone();
        tokio::spawn(async move {
            let mut rx = state_rx;

            while rx.changed().await.is_ok() {
                let (state, was_manual) = *rx.borrow_and_update();

                // Reconnect if closed/disconnected AND not manual
                if matches!(state, ConnectionState::Closed) && !was_manual {
                    tracing::info!("State watcher detected disconnect, attempting reconnection...");

                    if let Err(e) = client_for_watcher.try_reconnect().await {
                        tracing::error!("Reconnection watcher failed: {}", e);
                    }
                }
            }
            tracing::debug!("Reconnection watcher task finished");
        });

        client
    }
}

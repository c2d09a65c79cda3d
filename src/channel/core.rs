use super::{
    Push,
    state::{ChannelState, ChannelStatus, EventBinding},
};
use crate::client::PhoenixClient;
use crate::messaging::{ChannelEvent, SystemEvent};
use crate::types::constants::{DEFAULT_TIMEOUT, MAX_PUSH_BUFFER_SIZE};
use crate::types::{PhoenixError, PhoenixMessage, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};

/// Configuration options for a channel.
#[derive(Debug, Clone)]
pub struct PhoenixChannelOptions {
    /// Opaque payload carried by the join frame
    pub params: serde_json::Value,
    /// Push/join acknowledgement window in milliseconds; falls back to the
    /// client-level setting
    pub timeout: Option<u64>,
}

impl Default for PhoenixChannelOptions {
    fn default() -> Self {
        Self {
            params: serde_json::json!({}),
            timeout: None,
        }
    }
}

/// A named logical sub-stream multiplexed over one connection.
///
/// Channels are joined before use and identified by a topic string. Register
/// listeners with [`on()`](Self::on), join with
/// [`subscribe()`](Self::subscribe), send with [`push()`](Self::push).
///
/// # Example
///
/// ```no_run
/// use phoenix_channels_rs::{PhoenixClient, PhoenixClientOptions};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let client = PhoenixClient::new(
/// #     "ws://localhost:4000/socket/websocket",
/// #     PhoenixClientOptions::default(),
/// # )?;
/// # client.connect().await?;
/// let channel = client.channel("general:lobby", Default::default()).await?;
///
/// // Register listeners BEFORE subscribing
/// let mut shouts = channel.on("shout").await;
///
/// channel.subscribe().await?;
///
/// channel
///     .push("shout", json!({"type": "inn", "data": "1234567890"}))
///     .send()
///     .await?;
///
/// tokio::spawn(async move {
///     while let Some(payload) = shouts.recv().await {
///         println!("Received shout: {:?}", payload);
///     }
/// });
/// # Ok(())
/// # }
/// ```
pub struct PhoenixChannel {
    topic: String,
    client: Arc<PhoenixClient>,
    pub(crate) state: Arc<RwLock<ChannelState>>,
    options: PhoenixChannelOptions,
}

impl PhoenixChannel {
    pub fn new(
        topic: String,
        client: Arc<PhoenixClient>,
        options: PhoenixChannelOptions,
    ) -> Self {
        Self {
            topic,
            client,
            state: Arc::new(RwLock::new(ChannelState::new())),
            options,
        }
    }

    /// Current join status
    pub async fn status(&self) -> ChannelStatus {
        self.state.read().await.status
    }

    /// Registers an event listener.
    ///
    /// Returns a receiver fed with the payload of every matching inbound
    /// frame. Duplicate registrations for the same event each get their own
    /// receiver, fed in registration order. Bindings survive reconnects;
    /// they are removed by [`off()`](Self::off) or when the channel leaves.
    pub async fn on(&self, event: impl Into<ChannelEvent>) -> mpsc::Receiver<serde_json::Value> {
        let (tx, rx) = mpsc::channel(100);
        let binding = EventBinding {
            event: event.into(),
            sender: tx,
        };

        self.state.write().await.bindings.push(binding);

        rx
    }

    /// Cancels every binding registered for an event. The matching
    /// receivers observe a closed stream.
    pub async fn off(&self, event: impl Into<ChannelEvent>) {
        let event = event.into();
        self.state.write().await.bindings.retain(|b| b.event != event);
    }

    /// Joins the channel.
    ///
    /// Sends one join frame and returns immediately; the channel reaches
    /// `Joined` on the server's ok reply, or `Errored` on a rejection or
    /// timeout (observable via [`status()`](Self::status) and a `phx_error`
    /// event). While a join is already in flight or acknowledged this is a
    /// no-op, so exactly one join frame is ever pending per channel.
    ///
    /// Subscribing before the connection is open records the intent; the
    /// join frame goes out as soon as the connection does.
    ///
    /// # Errors
    ///
    /// Returns an error when the channel is currently leaving, or when the
    /// join frame cannot be queued.
    pub async fn subscribe(self: &Arc<Self>) -> Result<()> {
        let connected = self.client.is_connected().await;

        let join_ref = {
            let mut state = self.state.write().await;
            match state.status {
                ChannelStatus::Joined => return Ok(()),
                ChannelStatus::Joining if state.pending_join.is_some() => return Ok(()),
                ChannelStatus::Leaving => {
                    return Err(PhoenixError::Channel(format!(
                        "Cannot join {} while leaving",
                        self.topic
                    )));
                }
                _ => {}
            }

            state.status = ChannelStatus::Joining;
            state.rejoin = true;
            state.left = false;

            if !connected {
                // Join intent recorded; connect() replays it once open
                tracing::debug!("Deferring join of {} until connected", self.topic);
                return Ok(());
            }

            let join_ref = self.client.make_ref().await;
            state.pending_join = Some(join_ref.clone());
            state.join_ref = Some(join_ref.clone());
            join_ref
        };

        let join_message = PhoenixMessage::new(
            self.topic.clone(),
            ChannelEvent::System(SystemEvent::Join),
            self.options.params.clone(),
        )
        .with_ref(join_ref.clone())
        .with_join_ref(join_ref.clone());

        tracing::info!("Joining channel: {}", self.topic);

        if let Err(e) = self.client.push(join_message).await {
            let mut state = self.state.write().await;
            state.pending_join = None;
            state.status = ChannelStatus::Errored;
            return Err(e);
        }

        self.spawn_join_timeout(join_ref);

        Ok(())
    }

    /// Leaves the channel.
    ///
    /// Sends a leave frame (best effort when disconnected), cancels every
    /// binding and drops buffered pushes. Subscribing again later starts a
    /// fresh join.
    pub async fn unsubscribe(&self) -> Result<()> {
        let join_ref = {
            let mut state = self.state.write().await;
            if state.status == ChannelStatus::Closed {
                return Ok(());
            }
            state.status = ChannelStatus::Leaving;
            state.rejoin = false;
            state.left = true;
            state.pending_join = None;
            state.join_ref.clone()
        };

        let leave_ref = self.client.make_ref().await;
        let mut leave_message = PhoenixMessage::new(
            self.topic.clone(),
            ChannelEvent::System(SystemEvent::Leave),
            serde_json::json!({}),
        )
        .with_ref(leave_ref);
        if let Some(join_ref) = join_ref {
            leave_message = leave_message.with_join_ref(join_ref);
        }

        if let Err(e) = self.client.push(leave_message).await {
            // The server already lost us; local teardown still applies
            tracing::debug!("Leave frame not transmitted: {}", e);
        }

        tracing::info!("Leaving channel: {}", self.topic);

        let mut state = self.state.write().await;
        state.status = ChannelStatus::Closed;
        state.bindings.clear();
        state.push_buffer.clear();
        state.join_ref = None;

        Ok(())
    }

    /// Builds a push for this channel.
    ///
    /// Attach acknowledgement callbacks with [`Push::receive`] and transmit
    /// with [`Push::send`]. A push sent while the channel is not yet joined
    /// (or the connection is down) is buffered FIFO and flushed on join;
    /// pushing on a channel that left fails instead. Exactly one of the
    /// ok/error/timeout callbacks fires per push.
    pub fn push(
        self: &Arc<Self>,
        event: impl Into<ChannelEvent>,
        payload: serde_json::Value,
    ) -> Push {
        let ref_id = uuid::Uuid::new_v4().to_string();
        let event = event.into();
        Push::new(
            event.as_str().to_string(),
            payload,
            ref_id,
            self.push_timeout(),
            Arc::clone(self),
        )
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Acknowledgement window resolution: channel option, then client
    /// option, then the protocol default.
    fn push_timeout(&self) -> Duration {
        let ms = self
            .options
            .timeout
            .or(self.client.options.timeout)
            .unwrap_or(DEFAULT_TIMEOUT);
        Duration::from_millis(ms)
    }

    /// Transmit or buffer a push, and start its timeout clock.
    pub(crate) async fn send_push(self: &Arc<Self>, push: Arc<Push>) -> Result<()> {
        let connected = self.client.is_connected().await;

        let message = {
            let mut state = self.state.write().await;

            if state.status == ChannelStatus::Leaving || state.left {
                return Err(PhoenixError::Channel(format!(
                    "Cannot push '{}' on left channel {}",
                    push.event, self.topic
                )));
            }

            if state.status == ChannelStatus::Joined && connected {
                state
                    .pending_pushes
                    .insert(push.ref_id.clone(), Arc::clone(&push));
                Some(self.frame_for(&push, state.join_ref.as_deref()))
            } else {
                if state.push_buffer.len() >= MAX_PUSH_BUFFER_SIZE {
                    return Err(PhoenixError::Channel(format!(
                        "Push buffer full on channel {}",
                        self.topic
                    )));
                }
                state.push_buffer.push_back(Arc::clone(&push));
                None
            }
        };

        match message {
            Some(message) => {
                if let Err(e) = self.client.push(message).await {
                    // Connection raced shut; keep the push for the next join
                    tracing::warn!("Push {} not transmitted, buffering: {}", push.ref_id, e);
                    let mut state = self.state.write().await;
                    state.pending_pushes.remove(&push.ref_id);
                    state.push_buffer.push_back(Arc::clone(&push));
                }
            }
            None => {
                tracing::debug!("Buffered push {} until {} is joined", push.ref_id, self.topic);
            }
        }

        self.spawn_push_timeout(push);
        Ok(())
    }

    fn frame_for(&self, push: &Push, join_ref: Option<&str>) -> PhoenixMessage {
        let mut message = PhoenixMessage::new(
            self.topic.clone(),
            ChannelEvent::parse(&push.event),
            push.payload.clone(),
        )
        .with_ref(push.ref_id.clone());
        if let Some(join_ref) = join_ref {
            message = message.with_join_ref(join_ref.to_string());
        }
        message
    }

    /// Drop a push from the pending set and the buffer (timeout or cancel)
    pub(crate) async fn discard_push(&self, ref_id: &str) {
        let mut state = self.state.write().await;
        state.pending_pushes.remove(ref_id);
        state.push_buffer.retain(|p| p.ref_id != ref_id);
    }

    fn spawn_push_timeout(self: &Arc<Self>, push: Arc<Push>) {
        let channel = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(push.timeout).await;
            if push.is_resolved() {
                return;
            }
            channel.discard_push(&push.ref_id).await;
            tracing::debug!("Push {} timed out on channel {}", push.ref_id, channel.topic);
            push.trigger("timeout", serde_json::json!({}));
        });
    }

    fn spawn_join_timeout(self: &Arc<Self>, join_ref: String) {
        let channel = Arc::clone(self);
        let timeout = self.push_timeout();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let timed_out = {
                let mut state = channel.state.write().await;
                if state.pending_join.as_deref() == Some(join_ref.as_str())
                    && state.status == ChannelStatus::Joining
                {
                    state.pending_join = None;
                    state.status = ChannelStatus::Errored;
                    true
                } else {
                    false
                }
            };
            if timed_out {
                tracing::warn!("Join timed out for channel {}", channel.topic);
                channel
                    ._trigger(
                        ChannelEvent::System(SystemEvent::Error),
                        serde_json::json!({"reason": "join timeout"}),
                    )
                    .await;
            }
        });
    }

    /// Deliver a payload to every binding registered for the event.
    /// Dispatch follows registration order; a dead listener is logged and
    /// skipped so the rest still run.
    pub(crate) async fn _trigger(&self, event: ChannelEvent, payload: serde_json::Value) {
        let targets: Vec<mpsc::Sender<serde_json::Value>> = {
            let state = self.state.read().await;
            state
                .bindings
                .iter()
                .filter(|binding| binding.event == event)
                .map(|binding| binding.sender.clone())
                .collect()
        };

        for sender in targets {
            if let Err(e) = sender.send(payload.clone()).await {
                tracing::warn!(
                    "Failed to deliver event '{}' to listener: {}. Receiver may be closed.",
                    event.as_str(),
                    e
                );
            }
        }
    }

    /// Resolve a reply to the in-flight join. Returns false when the ref
    /// does not belong to it.
    pub(crate) async fn resolve_join_reply(
        &self,
        ref_id: &str,
        status: &str,
        response: serde_json::Value,
    ) -> bool {
        {
            let state = self.state.read().await;
            if state.pending_join.as_deref() != Some(ref_id) {
                return false;
            }
        }

        if status == "ok" {
            tracing::info!("Joined channel: {}", self.topic);
            self.acknowledge_join().await;
        } else {
            {
                let mut state = self.state.write().await;
                state.pending_join = None;
                state.status = ChannelStatus::Errored;
            }
            tracing::warn!("Join rejected for channel {}: {}", self.topic, response);
            self._trigger(ChannelEvent::System(SystemEvent::Error), response)
                .await;
        }
        true
    }

    /// Move to Joined and flush the push buffer FIFO, so buffered frames hit
    /// the wire after the join frame and in call order.
    async fn acknowledge_join(&self) {
        let messages = {
            let mut state = self.state.write().await;
            state.pending_join = None;
            state.status = ChannelStatus::Joined;
            let join_ref = state.join_ref.clone();

            let mut messages = Vec::new();
            while let Some(push) = state.push_buffer.pop_front() {
                if push.is_resolved() {
                    continue; // timed out while buffered
                }
                state
                    .pending_pushes
                    .insert(push.ref_id.clone(), Arc::clone(&push));
                messages.push(self.frame_for(&push, join_ref.as_deref()));
            }
            messages
        };

        for message in messages {
            if let Err(e) = self.client.push(message).await {
                tracing::warn!("Failed to flush buffered push: {}", e);
            }
        }
    }

    /// Resolve a reply to a tracked push by ref. Returns false when no push
    /// with that ref is pending.
    pub(crate) async fn resolve_push_reply(
        &self,
        ref_id: &str,
        status: &str,
        response: serde_json::Value,
    ) -> bool {
        let push = {
            let mut state = self.state.write().await;
            state.pending_pushes.remove(ref_id)
        };

        let Some(push) = push else {
            return false;
        };

        push.trigger(status, response);
        true
    }

    /// The connection dropped (or the server sent `phx_error`): an active
    /// channel becomes Errored and its listeners observe a `phx_error`
    /// event. Bindings stay registered for the rejoin.
    pub(crate) async fn mark_errored(&self, reason: serde_json::Value) {
        {
            let mut state = self.state.write().await;
            if !matches!(state.status, ChannelStatus::Joined | ChannelStatus::Joining) {
                return;
            }
            state.status = ChannelStatus::Errored;
            state.pending_join = None;
        }
        tracing::warn!("Channel {} errored", self.topic);
        self._trigger(ChannelEvent::System(SystemEvent::Error), reason)
            .await;
    }

    /// Server-side close (`phx_close`). Final: the channel will not rejoin
    /// until subscribed again explicitly.
    pub(crate) async fn acknowledge_close(&self) {
        {
            let mut state = self.state.write().await;
            state.status = ChannelStatus::Closed;
            state.pending_join = None;
            state.join_ref = None;
            state.rejoin = false;
        }
        tracing::debug!("Channel {} closed by server", self.topic);
        self._trigger(
            ChannelEvent::System(SystemEvent::Close),
            serde_json::json!({}),
        )
        .await;
    }

    /// Re-enter the join flow after a reconnect, for channels whose
    /// subscribe intent is still standing.
    pub(crate) async fn rejoin(self: &Arc<Self>) -> Result<()> {
        {
            let mut state = self.state.write().await;
            let join_on_wire =
                state.status == ChannelStatus::Joining && state.pending_join.is_some();
            if !state.rejoin
                || join_on_wire
                || matches!(state.status, ChannelStatus::Joined | ChannelStatus::Leaving)
            {
                return Ok(());
            }
            state.status = ChannelStatus::Closed;
        }
        self.subscribe().await
    }
}

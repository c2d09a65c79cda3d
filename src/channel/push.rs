use super::core::PhoenixChannel;
use crate::types::Result;
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

type Callback = Arc<dyn Fn(Value) + Send + Sync + 'static>;

/// A single outbound event with optional acknowledgement tracking.
///
/// Attach callbacks with [`receive`](Self::receive) before calling
/// [`send`](Self::send); exactly one of the `"ok"`, `"error"` or `"timeout"`
/// callbacks fires, never more than one. A late reply after the timeout
/// already fired is discarded.
pub struct Push {
    pub event: String,
    pub payload: Value,
    pub ref_id: String,
    pub(crate) timeout: Duration,
    pub(crate) channel: Arc<PhoenixChannel>,
    callbacks: Mutex<HashMap<String, Callback>>,
    resolved: AtomicBool,
}

impl Push {
    pub(crate) fn new(
        event: String,
        payload: Value,
        ref_id: String,
        timeout: Duration,
        channel: Arc<PhoenixChannel>,
    ) -> Self {
        Self {
            event,
            payload,
            ref_id,
            timeout,
            channel,
            callbacks: Mutex::new(HashMap::new()),
            resolved: AtomicBool::new(false),
        }
    }

    /// Register a callback for a reply status ("ok", "error" or "timeout")
    pub fn receive<F>(self, status: &str, callback: F) -> Self
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.callbacks
            .lock()
            .unwrap()
            .insert(status.to_string(), Arc::new(callback));
        self
    }

    /// Override the acknowledgement window for this push.
    /// A zero timeout resolves with a timeout outcome right after transmit.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Transmit the push, or queue it until the channel is joined on an open
    /// connection. See [`PhoenixChannel::push`] for the buffering policy.
    pub async fn send(self) -> Result<PushRef> {
        let channel = Arc::clone(&self.channel);
        let push = Arc::new(self);
        channel.send_push(Arc::clone(&push)).await?;
        Ok(PushRef { push })
    }

    /// Resolve the push. Only the first resolution runs its callback;
    /// anything after that is a no-op.
    pub(crate) fn trigger(&self, status: &str, payload: Value) {
        if self.resolved.swap(true, Ordering::SeqCst) {
            return;
        }

        let opt_callback = {
            let callbacks = self.callbacks.lock().unwrap();
            callbacks.get(status).cloned()
        }; // Lock released here

        if let Some(callback) = opt_callback {
            callback(payload);
        }
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::SeqCst)
    }

    /// Mark resolved without firing any callback
    pub(crate) fn detach(&self) {
        self.resolved.store(true, Ordering::SeqCst);
    }
}

/// Handle to a sent [`Push`].
pub struct PushRef {
    push: Arc<Push>,
}

impl PushRef {
    /// The correlation ref the reply will carry
    pub fn ref_id(&self) -> &str {
        &self.push.ref_id
    }

    /// Detach the acknowledgement callbacks. A transmission already in
    /// flight is unaffected; its reply is simply ignored.
    pub async fn cancel(&self) {
        self.push.detach();
        self.push.channel.discard_push(&self.push.ref_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting(counter: &Arc<AtomicUsize>) -> impl Fn(Value) + Send + Sync + 'static {
        let counter = Arc::clone(counter);
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_trigger_fires_exactly_once() {
        let client = crate::PhoenixClient::new(
            "ws://localhost:4000/socket/websocket",
            Default::default(),
        )
        .unwrap();
        let channel = client
            .channel("general:lobby", Default::default())
            .await
            .unwrap();

        let ok = Arc::new(AtomicUsize::new(0));
        let timeout = Arc::new(AtomicUsize::new(0));

        let push = channel
            .push("shout", serde_json::json!({}))
            .receive("ok", counting(&ok))
            .receive("timeout", counting(&timeout));

        push.trigger("ok", Value::Null);
        push.trigger("ok", Value::Null);
        push.trigger("timeout", Value::Null);

        assert_eq!(ok.load(Ordering::SeqCst), 1);
        assert_eq!(timeout.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_detach_suppresses_callbacks() {
        let client = crate::PhoenixClient::new(
            "ws://localhost:4000/socket/websocket",
            Default::default(),
        )
        .unwrap();
        let channel = client
            .channel("general:lobby", Default::default())
            .await
            .unwrap();

        let ok = Arc::new(AtomicUsize::new(0));
        let push = channel
            .push("shout", serde_json::json!({}))
            .receive("ok", counting(&ok));

        push.detach();
        push.trigger("ok", Value::Null);

        assert_eq!(ok.load(Ordering::SeqCst), 0);
    }
}

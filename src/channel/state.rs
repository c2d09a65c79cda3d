use super::push::Push;
use crate::messaging::ChannelEvent;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Channel join status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Closed,
    Errored,
    Joined,
    Joining,
    Leaving,
}

/// Event binding for channel event listeners
#[derive(Debug)]
pub struct EventBinding {
    pub event: ChannelEvent,
    pub sender: mpsc::Sender<serde_json::Value>,
}

/// Mutable state for a PhoenixChannel
pub struct ChannelState {
    pub status: ChannelStatus,
    /// Listener registrations, dispatched in registration order
    pub bindings: Vec<EventBinding>,
    /// Transmitted pushes awaiting their reply, keyed by ref
    pub pending_pushes: HashMap<String, Arc<Push>>,
    /// FIFO of pushes waiting for the channel to reach Joined on an open
    /// connection
    pub push_buffer: VecDeque<Arc<Push>>,
    /// Ref of the accepted join, stamped on subsequent frames
    pub join_ref: Option<String>,
    /// Ref of the join frame still awaiting its reply
    pub pending_join: Option<String>,
    /// Subscribe intent: rejoin automatically after a reconnect
    pub rejoin: bool,
    /// Set by an explicit leave; pushes fail instead of buffering
    pub left: bool,
}

impl ChannelState {
    pub fn new() -> Self {
        Self {
            status: ChannelStatus::Closed,
            bindings: Vec::new(),
            pending_pushes: HashMap::new(),
            push_buffer: VecDeque::new(),
            join_ref: None,
            pending_join: None,
            rejoin: false,
            left: false,
        }
    }
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::new()
    }
}

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::turn::Origin;
use crate::service::sequencer::Channel;

/// What changed in client state. Render surfaces redraw from these; stale
/// results never produce one.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    TurnAppended {
        session: Uuid,
        index: usize,
        origin: Origin,
        text: String,
    },
    SessionError {
        session: Uuid,
        detail: String,
    },
    FlowLoading {
        view: Uuid,
        channel: Channel,
        sequence: u64,
    },
    FlowSettled {
        view: Uuid,
        channel: Channel,
        sequence: u64,
        succeeded: bool,
    },
}

#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<StateChange>,
}

impl EventBus {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StateChange>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A bus nobody listens to.
    pub fn detached() -> Self {
        let (bus, _rx) = Self::new();
        bus
    }

    pub fn emit(&self, change: StateChange) {
        let _ = self.tx.send(change);
    }
}

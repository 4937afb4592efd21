//! Flow chart progress: per-node activation state, a serialized update
//! queue, and the two-phase reporting protocol wallets use while executing.

pub mod coordinator;
pub mod event;
pub mod tracker;

use thiserror::Error;

pub use coordinator::{Listener, ProgressCoordinator, Subscription};
pub use event::{EventKind, FlowEvent, NodeSnapshot, NodeState, NodeStatus, NodeUpdate};
pub use tracker::{FixedJitter, Jitter, ProgressSink, RandomJitter, TransactionProgress};

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("Progress coordinator has been disposed")]
    Disposed,

    #[error("No async runtime available to drain the update queue")]
    NoRuntime,

    #[error("Unsupported queued event type {0}")]
    UnsupportedEvent(EventKind),
}

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use rand::Rng;
use tracing::{error, warn};

use super::ProgressError;
use super::coordinator::ProgressCoordinator;
use super::event::{FlowEvent, NodeSnapshot, NodeStatus, NodeUpdate};

/// Polls made by `verify_node_activation` unless told otherwise.
pub const DEFAULT_ACTIVATION_ATTEMPTS: u32 = 3;
pub const ACTIVATION_POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const MAX_JITTER: Duration = Duration::from_millis(2000);

/// Progress callback handed in by the UI layer: `(node_id, trading_loss)`.
pub type ProgressCallback<'a> = &'a mut (dyn FnMut(&str, Option<f64>) + Send);

/// Where transaction progress is reported.
pub trait ProgressSink: Send + Sync {
    fn queue_update(&self, event: FlowEvent) -> Result<(), ProgressError>;
    fn node_state(&self, node_id: &str) -> NodeSnapshot;
}

impl ProgressSink for ProgressCoordinator {
    fn queue_update(&self, event: FlowEvent) -> Result<(), ProgressError> {
        ProgressCoordinator::queue_update(self, event)
    }

    fn node_state(&self, node_id: &str) -> NodeSnapshot {
        self.get_node_state(node_id)
    }
}

/// Delay inserted before reporting, to spread RPC calls from parallel legs.
pub trait Jitter: Send + Sync {
    fn delay(&self) -> Duration;
}

/// Uniform in `[0, max)`.
#[derive(Debug, Clone, Copy)]
pub struct RandomJitter {
    pub max: Duration,
}

impl Default for RandomJitter {
    fn default() -> Self {
        RandomJitter { max: MAX_JITTER }
    }
}

impl Jitter for RandomJitter {
    fn delay(&self) -> Duration {
        if self.max.is_zero() {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(rand::rng().random_range(0.0..self.max.as_secs_f64()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FixedJitter(pub Duration);

impl Jitter for FixedJitter {
    fn delay(&self) -> Duration {
        self.0
    }
}

/// Two-phase progress reporting for one protocol's transactions: queue the
/// update, then poll until the node reads active.
pub struct TransactionProgress<S, J = RandomJitter> {
    sink: S,
    jitter: J,
    poll_interval: Duration,
}

impl<S: ProgressSink> TransactionProgress<S> {
    pub fn new(sink: S) -> Self {
        Self::with_jitter(sink, RandomJitter::default())
    }
}

impl<S: ProgressSink, J: Jitter> TransactionProgress<S, J> {
    pub fn with_jitter(sink: S, jitter: J) -> Self {
        TransactionProgress {
            sink,
            jitter,
            poll_interval: ACTIVATION_POLL_INTERVAL,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Queue a `NODE_UPDATE` marking `node_id` active, then call
    /// `update_progress`. The callback runs even when queueing fails; the
    /// return value says whether queueing succeeded.
    pub fn update_progress_and_wait(
        &self,
        update_progress: Option<ProgressCallback<'_>>,
        node_id: &str,
        trading_loss: Option<f64>,
    ) -> bool {
        let queued = self
            .sink
            .queue_update(FlowEvent::NodeUpdate(NodeUpdate::active(node_id, trading_loss)));
        if let Err(e) = &queued {
            error!(node_id, error = %e, "failed to queue progress update");
        }
        if let Some(callback) = update_progress {
            callback(node_id, trading_loss);
        }
        queued.is_ok()
    }

    /// Poll the node state up to `max_attempts` times.
    pub async fn verify_node_activation(&self, node_id: &str, max_attempts: u32) -> bool {
        for attempt in 1..=max_attempts {
            if self.sink.node_state(node_id).status == NodeStatus::Active {
                return true;
            }
            if attempt < max_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
        false
    }

    /// Jitter, report, verify. Never panics; any failure reads as `false`.
    pub async fn handle_transaction_progress(
        &self,
        update_progress: Option<ProgressCallback<'_>>,
        node_id: &str,
        trading_loss: Option<f64>,
        operation: &str,
    ) -> bool {
        let attempt = async {
            tokio::time::sleep(self.jitter.delay()).await;
            if !self.update_progress_and_wait(update_progress, node_id, trading_loss) {
                return false;
            }
            if !self
                .verify_node_activation(node_id, DEFAULT_ACTIVATION_ATTEMPTS)
                .await
            {
                warn!(node_id, operation, "node activation not confirmed");
            }
            true
        };
        match AssertUnwindSafe(attempt).catch_unwind().await {
            Ok(ok) => ok,
            Err(_) => {
                error!(node_id, operation, "progress reporting panicked");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_jitter_in_range() {
        let jitter = RandomJitter {
            max: Duration::from_millis(10),
        };
        for _ in 0..100 {
            assert!(jitter.delay() < Duration::from_millis(10));
        }
        assert_eq!(RandomJitter { max: Duration::ZERO }.delay(), Duration::ZERO);
    }
}

use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::model::NodeId;

use super::ProgressError;
use super::event::{EventKind, FlowEvent, NodeSnapshot, NodeState, NodeStatus, NodeUpdate};

/// Pause after a reset so renderers pick up the seeded states.
pub const CLEAR_SETTLE_DELAY: Duration = Duration::from_millis(100);

pub type Listener = Arc<dyn Fn(&FlowEvent) + Send + Sync>;

#[derive(Default)]
struct Inner {
    listeners: HashMap<EventKind, Vec<Listener>>,
    node_states: HashMap<NodeId, NodeState>,
    trading_losses: HashMap<NodeId, f64>,
    queue: VecDeque<FlowEvent>,
    is_processing: bool,
    /// Bumped by every reset; a drain started under an older generation stops.
    generation: u64,
    disposed: bool,
}

/// Per-node progress tracking with a serialized update queue.
///
/// Cloning yields another handle onto the same state. The lock is only held
/// for map updates, never while listeners run.
#[derive(Clone, Default)]
pub struct ProgressCoordinator {
    inner: Arc<Mutex<Inner>>,
    idle: Arc<Notify>,
}

/// Handle returned by [`ProgressCoordinator::subscribe`].
#[must_use = "dropping a Subscription keeps the listener registered; call unsubscribe() to remove it"]
pub struct Subscription {
    coordinator: ProgressCoordinator,
    kind: EventKind,
    listener: Listener,
}

impl Subscription {
    pub fn unsubscribe(self) {
        let mut inner = self.coordinator.lock();
        if let Some(listeners) = inner.listeners.get_mut(&self.kind) {
            listeners.retain(|l| !Arc::ptr_eq(l, &self.listener));
        }
    }
}

impl ProgressCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Pub/sub ──────────────────────────────────────────────────────

    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> Subscription
    where
        F: Fn(&FlowEvent) + Send + Sync + 'static,
    {
        self.subscribe_listener(kind, Arc::new(callback))
    }

    /// Register a shared listener. Registering the same `Arc` twice for one
    /// kind is a no-op.
    pub fn subscribe_listener(&self, kind: EventKind, listener: Listener) -> Subscription {
        let mut inner = self.lock();
        let listeners = inner.listeners.entry(kind).or_default();
        if !listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            listeners.push(listener.clone());
        }
        Subscription {
            coordinator: self.clone(),
            kind,
            listener,
        }
    }

    /// Invoke every listener for the event's kind. A panicking listener is
    /// logged and does not stop the others.
    pub fn emit(&self, event: &FlowEvent) {
        let listeners = self
            .lock()
            .listeners
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                error!(kind = %event.kind(), "progress listener panicked");
            }
        }
    }

    // ── Direct state ─────────────────────────────────────────────────

    /// Set a node's state immediately and emit `NODE_UPDATE`.
    pub fn update_node(&self, node_id: &str, status: NodeStatus, trading_loss: Option<f64>) {
        self.apply(node_id, status, trading_loss, None);
    }

    /// Write the state and emit. With `generation` set, the write is skipped
    /// (returning false) when a reset happened since that generation.
    fn apply(&self, node_id: &str, status: NodeStatus, trading_loss: Option<f64>, generation: Option<u64>) -> bool {
        {
            let mut inner = self.lock();
            if generation.is_some_and(|g| g != inner.generation) {
                return false;
            }
            inner.node_states.insert(
                node_id.to_string(),
                NodeState {
                    status,
                    timestamp: Utc::now(),
                    trading_loss,
                },
            );
            if let Some(loss) = trading_loss {
                inner.trading_losses.insert(node_id.to_string(), loss);
            }
        }
        self.emit(&FlowEvent::NodeUpdate(NodeUpdate {
            node_id: node_id.to_string(),
            status,
            trading_loss,
        }));
        true
    }

    pub fn get_node_state(&self, node_id: &str) -> NodeSnapshot {
        let inner = self.lock();
        NodeSnapshot {
            status: inner
                .node_states
                .get(node_id)
                .map(|s| s.status)
                .unwrap_or_default(),
            trading_loss: inner.trading_losses.get(node_id).copied(),
        }
    }

    pub fn trading_loss_of(&self, node_id: &str) -> Option<f64> {
        self.lock().trading_losses.get(node_id).copied()
    }

    pub fn node_states(&self) -> HashMap<NodeId, NodeState> {
        self.lock().node_states.clone()
    }

    // ── Queue ────────────────────────────────────────────────────────

    /// Append to the FIFO queue and start a drain if none is running.
    ///
    /// Must be called inside a tokio runtime.
    pub fn queue_update(&self, event: FlowEvent) -> Result<(), ProgressError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| ProgressError::NoRuntime)?;
        let mut inner = self.lock();
        if inner.disposed {
            return Err(ProgressError::Disposed);
        }
        inner.queue.push_back(event);
        if inner.is_processing {
            return Ok(());
        }
        inner.is_processing = true;
        let generation = inner.generation;
        drop(inner);

        let this = self.clone();
        handle.spawn(async move { this.process_queue(generation).await });
        Ok(())
    }

    pub fn batch_update(&self, updates: Vec<NodeUpdate>) -> Result<(), ProgressError> {
        self.queue_update(FlowEvent::BatchUpdate { status: updates })
    }

    async fn process_queue(&self, generation: u64) {
        loop {
            let next = {
                let mut inner = self.lock();
                if inner.generation != generation {
                    debug!("queue drain superseded by reset");
                    return;
                }
                match inner.queue.pop_front() {
                    Some(event) => event,
                    None => {
                        inner.is_processing = false;
                        drop(inner);
                        self.idle.notify_waiters();
                        return;
                    }
                }
            };
            if let Err(e) = self.process_update(next, generation) {
                warn!(error = %e, "skipping queued update");
            }
            tokio::task::yield_now().await;
        }
    }

    /// Apply one dequeued event unless a reset superseded `generation`.
    fn process_update(&self, event: FlowEvent, generation: u64) -> Result<(), ProgressError> {
        let updates = match event {
            FlowEvent::NodeUpdate(update) => vec![update],
            FlowEvent::BatchUpdate { status } => status,
            other => return Err(ProgressError::UnsupportedEvent(other.kind())),
        };
        for update in updates {
            if !self.apply(&update.node_id, update.status, update.trading_loss, Some(generation)) {
                debug!(node_id = %update.node_id, "dropping update from before reset");
                break;
            }
        }
        Ok(())
    }

    /// Resolve once no drain is in flight.
    pub async fn wait_until_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if !self.lock().is_processing {
                return;
            }
            notified.await;
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Reset for a new action: drop queued work and every node state, then
    /// seed `node_ids` as pending. Listeners are kept.
    pub async fn clear_all<S: AsRef<str>>(&self, node_ids: &[S]) {
        {
            let mut inner = self.lock();
            inner.queue.clear();
            inner.is_processing = false;
            inner.generation += 1;
            inner.trading_losses.clear();
            let now = Utc::now();
            inner.node_states = node_ids
                .iter()
                .map(|id| {
                    (
                        id.as_ref().to_string(),
                        NodeState {
                            status: NodeStatus::Pending,
                            timestamp: now,
                            trading_loss: None,
                        },
                    )
                })
                .collect();
        }
        self.idle.notify_waiters();
        debug!(nodes = node_ids.len(), "progress state cleared");
        tokio::time::sleep(CLEAR_SETTLE_DELAY).await;
    }

    /// Stop accepting updates and drop all listeners.
    pub fn dispose(&self) {
        {
            let mut inner = self.lock();
            inner.disposed = true;
            inner.listeners.clear();
            inner.queue.clear();
            inner.is_processing = false;
            inner.generation += 1;
        }
        self.idle.notify_waiters();
    }

    /// No drain in flight and nothing queued.
    pub fn is_ready(&self) -> bool {
        let inner = self.lock();
        !inner.is_processing && inner.queue.is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_unknown_node_reads_pending() {
        let c = ProgressCoordinator::new();
        assert_eq!(c.get_node_state("nope"), NodeSnapshot::default());
    }

    #[test]
    fn test_update_node_records_loss_and_emits() {
        let c = ProgressCoordinator::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let _sub = c.subscribe(EventKind::NodeUpdate, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        c.update_node("a", NodeStatus::Active, Some(-0.3));
        assert_eq!(c.get_node_state("a").status, NodeStatus::Active);
        assert_eq!(c.trading_loss_of("a"), Some(-0.3));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_duplicate_listener_registered_once() {
        let c = ProgressCoordinator::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let listener: Listener = Arc::new(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let first = c.subscribe_listener(EventKind::NodeUpdate, listener.clone());
        let _second = c.subscribe_listener(EventKind::NodeUpdate, listener);
        c.update_node("a", NodeStatus::Active, None);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        first.unsubscribe();
        c.update_node("a", NodeStatus::Active, None);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_queue_without_runtime_fails() {
        let c = ProgressCoordinator::new();
        let err = c
            .queue_update(FlowEvent::NodeUpdate(NodeUpdate::active("a", None)))
            .unwrap_err();
        assert!(matches!(err, ProgressError::NoRuntime));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_dequeued_before_reset_is_dropped() {
        let c = ProgressCoordinator::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let _sub = c.subscribe(EventKind::NodeUpdate, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        // A drain has popped these under the old generation when the reset lands.
        let stale = c.lock().generation;
        c.clear_all(&["x", "y"]).await;
        c.process_update(FlowEvent::NodeUpdate(NodeUpdate::active("x", Some(0.4))), stale)
            .unwrap();
        c.process_update(
            FlowEvent::BatchUpdate {
                status: vec![NodeUpdate::active("y", None)],
            },
            stale,
        )
        .unwrap();

        assert_eq!(c.get_node_state("x").status, NodeStatus::Pending);
        assert_eq!(c.get_node_state("y").status, NodeStatus::Pending);
        assert_eq!(c.trading_loss_of("x"), None);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        let current = c.lock().generation;
        c.process_update(FlowEvent::NodeUpdate(NodeUpdate::active("x", None)), current)
            .unwrap();
        assert_eq!(c.get_node_state("x").status, NodeStatus::Active);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ready_only_when_queue_drained() {
        let c = ProgressCoordinator::new();
        assert!(c.is_ready());
        c.queue_update(FlowEvent::NodeUpdate(NodeUpdate::active("a", None)))
            .unwrap();
        // The drain task has not run yet on this single-threaded runtime.
        assert!(!c.is_ready());
        c.wait_until_idle().await;
        assert!(c.is_ready());
    }
}

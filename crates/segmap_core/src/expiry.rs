//! Time-ordered expiry scheduling.
//!
//! One queue of pending expirations for the whole store, kept sorted
//! ascending by deadline, and exactly one background waiter that sleeps
//! until the head's deadline. Inserting a new head wakes the waiter so it
//! re-arms on the fresher deadline; the waiter re-evaluates the head on
//! every wakeup, so there is no per-wait cancellation token to misfire or
//! fire twice. [`ExpiryQueue::next_due`] is the waiter's blocking step; the
//! store owns the thread that loops on it.

use crate::node::Route;
use crate::value::ValueId;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// A scheduled expiration.
///
/// This is a reference to the entry, not ownership: the authoritative value
/// lives in the node, and firing no-ops if the id is already gone.
pub(crate) struct Pending<V> {
    /// Absolute deadline.
    pub expires_at: Instant,
    /// The original full key, for the change-feed record.
    pub key: Arc<str>,
    /// Id of the value within its owning node.
    pub id: ValueId,
    /// Routed path to the owning node, retained for removal and pruning.
    pub route: Route<V>,
}

struct QueueState<V> {
    /// Sorted ascending by `expires_at`; ties keep insertion order.
    pending: Vec<Pending<V>>,
    shutdown: bool,
}

/// The store-wide expiry queue.
pub(crate) struct ExpiryQueue<V> {
    state: Mutex<QueueState<V>>,
    waiter: Condvar,
}

impl<V> ExpiryQueue<V> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: Vec::new(),
                shutdown: false,
            }),
            waiter: Condvar::new(),
        }
    }

    /// Inserts a scheduled expiration at its sorted position.
    ///
    /// `partition_point` keeps equal deadlines in insertion order. Landing
    /// at index 0 supersedes whatever deadline the waiter is armed on, so
    /// the waiter is woken to re-arm.
    pub(crate) fn schedule(&self, pending: Pending<V>) {
        let mut state = self.state.lock();
        let index = state
            .pending
            .partition_point(|p| p.expires_at <= pending.expires_at);
        trace!(key = %pending.key, id = %pending.id, index, "scheduling expiry");
        state.pending.insert(index, pending);
        if index == 0 {
            self.waiter.notify_one();
        }
    }

    /// Blocks until the earliest pending expiration is due, then pops it.
    ///
    /// Returns `None` once the queue is shut down. Wakeups caused by a
    /// fresher head or by spurious condvar signals simply re-evaluate the
    /// head and go back to sleep.
    pub(crate) fn next_due(&self) -> Option<Pending<V>> {
        let mut state = self.state.lock();
        loop {
            if state.shutdown {
                return None;
            }
            match state.pending.first().map(|p| p.expires_at) {
                None => {
                    self.waiter.wait(&mut state);
                }
                Some(deadline) if deadline <= Instant::now() => {
                    return Some(state.pending.remove(0));
                }
                Some(deadline) => {
                    self.waiter.wait_until(&mut state, deadline);
                }
            }
        }
    }

    /// Number of pending expirations, stale entries included.
    pub(crate) fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Stops the waiter; pending entries are discarded with the queue.
    pub(crate) fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        self.waiter.notify_all();
    }

    #[cfg(test)]
    fn pending_ids(&self) -> Vec<ValueId> {
        self.state
            .lock()
            .pending
            .iter()
            .map(|p| p.id.clone())
            .collect()
    }
}

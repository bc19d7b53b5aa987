//! Store statistics and telemetry.
//!
//! [`StoreStats`] holds monotonic operation counters that can be read while
//! operations are in progress; [`StoreUsage`] is a computed point-in-time
//! snapshot of live structure sizes.

use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters for a store.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct StoreStats {
    /// Values inserted by `put`.
    puts: AtomicU64,
    /// Values removed by the expiry scheduler.
    expirations: AtomicU64,
    /// Values removed by explicit `delete`.
    deletes: AtomicU64,
    /// Empty nodes unlinked from their parent.
    prunes: AtomicU64,
    /// Id generation retries caused by collisions.
    id_collisions: AtomicU64,
    /// Change-feed drain ticks that handed over a non-empty buffer.
    drains: AtomicU64,
}

impl StoreStats {
    /// Creates a new stats instance with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_prune(&self) {
        self.prunes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_id_collision(&self) {
        self.id_collisions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_drain(&self) {
        self.drains.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of values inserted.
    pub fn puts(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    /// Returns the number of values evicted by TTL.
    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    /// Returns the number of values removed by explicit delete.
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Returns the number of empty nodes pruned.
    pub fn prunes(&self) -> u64 {
        self.prunes.load(Ordering::Relaxed)
    }

    /// Returns the number of id collisions resolved by regeneration.
    pub fn id_collisions(&self) -> u64 {
        self.id_collisions.load(Ordering::Relaxed)
    }

    /// Returns the number of non-empty change-feed drains.
    pub fn drains(&self) -> u64 {
        self.drains.load(Ordering::Relaxed)
    }
}

/// A point-in-time snapshot of live structure sizes.
///
/// Computed by walking the trie, so concurrent mutation makes it
/// best-effort, the same way traversal is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreUsage {
    /// Trie nodes currently reachable, including the root.
    pub nodes: usize,
    /// Live values across all nodes.
    pub values: usize,
    /// Live values carrying an expiry instant.
    pub expiring_values: usize,
    /// Entries in the scheduler's pending queue.
    ///
    /// May exceed `expiring_values`: an explicitly deleted value leaves a
    /// stale queue entry behind that fires later as a no-op.
    pub pending_expirations: usize,
    /// Removal records buffered in the change feed, awaiting a drain.
    pub feed_backlog: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = StoreStats::new();
        stats.record_put();
        stats.record_put();
        stats.record_expiration();
        stats.record_delete();
        stats.record_prune();

        assert_eq!(stats.puts(), 2);
        assert_eq!(stats.expirations(), 1);
        assert_eq!(stats.deletes(), 1);
        assert_eq!(stats.prunes(), 1);
        assert_eq!(stats.id_collisions(), 0);
    }
}

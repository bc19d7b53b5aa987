//! The store: routing, put/get/delete/traverse, and background tasks.

use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::expiry::{ExpiryQueue, Pending};
use crate::feed::{ChangeFeed, Removal, Removals};
use crate::node::{Node, Route};
use crate::segment::{space_segmenter, Segmenter};
use crate::stats::{StoreStats, StoreUsage};
use crate::value::{GetValue, ValueId};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Why a value is being removed. Both causes share one removal path.
#[derive(Clone, Copy)]
enum RemovalCause {
    Expired,
    Deleted,
}

/// State shared between the store handle and its background threads.
struct Inner<V> {
    root: Arc<Node<V>>,
    segmenter: Segmenter,
    config: Config,
    stats: StoreStats,
    expiry: ExpiryQueue<V>,
    feed: ChangeFeed<V>,
}

impl<V> Inner<V> {
    /// Routes to the node for `key`, creating missing children.
    fn route_create(&self, key: &str) -> Route<V> {
        let mut route = Route {
            root: Arc::clone(&self.root),
            hops: Vec::new(),
        };
        let mut cursor = 0;
        while let Some((segment, next)) = (self.segmenter)(key, cursor) {
            if segment.is_empty() {
                break;
            }
            let node = route.terminal().child_or_create(&segment);
            route.hops.push((segment, node));
            match next {
                // A cursor that fails to advance or runs past the key is a
                // segmenter contract violation; degrade to end-of-key.
                Some(n) if n > cursor && n <= key.len() => cursor = n,
                _ => break,
            }
        }
        route
    }

    /// Routes to the node for `key` without creating anything.
    ///
    /// Returns `None` the moment a required child is absent.
    fn route_existing(&self, key: &str) -> Option<Route<V>> {
        let mut route = Route {
            root: Arc::clone(&self.root),
            hops: Vec::new(),
        };
        let mut cursor = 0;
        while let Some((segment, next)) = (self.segmenter)(key, cursor) {
            if segment.is_empty() {
                break;
            }
            let node = route.terminal().child(&segment)?;
            route.hops.push((segment, node));
            match next {
                Some(n) if n > cursor && n <= key.len() => cursor = n,
                _ => break,
            }
        }
        Some(route)
    }

    /// Removes one value and applies the shared side effects: prune the
    /// route, append a change-feed record.
    ///
    /// No-ops (returns `false`) if the id is already gone, which is what
    /// makes an expiry racing an explicit delete fire exactly once.
    fn remove_value(&self, route: &Route<V>, key: &str, id: &ValueId, cause: RemovalCause) -> bool {
        let Some(stored) = route.terminal().remove_value(id) else {
            trace!(%key, %id, "removal skipped, id already gone");
            return false;
        };
        match cause {
            RemovalCause::Expired => self.stats.record_expiration(),
            RemovalCause::Deleted => self.stats.record_delete(),
        }
        self.prune_route(route);
        self.feed.record(
            key,
            Removal {
                value: stored.value,
                id: id.clone(),
            },
        );
        true
    }

    /// Prunes empty nodes along the route, deepest first.
    ///
    /// Each step re-checks emptiness under the parent's lock; the cascade
    /// stops at the first node that is still in use. A Put racing the prune
    /// can leave an empty node linked, which is benign: the next removal
    /// through it prunes it.
    fn prune_route(&self, route: &Route<V>) {
        for i in (0..route.hops.len()).rev() {
            let (segment, child) = &route.hops[i];
            if !route.parent_of(i).prune_child(segment, child) {
                break;
            }
            self.stats.record_prune();
            trace!(segment = %segment, "pruned empty node");
        }
    }
}

/// Runs the single expiry waiter until shutdown.
fn expiry_loop<V: Send + Sync + 'static>(inner: Arc<Inner<V>>) {
    while let Some(due) = inner.expiry.next_due() {
        trace!(key = %due.key, id = %due.id, "expiry fired");
        inner.remove_value(&due.route, &due.key, &due.id, RemovalCause::Expired);
    }
    debug!("expiry waiter stopped");
}

/// An in-memory segmented-trie key-value store with per-value TTL eviction.
///
/// Keys are decomposed into segments by a pluggable [`Segmenter`]; values
/// live at the node their full key routes to and carry independent optional
/// TTLs. All operations are safe to call from many threads concurrently;
/// locking is per trie node, never global.
///
/// Dropping the store stops and joins its background threads.
pub struct SegMap<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Inner<V>>,
    waiter: Option<JoinHandle<()>>,
    drain: Mutex<Option<JoinHandle<()>>>,
}

impl<V> SegMap<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a store with the default configuration and the
    /// space-delimited segmenter.
    #[must_use]
    pub fn new() -> Self {
        Self::spawn(Config::default(), space_segmenter)
    }

    /// Creates a store with a custom segmenter.
    #[must_use]
    pub fn with_segmenter(segmenter: Segmenter) -> Self {
        Self::spawn(Config::default(), segmenter)
    }

    /// Creates a store with a custom configuration.
    pub fn with_config(config: Config) -> StoreResult<Self> {
        Self::with_config_and_segmenter(config, space_segmenter)
    }

    /// Creates a store with a custom configuration and segmenter.
    pub fn with_config_and_segmenter(
        config: Config,
        segmenter: Segmenter,
    ) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self::spawn(config, segmenter))
    }

    fn spawn(config: Config, segmenter: Segmenter) -> Self {
        let inner = Arc::new(Inner {
            root: Node::new(),
            segmenter,
            config,
            stats: StoreStats::new(),
            expiry: ExpiryQueue::new(),
            feed: ChangeFeed::new(),
        });
        let waiter = {
            let inner = Arc::clone(&inner);
            thread::spawn(move || expiry_loop(inner))
        };
        Self {
            inner,
            waiter: Some(waiter),
            drain: Mutex::new(None),
        }
    }

    /// Inserts values under `key`, each with its own freshly generated id.
    ///
    /// A non-zero `ttl` schedules each value for eviction at `now + ttl`;
    /// a zero `ttl` means the value lives until explicitly deleted. Missing
    /// trie nodes along the key's segment path are created.
    ///
    /// Returns the post-insert count of values at that exact node (not the
    /// subtree).
    pub fn put(&self, key: &str, ttl: Duration, values: impl IntoIterator<Item = V>) -> usize {
        let route = self.inner.route_create(key);
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        let shared_key: Arc<str> = Arc::from(key);
        let mut count = route.terminal().value_count();
        for value in values {
            let (id, post_count) = route.terminal().insert_value(
                value,
                expires_at,
                self.inner.config.id_length,
                &self.inner.stats,
            );
            self.inner.stats.record_put();
            count = post_count;
            if let Some(at) = expires_at {
                self.inner.expiry.schedule(Pending {
                    expires_at: at,
                    key: Arc::clone(&shared_key),
                    id,
                    route: route.clone(),
                });
            }
        }
        count
    }

    /// Returns a snapshot of the `(value, id)` pairs stored exactly at
    /// `key`, or an empty vector if the key is unknown.
    ///
    /// The snapshot is copied out under the node's read lock; it never
    /// aliases live store state.
    #[must_use]
    pub fn get(&self, key: &str) -> Vec<GetValue<V>> {
        match self.inner.route_existing(key) {
            Some(route) => route.terminal().snapshot(),
            None => Vec::new(),
        }
    }

    /// Removes the value stored under `key` with the given id.
    ///
    /// Returns `false` if no such value is live — already expired, already
    /// deleted, or never present are indistinguishable, matching cache
    /// semantics. A successful delete has the same downstream effects as a
    /// natural expiry: node cleanup and a change-feed record.
    pub fn delete(&self, key: &str, id: &ValueId) -> bool {
        let Some(route) = self.inner.route_existing(key) else {
            return false;
        };
        self.inner
            .remove_value(&route, key, id, RemovalCause::Deleted)
    }

    /// Collects every value stored under any key sharing `prefix`, as one
    /// flat unordered vector.
    ///
    /// Consistency is per-node: concurrent mutation mid-traversal may be
    /// reflected partially. Traversal never mutates the store.
    #[must_use]
    pub fn traverse(&self, prefix: &str) -> Vec<V> {
        let mut out = Vec::new();
        if let Some(route) = self.inner.route_existing(prefix) {
            route.terminal().collect_into(&mut out);
        }
        out
    }

    /// Registers a periodic drain of the change feed.
    ///
    /// Every `interval`, the buffered removals since the last drain are
    /// handed to `callback` and the buffer is reset; an empty buffer still
    /// invokes the callback. The callback runs on a dedicated thread and is
    /// never invoked concurrently with itself: a slow callback coalesces
    /// removals into the next batch.
    ///
    /// At most one callback can be registered per store.
    pub fn on_evicted<F>(&self, mut callback: F, interval: Duration) -> StoreResult<()>
    where
        F: FnMut(Removals<V>) + Send + 'static,
    {
        let mut slot = self.drain.lock();
        if slot.is_some() {
            return Err(StoreError::DrainAlreadyRegistered);
        }
        let inner = Arc::clone(&self.inner);
        *slot = Some(thread::spawn(move || {
            while !inner.feed.wait_tick(interval) {
                let batch = inner.feed.take_if_any();
                if !batch.is_empty() {
                    inner.stats.record_drain();
                    debug!(keys = batch.len(), "drained change feed");
                }
                callback(batch);
            }
            debug!("change feed drain stopped");
        }));
        Ok(())
    }

    /// Returns the store's operation counters.
    pub fn stats(&self) -> &StoreStats {
        &self.inner.stats
    }

    /// Computes a point-in-time snapshot of live structure sizes.
    #[must_use]
    pub fn usage(&self) -> StoreUsage {
        let tally = self.inner.root.tally();
        StoreUsage {
            nodes: tally.nodes,
            values: tally.values,
            expiring_values: tally.expiring,
            pending_expirations: self.inner.expiry.len(),
            feed_backlog: self.inner.feed.backlog(),
        }
    }

    /// Shuts the store down, stopping and joining its background threads.
    ///
    /// Equivalent to dropping the store; provided for explicit teardown.
    pub fn close(self) {}
}

impl<V> Default for SegMap<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Drop for SegMap<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.inner.expiry.shutdown();
        self.inner.feed.shutdown();
        if let Some(handle) = self.waiter.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.drain.lock().take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sorted(mut values: Vec<String>) -> Vec<String> {
        values.sort();
        values
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn put_then_get_round_trip() {
        let store = SegMap::new();
        store.put("a b", Duration::ZERO, strings(&["v"]));

        let got = store.get("a b");
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].value, "v");

        // Unknown keys and non-terminal prefixes are empty, not errors.
        assert!(store.get("a x").is_empty());
        assert!(store.get("a ").is_empty());
        assert!(store.get("a").is_empty());
    }

    #[test]
    fn put_returns_exact_node_count() {
        let store = SegMap::new();
        assert_eq!(store.put("k", Duration::ZERO, strings(&["1", "2"])), 2);
        assert_eq!(store.put("k", Duration::ZERO, strings(&["3"])), 3);
        // Values under a longer key do not count toward the parent node.
        assert_eq!(store.put("k l", Duration::ZERO, strings(&["4"])), 1);

        let ids: HashSet<_> = store.get("k").into_iter().map(|v| v.id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn empty_value_list_reports_current_count() {
        let store: SegMap<String> = SegMap::new();
        store.put("k", Duration::ZERO, strings(&["1"]));
        assert_eq!(store.put("k", Duration::ZERO, Vec::new()), 1);
    }

    #[test]
    fn value_expires_after_ttl() {
        let store = SegMap::new();
        store.put("a b", Duration::from_millis(200), strings(&["gone"]));
        store.put("a c", Duration::ZERO, strings(&["stays"]));

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(store.get("a b").len(), 1);

        std::thread::sleep(Duration::from_millis(300));
        assert!(store.get("a b").is_empty());
        assert_eq!(store.get("a c").len(), 1);
        assert_eq!(store.stats().expirations(), 1);
        assert_eq!(store.stats().deletes(), 0);
    }

    #[test]
    fn delete_is_idempotent() {
        let store = SegMap::new();
        store.put("a b", Duration::ZERO, strings(&["v"]));
        let id = store.get("a b")[0].id.clone();

        assert!(store.delete("a b", &id));
        assert!(!store.delete("a b", &id));
        assert!(!store.delete("never seen", &id));

        // Exactly one change-feed record despite the repeated delete.
        assert_eq!(store.usage().feed_backlog, 1);
        assert_eq!(store.stats().deletes(), 1);
    }

    #[test]
    fn delete_prevents_later_expiry_from_double_firing() {
        let store = SegMap::new();
        store.put("k", Duration::from_millis(150), strings(&["v"]));
        let id = store.get("k")[0].id.clone();
        assert!(store.delete("k", &id));

        // Let the stale scheduler entry fire; it must find the id gone.
        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(store.usage().feed_backlog, 1);
        assert_eq!(store.stats().deletes(), 1);
        assert_eq!(store.stats().expirations(), 0);
    }

    #[test]
    fn traverse_aggregates_subtree() {
        let store = SegMap::new();
        store.put("a b", Duration::ZERO, strings(&["1", "2"]));
        store.put("a c", Duration::ZERO, strings(&["3"]));
        store.put("x", Duration::ZERO, strings(&["4"]));

        assert_eq!(sorted(store.traverse("a ")), strings(&["1", "2", "3"]));
        assert_eq!(sorted(store.traverse("a b")), strings(&["1", "2"]));
        // The empty prefix routes to the root: the whole store.
        assert_eq!(sorted(store.traverse("")), strings(&["1", "2", "3", "4"]));
        assert!(store.traverse("q").is_empty());
    }

    #[test]
    fn prune_removes_empty_branch() {
        let store = SegMap::new();
        store.put("a b", Duration::ZERO, strings(&["v"]));
        assert_eq!(store.usage().nodes, 3); // root, "a ", "b"

        let id = store.get("a b")[0].id.clone();
        assert!(store.delete("a b", &id));

        // The leaf and the now-empty waypoint are both gone.
        assert_eq!(store.usage().nodes, 1);
        assert_eq!(store.stats().prunes(), 2);
        assert!(store.traverse("").is_empty());
    }

    #[test]
    fn prune_stops_at_shared_waypoint() {
        let store = SegMap::new();
        store.put("a b", Duration::ZERO, strings(&["1"]));
        store.put("a c", Duration::ZERO, strings(&["2"]));

        let id = store.get("a b")[0].id.clone();
        store.delete("a b", &id);

        // "b" is pruned; "a " survives as the waypoint to "c".
        assert_eq!(store.usage().nodes, 3);
        assert_eq!(sorted(store.traverse("a ")), strings(&["2"]));
    }

    #[test]
    fn waypoint_with_own_values_survives_child_prune() {
        let store = SegMap::new();
        store.put("a ", Duration::ZERO, strings(&["w"]));
        store.put("a b", Duration::ZERO, strings(&["v"]));

        let id = store.get("a b")[0].id.clone();
        assert!(store.delete("a b", &id));

        // "b" is pruned; "a " keeps its own value.
        assert_eq!(store.usage().nodes, 2);
        assert_eq!(store.get("a ")[0].value, "w");
    }

    #[test]
    fn mixed_ttl_scenario() {
        let store = SegMap::new();
        store.put("a b", Duration::from_millis(200), strings(&["1"]));
        store.put("a b", Duration::from_millis(200), strings(&["2"]));
        store.put("a c", Duration::ZERO, strings(&["3"]));

        let ab = store.get("a b");
        assert_eq!(
            sorted(ab.iter().map(|v| v.value.clone()).collect()),
            strings(&["1", "2"])
        );
        assert_ne!(ab[0].id, ab[1].id);
        assert_eq!(sorted(store.traverse("a ")), strings(&["1", "2", "3"]));

        std::thread::sleep(Duration::from_millis(500));
        assert!(store.get("a b").is_empty());
        assert_eq!(store.get("a c").len(), 1);
        assert_eq!(sorted(store.traverse("a ")), strings(&["3"]));
        assert_eq!(store.usage().nodes, 3); // root, "a ", "c"
    }

    #[test]
    fn expired_values_reach_change_feed() {
        let store = SegMap::new();
        let batches: Arc<Mutex<Vec<Removals<String>>>> = Arc::new(Mutex::new(Vec::new()));
        {
            let batches = Arc::clone(&batches);
            store
                .on_evicted(
                    move |batch| batches.lock().push(batch),
                    Duration::from_millis(50),
                )
                .unwrap();
        }

        store.put("a b", Duration::from_millis(100), strings(&["1"]));
        store.put("a c", Duration::ZERO, strings(&["3"]));
        std::thread::sleep(Duration::from_millis(400));

        let batches = batches.lock();
        // Ticks fire even when there is nothing to report.
        assert!(batches.len() > 2);
        let removed: Vec<_> = batches
            .iter()
            .flat_map(|b| b.iter())
            .map(|(key, removals)| (key.clone(), removals.clone()))
            .collect();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].0, "a b");
        assert_eq!(removed[0].1[0].value, "1");
        // Each removal is delivered exactly once.
        assert_eq!(store.usage().feed_backlog, 0);
    }

    #[test]
    fn on_evicted_registers_once() {
        let store: SegMap<String> = SegMap::new();
        store
            .on_evicted(|_| {}, Duration::from_millis(100))
            .unwrap();
        assert!(matches!(
            store.on_evicted(|_| {}, Duration::from_millis(100)),
            Err(StoreError::DrainAlreadyRegistered)
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result: StoreResult<SegMap<String>> = SegMap::with_config(Config::new().id_length(0));
        assert!(matches!(result, Err(StoreError::InvalidConfig { .. })));
    }

    #[test]
    fn custom_segmenter_routes_by_slash() {
        fn slash_segmenter(key: &str, cursor: usize) -> Option<(String, Option<usize>)> {
            if key.is_empty() || cursor >= key.len() {
                return None;
            }
            let rest = key.get(cursor..)?;
            for (offset, ch) in rest.char_indices().skip(1) {
                if ch == '/' {
                    let end = cursor + offset + 1;
                    return Some((key[cursor..end].to_string(), Some(end)));
                }
            }
            Some((rest.to_string(), None))
        }

        let store = SegMap::with_segmenter(slash_segmenter);
        store.put("usr/local/bin", Duration::ZERO, strings(&["1"]));
        store.put("usr/local/lib", Duration::ZERO, strings(&["2"]));

        assert_eq!(store.get("usr/local/bin").len(), 1);
        assert_eq!(sorted(store.traverse("usr/")), strings(&["1", "2"]));
    }

    #[test]
    fn misbehaving_segmenter_degrades_to_end_of_key() {
        // Never advances the cursor; the store must still terminate and
        // treat the first segment as the whole key.
        fn stuck_segmenter(key: &str, cursor: usize) -> Option<(String, Option<usize>)> {
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), Some(cursor)))
        }

        let store = SegMap::with_segmenter(stuck_segmenter);
        store.put("k", Duration::ZERO, strings(&["v"]));
        assert_eq!(store.get("k").len(), 1);
        assert_eq!(store.usage().nodes, 2);
    }

    #[test]
    fn concurrent_puts_are_all_visible() {
        let store = Arc::new(SegMap::new());
        let mut handles = Vec::new();
        for t in 0..4 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    store.put(
                        &format!("shard{t} item{i}"),
                        Duration::ZERO,
                        [format!("{t}-{i}")],
                    );
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.traverse("").len(), 400);
        assert_eq!(store.stats().puts(), 400);
    }

    #[test]
    fn close_joins_background_threads() {
        let store = SegMap::new();
        store.put("k", Duration::from_secs(60), strings(&["v"]));
        store
            .on_evicted(|_| {}, Duration::from_millis(20))
            .unwrap();
        // Must return promptly despite the far-future pending expiry.
        store.close();
    }
}

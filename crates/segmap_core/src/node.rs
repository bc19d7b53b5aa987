//! Trie nodes.
//!
//! One node per distinct segment path. Each node owns its locally-stored
//! values and its child edges behind a single reader/writer lock; there is
//! no global trie lock. Whenever two node locks are held at once (child
//! creation, prune re-check) the order is strictly parent-then-child, which
//! follows the tree and therefore cannot deadlock.

use crate::stats::StoreStats;
use crate::value::{GetValue, StoredValue, ValueId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// One vertex of the segment trie.
pub(crate) struct Node<V> {
    inner: RwLock<NodeInner<V>>,
}

struct NodeInner<V> {
    /// Values stored exactly at this key depth, by id.
    values: HashMap<ValueId, StoredValue<V>>,
    /// Child edges, by segment.
    children: HashMap<String, Arc<Node<V>>>,
}

/// Subtree totals gathered by [`Node::tally`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeTally {
    pub nodes: usize,
    pub values: usize,
    pub expiring: usize,
}

impl<V> Node<V> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(NodeInner {
                values: HashMap::new(),
                children: HashMap::new(),
            }),
        })
    }

    /// Looks up an existing child edge.
    pub(crate) fn child(&self, segment: &str) -> Option<Arc<Node<V>>> {
        self.inner.read().children.get(segment).cloned()
    }

    /// Looks up a child edge, creating it if absent.
    pub(crate) fn child_or_create(&self, segment: &str) -> Arc<Node<V>> {
        if let Some(child) = self.child(segment) {
            return child;
        }
        let mut inner = self.inner.write();
        Arc::clone(
            inner
                .children
                .entry(segment.to_string())
                .or_insert_with(Node::new),
        )
    }

    /// Inserts a value under a freshly generated id, retrying on collision.
    ///
    /// Returns the id and the post-insert count of values at this node.
    pub(crate) fn insert_value(
        &self,
        value: V,
        expires_at: Option<Instant>,
        id_length: usize,
        stats: &StoreStats,
    ) -> (ValueId, usize) {
        let mut inner = self.inner.write();
        let mut id = ValueId::random(id_length);
        while inner.values.contains_key(&id) {
            stats.record_id_collision();
            id = ValueId::random(id_length);
        }
        inner.values.insert(id.clone(), StoredValue { value, expires_at });
        (id, inner.values.len())
    }

    /// Removes a value by id.
    ///
    /// Returns `None` if the id is not present — the single-fire check that
    /// makes an expiry racing an explicit delete idempotent.
    pub(crate) fn remove_value(&self, id: &ValueId) -> Option<StoredValue<V>> {
        self.inner.write().values.remove(id)
    }

    /// Number of values stored at this node (not the subtree).
    pub(crate) fn value_count(&self) -> usize {
        self.inner.read().values.len()
    }

    /// True when the node stores no values and has no children.
    pub(crate) fn is_empty(&self) -> bool {
        let inner = self.inner.read();
        inner.values.is_empty() && inner.children.is_empty()
    }

    /// Removes the edge to `child` if it is still this node's child under
    /// `segment` and still empty.
    ///
    /// The re-check runs under this node's write lock: a Put that
    /// repopulated the child since the caller observed it empty wins, and
    /// the edge stays. Returns whether the edge was removed.
    pub(crate) fn prune_child(&self, segment: &str, child: &Arc<Node<V>>) -> bool {
        let mut inner = self.inner.write();
        match inner.children.get(segment) {
            Some(current) if Arc::ptr_eq(current, child) && child.is_empty() => {
                inner.children.remove(segment);
                true
            }
            _ => false,
        }
    }
}

impl<V: Clone> Node<V> {
    /// Snapshots this node's `(value, id)` pairs under its read lock.
    pub(crate) fn snapshot(&self) -> Vec<GetValue<V>> {
        self.inner
            .read()
            .values
            .iter()
            .map(|(id, stored)| GetValue {
                value: stored.value.clone(),
                id: id.clone(),
            })
            .collect()
    }

    /// Collects every value in this node's subtree into `out`.
    ///
    /// The lock is held only while copying this node's own values and child
    /// list, never across the recursion, so a deep traversal cannot block
    /// writers in unrelated branches. Consistency is per-node, not
    /// whole-subtree.
    pub(crate) fn collect_into(&self, out: &mut Vec<V>) {
        let children: Vec<Arc<Node<V>>> = {
            let inner = self.inner.read();
            out.extend(inner.values.values().map(|stored| stored.value.clone()));
            inner.children.values().cloned().collect()
        };
        for child in children {
            child.collect_into(out);
        }
    }
}

impl<V> Node<V> {
    /// Tallies node, value, and expiring-value counts over the subtree.
    pub(crate) fn tally(&self) -> NodeTally {
        let mut total = NodeTally {
            nodes: 1,
            ..NodeTally::default()
        };
        let children: Vec<Arc<Node<V>>> = {
            let inner = self.inner.read();
            total.values = inner.values.len();
            total.expiring = inner
                .values
                .values()
                .filter(|stored| stored.expires_at.is_some())
                .count();
            inner.children.values().cloned().collect()
        };
        for child in children {
            let sub = child.tally();
            total.nodes += sub.nodes;
            total.values += sub.values;
            total.expiring += sub.expiring;
        }
        total
    }
}

/// A routed path from the root to a terminal node.
///
/// Each hop pairs the segment with the node it leads to. Removals keep the
/// route so pruning can cascade back up through now-empty waypoints.
#[derive(Clone)]
pub(crate) struct Route<V> {
    pub root: Arc<Node<V>>,
    pub hops: Vec<(String, Arc<Node<V>>)>,
}

impl<V> Route<V> {
    /// The node responsible for the routed key.
    pub(crate) fn terminal(&self) -> &Arc<Node<V>> {
        self.hops.last().map(|(_, node)| node).unwrap_or(&self.root)
    }

    /// The parent of hop `i` (the root for the first hop).
    pub(crate) fn parent_of(&self, i: usize) -> &Arc<Node<V>> {
        if i == 0 {
            &self.root
        } else {
            &self.hops[i - 1].1
        }
    }
}

//! Value identity and stored entries.

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fmt;
use std::time::Instant;

/// Identifier of a stored value.
///
/// Ids are short random alphanumeric strings, unique within the owning trie
/// node only. They are generated with a collision check against the node's
/// current id set and regenerated on collision, so a small fixed length is
/// enough.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(String);

impl ValueId {
    /// Draws a fresh random id of `length` alphanumeric characters.
    ///
    /// Uniqueness is the caller's concern: the owning node retries against
    /// its current id set.
    #[must_use]
    pub(crate) fn random(length: usize) -> Self {
        let id = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect();
        Self(id)
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueId({})", self.0)
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ValueId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A value as stored inside a trie node.
///
/// The node owns the authoritative copy; the expiry scheduler only holds a
/// reference (key, route, id) to entries it has not yet fired.
#[derive(Debug, Clone)]
pub(crate) struct StoredValue<V> {
    /// The payload.
    pub value: V,
    /// Absolute expiry instant; `None` means the value lives until
    /// explicitly deleted.
    pub expires_at: Option<Instant>,
}

/// One `(value, id)` pair returned by [`SegMap::get`](crate::SegMap::get).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetValue<V> {
    /// The stored payload.
    pub value: V,
    /// The id under which it is stored, usable with
    /// [`SegMap::delete`](crate::SegMap::delete).
    pub id: ValueId,
}

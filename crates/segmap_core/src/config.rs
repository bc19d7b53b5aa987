//! Store configuration.

use crate::error::{StoreError, StoreResult};

/// Configuration for creating a [`SegMap`](crate::SegMap).
#[derive(Debug, Clone)]
pub struct Config {
    /// Length of generated value identifiers, in characters.
    ///
    /// Identifiers only need to be unique within a single trie node, so a
    /// short id is sufficient; collisions are detected and retried at
    /// generation time.
    pub id_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self { id_length: 5 }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the length of generated value identifiers.
    #[must_use]
    pub const fn id_length(mut self, length: usize) -> Self {
        self.id_length = length;
        self
    }

    /// Validates the configuration.
    pub(crate) fn validate(&self) -> StoreResult<()> {
        if self.id_length == 0 {
            return Err(StoreError::invalid_config("id_length must be non-zero"));
        }
        Ok(())
    }
}

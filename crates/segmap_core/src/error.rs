//! Error types for the SegMap core.
//!
//! Absent keys and ids are normal empty results, not errors; the only
//! fallible surface is store configuration and lifecycle misuse.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur when configuring or managing a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The supplied configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// An eviction callback is already registered on this store.
    #[error("eviction callback already registered")]
    DrainAlreadyRegistered,
}

impl StoreError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_display() {
        let err = StoreError::invalid_config("id length must be non-zero");
        assert_eq!(
            err.to_string(),
            "invalid configuration: id length must be non-zero"
        );
    }
}

//! # SegMap Core
//!
//! An in-memory, concurrently-accessed key-value store where keys are
//! decomposed into ordered segments forming a trie, and every stored value
//! carries an optional time-to-live after which it is evicted automatically.
//!
//! This crate provides:
//! - A segment trie with per-node reader/writer locking
//! - Random, collision-checked value identifiers
//! - A single-waiter expiry scheduler ordered by deadline
//! - A change feed of removals, drained by a periodic callback
//!
//! ## Usage
//!
//! ```rust
//! use segmap_core::SegMap;
//! use std::time::Duration;
//!
//! let store = SegMap::new();
//! store.put("user alice", Duration::ZERO, ["session-1".to_string()]);
//! store.put("user bob", Duration::from_secs(60), ["session-2".to_string()]);
//!
//! // Exact lookup returns (value, id) pairs for that key only.
//! let alice = store.get("user alice");
//! assert_eq!(alice.len(), 1);
//!
//! // Prefix traversal aggregates the whole subtree.
//! let all = store.traverse("user ");
//! assert_eq!(all.len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod expiry;
mod feed;
mod node;
mod segment;
mod stats;
mod store;
mod value;

pub use config::Config;
pub use error::{StoreError, StoreResult};
pub use feed::{Removal, Removals};
pub use segment::{space_segmenter, Segmenter};
pub use stats::{StoreStats, StoreUsage};
pub use store::SegMap;
pub use value::{GetValue, ValueId};

//! # SegMap Testkit
//!
//! Test utilities for SegMap.
//!
//! This crate provides:
//! - Property-based test generators using proptest
//! - Stress testing utilities for concurrent workloads
//!
//! ## Usage
//!
//! ```rust
//! use segmap_testkit::prelude::*;
//! use segmap_core::SegMap;
//! use std::sync::Arc;
//!
//! let store = Arc::new(SegMap::new());
//! let result = stress_concurrent_puts(&store, &StressConfig::default());
//! assert_eq!(result.failed_ops, 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod generators;
pub mod stress;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use generators::*;
pub use stress::*;

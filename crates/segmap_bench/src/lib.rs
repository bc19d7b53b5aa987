//! Benchmark crate for SegMap; see the `benches/` directory.

#![deny(unsafe_code)]
#![warn(missing_docs)]

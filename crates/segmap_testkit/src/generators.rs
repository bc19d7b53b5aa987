//! Property-based test generators using proptest.
//!
//! Strategies for keys, values, and whole entry sets that exercise the
//! default space-delimited segmenter: generated keys are one to four
//! lowercase segments joined by single spaces.

use proptest::prelude::*;

/// Strategy for a single key segment (no spaces).
pub fn segment_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,6}").expect("valid regex")
}

/// Strategy for a segmented key: 1..=4 segments joined by spaces.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(segment_strategy(), 1..=4).prop_map(|segments| segments.join(" "))
}

/// Strategy for a stored value.
pub fn value_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9]{0,16}").expect("valid regex")
}

/// Strategy for a batch of `(key, value)` entries.
///
/// Keys may repeat; repeated keys store additional values at the same node.
pub fn entries_strategy(max: usize) -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec((key_strategy(), value_strategy()), 1..=max)
}

/// Strategy for arbitrary (possibly multibyte, space-laden) keys, for
/// exercising the segmenter itself rather than canonical store keys.
pub fn raw_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z é]{0,20}").expect("valid regex")
}

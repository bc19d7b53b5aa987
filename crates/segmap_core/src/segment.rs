//! Key segmentation.
//!
//! A segmenter decomposes a key into ordered segments; the store routes each
//! segment through one level of the trie. The function is pluggable so
//! callers can define their own key hierarchy (path components, tenant
//! prefixes, and so on).

/// A pluggable key-segmentation function.
///
/// Called repeatedly with the key and a byte cursor. Returns:
/// - `Some((segment, Some(next)))` — one segment, more follow from `next`
/// - `Some((segment, None))` — the final segment
/// - `None` — end of key, or the cursor is out of range
///
/// A segmenter that misbehaves (empty segment, non-advancing or
/// out-of-range cursor) degrades to end-of-key: the store stops segmenting
/// and routes to the node reached so far.
pub type Segmenter = fn(key: &str, cursor: usize) -> Option<(String, Option<usize>)>;

/// The default segmenter: splits on spaces, delimiter-inclusive.
///
/// Each segment is a run ending just after the next space, so `"a b"`
/// segments as `["a ", "b"]`. A segment always consumes at least one
/// character, so a key of consecutive spaces still terminates.
pub fn space_segmenter(key: &str, cursor: usize) -> Option<(String, Option<usize>)> {
    if key.is_empty() || cursor >= key.len() {
        return None;
    }
    // A cursor that is not a character boundary is a contract violation by
    // the caller supplying cursors; treat it as end-of-key.
    let rest = key.get(cursor..)?;
    for (offset, ch) in rest.char_indices().skip(1) {
        if ch == ' ' {
            let end = cursor + offset + 1;
            return Some((key[cursor..end].to_string(), Some(end)));
        }
    }
    Some((rest.to_string(), None))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(key: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut cursor = 0;
        while let Some((segment, next)) = space_segmenter(key, cursor) {
            out.push(segment);
            match next {
                Some(n) => cursor = n,
                None => break,
            }
        }
        out
    }

    #[test]
    fn delimiter_inclusive_split() {
        assert_eq!(segments("a b"), vec!["a ", "b"]);
        assert_eq!(segments("user alice session"), vec!["user ", "alice ", "session"]);
    }

    #[test]
    fn single_segment() {
        assert_eq!(segments("alone"), vec!["alone"]);
    }

    #[test]
    fn trailing_space_ends_last_segment() {
        assert_eq!(segments("a "), vec!["a "]);
        assert_eq!(segments("a b "), vec!["a ", "b "]);
    }

    #[test]
    fn leading_space_attaches_to_first_segment() {
        // The first character is always part of the segment; the split
        // point is the next space after it.
        assert_eq!(segments(" b"), vec![" b"]);
        assert_eq!(segments("  b"), vec!["  ", "b"]);
    }

    #[test]
    fn empty_key_has_no_segments() {
        assert_eq!(space_segmenter("", 0), None);
        assert!(segments("").is_empty());
    }

    #[test]
    fn out_of_range_cursor_is_end() {
        assert_eq!(space_segmenter("abc", 3), None);
        assert_eq!(space_segmenter("abc", 100), None);
    }

    #[test]
    fn non_boundary_cursor_is_end() {
        // 'é' is two bytes; cursor 1 lands inside it.
        assert_eq!(space_segmenter("é x", 1), None);
    }

    #[test]
    fn multibyte_keys() {
        assert_eq!(segments("héllo wörld"), vec!["héllo ", "wörld"]);
    }

    #[test]
    fn segments_rejoin_to_key() {
        for key in ["a b c", "x", "trailing ", " lead", "no-space-at-all"] {
            assert_eq!(segments(key).concat(), key);
        }
    }
}

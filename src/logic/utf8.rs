//! UTF-8 boundary helpers for the public entry points that still only
//! hold raw bytes.
//!
//! `parse` itself takes `&str`, so callers that already validated their
//! input never touch this module. It exists for the callers described
//! in the crate's ambient-stack notes that only have raw bytes (file
//! read, network body, clipboard paste) and need a lossy decode before
//! they can call `parse` at all.
//!
//! Unlike a renderer-facing sanitizer, this module never rewrites bytes
//! beyond the minimum lossy UTF-8 decode: no NFC normalization, no
//! control-character stripping, no line-ending rewriting. Any of those
//! would move byte offsets out from under the caller's own bookkeeping,
//! which would silently break every `Boundaries` this crate reports.

use std::borrow::Cow;

/// Decode `bytes` as UTF-8, lossily replacing invalid sequences with
/// U+FFFD. Returns the sanitized string; if `bytes` was already valid
/// UTF-8 this is a borrow with no allocation.
pub fn sanitize_input(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// True if `index` lands on a char boundary of `s`.
pub fn is_char_boundary(s: &str, index: usize) -> bool {
    s.is_char_boundary(index)
}

/// The previous valid char boundary at or before `index`.
pub fn find_prev_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut pos = index;
    while pos > 0 && !s.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// The next valid char boundary at or after `index`.
pub fn find_next_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut pos = index;
    while pos < s.len() && !s.is_char_boundary(pos) {
        pos += 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_utf8_is_borrowed() {
        let s = sanitize_input("hello — world".as_bytes());
        assert!(matches!(s, Cow::Borrowed(_)));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let s = sanitize_input(&[0x68, 0x69, 0xff, 0xfe]);
        assert!(s.contains('\u{FFFD}'));
    }

    #[test]
    fn boundary_search_walks_to_char_start_and_end() {
        let text = "Hello — World";
        let dash = text.find('—').unwrap();
        assert_eq!(find_prev_boundary(text, dash + 1), dash);
        assert_eq!(find_next_boundary(text, dash + 1), dash + 3);
        assert_eq!(find_prev_boundary(text, dash), dash);
    }
}

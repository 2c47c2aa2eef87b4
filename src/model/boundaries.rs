#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Five offsets bracketing the textual content of a block or span on a
/// single line: `pre..beg` is leading markup, `beg..end` is displayable
/// content, `end..post` is trailing markup. `pre <= beg <= end <= post`
/// always holds for a single boundary record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Boundaries {
    pub line_number: usize,
    pub pre: usize,
    pub beg: usize,
    pub end: usize,
    pub post: usize,
}

impl Boundaries {
    pub fn new(line_number: usize, pre: usize, beg: usize, end: usize, post: usize) -> Self {
        debug_assert!(pre <= beg && beg <= end && end <= post);
        Self { line_number, pre, beg, end, post }
    }

    /// A degenerate record with no content, used for sentinel/empty
    /// placeholder containers.
    pub fn empty_at(line_number: usize, offset: usize) -> Self {
        Self { line_number, pre: offset, beg: offset, end: offset, post: offset }
    }
}

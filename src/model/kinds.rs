#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Block-level container kinds. TABLE is reserved for a family planned
/// but not present in the textual grammar this crate implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BlockKind {
    Doc,
    Hidden,
    Quote,
    Ul,
    Ol,
    Li,
    Hr,
    H,
    Div,
    Def,
    Latex,
    Code,
    P,
    /// Sentinel empty placeholder child (bare list item, freshly opened
    /// division with no content yet). Never surfaced to the walker.
    Empty,
}

impl BlockKind {
    /// Leaf kinds carry inline spans and are handed to the span parser;
    /// all other kinds only ever contain other containers.
    pub fn is_leaf(self) -> bool {
        matches!(self, BlockKind::P | BlockKind::H | BlockKind::Code | BlockKind::Latex)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SpanKind {
    Em,
    Strong,
    Url,
    Img,
    Code,
    Del,
    LatexMath,
    Ref,
    Underline,
    Highlight,
    /// Internal-only: consumed during attribute reconciliation (4.6.4),
    /// never replayed as its own enter/leave pair.
    Attribute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TextKind {
    Normal,
    Latex,
    Code,
    BlockMarkerHidden,
    SpanMarkerHidden,
}

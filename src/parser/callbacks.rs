//! The caller-facing event sink (§6). A parse walks the resolved
//! container tree depth-first and reports what it finds through this
//! trait instead of building its own AST — the caller decides what, if
//! anything, to materialize.

use crate::model::{Attributes, BlockDetail, BlockKind, Boundaries, SpanDetail, SpanKind, TextKind};

/// Receives block, span, and text events during a parse.
///
/// `enter_block`/`leave_block` bracket a container in depth-first
/// pre-order; `enter_span`/`leave_span` bracket an inline span found
/// inside a leaf block's text; `text` reports a run of literal content
/// that belongs to whatever block or span is currently open. `boundaries`
/// on every event is one `Boundaries` entry per source line the
/// construct spans, letting a caller recover the exact source slice
/// via the line it names without this crate re-allocating one.
pub trait ParserCallbacks {
    fn enter_block(&mut self, kind: BlockKind, boundaries: &[Boundaries], attributes: &Attributes, detail: Option<&BlockDetail>) -> anyhow::Result<()>;

    fn leave_block(&mut self, kind: BlockKind) -> anyhow::Result<()>;

    fn enter_span(&mut self, kind: SpanKind, boundaries: &[Boundaries], attributes: &Attributes, detail: Option<&SpanDetail>) -> anyhow::Result<()>;

    fn leave_span(&mut self, kind: SpanKind) -> anyhow::Result<()>;

    fn text(&mut self, kind: TextKind, boundaries: &[Boundaries]) -> anyhow::Result<()>;
}

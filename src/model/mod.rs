//! Public data types shared between the block and span phases and the
//! caller-facing event sink.

mod boundaries;
mod detail;
mod kinds;

pub use boundaries::Boundaries;
pub use detail::{Attributes, BlockDetail, DefKind, OlType, SpanDetail, TaskState};
pub use kinds::{BlockKind, SpanKind, TextKind};

//! The two-phase parsing engine (§2): line index, segment analyzer,
//! segment processor, container arena, tree walker, and span parser,
//! wired together behind the single [`parse`] entry point (§6).

pub mod block_processor;
pub mod callbacks;
pub mod container;
pub mod line_index;
pub mod segment;
pub mod span;
pub mod walker;

pub use callbacks::ParserCallbacks;

use anyhow::Context;

use crate::options::ParseOptions;

use block_processor::{process_segment, Cursors};
use container::{Arena, ROOT};
use line_index::LineIndex;
use segment::analyse_segment;

/// Parses `input` with the default [`ParseOptions`], reporting events
/// through `callbacks`. See [`parse_with_options`] to tune the
/// verbatim-run cap.
pub fn parse(input: &str, callbacks: &mut dyn ParserCallbacks) -> anyhow::Result<()> {
    parse_with_options(input, &ParseOptions::default(), callbacks)
}

/// Runs the block-structure phase to completion over `input`, then
/// walks the resulting container tree, running the span-detection
/// phase over each leaf block's content ranges (§4.5, §4.6).
///
/// `parse` is stateless and synchronous (§5): one call owns one arena
/// from start to finish, and the sink's callbacks are invoked inline,
/// in depth-first source order. A callback failure short-circuits the
/// walk; no further callbacks run and the error propagates out of this
/// call.
pub fn parse_with_options(
    input: &str,
    options: &ParseOptions,
    callbacks: &mut dyn ParserCallbacks,
) -> anyhow::Result<()> {
    log::info!("parsing {} bytes", input.len());

    let line_index = LineIndex::build(input);
    let mut arena = Arena::new();
    let mut cursors = Cursors::default();

    let mut offset = 0usize;
    while offset < input.len() {
        let result = analyse_segment(input, offset, &line_index, &arena, cursors.above, options);
        cursors.above = result.above_container;
        cursors = process_segment(&mut arena, cursors, &result.segment);
        offset = result.resume_at + 1;
    }

    walker::walk(input, &arena, ROOT, options, callbacks)
        .context("parse aborted: sink callback returned an error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attributes, BlockDetail, Boundaries, SpanDetail, SpanKind, TextKind};
    use crate::model::BlockKind;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl ParserCallbacks for Recorder {
        fn enter_block(&mut self, kind: BlockKind, _b: &[Boundaries], _a: &Attributes, _d: Option<&BlockDetail>) -> anyhow::Result<()> {
            self.events.push(format!("enter_block {:?}", kind));
            Ok(())
        }
        fn leave_block(&mut self, kind: BlockKind) -> anyhow::Result<()> {
            self.events.push(format!("leave_block {:?}", kind));
            Ok(())
        }
        fn enter_span(&mut self, kind: SpanKind, _b: &[Boundaries], _a: &Attributes, _d: Option<&SpanDetail>) -> anyhow::Result<()> {
            self.events.push(format!("enter_span {:?}", kind));
            Ok(())
        }
        fn leave_span(&mut self, kind: SpanKind) -> anyhow::Result<()> {
            self.events.push(format!("leave_span {:?}", kind));
            Ok(())
        }
        fn text(&mut self, kind: TextKind, bounds: &[Boundaries]) -> anyhow::Result<()> {
            self.events.push(format!("text {:?} len={}", kind, bounds.len()));
            Ok(())
        }
    }

    struct Failing;
    impl ParserCallbacks for Failing {
        fn enter_block(&mut self, _k: BlockKind, _b: &[Boundaries], _a: &Attributes, _d: Option<&BlockDetail>) -> anyhow::Result<()> {
            anyhow::bail!("sink refuses this block")
        }
        fn leave_block(&mut self, _k: BlockKind) -> anyhow::Result<()> {
            Ok(())
        }
        fn enter_span(&mut self, _k: SpanKind, _b: &[Boundaries], _a: &Attributes, _d: Option<&SpanDetail>) -> anyhow::Result<()> {
            Ok(())
        }
        fn leave_span(&mut self, _k: SpanKind) -> anyhow::Result<()> {
            Ok(())
        }
        fn text(&mut self, _k: TextKind, _b: &[Boundaries]) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn plain_text_emits_single_text_event() {
        let mut rec = Recorder::default();
        parse("abc\n", &mut rec).unwrap();
        assert_eq!(
            rec.events,
            vec!["enter_block Doc", "enter_block P", "text Normal len=1", "leave_block P", "leave_block Doc"]
        );
    }

    #[test]
    fn callback_failure_aborts_the_walk() {
        let mut sink = Failing;
        let err = parse("abc\n", &mut sink).unwrap_err();
        assert!(err.to_string().contains("parse aborted"));
    }

    #[test]
    fn emphasis_and_strong_are_detected_end_to_end() {
        let mut rec = Recorder::default();
        parse("a *b* c _d_ e\n", &mut rec).unwrap();
        assert!(rec.events.contains(&"enter_span Strong".to_string()));
        assert!(rec.events.contains(&"enter_span Em".to_string()));
    }
}

//! The tree walker (§4.5). After the block phase settles, this walks
//! the container tree depth-first pre-order, reporting enter/leave
//! events through the caller's sink and handing each leaf's content
//! ranges to the span parser.

use anyhow::Result;

use crate::model::{BlockKind, TextKind};
use crate::options::ParseOptions;
use crate::parser::callbacks::ParserCallbacks;
use crate::parser::container::{Arena, ContainerId};
use crate::parser::span::parse_spans;

/// Depth-first pre-order walk of `id` and its descendants. `Empty` is
/// the block-processor's sentinel placeholder (a bare list item, a
/// freshly opened division with no content yet) and is never surfaced.
pub fn walk(
    input: &str,
    arena: &Arena,
    id: ContainerId,
    options: &ParseOptions,
    callbacks: &mut dyn ParserCallbacks,
) -> Result<()> {
    let container = arena.get(id);
    if container.kind == BlockKind::Empty {
        return Ok(());
    }

    callbacks.enter_block(
        container.kind,
        &container.content_boundaries,
        &container.attributes,
        container.detail.as_ref(),
    )?;

    match container.kind {
        BlockKind::Code => {
            callbacks.text(TextKind::Code, &container.content_boundaries)?;
        }
        BlockKind::Latex => {
            callbacks.text(TextKind::Latex, &container.content_boundaries)?;
        }
        _ if container.kind.is_leaf() => {
            parse_spans(input, TextKind::Normal, &container.content_boundaries, options, callbacks)?;
        }
        _ => {
            for &child in &container.children {
                walk(input, arena, child, options, callbacks)?;
            }
        }
    }

    callbacks.leave_block(container.kind)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attributes, BlockDetail, Boundaries, SpanDetail, SpanKind};
    use crate::parser::block_processor::{process_segment, Cursors};
    use crate::parser::container::ROOT;
    use crate::parser::line_index::LineIndex;
    use crate::parser::segment::analyse_segment;

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

    fn run(input: &str) -> Vec<String> {
        let idx = LineIndex::build(input);
        let mut arena = Arena::new();
        let opts = ParseOptions::default();
        let mut cursors = Cursors::default();
        let mut off = 0;
        while off < input.len() {
            let result = analyse_segment(input, off, &idx, &arena, cursors.above, &opts);
            cursors.above = result.above_container;
            cursors = process_segment(&mut arena, cursors, &result.segment);
            off = result.resume_at + 1;
        }
        let mut rec = Recorder::default();
        walk(input, &arena, ROOT, &opts, &mut rec).unwrap();
        rec.events
    }

    #[test]
    fn plain_paragraph_round_trips_through_the_walker() {
        let events = run("abc\n");
        assert_eq!(
            events,
            vec!["enter_block Doc", "enter_block P", "text Normal len=1", "leave_block P", "leave_block Doc"]
        );
    }

    #[test]
    fn code_fence_skips_span_scanning() {
        let events = run("```py\nprint(1)\n```\n");
        assert!(events.contains(&"enter_block Code".to_string()));
        assert!(events.iter().any(|e| e.starts_with("text Code")));
        assert!(!events.iter().any(|e| e.contains("enter_span")));
    }

    #[test]
    fn list_with_one_blank_stays_one_list() {
        let events = run("- x\n- y\n\n- z\n");
        let ul_enters = events.iter().filter(|e| e.as_str() == "enter_block Ul").count();
        assert_eq!(ul_enters, 1);
        let li_enters = events.iter().filter(|e| e.as_str() == "enter_block Li").count();
        assert_eq!(li_enters, 3);
        assert!(events.contains(&"enter_block Hidden".to_string()));
    }

    #[test]
    fn quoted_paragraph_spans_two_lines_as_one_container() {
        let events = run("> a\n> b\n");
        let p_enters = events.iter().filter(|e| e.as_str() == "enter_block P").count();
        assert_eq!(p_enters, 1);
        assert!(events.contains(&"enter_block Quote".to_string()));
    }
}

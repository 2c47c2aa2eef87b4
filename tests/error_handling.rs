//! §7: the grammar is total (no input is ever rejected outright) and
//! the only failure mode observable at the `parse` boundary is a sink
//! callback returning an error.

use ab_markup::model::{Attributes, BlockDetail, BlockKind, Boundaries, SpanDetail, SpanKind, TextKind};
use ab_markup::{parse, ParserCallbacks};

struct CountUntil {
    budget: usize,
}

impl ParserCallbacks for CountUntil {
    fn enter_block(&mut self, _k: BlockKind, _b: &[Boundaries], _a: &Attributes, _d: Option<&BlockDetail>) -> anyhow::Result<()> {
        if self.budget == 0 {
            anyhow::bail!("budget exhausted");
        }
        self.budget -= 1;
        Ok(())
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
fn a_sink_failure_on_the_second_block_stops_the_walk_before_a_third() {
    let mut sink = CountUntil { budget: 1 };
    let err = parse("a\n\nb\n\nc\n", &mut sink);
    assert!(err.is_err());
    assert_eq!(sink.budget, 0);
}

#[test]
fn malformed_attribute_blocks_degrade_to_empty_rather_than_failing_the_parse() {
    #[derive(Default)]
    struct Seen {
        any_attrs: bool,
    }
    impl ParserCallbacks for Seen {
        fn enter_block(&mut self, _k: BlockKind, _b: &[Boundaries], _a: &Attributes, _d: Option<&BlockDetail>) -> anyhow::Result<()> {
            Ok(())
        }
        fn leave_block(&mut self, _k: BlockKind) -> anyhow::Result<()> {
            Ok(())
        }
        fn enter_span(&mut self, _k: SpanKind, _b: &[Boundaries], attrs: &Attributes, _d: Option<&SpanDetail>) -> anyhow::Result<()> {
            if !attrs.is_empty() {
                self.any_attrs = true;
            }
            Ok(())
        }
        fn leave_span(&mut self, _k: SpanKind) -> anyhow::Result<()> {
            Ok(())
        }
        fn text(&mut self, _k: TextKind, _b: &[Boundaries]) -> anyhow::Result<()> {
            Ok(())
        }
    }
    // the `{{` never closes before end of line: per §4.7 this rejects
    // the whole block rather than failing the parse.
    let mut sink = Seen::default();
    let result = parse("[see](http://x){{cls=hi\n", &mut sink);
    assert!(result.is_ok());
    assert!(!sink.any_attrs);
}

#[test]
fn every_byte_sequence_maps_to_a_document_tree_even_when_empty() {
    #[derive(Default)]
    struct JustCount {
        blocks: usize,
    }
    impl ParserCallbacks for JustCount {
        fn enter_block(&mut self, _k: BlockKind, _b: &[Boundaries], _a: &Attributes, _d: Option<&BlockDetail>) -> anyhow::Result<()> {
            self.blocks += 1;
            Ok(())
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
    let mut sink = JustCount::default();
    parse("", &mut sink).expect("an empty buffer still parses to a (trivial) document");
    assert_eq!(sink.blocks, 1, "the root Doc container is always entered");
}

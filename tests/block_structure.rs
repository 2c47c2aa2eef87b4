//! End-to-end exercises of the block-structure phase through the
//! public `parse` entry point: container nesting, continuation, and
//! the blank-line discipline that keeps lists and quotes intact
//! across a single blank line.

use ab_markup::model::{Attributes, BlockDetail, BlockKind, Boundaries, SpanDetail, SpanKind, TextKind};
use ab_markup::{parse, ParserCallbacks};

#[derive(Default, Debug)]
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
    fn text(&mut self, kind: TextKind, _b: &[Boundaries]) -> anyhow::Result<()> {
        self.events.push(format!("text {:?}", kind));
        Ok(())
    }
}

fn run(input: &str) -> Vec<String> {
    let mut rec = Recorder::default();
    parse(input, &mut rec).expect("parse failed");
    rec.events
}

#[test]
fn enter_and_leave_events_are_balanced_and_nest_lifo() {
    let events = run("# Title\n\n> a quote\n\n- one\n- two\n\n```rs\nfn f() {}\n```\n");
    let mut depth = 0i32;
    for e in &events {
        if let Some(rest) = e.strip_prefix("enter_block ") {
            depth += 1;
            let _ = rest;
        } else if e.starts_with("leave_block") {
            depth -= 1;
        }
        assert!(depth >= 0, "events went negative: {:?}", events);
    }
    assert_eq!(depth, 0, "unbalanced enter/leave: {:?}", events);
}

#[test]
fn plain_paragraph() {
    let events = run("abc\n");
    assert_eq!(
        events,
        vec!["enter_block Doc", "enter_block P", "text Normal", "leave_block P", "leave_block Doc"]
    );
}

#[test]
fn quoted_paragraph_spans_two_lines_inside_one_container() {
    let events = run("> a\n> b\n");
    assert_eq!(events.iter().filter(|e| e.as_str() == "enter_block Quote").count(), 1);
    assert_eq!(events.iter().filter(|e| e.as_str() == "enter_block P").count(), 1);
}

#[test]
fn a_list_survives_one_blank_line_but_the_gap_is_recorded_as_hidden() {
    let events = run("- x\n- y\n\n- z\n");
    assert_eq!(events.iter().filter(|e| e.as_str() == "enter_block Ul").count(), 1);
    assert_eq!(events.iter().filter(|e| e.as_str() == "enter_block Li").count(), 3);
    assert!(events.contains(&"enter_block Hidden".to_string()));
}

#[test]
fn two_consecutive_blanks_split_a_list_into_two() {
    let events = run("- x\n\n\n- z\n");
    assert_eq!(events.iter().filter(|e| e.as_str() == "enter_block Ul").count(), 2);
}

#[test]
fn fenced_code_block_carries_language_and_emits_no_inner_spans() {
    let mut rec = Recorder::default();
    parse("```py\nprint(1)\n```\n", &mut rec).unwrap();
    assert!(rec.events.contains(&"enter_block Code".to_string()));
    assert!(!rec.events.iter().any(|e| e.contains("enter_span")));
}

#[test]
fn an_unclosed_fence_stays_open_through_end_of_buffer() {
    // §7: ill-formed input is never fatal; the grammar is total.
    let mut rec = Recorder::default();
    let result = parse("```rs\nfn f() {}\n", &mut rec);
    assert!(result.is_ok());
    assert!(rec.events.contains(&"enter_block Code".to_string()));
    assert!(rec.events.contains(&"leave_block Code".to_string()));
}

#[test]
fn a_named_division_closes_on_a_second_fence_line_and_holds_a_nested_paragraph() {
    let events = run(":::note\nhello\n:::\n");
    assert!(events.contains(&"enter_block Div".to_string()));
    assert!(events.contains(&"enter_block P".to_string()));
}

#[test]
fn headers_of_differing_levels_never_coalesce() {
    let events = run("# one\n## two\n");
    assert_eq!(events.iter().filter(|e| e.as_str() == "enter_block H").count(), 2);
}

#[test]
fn a_link_definition_is_recognised_and_never_span_parsed() {
    let events = run("[foo]: http://example.com \"Example\"\n");
    assert!(events.contains(&"enter_block Def".to_string()));
    assert!(!events.iter().any(|e| e.contains("enter_span")));
}

#[test]
fn a_horizontal_rule_is_a_single_line_leafless_container() {
    let events = run("---\n");
    assert!(events.contains(&"enter_block Hr".to_string()));
    assert!(events.contains(&"leave_block Hr".to_string()));
}

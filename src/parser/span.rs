//! The span parser (§4.6): scans a leaf block's content boundaries for
//! marker candidates, resolves a `MarkChain` of tentatively open spans
//! into nested inline spans, reconstructs multi-line boundaries, and
//! replays the resolved chain as `enter_span`/`text`/`leave_span`
//! events through the callback bundle.
//!
//! Two design choices narrow the general algorithm in ways worth
//! calling out (see DESIGN.md for the fuller rationale):
//!   - CODE and inline LATEX spans are resolved eagerly, as a single
//!     atomic open-and-find-close scan, rather than through the
//!     general MarkChain. Both are verbatim (§8: "within a verbatim
//!     span, no nested spans are emitted"), so there is nothing for
//!     the chain to track between their open and close.
//!   - A link-family span (LINK/LINKDEF/IMG in its three forms) never
//!     opens while another link-family span is already open. The
//!     table's "disallow other link-family inside" flag is realised as
//!     this open-time guard rather than a close-time bitmask check.

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::IResult;

use crate::grammar::attributes::parse_attributes;
use crate::grammar::lexical::is_whitespace;
use crate::model::{Attributes, Boundaries, SpanDetail, SpanKind, TextKind};
use crate::options::ParseOptions;
use crate::parser::callbacks::ParserCallbacks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkKind {
    Em,
    Strong,
    Highlight,
    Underline,
    Delete,
    Ref,
    InsertedRef,
    Img,
    Link,
    Autolink,
    Code,
    Latex,
    Attribute,
}

impl MarkKind {
    fn to_span_kind(self) -> SpanKind {
        match self {
            MarkKind::Em => SpanKind::Em,
            MarkKind::Strong => SpanKind::Strong,
            MarkKind::Highlight => SpanKind::Highlight,
            MarkKind::Underline => SpanKind::Underline,
            MarkKind::Delete => SpanKind::Del,
            MarkKind::Ref | MarkKind::InsertedRef => SpanKind::Ref,
            MarkKind::Img => SpanKind::Img,
            MarkKind::Link | MarkKind::Autolink => SpanKind::Url,
            MarkKind::Code => SpanKind::Code,
            MarkKind::Latex => SpanKind::LatexMath,
            MarkKind::Attribute => unreachable!("attribute marks are reconciled away before replay"),
        }
    }
}

enum LinkForm {
    Titled,
    Defined,
    Bare,
}

struct Mark {
    kind: MarkKind,
    /// True for the `{_`/`{*`/`{=`/`{+`/`{-` braced open forms, which
    /// close on `_}`/`*}`/`=}`/`+}`/`-}` instead of the bare mark.
    braced: bool,
    pre: usize,
    beg: usize,
    solved: bool,
    attrs: Attributes,
    true_bounds: Vec<Boundaries>,
    /// Offset (on the close line) just past the second open token
    /// (`](`, `][`), or past the opening `[[`/`![[` for a ref, used to
    /// slice destination/name text out of the buffer at replay time.
    dest_start: usize,
    dest_end: usize,
    alias: bool,
}

/// A read-only view over a leaf container's content boundaries: one
/// window (`beg..end`) per source line the block spans.
struct Windows<'a> {
    items: &'a [Boundaries],
}

impl<'a> Windows<'a> {
    fn len(&self) -> usize {
        self.items.len()
    }
    fn beg(&self, wi: usize) -> usize {
        self.items[wi].beg
    }
    fn end(&self, wi: usize) -> usize {
        self.items[wi].end
    }
    fn line(&self, wi: usize) -> usize {
        self.items[wi].line_number
    }
}

fn byte_at(input: &str, w: &Windows, wi: usize, off: usize) -> Option<u8> {
    if wi >= w.len() || off >= w.end(wi) {
        return None;
    }
    Some(input.as_bytes()[off])
}

fn prev_byte_for_flank(input: &str, w: &Windows, wi: usize, off: usize) -> u8 {
    if off > w.beg(wi) {
        input.as_bytes()[off - 1]
    } else {
        b' ' // start-of-block counts as whitespace (§4.6.1)
    }
}

/// True when `b` is a word-boundary byte: whitespace or end-of-line.
/// Used for the open/close flanking rule (§4.6.1) — a bare `_`/`*`
/// only opens when content immediately follows, and only closes when
/// content immediately precedes it.
fn is_boundary(b: u8) -> bool {
    is_whitespace(b) || b == b'\n'
}

/// Advance `(wi, off)` to the next scannable byte, crossing window
/// (line) boundaries. Returns `false` once all windows are exhausted.
fn advance_to_content(w: &Windows, wi: &mut usize, off: &mut usize) -> bool {
    while *wi < w.len() && *off >= w.end(*wi) {
        *wi += 1;
        if *wi < w.len() {
            *off = w.beg(*wi);
        }
    }
    *wi < w.len()
}

/// Builds the `Boundaries` sequence for a span whose open is at
/// `(open_wi, pre, beg)` and whose close pattern runs `close_start
/// ..close_end` on window `close_wi` (§4.6.2).
fn build_true_bounds(w: &Windows, open_wi: usize, pre: usize, beg: usize, close_wi: usize, close_start: usize, close_end: usize) -> Vec<Boundaries> {
    if open_wi == close_wi {
        return vec![Boundaries::new(w.line(open_wi), pre, beg, close_start, close_end)];
    }
    let mut out = Vec::new();
    out.push(Boundaries::new(w.line(open_wi), pre, beg, w.end(open_wi), w.end(open_wi)));
    for wi in (open_wi + 1)..close_wi {
        out.push(Boundaries::new(w.line(wi), w.beg(wi), w.beg(wi), w.end(wi), w.end(wi)));
    }
    out.push(Boundaries::new(w.line(close_wi), w.beg(close_wi), w.beg(close_wi), close_start, close_end));
    out
}

/// Searches the chain in reverse for the first unsolved mark matching
/// `pred`, skipping already-solved marks transparently and erasing any
/// non-matching unsolved marks found along the way (§4.6.2, "abandoned
/// opens"). Returns the surviving index of the match, if any.
fn find_and_abandon(marks: &mut Vec<Mark>, pred: impl Fn(&Mark) -> bool) -> Option<usize> {
    let mut i = marks.len();
    let mut to_erase = Vec::new();
    while i > 0 {
        i -= 1;
        if marks[i].solved {
            continue;
        }
        if pred(&marks[i]) {
            for &e in &to_erase {
                marks.remove(e);
            }
            return Some(i);
        }
        to_erase.push(i);
    }
    None
}

fn count_run(input: &str, w: &Windows, wi: usize, off: usize, marker: u8) -> usize {
    let bytes = input.as_bytes();
    let mut i = off;
    let mut n = 0;
    while i < w.end(wi) && bytes[i] == marker {
        n += 1;
        i += 1;
    }
    n
}

/// Atomic open-and-find-close scan for a verbatim run (code span or
/// inline latex): no nested marker recognition happens inside, so
/// there is nothing for the general chain to track. Returns the
/// resolved boundaries and the cursor position just past the close,
/// or `None` if no matching close exists anywhere in the remaining
/// content (in which case the caller treats the opener as plain text).
fn scan_verbatim(
    input: &str,
    w: &Windows,
    marker: &[u8],
    repeat_exact: Option<usize>,
    open_wi: usize,
    open_pre: usize,
    open_beg: usize,
) -> Option<(Vec<Boundaries>, usize, usize)> {
    let bytes = input.as_bytes();
    let mut wi = open_wi;
    let mut off = open_beg;
    loop {
        if wi >= w.len() {
            return None;
        }
        if off >= w.end(wi) {
            wi += 1;
            if wi >= w.len() {
                return None;
            }
            off = w.beg(wi);
            continue;
        }
        if let Some(n) = repeat_exact {
            if bytes[off] == marker[0] {
                let run = count_run(input, w, wi, off, marker[0]);
                if run == n {
                    let close_start = off;
                    let close_end = off + n;
                    return Some((build_true_bounds(w, open_wi, open_pre, open_beg, wi, close_start, close_end), wi, close_end));
                }
                off += run;
                continue;
            }
        } else if bytes[off..].starts_with(marker) && off + marker.len() <= w.end(wi) {
            let close_start = off;
            let close_end = off + marker.len();
            return Some((build_true_bounds(w, open_wi, open_pre, open_beg, wi, close_start, close_end), wi, close_end));
        }
        off += 1;
    }
}

fn autolink_scan(input: &str, w: &Windows, wi: usize, off: usize) -> Option<usize> {
    fn scheme(i: &str) -> IResult<&str, &str> {
        alt((tag("https://"), tag("http://")))(i)
    }
    let line_end = w.end(wi);
    let slice = &input[off..line_end];
    let (rest, matched) = scheme(slice).ok()?;
    let _ = matched;
    let bytes = rest.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        if is_whitespace(b) || b == b'[' || b == b']' {
            break;
        }
        if b.is_ascii_punctuation() {
            // trailing punctuation immediately followed by WS/eol ends the URL before it
            let next = bytes.get(i + 1).copied();
            if next.is_none() || next.map(is_whitespace).unwrap_or(false) {
                break;
            }
        }
        i += 1;
    }
    Some(off + (rest.as_ptr() as usize - slice.as_ptr() as usize) + i)
}

/// Entry point: scan `boundaries` (already block-markup-stripped
/// content ranges) and replay the resolved spans through `callbacks`.
pub fn parse_spans(
    input: &str,
    text_kind: TextKind,
    boundaries: &[Boundaries],
    options: &ParseOptions,
    callbacks: &mut dyn ParserCallbacks,
) -> anyhow::Result<()> {
    let w = Windows { items: boundaries };
    if w.len() == 0 {
        return Ok(());
    }
    let mut marks: Vec<Mark> = Vec::new();
    let mut wi = 0usize;
    let mut off = w.beg(0);
    let mut link_family_open = false;

    while advance_to_content(&w, &mut wi, &mut off) {
        let bytes = input.as_bytes();
        let ch = bytes[off];

        if ch == b'\\' {
            off += 2;
            continue;
        }

        match ch {
            b'{' => {
                let next = byte_at(input, &w, wi, off + 1);
                let braced_kind = match next {
                    Some(b'_') => Some(MarkKind::Em),
                    Some(b'*') => Some(MarkKind::Strong),
                    Some(b'=') => Some(MarkKind::Highlight),
                    Some(b'+') => Some(MarkKind::Underline),
                    Some(b'-') => Some(MarkKind::Delete),
                    _ => None,
                };
                if let Some(kind) = braced_kind {
                    marks.push(Mark {
                        kind,
                        braced: true,
                        pre: off,
                        beg: off + 2,
                        solved: false,
                        attrs: Attributes::new(),
                        true_bounds: Vec::new(),
                        dest_start: 0,
                        dest_end: 0,
                        alias: false,
                    });
                    off += 2;
                } else if next == Some(b'{') {
                    marks.push(Mark {
                        kind: MarkKind::Attribute,
                        braced: false,
                        pre: off,
                        beg: off + 2,
                        solved: false,
                        attrs: Attributes::new(),
                        true_bounds: Vec::new(),
                        dest_start: 0,
                        dest_end: 0,
                        alias: false,
                    });
                    off += 2;
                } else {
                    off += 1;
                }
            }
            b'_' => {
                scan_plain_or_braced(MarkKind::Em, input, &w, wi, &mut off, &mut marks);
            }
            b'*' => {
                scan_plain_or_braced(MarkKind::Strong, input, &w, wi, &mut off, &mut marks);
            }
            b'=' => {
                let found = find_and_abandon(&mut marks, |m| m.kind == MarkKind::Highlight && byte_at(input, &w, wi, off + 1) == Some(b'}'));
                if let Some(i) = found {
                    let (pre, beg) = (marks[i].pre, marks[i].beg);
                    close_mark(&w, &mut marks, i, wi, off, off + 2, pre, beg);
                    off += 2;
                    continue;
                }
                off += 1;
            }
            b'+' => {
                let found = find_and_abandon(&mut marks, |m| m.kind == MarkKind::Underline && byte_at(input, &w, wi, off + 1) == Some(b'}'));
                if let Some(i) = found {
                    let (pre, beg) = (marks[i].pre, marks[i].beg);
                    close_mark(&w, &mut marks, i, wi, off, off + 2, pre, beg);
                    off += 2;
                    continue;
                }
                off += 1;
            }
            b'-' => {
                let found = find_and_abandon(&mut marks, |m| m.kind == MarkKind::Delete && byte_at(input, &w, wi, off + 1) == Some(b'}'));
                if let Some(i) = found {
                    let (pre, beg) = (marks[i].pre, marks[i].beg);
                    close_mark(&w, &mut marks, i, wi, off, off + 2, pre, beg);
                    off += 2;
                    continue;
                }
                off += 1;
            }
            b'}' => {
                let found = find_and_abandon(&mut marks, |m| m.kind == MarkKind::Attribute && byte_at(input, &w, wi, off + 1) == Some(b'}'));
                if let Some(i) = found {
                    let (pre, beg) = (marks[i].pre, marks[i].beg);
                    close_mark(&w, &mut marks, i, wi, off, off + 2, pre, beg);
                    off += 2;
                    continue;
                }
                off += 1;
            }
            b'`' => {
                let n = count_run(input, &w, wi, off, b'`').min(options.max_repeat_mark as usize);
                if n == 0 {
                    off += 1;
                    continue;
                }
                match scan_verbatim(input, &w, b"`", Some(n), wi, off, off + n) {
                    Some((bounds, close_wi, close_end)) => {
                        let mut m = new_plain_mark(MarkKind::Code, off, off + n);
                        m.solved = true;
                        m.true_bounds = bounds;
                        marks.push(m);
                        wi = close_wi;
                        off = close_end;
                    }
                    None => {
                        off += n;
                    }
                }
            }
            b'$' => {
                if byte_at(input, &w, wi, off + 1) == Some(b'$') {
                    match scan_verbatim(input, &w, b"$$", None, wi, off, off + 2) {
                        Some((bounds, close_wi, close_end)) => {
                            let mut m = new_plain_mark(MarkKind::Latex, off, off + 2);
                            m.solved = true;
                            m.true_bounds = bounds;
                            marks.push(m);
                            wi = close_wi;
                            off = close_end;
                        }
                        None => off += 2,
                    }
                } else {
                    off += 1;
                }
            }
            b'[' => {
                if byte_at(input, &w, wi, off + 1) == Some(b'[') {
                    marks.push(new_ref_mark(MarkKind::Ref, off, off + 2));
                    off += 2;
                } else if !link_family_open {
                    marks.push(new_plain_mark(MarkKind::Link, off, off + 1));
                    off += 1;
                } else {
                    off += 1;
                }
            }
            b'!' => {
                if byte_at(input, &w, wi, off + 1) == Some(b'[') && byte_at(input, &w, wi, off + 2) == Some(b'[') {
                    marks.push(new_ref_mark(MarkKind::InsertedRef, off, off + 3));
                    off += 3;
                } else if byte_at(input, &w, wi, off + 1) == Some(b'[') && !link_family_open {
                    marks.push(new_plain_mark(MarkKind::Img, off, off + 2));
                    off += 2;
                } else {
                    off += 1;
                }
            }
            b']' => {
                if byte_at(input, &w, wi, off + 1) == Some(b']') {
                    let found = find_and_abandon(&mut marks, |m| m.kind == MarkKind::Ref || m.kind == MarkKind::InsertedRef);
                    if let Some(i) = found {
                        close_ref(&w, input, &mut marks, i, wi, off);
                        off += 2;
                        continue;
                    }
                    off += 1;
                    continue;
                }
                let form = match byte_at(input, &w, wi, off + 1) {
                    Some(b'(') => LinkForm::Titled,
                    Some(b'[') => LinkForm::Defined,
                    _ => LinkForm::Bare,
                };
                let found = find_and_abandon(&mut marks, |m| match form {
                    LinkForm::Bare => m.kind == MarkKind::Img,
                    _ => m.kind == MarkKind::Img || m.kind == MarkKind::Link,
                });
                if let Some(i) = found {
                    match close_link(&w, input, &mut marks, i, wi, off, &form) {
                        Some(new_off) => {
                            off = new_off;
                            continue;
                        }
                        None => {
                            // second-close not found on this line; abandon the opener, leave `]` as text
                            marks.remove(i);
                        }
                    }
                }
                off += 1;
            }
            b'h' => {
                if let Some(end) = autolink_scan(input, &w, wi, off) {
                    if !link_family_open {
                        let mut m = new_plain_mark(MarkKind::Autolink, off, off);
                        m.solved = true;
                        m.true_bounds = vec![Boundaries::new(w.line(wi), off, off, end, end)];
                        marks.push(m);
                        off = end;
                        continue;
                    }
                }
                off += 1;
            }
            _ => {
                off += 1;
            }
        }

        link_family_open = marks.iter().any(|m| !m.solved && (m.kind == MarkKind::Link || m.kind == MarkKind::Img));
    }

    reconcile_attributes(input, &w, &mut marks);
    marks.retain(|m| m.solved);
    replay(input, &w, text_kind, &marks, callbacks)
}

fn new_plain_mark(kind: MarkKind, pre: usize, beg: usize) -> Mark {
    Mark {
        kind,
        braced: false,
        pre,
        beg,
        solved: false,
        attrs: Attributes::new(),
        true_bounds: Vec::new(),
        dest_start: 0,
        dest_end: 0,
        alias: false,
    }
}

fn new_ref_mark(kind: MarkKind, pre: usize, beg: usize) -> Mark {
    new_plain_mark(kind, pre, beg)
}

/// Handles a plain marker byte (`_` or `*`) that also has a braced
/// counterpart (`{_..._}`/`{*..*}`) already pushed by the `{` arm.
/// A bare marker only opens a span when content hugs it on the
/// opening side, and only closes one when content hugs it on the
/// closing side (§4.6.1's flanking rule) — markers surrounded by
/// whitespace on both sides are left as literal text.
fn scan_plain_or_braced(kind: MarkKind, input: &str, w: &Windows, wi: usize, off: &mut usize, marks: &mut Vec<Mark>) {
    let closes_here = !is_boundary(prev_byte_for_flank(input, w, wi, *off));
    let opens_here = byte_at(input, w, wi, *off + 1).map(|b| !is_boundary(b)).unwrap_or(false);

    let found = find_and_abandon(marks, |m| {
        m.kind == kind
            && if m.braced {
                byte_at(input, w, wi, *off + 1) == Some(b'}')
            } else {
                closes_here
            }
    });
    if let Some(i) = found {
        let braced = marks[i].braced;
        let after = if braced { *off + 2 } else { *off + 1 };
        let (pre, beg) = (marks[i].pre, marks[i].beg);
        close_mark(w, marks, i, wi, *off, after, pre, beg);
        *off = after;
        return;
    }
    if opens_here {
        marks.push(new_plain_mark(kind, *off, *off + 1));
    }
    *off += 1;
}

#[allow(clippy::too_many_arguments)]
fn close_mark(w: &Windows, marks: &mut [Mark], idx: usize, close_wi: usize, close_start: usize, close_end: usize, pre: usize, beg: usize) {
    let open_wi = find_open_wi(w, pre);
    marks[idx].solved = true;
    marks[idx].true_bounds = build_true_bounds(w, open_wi, pre, beg, close_wi, close_start, close_end);
}

/// Given an absolute offset known to be a mark's `pre`, finds which
/// window it falls in. Marks only ever open inside the current scan's
/// windows, so this is always found; windows are disjoint and appear
/// in increasing offset order, so the last window starting at or
/// before `pre` is the answer.
fn find_open_wi(w: &Windows, pre: usize) -> usize {
    let mut best = 0;
    for wi in 0..w.len() {
        if w.beg(wi) <= pre {
            best = wi;
        } else {
            break;
        }
    }
    best
}

fn close_ref(w: &Windows, input: &str, marks: &mut [Mark], idx: usize, close_wi: usize, close_off: usize) {
    let open_wi = find_open_wi(w, marks[idx].pre);
    let pre = marks[idx].pre;
    let beg = marks[idx].beg;
    marks[idx].dest_start = beg;
    marks[idx].dest_end = close_off;
    marks[idx].solved = true;
    marks[idx].true_bounds = build_true_bounds(w, open_wi, pre, beg, close_wi, close_off, close_off + 2);
    let _ = input;
}

/// Resolves a link/image close at `]` (§4.6.2). Returns the cursor
/// position just past the consumed close on success.
fn close_link(w: &Windows, input: &str, marks: &mut [Mark], idx: usize, close_wi: usize, close_off: usize, form: &LinkForm) -> Option<usize> {
    let bytes = input.as_bytes();
    match form {
        LinkForm::Titled => {
            let after_open = close_off + 2; // past `](`
            let (second_wi, second_off) = find_on_same_line(w, bytes, close_wi, after_open, b')')?;
            let pre = marks[idx].pre;
            let beg = marks[idx].beg;
            let open_wi = find_open_wi(w, pre);
            marks[idx].dest_start = after_open;
            marks[idx].dest_end = second_off;
            marks[idx].alias = false;
            marks[idx].solved = true;
            marks[idx].true_bounds = build_true_bounds(w, open_wi, pre, beg, close_wi, close_off, second_off + 1);
            let _ = second_wi;
            Some(second_off + 1)
        }
        LinkForm::Defined => {
            let after_open = close_off + 2; // past `][`
            let (second_wi, second_off) = find_on_same_line(w, bytes, close_wi, after_open, b']')?;
            let pre = marks[idx].pre;
            let beg = marks[idx].beg;
            let open_wi = find_open_wi(w, pre);
            marks[idx].dest_start = after_open;
            marks[idx].dest_end = second_off;
            marks[idx].alias = true;
            marks[idx].solved = true;
            marks[idx].true_bounds = build_true_bounds(w, open_wi, pre, beg, close_wi, close_off, second_off + 1);
            let _ = second_wi;
            Some(second_off + 1)
        }
        LinkForm::Bare => {
            let pre = marks[idx].pre;
            let beg = marks[idx].beg;
            let open_wi = find_open_wi(w, pre);
            marks[idx].dest_start = beg;
            marks[idx].dest_end = beg;
            marks[idx].alias = false;
            marks[idx].solved = true;
            marks[idx].true_bounds = build_true_bounds(w, open_wi, pre, beg, close_wi, close_off, close_off + 1);
            Some(close_off + 1)
        }
    }
}

/// Linear lookahead for `target` on the same line (window) starting at
/// `from`, honoring backslash escapes (§4.6.2's "somewhere on the same
/// line" second-close rule).
fn find_on_same_line(w: &Windows, bytes: &[u8], wi: usize, from: usize, target: u8) -> Option<(usize, usize)> {
    let mut i = from;
    let end = w.end(wi);
    while i < end {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == target {
            return Some((wi, i));
        }
        i += 1;
    }
    None
}

/// §4.6.4: sweep the chain and fold each solved ATTRIBUTE mark into
/// the immediately-preceding solved mark on the same line.
fn reconcile_attributes(input: &str, w: &Windows, marks: &mut Vec<Mark>) {
    let mut i = 0;
    let mut last_non_attr: Option<usize> = None;
    while i < marks.len() {
        if marks[i].kind == MarkKind::Attribute && marks[i].solved {
            if let Some(host) = last_non_attr {
                let host_end_line = marks[host].true_bounds.last().map(|b| b.line_number);
                let attr_pre = marks[i].pre;
                let attr_line = marks[i].true_bounds.first().map(|b| b.line_number).unwrap_or(usize::MAX);
                let host_post = marks[host].true_bounds.last().map(|b| b.post).unwrap_or(0);
                if host_end_line == Some(attr_line) && only_whitespace_between(input, host_post, attr_pre) {
                    let mut attrs_off = marks[i].beg;
                    let attrs = parse_attributes(input, &mut attrs_off);
                    marks[host].attrs = attrs;
                    if let Some(last) = marks[host].true_bounds.last_mut() {
                        last.post = marks[i].true_bounds.last().map(|b| b.post).unwrap_or(last.post);
                    }
                }
            }
            marks.remove(i);
            continue;
        }
        if marks[i].solved {
            last_non_attr = Some(i);
        }
        i += 1;
    }
    let _ = w;
}

fn only_whitespace_between(input: &str, from: usize, to: usize) -> bool {
    if from > to {
        return false;
    }
    input.as_bytes()[from..to].iter().all(|&b| is_whitespace(b))
}

fn replay(input: &str, w: &Windows, base_kind: TextKind, marks: &[Mark], callbacks: &mut dyn ParserCallbacks) -> anyhow::Result<()> {
    let mut idx = 0usize;
    let mut cursor_wi = 0usize;
    let mut cursor_off = w.beg(0);
    emit_run(input, w, base_kind, marks, &mut idx, None, &mut cursor_wi, &mut cursor_off, callbacks)?;
    // trailing text after the last mark
    emit_text_up_to(input, w, base_kind, &mut cursor_wi, &mut cursor_off, w.len() - 1, w.end(w.len() - 1), callbacks)?;
    Ok(())
}

/// Recursively emits one "run" of sibling marks, all nested inside
/// whatever the caller is currently inside (or top-level if `stop_pre`
/// is `None`). Relies on the chain's open-order already being a
/// preorder traversal of a well-nested forest (guaranteed by the LIFO
/// close discipline in the main scan loop).
#[allow(clippy::too_many_arguments)]
fn emit_run(
    input: &str,
    w: &Windows,
    base_kind: TextKind,
    marks: &[Mark],
    idx: &mut usize,
    stop_pre: Option<(usize, usize)>,
    cursor_wi: &mut usize,
    cursor_off: &mut usize,
    callbacks: &mut dyn ParserCallbacks,
) -> anyhow::Result<()> {
    while *idx < marks.len() {
        let m = &marks[*idx];
        let open_line = m.true_bounds.first().map(|b| b.line_number).unwrap_or(0);
        let open_pre = m.pre;
        if let Some((stop_line, stop_pre_off)) = stop_pre {
            if (open_line, open_pre) >= (stop_line, stop_pre_off) {
                break;
            }
        }

        // text from cursor up to this mark's open
        emit_text_up_to(input, w, base_kind, cursor_wi, cursor_off, find_open_wi(w, open_pre), open_pre, callbacks)?;

        if m.kind == MarkKind::Attribute {
            // shouldn't survive to replay; defensive skip
            *idx += 1;
            continue;
        }

        let span_kind = m.kind.to_span_kind();
        let detail = build_detail(input, m);
        callbacks.enter_span(span_kind, &m.true_bounds, &m.attrs, detail.as_ref())?;
        *cursor_wi = find_open_wi(w, m.true_bounds.first().map(|b| b.beg).unwrap_or(m.beg));
        *cursor_off = m.true_bounds.first().map(|b| b.beg).unwrap_or(m.beg);

        let inner_kind = inner_text_kind(span_kind, base_kind);

        *idx += 1;
        let close_line = m.true_bounds.last().unwrap().line_number;
        let close_end = m.true_bounds.last().unwrap().end;
        emit_run(input, w, inner_kind, marks, idx, Some((close_line, close_end)), cursor_wi, cursor_off, callbacks)?;

        // suppress inner text for ref/img kinds whose semantics don't carry visible text
        let suppress_text = matches!(span_kind, SpanKind::Ref | SpanKind::Img);
        if !suppress_text {
            emit_text_up_to(input, w, inner_kind, cursor_wi, cursor_off, close_line_wi(w, close_line), close_end, callbacks)?;
        }
        let last = m.true_bounds.last().unwrap();
        *cursor_wi = close_line_wi(w, last.line_number);
        *cursor_off = last.post;
        callbacks.leave_span(span_kind)?;
    }
    Ok(())
}

fn close_line_wi(w: &Windows, line: usize) -> usize {
    for wi in 0..w.len() {
        if w.line(wi) == line {
            return wi;
        }
    }
    w.len().saturating_sub(1)
}

fn inner_text_kind(span_kind: SpanKind, outer: TextKind) -> TextKind {
    match span_kind {
        SpanKind::Code => TextKind::Code,
        _ if outer == TextKind::Latex => TextKind::Latex,
        _ => TextKind::Normal,
    }
}

fn emit_text_up_to(
    input: &str,
    w: &Windows,
    kind: TextKind,
    cursor_wi: &mut usize,
    cursor_off: &mut usize,
    target_wi: usize,
    target_off: usize,
    callbacks: &mut dyn ParserCallbacks,
) -> anyhow::Result<()> {
    let _ = input;
    if *cursor_wi > target_wi || (*cursor_wi == target_wi && *cursor_off >= target_off) {
        return Ok(());
    }
    let mut bounds = Vec::new();
    if *cursor_wi == target_wi {
        bounds.push(Boundaries::new(w.line(*cursor_wi), *cursor_off, *cursor_off, target_off, target_off));
    } else {
        bounds.push(Boundaries::new(w.line(*cursor_wi), *cursor_off, *cursor_off, w.end(*cursor_wi), w.end(*cursor_wi)));
        for wi in (*cursor_wi + 1)..target_wi {
            bounds.push(Boundaries::new(w.line(wi), w.beg(wi), w.beg(wi), w.end(wi), w.end(wi)));
        }
        bounds.push(Boundaries::new(w.line(target_wi), w.beg(target_wi), w.beg(target_wi), target_off, target_off));
    }
    if bounds.iter().any(|b| b.beg < b.end) || bounds.len() == 1 {
        callbacks.text(kind, &bounds)?;
    }
    *cursor_wi = target_wi;
    *cursor_off = target_off;
    Ok(())
}

fn build_detail(input: &str, m: &Mark) -> Option<SpanDetail> {
    match m.kind {
        MarkKind::Autolink => {
            let href = m.true_bounds.first().map(|b| input[b.pre..b.end].to_string()).unwrap_or_default();
            Some(SpanDetail::Url { href, title: String::new(), alias: false })
        }
        MarkKind::Link => {
            if m.dest_end >= m.dest_start {
                Some(SpanDetail::Url { href: input[m.dest_start..m.dest_end].to_string(), title: String::new(), alias: m.alias })
            } else {
                None
            }
        }
        MarkKind::Img => {
            let src = if m.dest_end >= m.dest_start { input[m.dest_start..m.dest_end].to_string() } else { String::new() };
            Some(SpanDetail::Img { src, title: String::new(), alias: m.alias })
        }
        MarkKind::Ref | MarkKind::InsertedRef => {
            let name = if m.dest_end >= m.dest_start { input[m.dest_start..m.dest_end].to_string() } else { String::new() };
            Some(SpanDetail::Ref { name, inserted: m.kind == MarkKind::InsertedRef })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BlockKind;
    use crate::parser::line_index::LineIndex;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl ParserCallbacks for Recorder {
        fn enter_block(&mut self, kind: BlockKind, _b: &[Boundaries], _a: &Attributes, _d: Option<&crate::model::BlockDetail>) -> anyhow::Result<()> {
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

    fn parse_one_line_paragraph(text: &str) -> Vec<String> {
        let input = format!("{}\n", text);
        let idx = LineIndex::build(&input);
        let end = idx.find_next_line_end(&input, 0);
        let bounds = vec![Boundaries::new(0, 0, 0, end, end)];
        let mut rec = Recorder::default();
        parse_spans(&input, TextKind::Normal, &bounds, &ParseOptions::default(), &mut rec).unwrap();
        rec.events
    }

    #[test]
    fn plain_text_emits_single_text_event() {
        let events = parse_one_line_paragraph("abc");
        assert_eq!(events, vec!["text Normal len=1"]);
    }

    #[test]
    fn strong_and_em_are_detected() {
        let events = parse_one_line_paragraph("a *b* c _d_ e");
        assert!(events.contains(&"enter_span Strong".to_string()));
        assert!(events.contains(&"leave_span Strong".to_string()));
        assert!(events.contains(&"enter_span Em".to_string()));
        assert!(events.contains(&"leave_span Em".to_string()));
    }

    #[test]
    fn code_span_has_no_nested_spans() {
        let events = parse_one_line_paragraph("a `*b*` c");
        assert!(events.contains(&"enter_span Code".to_string()));
        assert!(!events.contains(&"enter_span Strong".to_string()));
    }

    #[test]
    fn link_with_trailing_attributes_attaches_not_emits() {
        let events = parse_one_line_paragraph("[see](http://x){{cls=hi}}");
        assert!(events.iter().any(|e| e == "enter_span Url"));
        assert!(!events.iter().any(|e| e.contains("Attribute")));
    }

    #[test]
    fn unclosed_emphasis_marker_is_dropped() {
        let events = parse_one_line_paragraph("a *b c");
        assert!(!events.iter().any(|e| e.contains("Strong")));
    }

}

//! The segment analyzer (§4.2): classifies one line, starting at an
//! offset, into a provisional block role.

use crate::grammar::enumeration::{
    alpha_to_decimal, validate_roman_enumeration, verify_positive_number,
};
use crate::grammar::lexical::{
    check_ws_or_end, count_marks, count_marks_at, is_whitespace, skip_whitespace,
};
use crate::grammar::attributes::parse_attributes;
use crate::model::{Attributes, Boundaries};
use crate::options::ParseOptions;
use crate::parser::container::{Arena, ContainerId, OpenerFlag, RepeatedMarker};
use crate::model::BlockKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Solved {
    None,
    Partial,
    Full,
}

pub struct Segment {
    pub flag: OpenerFlag,
    pub kind: BlockKind,
    pub bounds: Boundaries,
    pub start: usize,
    pub end: usize,
    pub first_non_blank: usize,
    pub indent: usize,
    pub line_number: usize,
    pub blank_line: bool,
    pub skip_segment: bool,
    pub acc: String,
    pub close_block: bool,
    pub no_content_after: bool,
    pub count: u32,
    pub li_pre_marker: u8,
    pub li_post_marker: u8,
    pub attributes: Attributes,
    pub solved: Solved,
}

impl Segment {
    fn new(line_number: usize, start: usize, end: usize) -> Self {
        Self {
            flag: OpenerFlag::None,
            kind: BlockKind::Doc,
            bounds: Boundaries::new(line_number, start, start, end, end),
            start,
            end,
            first_non_blank: end,
            indent: 0,
            line_number,
            blank_line: true,
            skip_segment: false,
            acc: String::new(),
            close_block: false,
            no_content_after: false,
            count: 0,
            li_pre_marker: 0,
            li_post_marker: 0,
            attributes: Attributes::new(),
            solved: Solved::None,
        }
    }

    fn make_paragraph(&mut self, off: usize) {
        self.attributes.clear();
        self.bounds.pre = off;
        self.bounds.beg = off;
        self.flag = OpenerFlag::P;
        self.kind = BlockKind::P;
    }

    fn make_ul(&mut self, off: usize, marker: u8, indent_before: usize) {
        self.bounds.pre = self.start;
        self.bounds.beg = if off + 1 == self.end { off + 1 } else { off + 2 };
        self.indent = off + 2 - self.start + indent_before;
        self.flag = OpenerFlag::List;
        self.kind = BlockKind::Ul;
        self.li_pre_marker = marker;
        self.solved = Solved::Full;
    }
}

/// Required indent tolerance for a continuation line under an opener
/// of this flag (§4.2, §9 Open Question #1: uniform across container
/// kinds, keyed purely by flag).
pub fn allowed_ws(flag: OpenerFlag) -> usize {
    match flag {
        OpenerFlag::Quote | OpenerFlag::Definition => 1,
        _ => 3,
    }
}

fn check_ws_before(seg: &Segment, off: usize) -> bool {
    seg.first_non_blank >= off
}

fn check_indent(ws_counter: usize, total_indent: usize, allowed: usize) -> bool {
    (ws_counter as i64) - (total_indent as i64) < allowed as i64
}

fn check_space_after(input: &str, off: usize) -> bool {
    let bytes = input.as_bytes();
    off + 1 < bytes.len() && bytes[off + 1] == b' '
}

fn check_for_whitespace_after(input: &str, off: usize) -> bool {
    let bytes = input.as_bytes();
    let mut i = off;
    while i < bytes.len() && bytes[i] != b'\n' {
        if !is_whitespace(bytes[i]) {
            return false;
        }
        i += 1;
    }
    true
}

/// §4.2.1 closing-fence detection. Returns the run length on
/// acceptance, 0 if no closing run was found, -1 if a run was found
/// but trailing content made it invalid.
#[allow(clippy::too_many_arguments)]
fn check_for_closing_delimiters(
    input: &str,
    off: &mut usize,
    seg: &mut Segment,
    marker: u8,
    num_markers: u32,
    allow_greater_number: bool,
    allow_chars_before_closing: bool,
    allow_attributes: bool,
) -> i64 {
    let bytes = input.as_bytes();
    let check_ws_before_ok = allow_chars_before_closing || check_ws_before(seg, *off);

    let mut count: i64 = 0;
    while *off < bytes.len() && bytes[*off] != b'\n' {
        if bytes[*off] == b'\\' {
            count = -1;
        } else if bytes[*off] == marker {
            count += 1;
        } else if count < num_markers as i64 {
            count = 0;
        } else {
            break;
        }
        *off += 1;
    }

    let is_count_right = if allow_greater_number {
        count >= num_markers as i64
    } else {
        count == num_markers as i64
    };

    let mut non_authorized_text_after = false;
    let mut tmp_off = *off;
    skip_whitespace(input, &mut tmp_off);

    if tmp_off < bytes.len() && bytes[tmp_off] == b'{' && allow_attributes {
        tmp_off += 1;
        if tmp_off < bytes.len() && bytes[tmp_off] == b'{' {
            tmp_off += 1;
            let attrs = parse_attributes(input, &mut tmp_off);
            if attrs.is_empty() {
                non_authorized_text_after = true;
            } else {
                seg.attributes = attrs;
            }
        } else {
            non_authorized_text_after = true;
        }
    } else if !check_ws_or_end(input, *off) {
        non_authorized_text_after = true;
    }

    if is_count_right && check_ws_before_ok && !non_authorized_text_after {
        count
    } else if non_authorized_text_after {
        -1
    } else {
        0
    }
}

fn get_name_and_attributes(input: &str, off: &mut usize) -> (String, Attributes) {
    let bytes = input.as_bytes();
    let mut name = String::new();
    let mut attributes = Attributes::new();
    while *off < bytes.len() && bytes[*off] != b'\n' {
        if bytes[*off] == b'{' && *off + 1 < bytes.len() && bytes[*off + 1] == b'{' {
            *off += 2;
            attributes = parse_attributes(input, off);
            break;
        } else if is_whitespace(bytes[*off]) {
            *off += 1;
            continue;
        } else {
            name.push(bytes[*off] as char);
            *off += 1;
        }
    }
    (name, attributes)
}

/// Descend `above` into the container that held the same logical
/// column on the previous line's *next* segment (§9: the
/// above/current cursor pair). Skips over list/ordered-list wrappers
/// straight to the active list item.
pub fn select_last_child_container(arena: &Arena, above: Option<ContainerId>) -> Option<ContainerId> {
    let above = above?;
    let children = &arena.get(above).children;
    if children.is_empty() {
        return None;
    }
    let mut next = *children.last().unwrap();
    let kind = arena.get(next).kind;
    if kind == BlockKind::Ul || kind == BlockKind::Ol {
        let grandchildren = &arena.get(next).children;
        if let Some(&last) = grandchildren.last() {
            next = last;
        }
    }
    Some(next)
}

/// Outcome of analysing one line: the populated segment, the offset
/// to resume scanning at, and the (possibly promoted) above-container
/// cursor that should feed into the segment processor.
pub struct AnalysisResult {
    pub segment: Segment,
    pub resume_at: usize,
    pub above_container: Option<ContainerId>,
}

pub fn analyse_segment(
    input: &str,
    off: usize,
    line_index: &super::line_index::LineIndex,
    arena: &Arena,
    mut above: Option<ContainerId>,
    options: &ParseOptions,
) -> AnalysisResult {
    let bytes = input.as_bytes();
    let end = line_index.find_next_line_end(input, off);
    let line_number = line_index.line_number_of(off);
    let mut seg = Segment::new(line_number, off, end);
    let mut this_segment_end = end;

    let mut local_indent = 0usize;
    let mut total_indent = 0usize;
    let mut repeated_markers: Option<RepeatedMarker> = None;

    if let Some(ac) = above {
        let c = arena.get(ac);
        local_indent = c.indent;
        total_indent = local_indent;
        if let Some(rm) = c.repeated_markers {
            if !c.closed {
                repeated_markers = Some(rm);
            }
        }
    }

    if let Some(_rm) = repeated_markers {
        let ac = arena.get(above.unwrap());
        if !ac.closed {
            seg.flag = ac.flag;
            seg.blank_line = false;
            seg.bounds.end = seg.end;
            seg.bounds.post = seg.end;
        }
    }

    let mut whitespace_counter = 0usize;
    let mut acc = String::new();

    let mut cursor = off;
    'scan: while cursor < end {
        acc.push(bytes[cursor] as char);

        if let Some(ac) = above {
            if local_indent > 0 && seg.blank_line && whitespace_counter >= local_indent && !arena.get(ac).closed {
                seg.start = cursor;
                above = select_last_child_container(arena, above);
                if let Some(new_ac) = above {
                    total_indent += arena.get(new_ac).indent;
                    local_indent = arena.get(new_ac).indent;
                    repeated_markers = arena.get(new_ac).repeated_markers;
                } else {
                    local_indent = 0;
                    repeated_markers = None;
                }
            }
        }

        if !(is_whitespace(bytes[cursor]) || bytes[cursor] == b'\n') && seg.blank_line {
            seg.blank_line = false;
            seg.first_non_blank = cursor;
            acc.clear();
            acc.push(bytes[cursor] as char);
        }

        let ch = bytes[cursor];
        if ch == b' ' {
            whitespace_counter += 1;
        } else if ch == b'\t' {
            whitespace_counter += 4;
        } else if ch == b'\\' {
            if cursor == seg.start && repeated_markers.is_none() {
                seg.make_paragraph(seg.start);
                this_segment_end = seg.end;
                break 'scan;
            } else {
                cursor += 1;
                continue 'scan;
            }
        } else if let Some(rm) = repeated_markers {
            if ch == rm.marker {
                let off_before = cursor;
                let mut scan_off = cursor;
                let num = check_for_closing_delimiters(
                    input,
                    &mut scan_off,
                    &mut seg,
                    rm.marker,
                    rm.count,
                    rm.allow_greater_number,
                    rm.allow_chars_before_closing,
                    rm.allow_attributes,
                );
                if num > 0 {
                    seg.close_block = true;
                    seg.flag = arena.get(above.unwrap()).flag;
                    seg.bounds.end = off_before;
                    seg.bounds.post = scan_off;
                    this_segment_end = scan_off;
                    break 'scan;
                }
            }
        } else if ch == b'#' {
            let count = count_marks_at(input, cursor, b'#');
            if check_ws_before(&seg, cursor)
                && count > 0
                && count < 7
                && check_ws_or_end(input, cursor + count)
                && check_indent(whitespace_counter, total_indent, 3)
            {
                seg.flag = OpenerFlag::H;
                seg.bounds.pre = seg.start;
                let sep = input.as_bytes().get(cursor + count).copied();
                seg.bounds.beg = if sep.map(|b| b != b'\n' && is_whitespace(b)).unwrap_or(false) {
                    cursor + count + 1
                } else {
                    cursor + count
                };
                seg.count = count as u32;
                seg.solved = Solved::Full;
                seg.kind = BlockKind::H;
                this_segment_end = end;
                break 'scan;
            } else {
                seg.make_paragraph(seg.start);
                this_segment_end = seg.end;
                break 'scan;
            }
        } else if ch == b'>' {
            if check_ws_before(&seg, cursor) && check_indent(whitespace_counter, total_indent, allowed_ws(OpenerFlag::Quote)) {
                seg.bounds.pre = seg.start;
                seg.bounds.beg = cursor + 1;
                seg.flag = OpenerFlag::Quote;
                seg.kind = BlockKind::Quote;
                this_segment_end = cursor + 1;
                seg.solved = Solved::Full;
                if check_space_after(input, cursor) {
                    seg.bounds.beg = cursor + 2;
                    this_segment_end = cursor + 2;
                }
                break 'scan;
            } else {
                seg.make_paragraph(seg.start);
                this_segment_end = seg.end;
                break 'scan;
            }
        } else if ch == b'*' {
            if check_ws_before(&seg, cursor) && check_ws_or_end(input, cursor + 1) && seg.flag != OpenerFlag::List {
                seg.make_ul(cursor, b'*', whitespace_counter);
                this_segment_end = if check_space_after(input, cursor) { cursor + 2 } else { cursor + 1 };
                break 'scan;
            } else {
                seg.make_paragraph(seg.start);
                this_segment_end = seg.end;
                break 'scan;
            }
        } else if ch == b'-' {
            let count = count_marks_at(input, cursor, b'-');
            if check_ws_before(&seg, cursor) && count > 2 && check_for_whitespace_after(input, cursor + count) {
                seg.flag = OpenerFlag::Hr;
                seg.bounds.pre = cursor;
                seg.bounds.beg = cursor + count;
                this_segment_end = seg.end;
                seg.solved = Solved::Full;
                seg.kind = BlockKind::Hr;
                break 'scan;
            } else if check_ws_before(&seg, cursor)
                && check_ws_or_end(input, cursor + 1)
                && seg.flag != OpenerFlag::List
            {
                seg.make_ul(cursor, b'-', whitespace_counter);
                this_segment_end = if check_space_after(input, cursor) { cursor + 2 } else { cursor + 1 };
                break 'scan;
            } else {
                seg.make_paragraph(seg.start);
                this_segment_end = seg.end;
                break 'scan;
            }
        } else if ch == b'+' {
            if check_ws_before(&seg, cursor)
                && check_ws_or_end(input, cursor + 1)
                && seg.flag != OpenerFlag::List
                && check_indent(whitespace_counter, total_indent, allowed_ws(OpenerFlag::List))
            {
                seg.make_ul(cursor, b'+', whitespace_counter);
                this_segment_end = if check_space_after(input, cursor) { cursor + 2 } else { cursor + 1 };
                break 'scan;
            }
        } else if ch == b'(' {
            if seg.flag == OpenerFlag::List || !check_ws_before(&seg, cursor) {
                seg.make_paragraph(seg.start);
                this_segment_end = seg.end;
                break 'scan;
            }
            seg.solved = Solved::Partial;
            acc.clear();
            seg.flag = OpenerFlag::List;
            seg.li_pre_marker = b'(';
        } else if ch == b')' || ch == b'.' {
            let token = &acc[..acc.len() - 1];
            if !token.is_empty()
                && token.len() < 12
                && check_ws_or_end(input, cursor + 1)
                && !(seg.li_pre_marker == b'(' && ch == b'.')
            {
                seg.bounds.pre = seg.start;
                seg.bounds.beg = cursor + 1;
                seg.indent = cursor + 2 - seg.start + whitespace_counter;
                this_segment_end = cursor + 2;
                if cursor + 1 < bytes.len() && bytes[cursor + 1] == b' ' {
                    seg.bounds.beg += 1;
                }
                seg.flag = OpenerFlag::List;
                seg.solved = Solved::Partial;
                seg.li_post_marker = ch;
                seg.acc = token.to_string();
                break 'scan;
            } else {
                seg.make_paragraph(seg.start);
                this_segment_end = seg.end;
                break 'scan;
            }
        } else if ch == b'[' {
            let parent_is_root = above
                .map(|ac| arena.get(ac).parent == Some(crate::parser::container::ROOT))
                .unwrap_or(true);
            if !check_indent(whitespace_counter, total_indent, allowed_ws(OpenerFlag::Definition)) || !parent_is_root {
                seg.make_paragraph(seg.start);
                this_segment_end = seg.end;
                break 'scan;
            }
            let start_off = cursor;
            let mut scan_off = cursor;
            let mut name_acc = String::new();
            let found_end = crate::grammar::lexical::advance_until(input, &mut scan_off, &mut name_acc, b']');
            let next_is_colon = scan_off + 1 < bytes.len() && bytes[scan_off + 1] == b':';
            if !found_end || !next_is_colon || scan_off - start_off < 2 {
                seg.make_paragraph(seg.start);
                this_segment_end = seg.end;
                break 'scan;
            } else {
                seg.flag = OpenerFlag::Definition;
                seg.solved = Solved::Full;
                seg.indent = 4 + whitespace_counter;
                seg.bounds.pre = seg.start;
                seg.bounds.beg = scan_off + 2;
                seg.bounds.end = scan_off + 2;
                seg.bounds.post = scan_off + 2;
                this_segment_end = scan_off + 2;
                seg.acc = name_acc;
                break 'scan;
            }
        } else if ch == b':' {
            let before_off = cursor;
            let mut scan_off = cursor;
            let count = count_marks(input, &mut scan_off, b':');
            skip_whitespace(input, &mut scan_off);
            if check_ws_before(&seg, before_off) && count == 3 && scan_off < end {
                seg.flag = OpenerFlag::Div;
                seg.bounds.pre = seg.start;
                seg.bounds.beg = seg.end;
                seg.bounds.end = seg.end;
                seg.bounds.post = seg.end;
                let parent_indent = above.map(|ac| arena.get(ac).indent).unwrap_or(0);
                seg.indent = 4 + parent_indent;
                this_segment_end = seg.end;
                let (name, attrs) = get_name_and_attributes(input, &mut scan_off);
                seg.acc = name;
                seg.attributes = attrs;
                break 'scan;
            } else {
                seg.make_paragraph(seg.start);
                this_segment_end = seg.end;
                break 'scan;
            }
        } else if ch == b'$' {
            let tmp_off = cursor;
            let mut scan_off = cursor;
            let count = count_marks(input, &mut scan_off, b'$');
            let mut throwaway = String::new();
            crate::grammar::lexical::advance_until(input, &mut scan_off, &mut throwaway, b'$');
            let closing = check_for_closing_delimiters(input, &mut scan_off, &mut seg, b'$', 2, false, true, true);
            if check_ws_before(&seg, tmp_off) && count == 2 && closing >= 0 {
                seg.flag = OpenerFlag::Latex;
                seg.bounds.beg = tmp_off + count;
                seg.bounds.end = seg.end;
                seg.bounds.post = seg.end;
                if closing > 0 {
                    seg.close_block = true;
                    seg.bounds.end = scan_off - closing as usize;
                }
                this_segment_end = scan_off + 1;
                break 'scan;
            } else {
                seg.make_paragraph(seg.start);
                this_segment_end = seg.end;
                break 'scan;
            }
        } else if ch == b'`' {
            let count = count_marks_at(input, cursor, b'`');
            if check_ws_before(&seg, cursor) && count > 2 && check_indent(whitespace_counter, total_indent, allowed_ws(OpenerFlag::Code)) {
                seg.flag = OpenerFlag::Code;
                seg.bounds.beg = seg.end;
                seg.bounds.end = seg.end;
                seg.bounds.post = seg.end;
                seg.count = count as u32;
                let mut scan_off = cursor + count;
                let (name, attrs) = get_name_and_attributes(input, &mut scan_off);
                seg.acc = name;
                seg.attributes = attrs;
                this_segment_end = scan_off;
                break 'scan;
            } else {
                seg.make_paragraph(seg.start);
                this_segment_end = seg.end;
                break 'scan;
            }
        }

        cursor += 1;
    }

    if !seg.blank_line && seg.flag == OpenerFlag::None {
        seg.make_paragraph(seg.start);
        this_segment_end = seg.end;
    }
    if whitespace_counter < local_indent && seg.first_non_blank.saturating_sub(seg.start) > allowed_ws(seg.flag) {
        seg.make_paragraph(seg.start);
        this_segment_end = seg.end;
    }

    if seg.blank_line && whitespace_counter <= local_indent {
        if let Some(ac) = above {
            let kind = arena.get(ac).kind;
            if kind == BlockKind::Li || kind == BlockKind::Def || kind == BlockKind::Div {
                seg.skip_segment = true;
            }
        }
    }

    if seg.flag == OpenerFlag::List && seg.solved == Solved::Partial {
        if seg.li_pre_marker == b'(' && seg.li_post_marker != b')' {
            seg.make_paragraph(seg.start);
            this_segment_end = seg.end;
        } else {
            let valid = (verify_positive_number(&acc) && acc.len() < 10)
                || validate_roman_enumeration(&acc)
                || (alpha_to_decimal(&acc) > 0 && acc.len() < 4);
            if valid {
                seg.solved = Solved::Full;
                seg.acc = acc.clone();
                seg.kind = BlockKind::Ol;
            } else {
                seg.make_paragraph(seg.start);
                this_segment_end = seg.end;
            }
        }
    }

    if seg.flag == OpenerFlag::List && seg.bounds.beg == seg.end {
        seg.no_content_after = true;
    }

    let _ = options;
    AnalysisResult { segment: seg, resume_at: this_segment_end, above_container: above }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::line_index::LineIndex;

    fn analyse(input: &str) -> Segment {
        let idx = LineIndex::build(input);
        let arena = Arena::new();
        let opts = ParseOptions::default();
        analyse_segment(input, 0, &idx, &arena, None, &opts).segment
    }

    #[test]
    fn plain_text_is_paragraph() {
        let seg = analyse("abc\n");
        assert_eq!(seg.flag, OpenerFlag::P);
    }

    #[test]
    fn header_detected() {
        let seg = analyse("## hi\n");
        assert_eq!(seg.flag, OpenerFlag::H);
        assert_eq!(seg.bounds.beg, 3);
    }

    #[test]
    fn hr_requires_three_dashes_and_only_whitespace_after() {
        let seg = analyse("---\n");
        assert_eq!(seg.flag, OpenerFlag::Hr);
        let seg2 = analyse("--\n");
        assert_eq!(seg2.flag, OpenerFlag::List);
    }

    #[test]
    fn bullet_list_marker() {
        let seg = analyse("- item\n");
        assert_eq!(seg.flag, OpenerFlag::List);
        assert_eq!(seg.li_pre_marker, b'-');
    }

    #[test]
    fn ordered_list_dot_marker() {
        let seg = analyse("12. item\n");
        assert_eq!(seg.kind, BlockKind::Ol);
        assert_eq!(seg.acc, "12");
    }

    #[test]
    fn code_fence_open() {
        let seg = analyse("```py\nx\n");
        assert_eq!(seg.flag, OpenerFlag::Code);
        assert_eq!(seg.acc, "py");
    }

    #[test]
    fn quote_marker() {
        let seg = analyse("> quoted\n");
        assert_eq!(seg.flag, OpenerFlag::Quote);
    }

    #[test]
    fn blank_line_stays_blank() {
        let seg = analyse("\n");
        assert!(seg.blank_line);
    }
}

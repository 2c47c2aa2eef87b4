//! The segment processor (§4.3): folds one `Segment` into the growing
//! container tree, and list-item coalescing (§4.3.1).

use crate::model::{BlockDetail, BlockKind, DefKind, OlType, TaskState};
use crate::parser::container::{Arena, ContainerId, OpenerFlag, RepeatedMarker, ROOT};
use crate::parser::segment::Segment;

/// The two cursors the algorithm threads across lines (§9): `above`
/// tracks the position held on the previous line, `current` tracks the
/// insertion tip (parent for whatever opens next).
pub struct Cursors {
    pub above: Option<ContainerId>,
    pub current: ContainerId,
}

impl Default for Cursors {
    fn default() -> Self {
        Self { above: None, current: ROOT }
    }
}

fn last_boundary_line(arena: &Arena, id: ContainerId) -> i64 {
    arena
        .get(id)
        .content_boundaries
        .last()
        .map(|b| b.line_number as i64)
        .unwrap_or(-1)
}

/// Skips over a UL/OL wrapper to the container actually holding
/// content boundaries for attach-blank purposes.
fn select_parent(arena: &Arena, id: ContainerId) -> ContainerId {
    let parent = arena.get(id).parent.unwrap_or(ROOT);
    let pkind = arena.get(parent).kind;
    if pkind == BlockKind::Ul || pkind == BlockKind::Ol {
        arena.get(parent).parent.unwrap_or(ROOT)
    } else {
        parent
    }
}

fn close_current(arena: &mut Arena, current: ContainerId) -> ContainerId {
    arena.close(current);
    arena.get(current).parent.unwrap_or(ROOT)
}

/// Quote and division containers hold no displayable text of their own
/// (§4.5 only span-parses leaf kinds); each needs a paragraph child to
/// actually carry its text. Returns the still-open trailing paragraph
/// child of `container`, creating one on first use.
fn inner_paragraph(arena: &mut Arena, container: ContainerId, line_number: usize) -> ContainerId {
    if let Some(&last) = arena.get(container).children.last() {
        if arena.get(last).kind == BlockKind::P && !arena.get(last).closed {
            return last;
        }
    }
    arena.alloc(BlockKind::P, container, line_number)
}

pub fn process_segment(arena: &mut Arena, cursors: Cursors, seg: &Segment) -> Cursors {
    let Cursors { mut above, mut current } = cursors;

    // Step 1: discontinuity check.
    if let Some(ac) = above {
        if ac != ROOT {
            let ac_kind = arena.get(ac).kind;
            let ac_flag = arena.get(ac).flag;
            let line_diff = seg.line_number as i64 - last_boundary_line(arena, ac);
            // A division's interior is not re-classified against the
            // division's own opener flag (§4.3 describes kind-change
            // closing for same-level siblings; a `:::` container's body
            // is free-form text until a second fence line closes it, so
            // an interior paragraph flag never counts as a kind change).
            let tolerates_interior_flag = ac_kind == BlockKind::Div && seg.flag != OpenerFlag::Div;
            let discontinuous = line_diff > 1
                || (ac_flag != seg.flag && !tolerates_interior_flag)
                || ac_flag == OpenerFlag::Definition;
            if discontinuous {
                let mut popped_parent = close_current(arena, ac);
                if arena.get(ac).kind == BlockKind::Li {
                    popped_parent = close_current(arena, popped_parent);
                }
                current = popped_parent;
                above = None;
            }
        }
    }

    // Step 2: blank handling.
    if seg.skip_segment {
        if let Some(ac) = above {
            arena.get_mut(ac).content_boundaries.push(seg.bounds);
        }
        return Cursors { above, current };
    }

    if seg.blank_line {
        let target = match above {
            Some(ac) => select_parent(arena, ac),
            None => ROOT,
        };
        let hidden = arena.alloc(BlockKind::Hidden, target, seg.line_number);
        arena.get_mut(hidden).content_boundaries.push(seg.bounds);
        arena.close(hidden);
        return Cursors { above, current };
    }

    // Step 3: dispatch by flag.
    match seg.flag {
        OpenerFlag::P => {
            if let Some(ac) = above {
                if arena.get(ac).kind == BlockKind::Div {
                    let p_id = inner_paragraph(arena, ac, seg.line_number);
                    arena.get_mut(p_id).content_boundaries.push(seg.bounds);
                    arena.note_non_empty_line(ac, seg.line_number);
                    current = p_id;
                } else {
                    arena.get_mut(ac).content_boundaries.push(seg.bounds);
                    arena.note_non_empty_line(ac, seg.line_number);
                    current = ac;
                }
            } else {
                let id = arena.alloc(BlockKind::P, current, seg.line_number);
                arena.get_mut(id).flag = OpenerFlag::P;
                arena.get_mut(id).content_boundaries.push(seg.bounds);
                current = id;
                above = Some(id);
            }
        }
        OpenerFlag::Hr => {
            let id = arena.alloc(BlockKind::Hr, current, seg.line_number);
            arena.get_mut(id).flag = OpenerFlag::Hr;
            arena.get_mut(id).content_boundaries.push(seg.bounds);
            arena.close(id);
            current = id;
            above = None;
        }
        OpenerFlag::H => {
            let level = seg.count as u8;
            let same_level = above
                .map(|ac| matches!(arena.get(ac).detail, Some(BlockDetail::H { level: l }) if l == level))
                .unwrap_or(false);
            if same_level {
                let ac = above.unwrap();
                arena.get_mut(ac).content_boundaries.push(seg.bounds);
                current = ac;
            } else {
                let id = arena.alloc(BlockKind::H, current, seg.line_number);
                let c = arena.get_mut(id);
                c.flag = OpenerFlag::H;
                c.detail = Some(BlockDetail::H { level });
                c.content_boundaries.push(seg.bounds);
                current = id;
                above = Some(id);
            }
        }
        OpenerFlag::Quote => {
            if let Some(ac) = above {
                arena.get_mut(ac).content_boundaries.push(seg.bounds);
                let p_id = inner_paragraph(arena, ac, seg.line_number);
                arena.get_mut(p_id).content_boundaries.push(seg.bounds);
                current = ac;
            } else {
                let id = arena.alloc(BlockKind::Quote, current, seg.line_number);
                let c = arena.get_mut(id);
                c.flag = OpenerFlag::Quote;
                c.indent = seg.indent;
                c.content_boundaries.push(seg.bounds);
                let p_id = inner_paragraph(arena, id, seg.line_number);
                arena.get_mut(p_id).content_boundaries.push(seg.bounds);
                current = id;
                above = Some(id);
            }
        }
        OpenerFlag::Definition => {
            let kind = definition_kind(&seg.acc);
            let id = arena.alloc(BlockKind::Def, current, seg.line_number);
            let c = arena.get_mut(id);
            c.flag = OpenerFlag::Definition;
            c.indent = seg.indent;
            c.detail = Some(BlockDetail::Def { name: seg.acc.clone(), kind });
            c.content_boundaries.push(seg.bounds);
            current = id;
            above = Some(id);
        }
        OpenerFlag::Div => {
            match above {
                // A second `:::` fence line while the division at `ac`
                // is still open closes it (toggle; no name matching —
                // the source grammar never requires the close fence to
                // repeat the division's name).
                Some(ac) if arena.get(ac).kind == BlockKind::Div && !arena.get(ac).closed => {
                    arena.close(ac);
                    current = arena.get(ac).parent.unwrap_or(ROOT);
                    above = None;
                }
                _ => {
                    let id = arena.alloc(BlockKind::Div, current, seg.line_number);
                    let c = arena.get_mut(id);
                    c.flag = OpenerFlag::Div;
                    c.indent = seg.indent;
                    c.detail = Some(BlockDetail::Div { name: seg.acc.clone() });
                    c.attributes = seg.attributes.clone();
                    c.content_boundaries.push(seg.bounds);
                    current = id;
                    above = Some(id);
                    let empty = arena.alloc(BlockKind::Empty, id, seg.line_number);
                    arena.close(empty);
                }
            }
        }
        OpenerFlag::Latex => {
            if let Some(ac) = above {
                arena.get_mut(ac).content_boundaries.push(seg.bounds);
                arena.get_mut(ac).attributes = seg.attributes.clone();
                current = ac;
                if seg.close_block {
                    arena.close(ac);
                    above = None;
                }
            } else {
                let id = arena.alloc(BlockKind::Latex, current, seg.line_number);
                let c = arena.get_mut(id);
                c.flag = OpenerFlag::Latex;
                c.content_boundaries.push(seg.bounds);
                c.repeated_markers = Some(RepeatedMarker {
                    marker: b'$',
                    count: 2,
                    allow_greater_number: true,
                    allow_chars_before_closing: true,
                    allow_attributes: true,
                });
                current = id;
                if seg.close_block {
                    arena.close(id);
                    above = None;
                } else {
                    above = Some(id);
                }
            }
        }
        OpenerFlag::Code => {
            if let Some(ac) = above {
                arena.get_mut(ac).content_boundaries.push(seg.bounds);
                current = ac;
                if seg.close_block {
                    arena.close(ac);
                    above = None;
                }
            } else {
                let id = arena.alloc(BlockKind::Code, current, seg.line_number);
                let c = arena.get_mut(id);
                c.flag = OpenerFlag::Code;
                c.detail = Some(BlockDetail::Code { language: seg.acc.clone(), num_ticks: seg.count as u8 });
                c.content_boundaries.push(seg.bounds);
                c.repeated_markers = Some(RepeatedMarker {
                    marker: b'`',
                    count: seg.count,
                    allow_greater_number: false,
                    allow_chars_before_closing: false,
                    allow_attributes: false,
                });
                current = id;
                above = Some(id);
            }
        }
        OpenerFlag::List => {
            let (new_above, new_current) = make_list_item(arena, above, current, seg);
            above = new_above;
            current = new_current;
        }
        OpenerFlag::None => {
            // Blank line already handled above; nothing else reaches here.
        }
    }

    Cursors { above, current }
}

fn definition_kind(name: &str) -> DefKind {
    if name.starts_with('^') {
        DefKind::Footnote
    } else if name.starts_with("c:") && name.len() > 3 {
        DefKind::Citation
    } else {
        DefKind::Link
    }
}

/// §4.3.1: decide whether this line continues the existing list at
/// `above`/`current` or starts a new one, coalescing blank-separated
/// items within the one-blank-line tolerance.
fn make_list_item(
    arena: &mut Arena,
    above: Option<ContainerId>,
    current: ContainerId,
    seg: &Segment,
) -> (Option<ContainerId>, ContainerId) {
    use crate::grammar::enumeration::{alpha_to_decimal, roman_to_decimal, verify_positive_number};

    let is_ul = seg.acc.is_empty();
    let alpha = alpha_to_decimal(&seg.acc);
    let roman = roman_to_decimal(&seg.acc);
    let is_positive = verify_positive_number(&seg.acc);

    let ty = if is_positive {
        OlType::Numeric
    } else if alpha > 0 && roman > 0 {
        if alpha < roman {
            OlType::Alphabetic
        } else {
            OlType::Roman
        }
    } else if alpha > 0 {
        OlType::Alphabetic
    } else {
        OlType::Roman
    };
    let lower_case = seg.acc.chars().next().map(|c| c.is_lowercase()).unwrap_or(true);

    // Find the existing list at this level: the LI held by `above`
    // (if any), and its UL/OL parent.
    let existing_li = above.filter(|&ac| arena.get(ac).kind == BlockKind::Li);
    let existing_list = existing_li.and_then(|li| arena.get(li).parent);

    let make_new_list = match existing_list {
        None => true,
        Some(list_id) => {
            let list = arena.get(list_id);
            let kind_mismatch = if is_ul {
                list.kind != BlockKind::Ul
                    || !matches!(&list.detail, Some(BlockDetail::Ul { marker }) if *marker == seg.li_pre_marker as char)
            } else {
                list.kind != BlockKind::Ol
                    || !matches!(
                        &list.detail,
                        Some(BlockDetail::Ol { pre_marker, post_marker, ty: existing_ty, .. })
                            if *pre_marker == seg.li_pre_marker as char
                                && *post_marker == seg.li_post_marker as char
                                && style_compatible(*existing_ty, ty)
                    )
            };
            let gap_too_large = seg.line_number as i64 - list.last_non_empty_child_line > 2;
            kind_mismatch || gap_too_large
        }
    };

    let ordinal = seg.acc.clone();
    let task_state = TaskState::Empty;

    if make_new_list {
        let list_kind = if is_ul { BlockKind::Ul } else { BlockKind::Ol };
        let list_id = arena.alloc(list_kind, current, seg.line_number);
        {
            let c = arena.get_mut(list_id);
            c.flag = OpenerFlag::List;
            c.indent = seg.indent;
            c.detail = Some(if is_ul {
                BlockDetail::Ul { marker: seg.li_pre_marker as char }
            } else {
                BlockDetail::Ol { pre_marker: seg.li_pre_marker as char, post_marker: seg.li_post_marker as char, lower_case, ty }
            });
        }
        let li_id = arena.alloc(BlockKind::Li, list_id, seg.line_number);
        {
            let c = arena.get_mut(li_id);
            c.flag = OpenerFlag::List;
            c.indent = seg.indent;
            c.detail = Some(BlockDetail::Li { ordinal, task_state, level: 0 });
            c.content_boundaries.push(seg.bounds);
        }
        if seg.no_content_after {
            let empty = arena.alloc(BlockKind::Empty, li_id, seg.line_number);
            arena.close(empty);
        } else {
            let p_id = inner_paragraph(arena, li_id, seg.line_number);
            arena.get_mut(p_id).content_boundaries.push(seg.bounds);
        }
        (Some(li_id), li_id)
    } else {
        let list_id = existing_list.unwrap();
        // close the prior LI sibling
        if let Some(prev_li) = existing_li {
            arena.close(prev_li);
        }
        arena.note_non_empty_line(list_id, seg.line_number);
        let li_id = arena.alloc(BlockKind::Li, list_id, seg.line_number);
        {
            let c = arena.get_mut(li_id);
            c.flag = OpenerFlag::List;
            c.indent = seg.indent;
            c.detail = Some(BlockDetail::Li { ordinal, task_state, level: 0 });
            c.content_boundaries.push(seg.bounds);
        }
        if seg.no_content_after {
            let empty = arena.alloc(BlockKind::Empty, li_id, seg.line_number);
            arena.close(empty);
        } else {
            let p_id = inner_paragraph(arena, li_id, seg.line_number);
            arena.get_mut(p_id).content_boundaries.push(seg.bounds);
        }
        (Some(li_id), li_id)
    }
}

fn style_compatible(existing: OlType, new_ty: OlType) -> bool {
    existing == new_ty || existing == OlType::Alphabetic || existing == OlType::Roman
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ParseOptions;
    use crate::parser::line_index::LineIndex;
    use crate::parser::segment::analyse_segment;

    fn run(input: &str) -> Arena {
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
        arena
    }

    #[test]
    fn single_paragraph() {
        let arena = run("abc\n");
        let root = arena.get(ROOT);
        assert_eq!(root.children.len(), 1);
        assert_eq!(arena.get(root.children[0]).kind, BlockKind::P);
    }

    #[test]
    fn list_survives_one_blank_splits_on_two() {
        let arena = run("- x\n- y\n\n- z\n");
        let root = arena.get(ROOT);
        // one UL containing all three items plus the hidden blank inside it
        let uls: Vec<_> = root.children.iter().filter(|&&c| arena.get(c).kind == BlockKind::Ul).collect();
        assert_eq!(uls.len(), 1);
        let list = arena.get(*uls[0]);
        let li_count = list.children.iter().filter(|&&c| arena.get(c).kind == BlockKind::Li).count();
        assert_eq!(li_count, 3);
    }
}

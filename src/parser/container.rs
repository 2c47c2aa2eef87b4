//! The container tree (§3, §4.4). All containers live in one arena
//! bound to a single `parse()` call; parent/child links are indices,
//! never pointers, so the erase-and-reuse games the span parser plays
//! elsewhere in this crate can't invalidate them.
//!
//! This implementation defers the tree walk to end-of-parse (§9
//! "Streaming top-level flush" design note explicitly allows this),
//! so the arena is a plain growable vector with no free-list —
//! simpler than the original's slot recycling, with no observable
//! difference in emitted events.

use crate::model::{Attributes, BlockDetail, Boundaries};

pub type ContainerId = usize;

pub const ROOT: ContainerId = 0;

/// The opener that produced a container, used to decide block
/// continuation in the segment processor (§4.3 step 1: "kind
/// change" closes the container).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenerFlag {
    None,
    P,
    Hr,
    H,
    Quote,
    List,
    Definition,
    Div,
    Latex,
    Code,
}

/// Fence state for a container whose interior is raw until a matching
/// repeated-marker run closes it (code, math).
#[derive(Debug, Clone, Copy)]
pub struct RepeatedMarker {
    pub marker: u8,
    pub count: u32,
    pub allow_greater_number: bool,
    pub allow_chars_before_closing: bool,
    pub allow_attributes: bool,
}

pub struct Container {
    pub kind: crate::model::BlockKind,
    pub detail: Option<BlockDetail>,
    pub parent: Option<ContainerId>,
    pub children: Vec<ContainerId>,
    pub content_boundaries: Vec<Boundaries>,
    pub closed: bool,
    pub indent: usize,
    pub flag: OpenerFlag,
    pub repeated_markers: Option<RepeatedMarker>,
    /// Line number of the most recent non-hidden child; -1 if none
    /// yet. Used by list-item coalescing's blank-line tolerance.
    pub last_non_empty_child_line: i64,
    pub attributes: Attributes,
}

impl Container {
    fn new(kind: crate::model::BlockKind, parent: Option<ContainerId>) -> Self {
        Self {
            kind,
            detail: None,
            parent,
            children: Vec::new(),
            content_boundaries: Vec::new(),
            closed: false,
            indent: 0,
            flag: OpenerFlag::None,
            repeated_markers: None,
            last_non_empty_child_line: -1,
            attributes: Attributes::new(),
        }
    }
}

pub struct Arena {
    containers: Vec<Container>,
}

impl Arena {
    pub fn new() -> Self {
        let root = Container::new(crate::model::BlockKind::Doc, None);
        Self { containers: vec![root] }
    }

    pub fn get(&self, id: ContainerId) -> &Container {
        &self.containers[id]
    }

    pub fn get_mut(&mut self, id: ContainerId) -> &mut Container {
        &mut self.containers[id]
    }

    pub fn alloc(
        &mut self,
        kind: crate::model::BlockKind,
        parent: ContainerId,
        line_number: usize,
    ) -> ContainerId {
        let id = self.containers.len();
        self.containers.push(Container::new(kind, Some(parent)));
        self.containers[parent].children.push(id);
        if kind != crate::model::BlockKind::Hidden {
            self.containers[parent].last_non_empty_child_line = line_number as i64;
        }
        id
    }

    pub fn close(&mut self, id: ContainerId) {
        self.containers[id].closed = true;
    }

    /// Records that `id` produced a non-hidden line at `line_number`,
    /// used by list-coalescing's blank-tolerance check on the parent.
    pub fn note_non_empty_line(&mut self, id: ContainerId, line_number: usize) {
        self.containers[id].last_non_empty_child_line = line_number as i64;
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

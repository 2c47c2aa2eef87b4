use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parsed `{{key=value, ...}}` attribute block. Key order is not
/// significant; insertion order is not preserved.
pub type Attributes = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OlType {
    Numeric,
    Alphabetic,
    Roman,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TaskState {
    Empty,
    Failed,
    Succeeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DefKind {
    Footnote,
    Citation,
    Link,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BlockDetail {
    Code { language: String, num_ticks: u8 },
    Ol { pre_marker: char, post_marker: char, lower_case: bool, ty: OlType },
    Ul { marker: char },
    Li { ordinal: String, task_state: TaskState, level: u32 },
    Def { name: String, kind: DefKind },
    Div { name: String },
    H { level: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SpanDetail {
    Url { href: String, title: String, alias: bool },
    Img { src: String, title: String, alias: bool },
    Ref { name: String, inserted: bool },
}

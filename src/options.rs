/// Caller-tunable knobs. There is no CLI, env, or persisted state at
/// this layer (the buffer and this struct are the only inputs); unlike
/// the editor this crate was lifted out of, options are not read from
/// a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Upper bound on a verbatim fence/mark run length (e.g. a run of
    /// backticks opening a code span). Bounds per-line work; the
    /// original engine hard-codes 32.
    pub max_repeat_mark: u32,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self { max_repeat_mark: 32 }
    }
}

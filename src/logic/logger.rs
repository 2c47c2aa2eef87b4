//! Safe logging helpers. This crate logs through the `log` facade only
//! (`log::trace!`/`log::debug!`/`log::warn!`); it never installs a
//! logger itself — that's the embedding application's job.

/// Safe string preview for logging — truncates by character count, not
/// bytes, so a log line never slices a multi-byte UTF-8 sequence in
/// half or dumps a multi-megabyte buffer whole.
///
/// # Examples
/// ```
/// use ab_markup::logic::logger::safe_preview;
///
/// let text = "Hello 😀 World — test";
/// let preview = safe_preview(text, 10);
/// log::debug!("parsing: {}", preview);
/// ```
#[inline]
pub fn safe_preview(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Log at debug level with the message text truncated through
/// [`safe_preview`] first.
#[macro_export]
macro_rules! safe_debug {
    ($fmt:expr, $text:expr, $max:expr) => {
        log::debug!($fmt, $crate::logic::logger::safe_preview($text, $max))
    };
    ($fmt:expr, $text:expr, $max:expr, $($arg:tt)*) => {
        log::debug!($fmt, $crate::logic::logger::safe_preview($text, $max), $($arg)*)
    };
}

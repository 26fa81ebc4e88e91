//! Response sanitizer
//!
//! Completion backends sometimes continue the prompt's dialogue format and
//! answer as `ずんだもん「...」`. Only that exact wrapper is removed: the check
//! is a literal prefix/suffix match on the leading-trimmed text, not a quote
//! parser, so quotes anywhere else in the answer are left alone.

use crate::persona::{CLOSE_QUOTE, OPEN_QUOTE};

/// Sanitize generated text for speech
///
/// Leading whitespace is trimmed (trailing whitespace is kept). If the text
/// then starts with `{speaker}「` and ends with `」`, the inner span is
/// returned. Empty results are replaced by `fallback`.
#[must_use]
pub fn sanitize(raw_text: &str, speaker: &str, fallback: &str) -> String {
    let trimmed = raw_text.trim_start();

    let inner = strip_wrapper(trimmed, speaker).map_or(trimmed, |inner| {
        tracing::debug!("answer is unwrapped");
        inner
    });

    if inner.trim().is_empty() {
        return fallback.to_string();
    }

    inner.to_string()
}

/// Return the span inside `{speaker}「 ... 」`, if the text is wrapped
fn strip_wrapper<'a>(text: &'a str, speaker: &str) -> Option<&'a str> {
    text.strip_prefix(speaker)?
        .strip_prefix(OPEN_QUOTE)?
        .strip_suffix(CLOSE_QUOTE)
}

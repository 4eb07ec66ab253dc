//! Line-ending normalization for text files.

use std::borrow::Cow;

/// Rewrites CRLF to LF when `content` looks like text.
///
/// Content qualifies when it contains at least one CRLF, is valid UTF-8, and
/// holds no control characters other than tab, CR and LF. Anything else is
/// returned untouched.
#[must_use]
pub fn normalize_line_endings(content: &[u8]) -> Cow<'_, [u8]> {
    if !content.windows(2).any(|w| w == b"\r\n") {
        return Cow::Borrowed(content);
    }
    let Ok(text) = std::str::from_utf8(content) else {
        return Cow::Borrowed(content);
    };
    if text.chars().any(is_disallowed_control) {
        return Cow::Borrowed(content);
    }
    Cow::Owned(text.replace("\r\n", "\n").into_bytes())
}

/// Returns true if the two contents differ at most in CRLF line endings.
#[must_use]
pub fn same_except_crlf(a: &[u8], b: &[u8]) -> bool {
    normalize_line_endings(a) == normalize_line_endings(b)
}

fn is_disallowed_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}' | '\u{7F}')
}

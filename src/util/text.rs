use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Display width of `s` in terminal columns.
///
/// Vietnamese diacritics precomposed or combining both count correctly;
/// combining marks are zero-width.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

const ELLIPSIS: char = '…';

/// Truncate `s` so it occupies at most `max_width` columns.
///
/// When text is cut, the last column is replaced by `…`. Returns the input
/// unchanged (borrowed) when it already fits.
///
/// ```
/// use promptfeed::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("ảnh chân dung", 20), "ảnh chân dung");
/// assert_eq!(truncate_to_width("ảnh chân dung", 6), "ảnh c…");
/// assert_eq!(truncate_to_width("ảnh", 0), "");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }
    if max_width == 0 {
        return Cow::Borrowed("");
    }

    let budget = max_width - 1;
    let mut used = 0;
    let mut out = String::with_capacity(s.len().min(max_width * 4));
    for c in s.chars() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push(ELLIPSIS);
    Cow::Owned(out)
}

fn is_unsafe_control(c: char) -> bool {
    (c.is_control() && !matches!(c, '\t' | '\n' | '\r')) || c == '\u{9b}'
}

/// Strip terminal control characters and ANSI escape sequences.
///
/// Prompt text comes from arbitrary users of the gallery, so escape
/// sequences are dropped before anything reaches the terminal. CSI
/// (`ESC [` ... final byte) and OSC (`ESC ]` ... BEL or `ESC \`) sequences
/// are removed whole; other C0/C1 controls are removed individually. Tab,
/// newline and carriage return survive.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_unsafe_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            if !is_unsafe_control(c) {
                out.push(c);
            }
            continue;
        }
        match chars.peek() {
            Some('[') => {
                chars.next();
                for c in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&c) {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                while let Some(c) = chars.next() {
                    if c == '\x07' {
                        break;
                    }
                    if c == '\x1b' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    Cow::Owned(out)
}

/// Render remote text on a single line: controls stripped, line breaks and
/// runs of whitespace folded to one space.
pub fn single_line(s: &str) -> String {
    strip_control_chars(s)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

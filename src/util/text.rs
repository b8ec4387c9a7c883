use std::borrow::Cow;

use unicode_width::UnicodeWidthChar;

/// Ellipsis appended by [`truncate_to_width`].
const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Truncates a string to fit within `max_width` terminal columns.
///
/// Wide characters (CJK, emoji) count as two columns. When the string has to be
/// cut, "..." is appended and counted against the width. Widths of three or
/// fewer columns get a plain prefix with no ellipsis.
///
/// ```
/// use memoria::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Short", 10), "Short");
/// assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
/// assert_eq!(truncate_to_width("Test", 2), "Te");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    let mut width = 0;
    let mut fits_end = s.len();
    let mut keep_end = None;
    let budget = max_width.saturating_sub(ELLIPSIS_WIDTH);

    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if keep_end.is_none() && width + w > budget {
            keep_end = Some(idx);
        }
        if width + w > max_width {
            fits_end = idx;
            break;
        }
        width += w;
    }

    if fits_end == s.len() {
        return Cow::Borrowed(s);
    }
    if max_width <= ELLIPSIS_WIDTH {
        return Cow::Owned(s[..fits_end].to_string());
    }
    let cut = keep_end.unwrap_or(fits_end);
    Cow::Owned(format!("{}{}", &s[..cut], ELLIPSIS))
}

fn is_stripped(b: u8) -> bool {
    b == 0x1b || b == 0x7f || (b < 0x20 && b != b'\t' && b != b'\n' && b != b'\r')
}

/// Strip terminal control characters and ANSI escape sequences.
///
/// Classification results and imported backups are untrusted text that ends
/// up printed to a terminal. Tab, newline and carriage return survive; CSI
/// (`ESC [ ... final`) and OSC (`ESC ] ... BEL|ST`) sequences are dropped
/// whole. Returns `Cow::Borrowed` when nothing needed stripping.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let bytes = s.as_bytes();
    if !bytes.iter().any(|&b| is_stripped(b)) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == 0x1b {
            match bytes.get(i + 1) {
                Some(b'[') => {
                    i += 2;
                    while i < bytes.len() {
                        let c = bytes[i];
                        i += 1;
                        if (0x40..=0x7e).contains(&c) {
                            break;
                        }
                    }
                }
                Some(b']') => {
                    i += 2;
                    while i < bytes.len() {
                        if bytes[i] == 0x07 {
                            i += 1;
                            break;
                        }
                        if bytes[i] == 0x1b && bytes.get(i + 1) == Some(&b'\\') {
                            i += 2;
                            break;
                        }
                        i += 1;
                    }
                }
                _ => i += 1,
            }
        } else if is_stripped(b) {
            i += 1;
        } else {
            let start = i;
            while i < bytes.len() && !is_stripped(bytes[i]) {
                i += 1;
            }
            // Only ASCII bytes stop the run, so this is a char boundary.
            out.push_str(&s[start..i]);
        }
    }

    Cow::Owned(out)
}

/// Sanitize a single-line metadata field: strip control characters and trim.
pub fn clean_field(s: &str) -> String {
    strip_control_chars(s).trim().to_string()
}

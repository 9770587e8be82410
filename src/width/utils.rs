//! Terminal display width helpers.
//!
//! Processor screens may carry ANSI escapes and wide glyphs, so console lines
//! are measured after stripping escapes and clipped by column count rather
//! than by byte length.

use unicode_width::UnicodeWidthChar;

/// Compute the display width of a string after stripping ANSI escapes.
pub fn display_width(text: &str) -> usize {
    let clean = strip_ansi_escapes::strip(text);
    let clean_str = String::from_utf8_lossy(&clean);
    unicode_width::UnicodeWidthStr::width(&*clean_str)
}

/// Clip `text` so it occupies at most `max_width` columns. Escapes are
/// stripped from the result.
pub fn clip_to_width(text: &str, max_width: usize) -> String {
    let clean = strip_ansi_escapes::strip(text);
    let clean_str = String::from_utf8_lossy(&clean);

    let mut result = String::with_capacity(clean_str.len());
    let mut width = 0usize;
    for ch in clean_str.chars() {
        let w = ch.width().unwrap_or(0);
        if width + w > max_width {
            break;
        }
        width += w;
        result.push(ch);
    }
    result
}

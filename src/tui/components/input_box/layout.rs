//! Row layout for the composer draft.
//!
//! The draft is wrapped with `textwrap` using the same word-separator options
//! as sent messages, then each wrapped line is mapped back to a byte range of
//! the draft, so a byte offset maps to exactly one row and column. The
//! composer renders these rows itself instead of letting `Paragraph` wrap.

use std::ops::Range;

use unicode_width::UnicodeWidthChar;

/// Border (2) + padding (2) consumed horizontally by the bordered block
pub(super) const HORIZONTAL_OVERHEAD: u16 = 4;
/// Top + bottom borders consumed vertically
pub(super) const VERTICAL_OVERHEAD: u16 = 2;
/// Offset from area edge to the first text column (border + padding)
pub(super) const TEXT_OFFSET_X: u16 = 2;
/// Rows shown before the composer scrolls internally
pub(super) const MAX_VISIBLE_ROWS: u16 = 5;

/// Width available to text inside an area of `area_width` columns.
pub(super) fn text_width(area_width: u16) -> u16 {
    area_width.saturating_sub(HORIZONTAL_OVERHEAD)
}

/// Build textwrap options for a text column of `width`.
pub(super) fn wrap_options(width: u16) -> textwrap::Options<'static> {
    textwrap::Options::new(usize::from(width.max(1)))
        .break_words(true)
        .word_separator(textwrap::WordSeparator::AsciiSpace)
}

/// Byte ranges of each display row. Newlines end a row and belong to none.
/// The spaces textwrap drops at a break stay on the row before it, so the
/// ranges of one logical line are contiguous. Always returns at least one
/// (possibly empty) row.
pub(super) fn rows(text: &str, width: u16) -> Vec<Range<usize>> {
    let options = wrap_options(width);
    let mut rows = Vec::new();
    let mut line_start = 0;

    for line in text.split('\n') {
        let line_end = line_start + line.len();

        // Wrapped segments are slices of `line`, in order
        let mut starts = vec![line_start];
        let mut search = 0;
        for (i, segment) in textwrap::wrap(line, &options).iter().enumerate() {
            let offset = line[search..]
                .find(segment.as_ref())
                .map_or(search, |found| search + found);
            if i > 0 {
                starts.push(line_start + offset);
            }
            search = offset + segment.len();
        }

        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(line_end);
            rows.push(start..end);
        }
        line_start = line_end + 1;
    }
    rows
}

/// Row index and display column of byte offset `pos`.
pub(super) fn locate(text: &str, rows: &[Range<usize>], pos: usize) -> (u16, u16) {
    let row = rows
        .partition_point(|r| r.start <= pos)
        .saturating_sub(1);
    let start = rows.get(row).map_or(0, |r| r.start);
    let col: usize = text[start..pos]
        .chars()
        .map(|c| c.width().unwrap_or(0))
        .sum();
    (row as u16, col as u16)
}

/// Byte offset of the character before `pos`.
pub(super) fn prev_boundary(text: &str, pos: usize) -> usize {
    text[..pos]
        .char_indices()
        .next_back()
        .map_or(0, |(i, _)| i)
}

/// Byte offset of the character after `pos`.
pub(super) fn next_boundary(text: &str, pos: usize) -> usize {
    text[pos..]
        .chars()
        .next()
        .map_or(text.len(), |c| pos + c.len_utf8())
}

//! Terminal row/column layout helpers for the interactive editor.

use crate::complete::Suggestion;
use crate::tui::settings;
use crossterm::terminal;

/// Computed layout for prompt + input buffer on the terminal surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InputLayout {
    /// Total terminal rows consumed by prompt + buffer.
    pub(crate) total_rows: usize,
    pub(crate) cursor_row: usize,
    pub(crate) cursor_col: usize,
}

/// Read terminal width or fallback to 80 columns.
pub(crate) fn terminal_columns() -> usize {
    terminal::size()
        .ok()
        .map(|(cols, _)| cols as usize)
        .filter(|cols| *cols > 0)
        .unwrap_or(80)
}

pub(crate) fn terminal_rows() -> usize {
    terminal::size()
        .ok()
        .map(|(_, rows)| rows as usize)
        .filter(|rows| *rows > 0)
        .unwrap_or(24)
}

/// Rows consumed by one line of text once soft-wrapped.
pub(crate) fn wrapped_rows(text: &str, cols: usize) -> usize {
    let mut row = 0usize;
    let mut col = 0usize;
    advance_text(text, cols, &mut row, &mut col);
    row + 1
}

/// Compute terminal layout for prompt + input and current cursor position.
pub(crate) fn compute_input_layout(
    buffer: &str,
    cursor: usize,
    cols: usize,
    prompt: &str,
) -> InputLayout {
    let mut row = 0usize;
    let mut col = 0usize;
    let mut cursor_pos: Option<(usize, usize)> = None;

    advance_text(prompt, cols, &mut row, &mut col);

    for (idx, _) in buffer.chars().enumerate() {
        if idx == cursor {
            cursor_pos = Some((row, col));
        }
        advance_char(cols, &mut row, &mut col);
    }

    let (cursor_row, cursor_col) = cursor_pos.unwrap_or((row, col));
    InputLayout {
        total_rows: row + 1,
        cursor_row,
        cursor_col,
    }
}

/// Rows the drawn suggestion window consumes.
pub(crate) fn suggestion_rows(
    window: &[Suggestion],
    selected: Option<usize>,
    text_width: usize,
    color: bool,
    cols: usize,
) -> usize {
    window
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let text = suggestion_text(item, selected == Some(idx), text_width, color);
            wrapped_rows(&text, cols)
        })
        .sum()
}

/// One unstyled dropdown line: marker, padded candidate, description.
pub(crate) fn suggestion_text(
    item: &Suggestion,
    is_selected: bool,
    text_width: usize,
    color: bool,
) -> String {
    let marker = settings::suggestion_marker(is_selected, color);
    format!(
        "{}{marker} {:<text_width$}  {}",
        settings::INDENT,
        item.text,
        item.description
    )
    .trim_end()
    .to_string()
}

fn advance_text(text: &str, cols: usize, row: &mut usize, col: &mut usize) {
    for ch in text.chars() {
        if ch == '\n' {
            *row += 1;
            *col = 0;
        } else {
            advance_char(cols, row, col);
        }
    }
}

/// Advance by one printable cell, wrapping to the next row when needed.
fn advance_char(cols: usize, row: &mut usize, col: &mut usize) {
    if cols == 0 {
        return;
    }
    if *col + 1 >= cols {
        *row += 1;
        *col = 0;
    } else {
        *col += 1;
    }
}

//! Interactive line editor with history and a completion dropdown.
//!
//! The editor asks its caller for suggestions whenever the text left of the
//! cursor changes and draws up to [`settings::MAX_SUGGESTIONS`] of them under
//! the prompt. Accepting one replaces only the fragment after the last word
//! separator.

use crate::complete::{fragment_start, Suggestion};
use crate::tui::input_buffer::{
    byte_index_at_char, char_count, delete_char_at_cursor, delete_char_before_cursor,
    delete_char_range, history_down, history_up, insert_char_at_cursor, previous_word_start,
    replace_before_cursor, ReplState,
};
use crate::tui::input_layout::{
    compute_input_layout, suggestion_rows, suggestion_text, terminal_columns,
};
use crate::tui::settings;
use crossterm::cursor::{MoveToColumn, MoveUp};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::{Print, PrintStyledContent, Stylize};
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::QueueableCommand;
use std::io::{self, IsTerminal, Write};
use std::ops::Range;
use std::time::Duration;

/// Result of reading one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// End-of-file (`Ctrl-D` on empty buffer / stdin EOF).
    Eof,
    /// `Ctrl-C` dropped the line being edited.
    Cancelled,
    /// The caller's poll asked the editor to stop.
    Interrupted,
}

/// Read one line.
///
/// `suggest` receives the text left of the cursor. `interrupted` is polled
/// while waiting for keys; when it returns true the editor clears itself and
/// returns [`ReadOutcome::Interrupted`].
pub fn read_line<S, P>(
    color: bool,
    state: &mut ReplState,
    mut suggest: S,
    mut interrupted: P,
) -> io::Result<ReadOutcome>
where
    S: FnMut(&str) -> Vec<Suggestion>,
    P: FnMut() -> bool,
{
    if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
        return read_line_fallback(color, &mut interrupted);
    }
    read_line_interactive(color, state, &mut suggest, &mut interrupted)
}

fn read_line_fallback(
    color: bool,
    interrupted: &mut dyn FnMut() -> bool,
) -> io::Result<ReadOutcome> {
    if interrupted() {
        return Ok(ReadOutcome::Interrupted);
    }
    let mut stderr = io::stderr();
    write_prompt(&mut stderr, color)?;
    stderr.flush()?;

    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        eprintln!();
        return Ok(ReadOutcome::Eof);
    }
    Ok(ReadOutcome::Line(
        line.trim_end_matches(['\n', '\r']).to_string(),
    ))
}

/// Visible slice of `len` suggestions keeping `selected` on screen.
pub(crate) fn suggestion_window(len: usize, selected: Option<usize>) -> Range<usize> {
    let max = settings::MAX_SUGGESTIONS;
    let first = selected.map(|s| s.saturating_sub(max - 1)).unwrap_or(0);
    first..len.min(first + max)
}

fn read_line_interactive(
    color: bool,
    state: &mut ReplState,
    suggest: &mut dyn FnMut(&str) -> Vec<Suggestion>,
    interrupted: &mut dyn FnMut() -> bool,
) -> io::Result<ReadOutcome> {
    let _guard = RawModeGuard::acquire()?;
    let mut stderr = io::stderr();

    let mut buffer = String::new();
    let mut cursor = 0usize; // char index
    let mut selected: Option<usize> = None;
    let mut suggestions: Vec<Suggestion> = Vec::new();
    let mut suggested_for: Option<String> = None;
    let mut history_index: Option<usize> = None;
    let mut history_draft = String::new();
    let mut previous_cursor_row = 0usize;
    let mut last_render_signature: Option<String> = None;

    loop {
        let before = buffer[..byte_index_at_char(&buffer, cursor)].to_string();
        if suggested_for.as_deref() != Some(before.as_str()) {
            suggestions = if before.trim().is_empty() {
                Vec::new()
            } else {
                suggest(&before)
            };
            selected = None;
            suggested_for = Some(before.clone());
        }

        let window = suggestion_window(suggestions.len(), selected);
        let signature =
            editor_render_signature(&buffer, cursor, selected, &suggestions[window.clone()]);
        if last_render_signature.as_deref() != Some(signature.as_str()) {
            previous_cursor_row = render_editor(
                &mut stderr,
                color,
                &buffer,
                cursor,
                &suggestions[window.clone()],
                selected.map(|s| s - window.start),
                previous_cursor_row,
            )?;
            last_render_signature = Some(signature);
        }

        if interrupted() {
            clear_surface(&mut stderr, previous_cursor_row)?;
            return Ok(ReadOutcome::Interrupted);
        }

        if !event::poll(Duration::from_millis(settings::REPL_EVENT_POLL_MS))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press && key.kind != KeyEventKind::Repeat {
            continue;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Enter => {
                finalize_editor(&mut stderr, color, &buffer, previous_cursor_row)?;
                return Ok(ReadOutcome::Line(buffer));
            }
            KeyCode::Char('d') if ctrl => {
                if buffer.is_empty() {
                    finalize_editor(&mut stderr, color, "", previous_cursor_row)?;
                    return Ok(ReadOutcome::Eof);
                }
                if cursor < char_count(&buffer) {
                    delete_char_at_cursor(&mut buffer, cursor);
                    history_index = None;
                }
            }
            KeyCode::Char('c') if ctrl => {
                finalize_editor(&mut stderr, color, "", previous_cursor_row)?;
                return Ok(ReadOutcome::Cancelled);
            }
            KeyCode::Tab => {
                if let Some(choice) = suggestions.get(selected.unwrap_or(0)) {
                    let from = fragment_start(&before);
                    replace_before_cursor(&mut buffer, &mut cursor, from, &choice.text);
                    history_index = None;
                }
            }
            KeyCode::Esc => {
                suggestions.clear();
                selected = None;
            }
            KeyCode::Up if !suggestions.is_empty() => {
                selected = Some(match selected {
                    Some(0) | None => suggestions.len() - 1,
                    Some(idx) => idx - 1,
                });
            }
            KeyCode::Down if !suggestions.is_empty() => {
                selected = Some(match selected {
                    Some(idx) => (idx + 1) % suggestions.len(),
                    None => 0,
                });
            }
            KeyCode::Up => {
                history_up(state, &mut history_index, &mut history_draft, &mut buffer);
                cursor = char_count(&buffer);
            }
            KeyCode::Down => {
                history_down(state, &mut history_index, &history_draft, &mut buffer);
                cursor = char_count(&buffer);
            }
            KeyCode::Char('p') if ctrl => {
                history_up(state, &mut history_index, &mut history_draft, &mut buffer);
                cursor = char_count(&buffer);
            }
            KeyCode::Char('n') if ctrl => {
                history_down(state, &mut history_index, &history_draft, &mut buffer);
                cursor = char_count(&buffer);
            }
            KeyCode::Left => cursor = cursor.saturating_sub(1),
            KeyCode::Char('b') if ctrl => cursor = cursor.saturating_sub(1),
            KeyCode::Right => cursor = (cursor + 1).min(char_count(&buffer)),
            KeyCode::Char('f') if ctrl => cursor = (cursor + 1).min(char_count(&buffer)),
            KeyCode::Home => cursor = 0,
            KeyCode::Char('a') if ctrl => cursor = 0,
            KeyCode::End => cursor = char_count(&buffer),
            KeyCode::Char('e') if ctrl => cursor = char_count(&buffer),
            KeyCode::Backspace => {
                if cursor > 0 {
                    delete_char_before_cursor(&mut buffer, &mut cursor);
                    history_index = None;
                }
            }
            KeyCode::Delete => {
                if cursor < char_count(&buffer) {
                    delete_char_at_cursor(&mut buffer, cursor);
                    history_index = None;
                }
            }
            KeyCode::Char('k') if ctrl => {
                let end = char_count(&buffer);
                delete_char_range(&mut buffer, cursor, end);
                history_index = None;
            }
            KeyCode::Char('u') if ctrl => {
                delete_char_range(&mut buffer, 0, cursor);
                cursor = 0;
                history_index = None;
            }
            KeyCode::Char('w') if ctrl => {
                let start = previous_word_start(&buffer, cursor);
                delete_char_range(&mut buffer, start, cursor);
                cursor = start;
                history_index = None;
            }
            KeyCode::Char(ch) => {
                if ctrl || key.modifiers.contains(KeyModifiers::ALT) {
                    continue;
                }
                insert_char_at_cursor(&mut buffer, &mut cursor, ch);
                history_index = None;
            }
            _ => {}
        }
    }
}

/// Clear rows previously painted by the editor or the host picker.
pub(crate) fn clear_surface(stderr: &mut io::Stderr, previous_cursor_row: usize) -> io::Result<()> {
    if previous_cursor_row > 0 {
        stderr.queue(MoveUp(previous_cursor_row as u16))?;
    }
    stderr.queue(MoveToColumn(0))?;
    stderr.queue(Clear(ClearType::FromCursorDown))?;
    stderr.flush()?;
    Ok(())
}

/// Build a lightweight render-state signature for redraw suppression.
fn editor_render_signature(
    buffer: &str,
    cursor: usize,
    selected: Option<usize>,
    window: &[Suggestion],
) -> String {
    let mut signature = format!("{buffer}|{cursor}|{selected:?}|");
    for item in window {
        signature.push_str(&item.text);
        signature.push(',');
    }
    signature
}

fn write_prompt(stderr: &mut io::Stderr, color: bool) -> io::Result<()> {
    if color {
        stderr.queue(PrintStyledContent(settings::PROMPT.with(settings::COLOR_PROMPT)))?;
    } else {
        stderr.queue(Print(settings::PROMPT))?;
    }
    Ok(())
}

/// Render prompt, buffer and dropdown, then put the cursor back.
fn render_editor(
    stderr: &mut io::Stderr,
    color: bool,
    buffer: &str,
    cursor: usize,
    window: &[Suggestion],
    selected: Option<usize>,
    previous_cursor_row: usize,
) -> io::Result<usize> {
    if previous_cursor_row > 0 {
        stderr.queue(MoveUp(previous_cursor_row as u16))?;
    }
    stderr.queue(MoveToColumn(0))?;
    stderr.queue(Clear(ClearType::FromCursorDown))?;

    let cols = terminal_columns();
    write_prompt(stderr, color)?;
    stderr.queue(Print(buffer))?;

    let text_width = window.iter().map(|s| char_count(&s.text)).max().unwrap_or(0);
    for (idx, item) in window.iter().enumerate() {
        let active = selected == Some(idx);
        stderr.queue(Print("\r\n"))?;
        if color {
            let marker = settings::suggestion_marker(active, true);
            let marker_color = if active {
                settings::COLOR_MARKER_SELECTED
            } else {
                settings::COLOR_MARKER_UNSELECTED
            };
            let padded = format!("{:<text_width$}", item.text);
            stderr.queue(Print(settings::INDENT))?;
            stderr.queue(PrintStyledContent(marker.with(marker_color)))?;
            stderr.queue(Print(" "))?;
            stderr.queue(PrintStyledContent(
                padded.as_str().with(settings::COLOR_SUGGESTION_TEXT).bold(),
            ))?;
            if !item.description.is_empty() {
                stderr.queue(Print("  "))?;
                stderr.queue(PrintStyledContent(
                    item.description
                        .as_str()
                        .with(settings::COLOR_SUGGESTION_DESCRIPTION),
                ))?;
            }
        } else {
            stderr.queue(Print(suggestion_text(item, active, text_width, false)))?;
        }
    }

    let layout = compute_input_layout(buffer, cursor, cols, settings::PROMPT);
    let dropdown_rows = suggestion_rows(window, selected, text_width, color, cols);
    let bottom_row = layout.total_rows.saturating_sub(1) + dropdown_rows;
    let lines_to_move_up = bottom_row.saturating_sub(layout.cursor_row);
    if lines_to_move_up > 0 {
        stderr.queue(MoveUp(lines_to_move_up as u16))?;
    }
    stderr.queue(MoveToColumn(layout.cursor_col as u16))?;
    stderr.flush()?;

    Ok(layout.cursor_row)
}

/// Redraw a clean final frame and move to a fresh line.
fn finalize_editor(
    stderr: &mut io::Stderr,
    color: bool,
    buffer: &str,
    previous_cursor_row: usize,
) -> io::Result<()> {
    clear_surface(stderr, previous_cursor_row)?;
    write_prompt(stderr, color)?;
    stderr.queue(Print(buffer))?;
    stderr.queue(Print("\r\n"))?;
    stderr.flush()?;
    Ok(())
}

/// Raw mode lifetime guard so terminal state is restored on any return path.
pub(crate) struct RawModeGuard;

impl RawModeGuard {
    pub(crate) fn acquire() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

//! Editable input buffer and history helpers.

use std::fs;
use std::io;
use std::path::Path;

const MAX_HISTORY: usize = 1000;

/// Persistent shell state across input reads.
#[derive(Debug, Clone, Default)]
pub struct ReplState {
    history: Vec<String>,
}

impl ReplState {
    /// Add a command to input history.
    pub fn push_history(&mut self, entry: &str) {
        let trimmed = entry.trim();
        if trimmed.is_empty() {
            return;
        }

        if self.history.last().map(|s| s.as_str()) == Some(trimmed) {
            return;
        }

        self.history.push(trimmed.to_string());
        if self.history.len() > MAX_HISTORY {
            let overflow = self.history.len() - MAX_HISTORY;
            self.history.drain(0..overflow);
        }
    }

    /// Load persisted history entries from disk.
    ///
    /// Reads a JSON array (`["cmd1", "cmd2"]`); a plain one-command-per-line
    /// file is accepted too. A missing file leaves history empty.
    pub fn load_history_file(&mut self, path: &Path) -> io::Result<()> {
        if !path.exists() {
            return Ok(());
        }

        let raw = fs::read_to_string(path)?;
        self.history.clear();

        if raw.trim().is_empty() {
            return Ok(());
        }

        if let Ok(entries) = serde_json::from_str::<Vec<String>>(&raw) {
            for entry in entries {
                self.push_history(&entry);
            }
            return Ok(());
        }

        for line in raw.lines() {
            self.push_history(line);
        }
        Ok(())
    }

    /// Persist history entries to disk as a compact JSON array.
    pub fn save_history_file(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let encoded = serde_json::to_string(&self.history).map_err(|err| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to encode history: {err}"),
            )
        })?;
        fs::write(path, format!("{encoded}\n"))
    }

    pub(crate) fn history_len(&self) -> usize {
        self.history.len()
    }

    #[cfg(test)]
    pub(crate) fn history(&self) -> &[String] {
        &self.history
    }
}

/// Move the history cursor one entry up and replace the current buffer.
pub(crate) fn history_up(
    state: &ReplState,
    history_index: &mut Option<usize>,
    history_draft: &mut String,
    buffer: &mut String,
) {
    if state.history.is_empty() {
        return;
    }

    match history_index {
        Some(idx) => {
            if *idx > 0 {
                *idx -= 1;
            }
        }
        None => {
            *history_draft = buffer.clone();
            *history_index = Some(state.history.len() - 1);
        }
    }

    if let Some(idx) = history_index {
        *buffer = state.history[*idx].clone();
    }
}

/// Move the history cursor one entry down and replace the current buffer.
pub(crate) fn history_down(
    state: &ReplState,
    history_index: &mut Option<usize>,
    history_draft: &str,
    buffer: &mut String,
) {
    let Some(idx) = history_index else {
        return;
    };

    if *idx + 1 < state.history.len() {
        *idx += 1;
        *buffer = state.history[*idx].clone();
        return;
    }

    *history_index = None;
    *buffer = history_draft.to_string();
}

pub(crate) fn insert_char_at_cursor(buffer: &mut String, cursor: &mut usize, ch: char) {
    let byte_idx = byte_index_at_char(buffer, *cursor);
    buffer.insert(byte_idx, ch);
    *cursor += 1;
}

pub(crate) fn delete_char_before_cursor(buffer: &mut String, cursor: &mut usize) {
    let start = byte_index_at_char(buffer, *cursor - 1);
    let end = byte_index_at_char(buffer, *cursor);
    buffer.replace_range(start..end, "");
    *cursor -= 1;
}

pub(crate) fn delete_char_at_cursor(buffer: &mut String, cursor: usize) {
    let start = byte_index_at_char(buffer, cursor);
    let end = byte_index_at_char(buffer, cursor + 1);
    buffer.replace_range(start..end, "");
}

/// Delete a char range represented in char indices.
pub(crate) fn delete_char_range(buffer: &mut String, start_char: usize, end_char: usize) {
    if start_char >= end_char {
        return;
    }
    let start = byte_index_at_char(buffer, start_char);
    let end = byte_index_at_char(buffer, end_char);
    buffer.replace_range(start..end, "");
}

/// Replace the text between byte offset `from` and the cursor with
/// `replacement`, leaving the cursor after it.
pub(crate) fn replace_before_cursor(
    buffer: &mut String,
    cursor: &mut usize,
    from: usize,
    replacement: &str,
) {
    let end = byte_index_at_char(buffer, *cursor);
    let from = from.min(end);
    buffer.replace_range(from..end, replacement);
    *cursor = char_count(&buffer[..from]) + char_count(replacement);
}

/// Return the char index where the previous word starts.
pub(crate) fn previous_word_start(buffer: &str, cursor: usize) -> usize {
    let mut idx = cursor;
    while idx > 0 {
        let ch = char_at(buffer, idx - 1);
        if !ch.is_whitespace() {
            break;
        }
        idx -= 1;
    }
    while idx > 0 {
        let ch = char_at(buffer, idx - 1);
        if ch.is_whitespace() {
            break;
        }
        idx -= 1;
    }
    idx
}

/// Convert a char index to a byte index, preserving UTF-8 boundaries.
pub(crate) fn byte_index_at_char(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(idx, _)| idx)
        .unwrap_or(s.len())
}

/// Return the char value at index, or NUL when out of range.
pub(crate) fn char_at(s: &str, char_idx: usize) -> char {
    s.chars().nth(char_idx).unwrap_or('\0')
}

pub(crate) fn char_count(s: &str) -> usize {
    s.chars().count()
}

//! Host picker shown at startup when no `-H` is given.
//!
//! Rows are rendered once from the config as aligned columns; filtering,
//! cursor movement and toggling operate on that text. The interactive view
//! draws on stderr in raw mode; without a terminal a numbered list and an
//! index prompt are used instead.

use crossterm::cursor::{MoveToColumn, MoveUp};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Print, PrintStyledContent, Stylize};
use crossterm::terminal::{Clear, ClearType};
use crossterm::QueueableCommand;
use regex::RegexBuilder;
use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use crate::config::Config;
use crate::tui::input::{clear_surface, RawModeGuard};
use crate::tui::input_layout::{terminal_columns, terminal_rows, wrapped_rows};
use crate::tui::settings;

const HEADER: [&str; 3] = ["ServerName", "Connect Information", "Note"];

#[derive(Debug, Clone, PartialEq, Eq)]
struct HostRow {
    label: String,
    line: String,
}

/// What the caller should do after one key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickStep {
    Continue,
    Done(Vec<String>),
    Cancel,
}

/// Filterable, multi-select host list.
#[derive(Debug, Clone)]
pub struct HostPicker {
    header: String,
    rows: Vec<HostRow>,
    selected: Vec<String>,
    keyword: String,
    cursor: usize,
    all_mode: bool,
}

fn strip_newlines(field: &str) -> String {
    field.replace(['\r', '\n'], "")
}

impl HostPicker {
    pub fn from_config(config: &Config) -> Self {
        let fields: Vec<[String; 3]> = config
            .server
            .iter()
            .map(|(label, server)| {
                [
                    strip_newlines(label),
                    strip_newlines(&server.destination()),
                    strip_newlines(server.note.as_deref().unwrap_or_default()),
                ]
            })
            .collect();
        let mut widths = HEADER.map(str::len);
        for row in &fields {
            for (width, field) in widths.iter_mut().zip(row) {
                *width = (*width).max(field.chars().count());
            }
        }
        let render = |cols: [&str; 3]| {
            format!(
                "{:<w0$} | {:<w1$} | {}",
                cols[0],
                cols[1],
                cols[2],
                w0 = widths[0],
                w1 = widths[1]
            )
            .trim_end()
            .to_string()
        };
        let rows = config
            .server
            .keys()
            .zip(&fields)
            .map(|(label, cols)| HostRow {
                label: label.clone(),
                line: render([cols[0].as_str(), cols[1].as_str(), cols[2].as_str()]),
            })
            .collect();
        Self {
            header: render(HEADER),
            rows,
            selected: Vec::new(),
            keyword: String::new(),
            cursor: 0,
            all_mode: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    /// Rows matching the keyword as a case-insensitive literal substring.
    fn visible(&self) -> Vec<&HostRow> {
        if self.keyword.is_empty() {
            return self.rows.iter().collect();
        }
        let Ok(matcher) = RegexBuilder::new(&regex::escape(&self.keyword))
            .case_insensitive(true)
            .build()
        else {
            return Vec::new();
        };
        self.rows.iter().filter(|row| matcher.is_match(&row.line)).collect()
    }

    /// Header first, then the visible rows.
    pub fn visible_lines(&self) -> Vec<&str> {
        std::iter::once(self.header.as_str())
            .chain(self.visible().into_iter().map(|row| row.line.as_str()))
            .collect()
    }

    pub fn set_keyword(&mut self, keyword: &str) {
        self.keyword = keyword.to_string();
        self.clamp_cursor();
    }

    fn clamp_cursor(&mut self) {
        let len = self.visible().len();
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }

    pub fn toggle(&mut self, label: &str) {
        match self.selected.iter().position(|s| s == label) {
            Some(idx) => {
                self.selected.remove(idx);
            }
            None => self.selected.push(label.to_string()),
        }
    }

    /// Toggle every visible row; outside "all" mode only unselected rows are
    /// added.
    pub fn toggle_all(&mut self, all_mode: bool) {
        let labels: Vec<String> = self.visible().iter().map(|r| r.label.clone()).collect();
        for label in labels {
            if all_mode || !self.selected.contains(&label) {
                self.toggle(&label);
            }
        }
    }

    fn cursor_label(&self) -> Option<String> {
        self.visible().get(self.cursor).map(|row| row.label.clone())
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> PickStep {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => PickStep::Cancel,
            KeyCode::Char('c') if ctrl => PickStep::Cancel,
            KeyCode::Char('a') if ctrl => {
                self.toggle_all(self.all_mode);
                self.all_mode = !self.all_mode;
                PickStep::Continue
            }
            KeyCode::Enter => {
                if !self.selected.is_empty() {
                    return PickStep::Done(self.selected.clone());
                }
                match self.cursor_label() {
                    Some(label) => PickStep::Done(vec![label]),
                    None => PickStep::Continue,
                }
            }
            KeyCode::Tab => {
                if let Some(label) = self.cursor_label() {
                    self.toggle(&label);
                }
                self.move_cursor(1);
                PickStep::Continue
            }
            KeyCode::Up => {
                self.move_cursor(-1);
                PickStep::Continue
            }
            KeyCode::Down => {
                self.move_cursor(1);
                PickStep::Continue
            }
            KeyCode::Backspace => {
                let mut keyword = self.keyword.clone();
                keyword.pop();
                self.set_keyword(&keyword);
                PickStep::Continue
            }
            KeyCode::Char(ch) if !ctrl => {
                let keyword = format!("{}{ch}", self.keyword);
                self.set_keyword(&keyword);
                PickStep::Continue
            }
            _ => PickStep::Continue,
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.visible().len();
        if len == 0 {
            return;
        }
        self.cursor = (self.cursor as isize + delta).rem_euclid(len as isize) as usize;
    }
}

/// Ask the user which hosts to connect to. `None` means cancelled.
pub fn choose_hosts(config: &Config, color: bool) -> io::Result<Option<Vec<String>>> {
    let mut picker = HostPicker::from_config(config);
    if picker.is_empty() {
        return Ok(None);
    }
    if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
        return choose_fallback(&picker);
    }
    choose_interactive(&mut picker, color)
}

fn choose_fallback(picker: &HostPicker) -> io::Result<Option<Vec<String>>> {
    eprintln!("• select hosts");
    eprintln!("     {}", picker.header());
    for (idx, row) in picker.rows.iter().enumerate() {
        eprintln!("  {:>2}. {}", idx + 1, row.line);
    }
    eprint!("  hosts (comma-separated numbers, empty to cancel): ");
    io::stderr().flush()?;

    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        eprintln!();
        return Ok(None);
    }
    let picks = parse_picks(&line, picker.rows.len());
    if picks.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        picks.into_iter().map(|idx| picker.rows[idx].label.clone()).collect(),
    ))
}

/// Zero-based indexes from a comma-separated list of 1-based numbers.
/// Out-of-range and malformed entries are dropped; duplicates keep the first.
fn parse_picks(input: &str, count: usize) -> Vec<usize> {
    let mut picks = Vec::new();
    for part in input.split(',') {
        let Ok(n) = part.trim().parse::<usize>() else {
            continue;
        };
        if n == 0 || n > count || picks.contains(&(n - 1)) {
            continue;
        }
        picks.push(n - 1);
    }
    picks
}

fn choose_interactive(picker: &mut HostPicker, color: bool) -> io::Result<Option<Vec<String>>> {
    let _guard = RawModeGuard::acquire()?;
    let mut stderr = io::stderr();
    let mut previous_rows = 0usize;
    let mut dirty = true;

    loop {
        if dirty {
            previous_rows = render(&mut stderr, picker, color, previous_rows)?;
            dirty = false;
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
        dirty = true;
        match picker.handle_key(key) {
            PickStep::Continue => {}
            PickStep::Done(labels) => {
                clear_surface(&mut stderr, previous_rows)?;
                return Ok(Some(labels));
            }
            PickStep::Cancel => {
                clear_surface(&mut stderr, previous_rows)?;
                return Ok(None);
            }
        }
    }
}

/// Draw the picker and return the index of the last row drawn.
fn render(
    stderr: &mut io::Stderr,
    picker: &HostPicker,
    color: bool,
    previous_rows: usize,
) -> io::Result<usize> {
    if previous_rows > 0 {
        stderr.queue(MoveUp(previous_rows as u16))?;
    }
    stderr.queue(MoveToColumn(0))?;
    stderr.queue(Clear(ClearType::FromCursorDown))?;

    let cols = terminal_columns();
    let prompt = format!("{}{}", settings::PICKER_PROMPT, picker.keyword);
    let help = format!("{}{}", settings::INDENT, settings::PICKER_HELP);
    let mut total_rows = wrapped_rows(&prompt, cols) + wrapped_rows(&help, cols);
    if color {
        stderr.queue(PrintStyledContent(
            settings::PICKER_PROMPT.with(settings::COLOR_PROMPT),
        ))?;
        stderr.queue(Print(&picker.keyword))?;
        stderr.queue(Print("\r\n"))?;
        stderr.queue(PrintStyledContent(help.as_str().with(settings::COLOR_HINT)))?;
    } else {
        stderr.queue(Print(&prompt))?;
        stderr.queue(Print("\r\n"))?;
        stderr.queue(Print(&help))?;
    }

    let header = format!("{}    {}", settings::INDENT, picker.header);
    stderr.queue(Print("\r\n"))?;
    total_rows += wrapped_rows(&header, cols);
    if color {
        stderr.queue(PrintStyledContent(header.as_str().bold()))?;
    } else {
        stderr.queue(Print(&header))?;
    }

    let visible = picker.visible();
    let room = terminal_rows().saturating_sub(4).max(1);
    let first = picker.cursor.saturating_sub(room.saturating_sub(1));
    for (idx, row) in visible.iter().enumerate().skip(first).take(room) {
        let active = idx == picker.cursor;
        let chosen = picker.selected.contains(&row.label);
        let marker = settings::suggestion_marker(active, color);
        let check = if chosen { "[x]" } else { "[ ]" };
        let line = format!("{}{marker} {check} {}", settings::INDENT, row.line);
        stderr.queue(Print("\r\n"))?;
        total_rows += wrapped_rows(&line, cols);
        if color && (active || chosen) {
            let tint = if chosen {
                settings::COLOR_SELECTED
            } else {
                settings::COLOR_CANDIDATE
            };
            stderr.queue(PrintStyledContent(line.as_str().with(tint)))?;
        } else {
            stderr.queue(Print(&line))?;
        }
    }

    stderr.flush()?;
    Ok(total_rows.saturating_sub(1))
}

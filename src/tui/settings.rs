//! Centralized, hardcoded UI settings for the terminal interface.
//!
//! This is the single place to tweak prompt strings, glyphs and colors.

use crossterm::style::Color;

// ---------------------------------------------------------------------------
// Layout / prompts
// ---------------------------------------------------------------------------

pub const INDENT: &str = "  ";

pub const PROMPT: &str = "msftp>> ";

pub const PICKER_PROMPT: &str = "msftp hosts> ";
pub const PICKER_HELP: &str =
    "type to filter, Up/Down move, Tab toggle, Ctrl-A toggle all, Enter connect, Esc cancel";

pub const REPL_EVENT_POLL_MS: u64 = 80;

// ---------------------------------------------------------------------------
// Suggestions
// ---------------------------------------------------------------------------

/// Rows of the completion dropdown drawn under the prompt.
pub const MAX_SUGGESTIONS: usize = 8;

pub const SELECTED_MARKER_COLOR: &str = "▶";
pub const UNSELECTED_MARKER_COLOR: &str = "·";
pub const SELECTED_MARKER_PLAIN: &str = ">";
pub const UNSELECTED_MARKER_PLAIN: &str = "-";

// ---------------------------------------------------------------------------
// Colors
// ---------------------------------------------------------------------------

pub const COLOR_PROMPT: Color = Color::Green;
pub const COLOR_HINT: Color = Color::DarkGrey;
pub const COLOR_SELECTED: Color = Color::Yellow;
pub const COLOR_CANDIDATE: Color = Color::White;
pub const COLOR_MARKER_SELECTED: Color = Color::DarkYellow;
pub const COLOR_MARKER_UNSELECTED: Color = Color::DarkGrey;
pub const COLOR_SUGGESTION_TEXT: Color = Color::Yellow;
pub const COLOR_SUGGESTION_DESCRIPTION: Color = Color::DarkGrey;

pub fn suggestion_marker(is_selected: bool, color: bool) -> &'static str {
    match (is_selected, color) {
        (true, true) => SELECTED_MARKER_COLOR,
        (false, true) => UNSELECTED_MARKER_COLOR,
        (true, false) => SELECTED_MARKER_PLAIN,
        (false, false) => UNSELECTED_MARKER_PLAIN,
    }
}

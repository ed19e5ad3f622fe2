//! Shell-style command-line splitting.

use crate::error::ShellError;

/// Split a command line into words.
///
/// Single and double quotes group words; a backslash escapes the next
/// character outside single quotes. `\:` is kept escaped so target operands
/// can still tell a literal colon from a host separator.
pub fn split_words(input: &str) -> Result<Vec<String>, ShellError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut started = false;
    let mut chars = input.chars();
    let mut in_single = false;
    let mut in_double = false;

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if !in_single => {
                if let Some(next) = chars.next() {
                    if next == ':' {
                        current.push('\\');
                    }
                    current.push(next);
                    started = true;
                }
            }
            '\'' if !in_double => {
                in_single = !in_single;
                started = true;
            }
            '"' if !in_single => {
                in_double = !in_double;
                started = true;
            }
            c if c.is_whitespace() && !in_single && !in_double => {
                if started {
                    words.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            _ => {
                current.push(ch);
                started = true;
            }
        }
    }

    if in_single || in_double {
        return Err(ShellError::Usage("unclosed quote".into()));
    }
    if started {
        words.push(current);
    }
    Ok(words)
}

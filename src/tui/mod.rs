//! Terminal user-interface building blocks.
//!
//! The line editor owns key handling and drawing; history and buffer edits
//! live in `input_buffer`, row/column math in `input_layout`.

pub mod input;
mod input_buffer;
pub(crate) mod input_layout;
pub mod settings;

pub use input::{read_line, ReadOutcome};
pub use input_buffer::ReplState;

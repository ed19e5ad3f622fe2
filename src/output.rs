//! Per-host output multiplexing.
//!
//! Every session owns a [`HostOutput`] bound to the configured tag template.
//! Commands write through a [`HostWriter`], which buffers until a full line is
//! available and then emits it to the shared sink in a single locked write,
//! prefixed with the host tag when the invocation spans several hosts.

use crossterm::style::{Color, Stylize};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

use crate::config::SERVER_PLACEHOLDER;

/// Destination shared by all host writers; one lock per emitted line.
pub type SharedSink = Arc<Mutex<Box<dyn Write + Send>>>;

pub fn stdout_sink() -> SharedSink {
    Arc::new(Mutex::new(Box::new(io::stdout())))
}

pub fn stderr_sink() -> SharedSink {
    Arc::new(Mutex::new(Box::new(io::stderr())))
}

const TAG_COLORS: [Color; 6] = [
    Color::Cyan,
    Color::Green,
    Color::Yellow,
    Color::Magenta,
    Color::Blue,
    Color::Red,
];

/// Render the tag template for one host.
pub fn render_tag(template: &str, label: &str) -> String {
    template.replace(SERVER_PLACEHOLDER, label)
}

fn tag_color(label: &str) -> Color {
    let idx = label.bytes().fold(0usize, |acc, b| acc.wrapping_add(b as usize));
    TAG_COLORS[idx % TAG_COLORS.len()]
}

/// Output binding owned by one session.
#[derive(Clone)]
pub struct HostOutput {
    tag: String,
    tag_width: usize,
    sink: SharedSink,
}

impl HostOutput {
    pub fn new(label: &str, template: &str, color: bool, sink: SharedSink) -> Self {
        let plain = render_tag(template, label);
        let tag_width = plain.chars().count();
        let tag = if color {
            plain.with(tag_color(label)).to_string()
        } else {
            plain
        };
        Self {
            tag,
            tag_width,
            sink,
        }
    }

    /// Rendered tag, including color escapes when enabled.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Display width of the tag without escapes.
    pub fn tag_width(&self) -> usize {
        self.tag_width
    }

    pub fn sink(&self) -> SharedSink {
        Arc::clone(&self.sink)
    }

    /// Writer for one invocation; `multi_host` decides whether lines are tagged.
    pub fn writer(&self, multi_host: bool) -> HostWriter {
        HostWriter {
            prefix: multi_host.then(|| self.tag.clone()),
            sink: Arc::clone(&self.sink),
            pending: Vec::new(),
        }
    }
}

impl std::fmt::Debug for HostOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostOutput").field("tag", &self.tag).finish()
    }
}

/// Line-buffered, optionally tagged writer for one host.
pub struct HostWriter {
    prefix: Option<String>,
    sink: SharedSink,
    pending: Vec<u8>,
}

impl HostWriter {
    /// Write one line, ignoring sink errors.
    pub fn line(&mut self, text: &str) {
        let _ = self.write_all(text.as_bytes());
        let _ = self.write_all(b"\n");
    }

    fn emit(&self, line: &[u8]) -> io::Result<()> {
        let mut sink = self.sink.lock();
        if let Some(prefix) = &self.prefix {
            sink.write_all(prefix.as_bytes())?;
        }
        sink.write_all(line)?;
        sink.flush()
    }
}

impl Write for HostWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.emit(&line)?;
        }
        Ok(buf.len())
    }

    /// Emit any partial line, terminated so the next tag starts cleanly.
    fn flush(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut line = std::mem::take(&mut self.pending);
        line.push(b'\n');
        self.emit(&line)
    }
}

impl Drop for HostWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

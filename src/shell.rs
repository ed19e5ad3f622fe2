//! The interactive read-execute loop.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::commands::{execute_line, CommandOutcome, ShellContext};
use crate::complete::Completer;
use crate::keepalive;
use crate::output::SharedSink;
use crate::session::close_all;
use crate::tui::{read_line, ReadOutcome, ReplState};

pub const NO_VALID_CONNECTIONS: &str = "Error: No valid connections";

pub struct Shell {
    ctx: ShellContext,
    completer: Completer,
    state: ReplState,
    color: bool,
    history_path: Option<PathBuf>,
}

impl Shell {
    pub fn new(ctx: ShellContext, color: bool, history_path: Option<PathBuf>) -> Self {
        let completer = Completer::new(Arc::clone(ctx.registry()));
        let mut state = ReplState::default();
        if let Some(path) = &history_path {
            if let Err(err) = state.load_history_file(path) {
                tracing::warn!(path = %path.display(), error = %err, "could not load history");
            }
        }
        Self {
            ctx,
            completer,
            state,
            color,
            history_path,
        }
    }

    /// Run one input line. `Some(code)` ends the session.
    pub async fn handle_line(&mut self, line: &str) -> Option<i32> {
        self.state.push_history(line);
        let result = execute_line(&self.ctx, line).await;
        self.completer.invalidate();
        match result {
            Ok(CommandOutcome::Exit) => Some(0),
            Ok(CommandOutcome::Continue) => None,
            Err(err) => {
                self.ctx.err_line(&format!("Error: {err}"));
                None
            }
        }
    }

    fn read(&mut self) -> io::Result<ReadOutcome> {
        let handle = tokio::runtime::Handle::current();
        let registry = Arc::clone(self.ctx.registry());
        let cwd = self.ctx.local().cwd;
        let completer = &self.completer;
        let state = &mut self.state;
        let color = self.color;
        tokio::task::block_in_place(|| {
            read_line(
                color,
                state,
                |before| handle.block_on(completer.complete(before, &cwd)),
                || registry.is_empty(),
            )
        })
    }

    /// Loop until exit, EOF or an empty pool, then tear everything down.
    /// Returns the process exit code.
    pub async fn run(mut self, keepalive_interval: Duration, diag: SharedSink) -> i32 {
        let registry = Arc::clone(self.ctx.registry());
        let sweeper = keepalive::spawn(Arc::clone(&registry), keepalive_interval, diag);

        let code = loop {
            if registry.is_empty() {
                self.ctx.err_line(NO_VALID_CONNECTIONS);
                break 1;
            }
            match self.read() {
                Ok(ReadOutcome::Line(line)) => {
                    if let Some(code) = self.handle_line(&line).await {
                        break code;
                    }
                }
                Ok(ReadOutcome::Cancelled | ReadOutcome::Interrupted) => {}
                Ok(ReadOutcome::Eof) => break 0,
                Err(err) => {
                    tracing::error!(error = %err, "terminal input failed");
                    self.ctx.err_line(&format!("Error: {err}"));
                    break 1;
                }
            }
        };

        sweeper.abort();
        if let Some(path) = &self.history_path {
            if let Err(err) = self.state.save_history_file(path) {
                tracing::warn!(path = %path.display(), error = %err, "could not save history");
            }
        }
        close_all(&registry).await;
        code
    }
}

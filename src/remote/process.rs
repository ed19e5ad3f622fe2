//! Process helpers shared by the ssh backend.

use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::RemoteError;

/// Captured result of one child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExecOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl ExecOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Run one remote command through an established control socket.
pub(crate) async fn run_ssh_raw_process(
    destination: &str,
    control_path: &Path,
    remote_command: &str,
    stdin: Option<&[u8]>,
) -> Result<ExecOutput, RemoteError> {
    run_process(
        "ssh",
        &[
            "-T".into(),
            "-S".into(),
            control_path.display().to_string(),
            "-o".into(),
            "ControlMaster=no".into(),
            destination.into(),
            remote_command.into(),
        ],
        stdin,
    )
    .await
}

/// Spawn and wait for a process, optionally piping stdin.
pub(crate) async fn run_process(
    program: &str,
    args: &[String],
    stdin: Option<&[u8]>,
) -> Result<ExecOutput, RemoteError> {
    let mut cmd = Command::new(program);
    // Dropping the owning future must not leave ssh children behind.
    cmd.kill_on_drop(true);
    cmd.args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| RemoteError::Connect(format!("{program}: {e}")))?;

    if let Some(input) = stdin {
        if let Some(mut child_stdin) = child.stdin.take() {
            child_stdin.write_all(input).await?;
            child_stdin.shutdown().await?;
        }
    }

    let output = child.wait_with_output().await?;

    Ok(ExecOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: output.stdout,
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Convert non-zero command status into a contextual remote error.
///
/// A stderr mentioning a missing path maps to [`RemoteError::NotFound`]
/// so callers can tell absent paths apart from other failures.
pub(crate) fn ensure_success(output: ExecOutput, context: &str) -> Result<ExecOutput, RemoteError> {
    if output.exit_code == 0 {
        return Ok(output);
    }

    let stderr = output.stderr.trim();
    if stderr.contains("No such file or directory") {
        return Err(RemoteError::NotFound(context.to_string()));
    }
    let mut details = if stderr.is_empty() {
        output.stdout_text().trim().to_string()
    } else {
        last_line(stderr).to_string()
    };
    if details.is_empty() {
        details = format!("command exited with {}", output.exit_code);
    }

    Err(RemoteError::Protocol(format!("{context}: {details}")))
}

fn last_line(text: &str) -> &str {
    text.lines().last().unwrap_or(text).trim()
}

/// Shell-safe single-quote escaping.
pub(crate) fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        "''".into()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}

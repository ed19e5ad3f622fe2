//! OpenSSH backend and control-socket lifecycle helpers.
//!
//! Each host gets one persistent master connection (`ssh -MNf`). Every
//! filesystem primitive then runs as a short remote command multiplexed over
//! that socket, so calls to one host never renegotiate authentication.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::process::{ensure_success, run_process, run_ssh_raw_process, shell_quote, ExecOutput};
use super::{Connector, DirEntry, FileStat, RemoteFs};
use crate::config::{Config, ServerConfig, SftpConfig};
use crate::error::RemoteError;

/// `stat --format` producing `mode(hex) size mtime uid gid`.
const STAT_FORMAT: &str = "%f %s %Y %u %g";

/// Connection parameters for one configured host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub label: String,
    pub destination: String,
    pub port: Option<u16>,
    pub key: Option<String>,
    pub options: Vec<String>,
    pub connect_timeout_secs: u64,
    /// Seconds between in-band keepalives sent by the master. One missed
    /// reply ends the master, which then fails the control-socket check.
    pub server_alive_secs: u64,
}

impl SshTarget {
    pub fn from_config(label: &str, server: &ServerConfig, sftp: &SftpConfig) -> Self {
        Self {
            label: label.to_string(),
            destination: server.destination(),
            port: server.port,
            key: server.key.clone(),
            options: server.ssh_options.clone(),
            connect_timeout_secs: sftp.connect_timeout_secs,
            server_alive_secs: sftp.keepalive_interval_secs,
        }
    }

    /// Arguments that start a backgrounded master on `control_path`.
    ///
    /// User-supplied options come first since ssh keeps the first value it
    /// sees for each option.
    pub(crate) fn master_args(&self, control_path: &Path) -> Vec<String> {
        let mut args = vec!["-MNf".to_string()];
        for option in &self.options {
            args.push("-o".into());
            args.push(option.clone());
        }
        args.extend([
            "-o".into(),
            "BatchMode=yes".into(),
            "-o".into(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
            "-o".into(),
            format!("ServerAliveInterval={}", self.server_alive_secs.max(1)),
            "-o".into(),
            "ServerAliveCountMax=1".into(),
            "-o".into(),
            "ControlMaster=yes".into(),
            "-o".into(),
            "ControlPersist=yes".into(),
            "-o".into(),
            format!("ControlPath={}", control_path.display()),
        ]);
        if let Some(port) = self.port {
            args.push("-p".into());
            args.push(port.to_string());
        }
        if let Some(key) = &self.key {
            args.push("-i".into());
            args.push(key.clone());
        }
        args.push(self.destination.clone());
        args
    }
}

/// Connects configured hosts by label.
pub struct SshConnector {
    config: Config,
}

impl SshConnector {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, label: &str) -> Result<Arc<dyn RemoteFs>, RemoteError> {
        let server = self
            .config
            .server
            .get(label)
            .ok_or_else(|| RemoteError::Connect(format!("no server named {label} in config")))?;
        let target = SshTarget::from_config(label, server, &self.config.sftp);
        let fs = SshFs::open(target).await?;
        Ok(Arc::new(fs))
    }
}

/// A live host reached through an ssh control socket.
#[derive(Debug)]
pub struct SshFs {
    target: SshTarget,
    control_path: PathBuf,
    closed: AtomicBool,
}

impl SshFs {
    /// Start the master connection and verify the remote toolset.
    pub async fn open(target: SshTarget) -> Result<Self, RemoteError> {
        if target.destination.trim().is_empty() {
            return Err(RemoteError::Connect("ssh destination cannot be empty".into()));
        }
        let control_path = build_ssh_control_path(&target.destination);
        tracing::debug!(host = %target.label, path = %control_path.display(), "opening ssh master");
        let open_result = run_process("ssh", &target.master_args(&control_path), None).await?;
        if open_result.exit_code != 0 {
            let _ = std::fs::remove_file(&control_path);
            return Err(RemoteError::Connect(
                first_non_empty(&open_result.stderr)
                    .unwrap_or("failed to open persistent ssh connection")
                    .to_string(),
            ));
        }

        let fs = Self {
            target,
            control_path,
            closed: AtomicBool::new(false),
        };
        let probe = fs
            .run("command -v stat >/dev/null && command -v find >/dev/null", None)
            .await?;
        if probe.exit_code != 0 {
            fs.close().await;
            return Err(RemoteError::Connect(
                "remote host lacks `stat` or `find`".into(),
            ));
        }
        Ok(fs)
    }

    async fn run(&self, command: &str, stdin: Option<&[u8]>) -> Result<ExecOutput, RemoteError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RemoteError::Connect(format!(
                "connection to {} is closed",
                self.target.label
            )));
        }
        tracing::trace!(host = %self.target.label, command, "remote call");
        run_ssh_raw_process(&self.target.destination, &self.control_path, command, stdin).await
    }

    async fn run_checked(
        &self,
        command: &str,
        stdin: Option<&[u8]>,
        context: &str,
    ) -> Result<ExecOutput, RemoteError> {
        ensure_success(self.run(command, stdin).await?, context)
    }

    async fn stat_with(&self, path: &str, follow: bool) -> Result<FileStat, RemoteError> {
        let flag = if follow { "-L " } else { "" };
        let command = format!("stat {flag}-c '{STAT_FORMAT}' -- {}", shell_quote(path));
        let out = self.run_checked(&command, None, path).await?;
        parse_stat_line(out.stdout_text().trim())
            .map(|(stat, _)| stat)
            .ok_or_else(|| RemoteError::Protocol(format!("{path}: unexpected stat output")))
    }
}

#[async_trait]
impl RemoteFs for SshFs {
    async fn home_dir(&self) -> Result<String, RemoteError> {
        let out = self.run_checked("pwd", None, "pwd").await?;
        Ok(out.stdout_text().trim().to_string())
    }

    async fn stat(&self, path: &str) -> Result<FileStat, RemoteError> {
        self.stat_with(path, true).await
    }

    async fn lstat(&self, path: &str) -> Result<FileStat, RemoteError> {
        self.stat_with(path, false).await
    }

    async fn read_link(&self, path: &str) -> Result<String, RemoteError> {
        let command = format!("readlink -- {}", shell_quote(path));
        let out = self.run_checked(&command, None, path).await?;
        Ok(out.stdout_text().trim_end_matches('\n').to_string())
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, RemoteError> {
        let q = shell_quote(path);
        let command = format!(
            "test -e {q} || {{ echo 'No such file or directory' >&2; exit 2; }}; \
             test -d {q} || {{ echo 'not a directory' >&2; exit 2; }}; \
             find -H {q} -mindepth 1 -maxdepth 1 -exec stat -c '{STAT_FORMAT} %n' {{}} +"
        );
        let out = self.run_checked(&command, None, path).await?;
        Ok(parse_dir_listing(&out.stdout_text()))
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        let command = format!("cat -- {}", shell_quote(path));
        Ok(self.run_checked(&command, None, path).await?.stdout)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), RemoteError> {
        let command = format!("cat > {}", shell_quote(path));
        self.run_checked(&command, Some(data), path).await?;
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), RemoteError> {
        let command = format!("mv -- {} {}", shell_quote(from), shell_quote(to));
        self.run_checked(&command, None, from).await?;
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<(), RemoteError> {
        let command = format!("rm -- {}", shell_quote(path));
        self.run_checked(&command, None, path).await?;
        Ok(())
    }

    async fn remove_dir(&self, path: &str) -> Result<(), RemoteError> {
        let command = format!("rmdir -- {}", shell_quote(path));
        self.run_checked(&command, None, path).await?;
        Ok(())
    }

    async fn mkdir(&self, path: &str, parents: bool) -> Result<(), RemoteError> {
        let flag = if parents { "-p " } else { "" };
        let command = format!("mkdir {flag}-- {}", shell_quote(path));
        self.run_checked(&command, None, path).await?;
        Ok(())
    }

    async fn symlink(&self, target: &str, link: &str) -> Result<(), RemoteError> {
        let command = format!("ln -s -- {} {}", shell_quote(target), shell_quote(link));
        self.run_checked(&command, None, link).await?;
        Ok(())
    }

    async fn hard_link(&self, target: &str, link: &str) -> Result<(), RemoteError> {
        let command = format!("ln -- {} {}", shell_quote(target), shell_quote(link));
        self.run_checked(&command, None, target).await?;
        Ok(())
    }

    async fn chmod(&self, path: &str, mode: u32) -> Result<(), RemoteError> {
        let command = format!("chmod {:o} -- {}", mode & 0o7777, shell_quote(path));
        self.run_checked(&command, None, path).await?;
        Ok(())
    }

    async fn chown(&self, path: &str, owner: &str) -> Result<(), RemoteError> {
        let command = format!("chown {} -- {}", shell_quote(owner), shell_quote(path));
        self.run_checked(&command, None, path).await?;
        Ok(())
    }

    async fn chgrp(&self, path: &str, group: &str) -> Result<(), RemoteError> {
        let command = format!("chgrp {} -- {}", shell_quote(group), shell_quote(path));
        self.run_checked(&command, None, path).await?;
        Ok(())
    }

    async fn disk_usage(
        &self,
        path: &str,
        human: bool,
        inodes: bool,
    ) -> Result<String, RemoteError> {
        let mut command = String::from("df -P");
        if human {
            command.push_str(" -h");
        }
        if inodes {
            command.push_str(" -i");
        }
        command.push_str(" -- ");
        command.push_str(&shell_quote(path));
        Ok(self.run_checked(&command, None, path).await?.stdout_text())
    }

    async fn check_alive(&self) -> Result<(), RemoteError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RemoteError::Connect("connection closed".into()));
        }
        let out = run_process(
            "ssh",
            &[
                "-S".into(),
                self.control_path.display().to_string(),
                "-O".into(),
                "check".into(),
                self.target.destination.clone(),
            ],
            None,
        )
        .await?;
        if out.exit_code == 0 {
            Ok(())
        } else {
            Err(RemoteError::Connect(
                first_non_empty(&out.stderr)
                    .unwrap_or("control master is gone")
                    .to_string(),
            ))
        }
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let destination = self.target.destination.clone();
        let control_path = self.control_path.clone();
        let _ = tokio::task::spawn_blocking(move || {
            close_ssh_control_connection(&destination, &control_path)
        })
        .await;
    }
}

impl Drop for SshFs {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            close_ssh_control_connection(&self.target.destination, &self.control_path);
        }
    }
}

#[cfg(test)]
type SshCloseHook = Box<dyn Fn(&str, &Path) + Send + Sync + 'static>;

#[cfg(test)]
fn ssh_close_hook_slot() -> &'static parking_lot::Mutex<Option<SshCloseHook>> {
    static SLOT: std::sync::OnceLock<parking_lot::Mutex<Option<SshCloseHook>>> =
        std::sync::OnceLock::new();
    SLOT.get_or_init(|| parking_lot::Mutex::new(None))
}

#[cfg(test)]
fn set_ssh_close_hook_for_tests(hook: Option<SshCloseHook>) {
    *ssh_close_hook_slot().lock() = hook;
}

fn close_ssh_control_connection(destination: &str, control_path: &Path) {
    #[cfg(test)]
    {
        if let Some(hook) = ssh_close_hook_slot().lock().as_ref() {
            hook(destination, control_path);
            return;
        }
    }

    let _ = std::process::Command::new("ssh")
        .arg("-S")
        .arg(control_path)
        .arg("-O")
        .arg("exit")
        .arg(destination)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    let _ = std::fs::remove_file(control_path);
}

fn build_ssh_control_path(destination: &str) -> PathBuf {
    let mut hasher = DefaultHasher::new();
    destination.hash(&mut hasher);
    std::process::id().hash(&mut hasher);
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    let hash = hasher.finish();
    std::env::temp_dir().join(format!("msftp-{hash:x}.sock"))
}

fn first_non_empty(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|line| !line.is_empty())
}

/// Parse one `STAT_FORMAT` line, optionally followed by ` %n`.
fn parse_stat_line(line: &str) -> Option<(FileStat, Option<&str>)> {
    let mut fields = line.splitn(6, ' ');
    let mode = u32::from_str_radix(fields.next()?, 16).ok()?;
    let size = fields.next()?.parse().ok()?;
    let mtime = fields.next()?.parse().ok()?;
    let uid = fields.next()?.parse().ok()?;
    let gid = fields.next()?.parse().ok()?;
    let name = fields.next();
    Some((
        FileStat {
            mode,
            size,
            mtime,
            uid,
            gid,
        },
        name,
    ))
}

fn parse_dir_listing(text: &str) -> Vec<DirEntry> {
    text.lines()
        .filter_map(|line| {
            let (stat, full) = parse_stat_line(line)?;
            let name = full?.rsplit('/').next()?.to_string();
            Some(DirEntry { name, stat })
        })
        .collect()
}

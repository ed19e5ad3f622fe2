//! Configuration data model.
//!
//! Struct/enum definitions plus default values. Loading and validation live in
//! `config::loader` so precedence behavior stays in one place.

use serde::Deserialize;
use std::collections::BTreeMap;

use super::defaults::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_KEEPALIVE_INTERVAL_SECS, DEFAULT_LOCAL_UMASK,
    DEFAULT_OUTPUT_PROMPT,
};

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Known hosts keyed by the label used in target specs.
    pub server: BTreeMap<String, ServerConfig>,
    pub sftp: SftpConfig,
    pub display: DisplayConfig,
}

/// One `[server.<label>]` entry.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Hostname or address handed to ssh.
    pub addr: String,
    pub user: Option<String>,
    pub port: Option<u16>,
    /// Identity file passed as `ssh -i`.
    pub key: Option<String>,
    /// Free-text note shown by the host picker.
    pub note: Option<String>,
    /// Extra `-o` options appended to every ssh invocation for this host.
    pub ssh_options: Vec<String>,
}

impl ServerConfig {
    /// `user@addr` destination string, or just `addr` when no user is set.
    pub fn destination(&self) -> String {
        match self.user.as_deref().map(str::trim) {
            Some(user) if !user.is_empty() => format!("{user}@{}", self.addr),
            _ => self.addr.clone(),
        }
    }
}

/// Shell-level settings stored under `[sftp]`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SftpConfig {
    /// Output tag template; `${SERVER}` is replaced with the host label.
    pub prompt: String,
    pub keepalive_interval_secs: u64,
    /// Three octal digits applied to locally created files and directories.
    pub local_umask: String,
    pub connect_timeout_secs: u64,
}

impl Default for SftpConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_OUTPUT_PROMPT.to_string(),
            keepalive_interval_secs: DEFAULT_KEEPALIVE_INTERVAL_SECS,
            local_umask: DEFAULT_LOCAL_UMASK.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DisplayConfig {
    pub color: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { color: true }
    }
}

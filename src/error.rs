//! Unified error types for the shell.

use std::fmt;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors when loading or parsing configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

// ---------------------------------------------------------------------------
// RemoteError
// ---------------------------------------------------------------------------

/// Errors from one call against a remote host's filesystem.
#[derive(Debug)]
pub enum RemoteError {
    /// Dial, authentication or control-socket setup failed.
    Connect(String),
    /// The remote side ran but reported a failure for this call.
    Protocol(String),
    /// The requested path does not exist.
    NotFound(String),
    /// Local process or stream error while talking to the host.
    Io(std::io::Error),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(msg) => write!(f, "connect: {msg}"),
            Self::Protocol(msg) => write!(f, "{msg}"),
            Self::NotFound(path) => write!(f, "{path}: no such file or directory"),
            Self::Io(e) => write!(f, "io: {e}"),
        }
    }
}

impl std::error::Error for RemoteError {}

impl From<std::io::Error> for RemoteError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// ShellError
// ---------------------------------------------------------------------------

/// Command-line level errors raised before any fan-out starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellError {
    /// Bad flags or operand count.
    Usage(String),
    /// A host named in a target spec is not in the live pool.
    UnknownHost(String),
    /// Resolution left nothing to act on.
    NoTargets,
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage(msg) => write!(f, "{msg}"),
            Self::UnknownHost(host) => write!(f, "host {host} not found"),
            Self::NoTargets => write!(f, "no target host"),
        }
    }
}

impl std::error::Error for ShellError {}

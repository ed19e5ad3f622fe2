//! Remote filesystem access.
//!
//! [`RemoteFs`] is the per-host seam every command goes through. The
//! production implementation in [`ssh`] drives OpenSSH over a persistent
//! control socket; tests substitute an in-memory filesystem.

mod glob;
pub mod path;
pub(crate) mod process;
pub mod ssh;
mod types;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::RemoteError;

pub use glob::{glob, has_meta};
pub use types::{DirEntry, FileKind, FileStat};

/// Filesystem primitives available on one connected host.
///
/// Paths are remote POSIX paths. Relative paths resolve against the
/// remote login directory, not against any shell-level working directory.
#[async_trait]
pub trait RemoteFs: Send + Sync {
    /// Absolute path of the remote login directory.
    async fn home_dir(&self) -> Result<String, RemoteError>;

    /// Attributes of `path`, following symlinks.
    async fn stat(&self, path: &str) -> Result<FileStat, RemoteError>;

    /// Attributes of `path` itself.
    async fn lstat(&self, path: &str) -> Result<FileStat, RemoteError>;

    async fn read_link(&self, path: &str) -> Result<String, RemoteError>;

    /// Entries of a directory, excluding `.` and `..`, in no particular order.
    async fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, RemoteError>;

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, RemoteError>;

    /// Create or truncate `path` with `data`.
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), RemoteError>;

    async fn rename(&self, from: &str, to: &str) -> Result<(), RemoteError>;

    async fn remove_file(&self, path: &str) -> Result<(), RemoteError>;

    /// Remove an empty directory.
    async fn remove_dir(&self, path: &str) -> Result<(), RemoteError>;

    async fn mkdir(&self, path: &str, parents: bool) -> Result<(), RemoteError>;

    async fn symlink(&self, target: &str, link: &str) -> Result<(), RemoteError>;

    async fn hard_link(&self, target: &str, link: &str) -> Result<(), RemoteError>;

    async fn chmod(&self, path: &str, mode: u32) -> Result<(), RemoteError>;

    async fn chown(&self, path: &str, owner: &str) -> Result<(), RemoteError>;

    async fn chgrp(&self, path: &str, group: &str) -> Result<(), RemoteError>;

    /// `df`-style report for the filesystem holding `path`.
    async fn disk_usage(&self, path: &str, human: bool, inodes: bool)
        -> Result<String, RemoteError>;

    /// Cheap liveness probe used by keepalive.
    async fn check_alive(&self) -> Result<(), RemoteError>;

    /// Tear down the connection. Further calls fail.
    async fn close(&self);
}

/// Opens connections by host label.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, label: &str) -> Result<Arc<dyn RemoteFs>, RemoteError>;
}

//! msftp: an interactive sftp-style shell that drives many hosts at once.
//!
//! Each pooled host keeps its own remote working directory. A command line
//! is resolved into per-host targets (`[host,...:]path`), fanned out to all
//! of them concurrently, and their output is multiplexed back with a
//! per-host tag.
//!
//! The building blocks, bottom up: [`remote`] (per-host filesystem access),
//! [`session`] (the shared session registry), [`target`] and [`dispatch`]
//! (target resolution and fan-out), [`commands`] (the built-ins),
//! [`complete`] (completion), and [`shell`] (the interactive loop).

pub mod commands;
pub mod complete;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod keepalive;
pub mod logging;
pub mod output;
pub mod picker;
pub mod remote;
pub mod session;
pub mod shell;
pub mod target;
#[cfg(test)]
pub mod testsupport;
pub mod tui;

//! Remote mutations: directories, removal, renames, links, ownership and
//! permission changes, plus `df`.

use clap::Parser;
use std::io::Write;

use super::{parse_flags, CommandOutcome, CommandResult, ShellContext};
use crate::dispatch::{expand_operand, fan_out, HostReport};
use crate::error::{RemoteError, ShellError};
use crate::session::Session;
use crate::target::TargetSet;

/// Per-path action applied to every glob match.
#[derive(Debug, Clone)]
enum PathOp {
    RemoveFile,
    RemoveDir,
    Chmod(u32),
    Chown(String),
    Chgrp(String),
}

impl PathOp {
    async fn apply(&self, session: &Session, path: &str) -> Result<(), RemoteError> {
        let fs = session.fs();
        match self {
            Self::RemoveFile => fs.remove_file(path).await,
            Self::RemoveDir => fs.remove_dir(path).await,
            Self::Chmod(mode) => fs.chmod(path, *mode).await,
            Self::Chown(owner) => fs.chown(path, owner).await,
            Self::Chgrp(group) => fs.chgrp(path, group).await,
        }
    }
}

/// Expand every operand per host and apply `op` to each match.
async fn apply_to_matches(ctx: &ShellContext, operands: &[String], op: PathOp) {
    let targets = ctx.resolve(operands);
    fan_out(targets, move |target, mut out| {
        let op = op.clone();
        async move {
            let mut report = HostReport::<()>::new();
            for raw in &target.paths {
                let expanded = expand_operand(&target.session, raw).await;
                let Some(matches) = report.record(&mut out, expanded) else {
                    continue;
                };
                for path in matches {
                    let result = op.apply(&target.session, &path).await;
                    report.record(&mut out, result);
                }
            }
            report
        }
    })
    .await;
}

fn require_operands(operands: &[String], usage: &str) -> Result<(), ShellError> {
    if operands.is_empty() {
        return Err(ShellError::Usage(format!("usage: {usage}")));
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(disable_help_flag = true)]
struct MkdirArgs {
    #[arg(short = 'p')]
    parents: bool,
    targets: Vec<String>,
}

pub(super) async fn run_mkdir(ctx: &ShellContext, args: Vec<String>) -> CommandResult {
    let parsed: MkdirArgs = parse_flags(&args)?;
    require_operands(&parsed.targets, "mkdir [-p] [host,...:]path...")?;
    let parents = parsed.parents;
    let targets = ctx.resolve(&parsed.targets);
    fan_out(targets, move |target, mut out| async move {
        let mut report = HostReport::<()>::new();
        for raw in &target.paths {
            let result = match target.session.resolve_path(raw).await {
                Ok(path) => target.session.fs().mkdir(&path, parents).await,
                Err(err) => Err(err),
            };
            report.record(&mut out, result);
        }
        report
    })
    .await;
    Ok(CommandOutcome::Continue)
}

#[derive(Parser, Debug)]
#[command(disable_help_flag = true)]
struct PathArgs {
    targets: Vec<String>,
}

pub(super) async fn run_rmdir(ctx: &ShellContext, args: Vec<String>) -> CommandResult {
    let parsed: PathArgs = parse_flags(&args)?;
    require_operands(&parsed.targets, "rmdir [host,...:]path...")?;
    apply_to_matches(ctx, &parsed.targets, PathOp::RemoveDir).await;
    Ok(CommandOutcome::Continue)
}

pub(super) async fn run_rm(ctx: &ShellContext, args: Vec<String>) -> CommandResult {
    let parsed: PathArgs = parse_flags(&args)?;
    require_operands(&parsed.targets, "rm [host,...:]path...")?;
    apply_to_matches(ctx, &parsed.targets, PathOp::RemoveFile).await;
    Ok(CommandOutcome::Continue)
}

#[derive(Parser, Debug)]
#[command(disable_help_flag = true)]
struct OwnedArgs {
    value: String,
    targets: Vec<String>,
}

pub(super) async fn run_chmod(ctx: &ShellContext, args: Vec<String>) -> CommandResult {
    let parsed: OwnedArgs = parse_flags(&args)?;
    require_operands(&parsed.targets, "chmod MODE [host,...:]path...")?;
    let mode = parse_mode(&parsed.value)?;
    apply_to_matches(ctx, &parsed.targets, PathOp::Chmod(mode)).await;
    Ok(CommandOutcome::Continue)
}

pub(super) async fn run_chown(ctx: &ShellContext, args: Vec<String>) -> CommandResult {
    let parsed: OwnedArgs = parse_flags(&args)?;
    require_operands(&parsed.targets, "chown OWNER [host,...:]path...")?;
    apply_to_matches(ctx, &parsed.targets, PathOp::Chown(parsed.value)).await;
    Ok(CommandOutcome::Continue)
}

pub(super) async fn run_chgrp(ctx: &ShellContext, args: Vec<String>) -> CommandResult {
    let parsed: OwnedArgs = parse_flags(&args)?;
    require_operands(&parsed.targets, "chgrp GROUP [host,...:]path...")?;
    apply_to_matches(ctx, &parsed.targets, PathOp::Chgrp(parsed.value)).await;
    Ok(CommandOutcome::Continue)
}

/// Octal permission bits, one to four digits.
fn parse_mode(raw: &str) -> Result<u32, ShellError> {
    let valid = (1..=4).contains(&raw.len()) && raw.chars().all(|c| ('0'..='7').contains(&c));
    if !valid {
        return Err(ShellError::Usage(format!("invalid mode: {raw}")));
    }
    u32::from_str_radix(raw, 8).map_err(|e| ShellError::Usage(format!("invalid mode {raw}: {e}")))
}

/// Which two-path operation to run on each pinned host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairOp {
    Rename,
    HardLink,
    Symlink,
}

/// Resolve `first` with its host list and apply `second` on the same hosts.
fn pinned_targets(ctx: &ShellContext, first: &str, second: &str) -> TargetSet {
    let mut set = TargetSet::new();
    let errors = set.resolve_into(&ctx.snapshot(), first);
    ctx.report(&errors);
    set.push_pinned(second);
    set
}

async fn run_pair(ctx: &ShellContext, first: &str, second: &str, op: PairOp) {
    let targets = pinned_targets(ctx, first, second);
    fan_out(targets, move |target, mut out| async move {
        let mut report = HostReport::<()>::new();
        let result = apply_pair(&target.session, &target.paths, op).await;
        report.record(&mut out, result);
        report
    })
    .await;
}

async fn apply_pair(session: &Session, paths: &[String], op: PairOp) -> Result<(), RemoteError> {
    let [from, to] = paths else {
        return Err(RemoteError::Protocol("expected two paths".into()));
    };
    let fs = session.fs();
    let to = session.resolve_path(to).await?;
    match op {
        PairOp::Rename => {
            let from = single_match(session, from).await?;
            fs.rename(&from, &to).await
        }
        PairOp::HardLink => {
            let from = single_match(session, from).await?;
            fs.hard_link(&from, &to).await
        }
        PairOp::Symlink => {
            // Link text is stored as written; only `~` is expanded.
            let from = if from == "~" || from.starts_with("~/") {
                session.resolve_path(from).await?
            } else {
                from.clone()
            };
            fs.symlink(&from, &to).await
        }
    }
}

async fn single_match(session: &Session, raw: &str) -> Result<String, RemoteError> {
    let mut matches = expand_operand(session, raw).await?;
    if matches.len() != 1 {
        return Err(RemoteError::Protocol(format!(
            "{raw}: matches {} paths",
            matches.len()
        )));
    }
    Ok(matches.remove(0))
}

#[derive(Parser, Debug)]
#[command(disable_help_flag = true)]
struct PairArgs {
    from: String,
    to: String,
}

pub(super) async fn run_rename(ctx: &ShellContext, args: Vec<String>) -> CommandResult {
    let parsed: PairArgs = parse_flags(&args)?;
    run_pair(ctx, &parsed.from, &parsed.to, PairOp::Rename).await;
    Ok(CommandOutcome::Continue)
}

#[derive(Parser, Debug)]
#[command(disable_help_flag = true)]
struct LnArgs {
    #[arg(short = 's')]
    symbolic: bool,
    target: String,
    link: String,
}

pub(super) async fn run_ln(ctx: &ShellContext, args: Vec<String>) -> CommandResult {
    let parsed: LnArgs = parse_flags(&args)?;
    let op = if parsed.symbolic {
        PairOp::Symlink
    } else {
        PairOp::HardLink
    };
    run_pair(ctx, &parsed.target, &parsed.link, op).await;
    Ok(CommandOutcome::Continue)
}

pub(super) async fn run_symlink(ctx: &ShellContext, args: Vec<String>) -> CommandResult {
    let parsed: PairArgs = parse_flags(&args)?;
    run_pair(ctx, &parsed.from, &parsed.to, PairOp::Symlink).await;
    Ok(CommandOutcome::Continue)
}

#[derive(Parser, Debug)]
#[command(disable_help_flag = true)]
struct DfArgs {
    #[arg(short = 'h')]
    human: bool,
    #[arg(short = 'i')]
    inodes: bool,
    targets: Vec<String>,
}

pub(super) async fn run_df(ctx: &ShellContext, args: Vec<String>) -> CommandResult {
    let parsed: DfArgs = parse_flags(&args)?;
    let targets = if parsed.targets.is_empty() {
        TargetSet::all_hosts(&ctx.snapshot())
    } else {
        ctx.resolve(&parsed.targets)
    };
    let (human, inodes) = (parsed.human, parsed.inodes);
    fan_out(targets, move |target, mut out| async move {
        let mut report = HostReport::<()>::new();
        let paths = if target.paths.is_empty() {
            vec![target.session.pwd().to_string()]
        } else {
            target.paths.clone()
        };
        for raw in &paths {
            let result = match target.session.resolve_path(raw).await {
                Ok(path) => target.session.fs().disk_usage(&path, human, inodes).await,
                Err(err) => Err(err),
            };
            if let Some(text) = report.record(&mut out, result) {
                let _ = out.write_all(text.as_bytes());
            }
        }
        report
    })
    .await;
    Ok(CommandOutcome::Continue)
}

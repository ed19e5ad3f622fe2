//! Local-side commands: `lcat`, `lcd`, `lls`, `lmkdir`, `lpwd`, `lumask`.

use clap::Parser;
use std::collections::BTreeMap;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use super::ls::{columns, long_rows, parse_id_names, prepare_entries, Listing, LsFlags};
use super::{parse_flags, CommandOutcome, CommandResult, ShellContext};
use crate::config::parse_umask;
use crate::dispatch::PathEntry;
use crate::error::ShellError;
use crate::remote::{has_meta, FileStat};

/// Expand `~`, the local directory and glob patterns for one local operand.
pub(crate) fn expand_local(ctx: &ShellContext, raw: &str) -> Result<Vec<PathBuf>, String> {
    let resolved = ctx.local_path(raw);
    let pattern = resolved.to_string_lossy().into_owned();
    if !has_meta(&pattern) {
        return match std::fs::symlink_metadata(&resolved) {
            Ok(_) => Ok(vec![resolved]),
            Err(_) => Err(format!("{raw} not found.")),
        };
    }
    let mut matches: Vec<PathBuf> = ::glob::glob(&pattern)
        .map_err(|e| format!("{raw}: {e}"))?
        .filter_map(Result::ok)
        .collect();
    matches.sort();
    if matches.is_empty() {
        return Err(format!("{raw} not found."));
    }
    Ok(matches)
}

fn local_stat(meta: &std::fs::Metadata) -> FileStat {
    FileStat {
        mode: meta.mode(),
        size: meta.size(),
        mtime: meta.mtime(),
        uid: meta.uid(),
        gid: meta.gid(),
    }
}

#[derive(Parser, Debug)]
#[command(disable_help_flag = true)]
struct LocalPaths {
    paths: Vec<String>,
}

pub(super) async fn run_lcat(ctx: &ShellContext, args: Vec<String>) -> CommandResult {
    let parsed: LocalPaths = parse_flags(&args)?;
    if parsed.paths.is_empty() {
        return Err(ShellError::Usage("usage: lcat path...".into()));
    }
    for raw in &parsed.paths {
        let matches = match expand_local(ctx, raw) {
            Ok(matches) => matches,
            Err(msg) => {
                ctx.err_line(&format!("Error: {msg}"));
                continue;
            }
        };
        for path in matches {
            match tokio::fs::read(&path).await {
                Ok(data) => ctx.out_bytes(&data),
                Err(e) => ctx.err_line(&format!("Error: {}: {e}", path.display())),
            }
        }
    }
    Ok(CommandOutcome::Continue)
}

#[derive(Parser, Debug)]
#[command(disable_help_flag = true)]
struct LcdArgs {
    path: Option<String>,
}

pub(super) async fn run_lcd(ctx: &ShellContext, args: Vec<String>) -> CommandResult {
    let parsed: LcdArgs = parse_flags(&args)?;
    let target = match parsed.path {
        Some(raw) => match expand_local(ctx, &raw) {
            Ok(matches) if matches.len() == 1 => matches.into_iter().next(),
            Ok(matches) => {
                ctx.err_line(&format!("Error: {raw}: matches {} paths", matches.len()));
                None
            }
            Err(msg) => {
                ctx.err_line(&format!("Error: {msg}"));
                None
            }
        },
        None => dirs::home_dir(),
    };
    let Some(target) = target else {
        return Ok(CommandOutcome::Continue);
    };
    match std::fs::canonicalize(&target) {
        Ok(dir) if dir.is_dir() => ctx.set_local_cwd(dir),
        Ok(_) => ctx.err_line(&format!("Error: {}: is not directory", target.display())),
        Err(e) => ctx.err_line(&format!("Error: {}: {e}", target.display())),
    }
    Ok(CommandOutcome::Continue)
}

pub(super) async fn run_lpwd(ctx: &ShellContext, _args: Vec<String>) -> CommandResult {
    ctx.out_line(&ctx.local().cwd.display().to_string());
    Ok(CommandOutcome::Continue)
}

#[derive(Parser, Debug)]
#[command(disable_help_flag = true)]
struct LumaskArgs {
    mode: Option<String>,
}

pub(super) async fn run_lumask(ctx: &ShellContext, args: Vec<String>) -> CommandResult {
    let parsed: LumaskArgs = parse_flags(&args)?;
    match parsed.mode {
        Some(raw) => {
            let umask = parse_umask(&raw).map_err(|e| ShellError::Usage(e.to_string()))?;
            ctx.set_umask(umask);
        }
        None => ctx.out_line(&format!("{:03o}", ctx.local().umask)),
    }
    Ok(CommandOutcome::Continue)
}

#[derive(Parser, Debug)]
#[command(disable_help_flag = true)]
struct LmkdirArgs {
    #[arg(short = 'p')]
    parents: bool,
    paths: Vec<String>,
}

pub(super) async fn run_lmkdir(ctx: &ShellContext, args: Vec<String>) -> CommandResult {
    let parsed: LmkdirArgs = parse_flags(&args)?;
    if parsed.paths.is_empty() {
        return Err(ShellError::Usage("usage: lmkdir [-p] path...".into()));
    }
    let mode = 0o777 & !ctx.local().umask;
    for raw in &parsed.paths {
        let path = ctx.local_path(raw);
        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(parsed.parents).mode(mode);
        if let Err(e) = builder.create(&path).await {
            ctx.err_line(&format!("Error: {raw}: {e}"));
        }
    }
    Ok(CommandOutcome::Continue)
}

pub(super) async fn run_lls(ctx: &ShellContext, args: Vec<String>) -> CommandResult {
    let flags: LsFlags = parse_flags(&args)?;
    let operands = if flags.targets.is_empty() {
        vec![ctx.local().cwd.display().to_string()]
    } else {
        flags.targets.clone()
    };

    let mut entries = Vec::new();
    for raw in &operands {
        match expand_local(ctx, raw) {
            Ok(matches) => {
                for path in matches {
                    if let Err(e) = collect_local(&path, &mut entries) {
                        ctx.err_line(&format!("Error: {}: {e}", path.display()));
                    }
                }
            }
            Err(msg) => ctx.err_line(&format!("Error: {msg}")),
        }
    }

    let mut listing = Listing {
        entries: prepare_entries(entries, &flags),
        ..Listing::default()
    };
    if flags.long {
        if !flags.numeric {
            if let Ok(text) = std::fs::read_to_string("/etc/passwd") {
                listing.users = parse_id_names(&text);
            }
            if let Ok(text) = std::fs::read_to_string("/etc/group") {
                listing.groups = parse_id_names(&text);
            }
        }
        let listings = BTreeMap::from([(String::new(), listing)]);
        for rows in long_rows(&listings, &flags).into_values() {
            for row in rows {
                ctx.out_line(&row);
            }
        }
    } else if flags.one {
        for entry in &listing.entries {
            ctx.out_line(&entry.path());
        }
    } else {
        let names: Vec<String> = listing.entries.iter().map(|e| e.name.clone()).collect();
        for line in columns(&names, ctx.term_width()) {
            ctx.out_line(&line);
        }
    }
    Ok(CommandOutcome::Continue)
}

/// Local counterpart of remote path expansion: directories yield their
/// entries (or themselves when empty), anything else yields itself.
fn collect_local(path: &Path, entries: &mut Vec<PathEntry>) -> std::io::Result<()> {
    let meta = std::fs::metadata(path)?;
    let own_entry = |stat: FileStat| PathEntry {
        dir: path
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "/".into()),
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".into()),
        stat,
    };
    if !meta.is_dir() {
        entries.push(own_entry(local_stat(&meta)));
        return Ok(());
    }
    let dir = path.display().to_string();
    let before = entries.len();
    for child in std::fs::read_dir(path)? {
        let child = child?;
        let stat = local_stat(&child.metadata()?);
        entries.push(PathEntry {
            dir: dir.clone(),
            name: child.file_name().to_string_lossy().into_owned(),
            stat,
        });
    }
    if entries.len() == before {
        entries.push(own_entry(local_stat(&meta)));
    }
    Ok(())
}

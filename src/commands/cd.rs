//! `cd` and `pwd`: per-session remote working directory.

use clap::Parser;
use std::collections::BTreeMap;

use super::{parse_flags, CommandOutcome, CommandResult, ShellContext};
use crate::dispatch::{expand_operand, fan_out, HostReport};
use crate::error::RemoteError;
use crate::remote::path;
use crate::session::{Session, DEFAULT_PWD};

#[derive(Parser, Debug)]
#[command(disable_help_flag = true)]
struct CdArgs {
    target: Option<String>,
}

pub(super) async fn run_cd(ctx: &ShellContext, args: Vec<String>) -> CommandResult {
    let parsed: CdArgs = parse_flags(&args)?;
    let Some(operand) = parsed.target else {
        ctx.registry().rebuild(|current| {
            current
                .iter()
                .map(|(label, session)| (label.clone(), session.with_pwd(DEFAULT_PWD)))
                .collect()
        });
        return Ok(CommandOutcome::Continue);
    };

    let targets = ctx.resolve(&[operand]);
    let reports = fan_out(targets, |target, mut out| async move {
        let mut report = HostReport::<Option<String>>::new();
        let raw = target.paths.first().cloned().unwrap_or_default();
        let result = validate_directory(&target.session, &raw).await;
        report.value = report.record(&mut out, result);
        report
    })
    .await;

    let moved: BTreeMap<String, String> = reports
        .into_iter()
        .filter_map(|(label, report)| report.value.map(|pwd| (label, pwd)))
        .collect();
    if moved.is_empty() {
        return Ok(CommandOutcome::Continue);
    }
    ctx.registry().rebuild(|current| {
        current
            .iter()
            .map(|(label, session)| {
                let next = match moved.get(label) {
                    Some(pwd) => session.with_pwd(pwd.clone()),
                    None => session.clone(),
                };
                (label.clone(), next)
            })
            .collect()
    });
    Ok(CommandOutcome::Continue)
}

/// Expand `raw` to exactly one directory, following a symlink at it.
async fn validate_directory(session: &Session, raw: &str) -> Result<String, RemoteError> {
    let matches = expand_operand(session, raw).await?;
    let [candidate] = matches.as_slice() else {
        return Err(RemoteError::Protocol(format!(
            "{raw}: matches {} paths",
            matches.len()
        )));
    };
    let fs = session.fs();
    let dir = match fs.read_link(candidate).await {
        Ok(link) if path::is_abs(&link) => link,
        Ok(link) => path::join(&path::parent(candidate), &link),
        Err(_) => candidate.clone(),
    };
    if !fs.lstat(&dir).await?.is_dir() {
        return Err(RemoteError::Protocol(format!("{raw}: is not directory")));
    }
    Ok(dir)
}

#[derive(Parser, Debug)]
#[command(disable_help_flag = true)]
struct PwdArgs {
    hosts: Option<String>,
}

pub(super) async fn run_pwd(ctx: &ShellContext, args: Vec<String>) -> CommandResult {
    let parsed: PwdArgs = parse_flags(&args)?;
    let targets = match parsed.hosts {
        Some(hosts) => ctx.resolve(&[hosts]),
        None => crate::target::TargetSet::all_hosts(&ctx.snapshot()),
    };
    let multi_host = targets.len() > 1;
    for (_, target) in targets.iter() {
        let mut w = target.session.output().writer(multi_host);
        w.line(target.session.pwd());
    }
    Ok(CommandOutcome::Continue)
}

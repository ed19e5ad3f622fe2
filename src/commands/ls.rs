//! `ls`: remote listing with cross-host aggregate formatting.
//!
//! Filtering and sorting run per host inside the fan-out; column widths are
//! computed only after every host has reported, so the size column lines up
//! across the whole invocation.

use clap::Parser;
use std::collections::{BTreeMap, HashMap};

use super::{parse_flags, CommandOutcome, CommandResult, ShellContext};
use crate::dispatch::{expand_paths, fan_out, HostReport, PathEntry};
use crate::output::HostOutput;
use crate::target::TargetSet;

#[derive(Parser, Debug, Default, Clone)]
#[command(disable_help_flag = true)]
pub(crate) struct LsFlags {
    /// One entry per line.
    #[arg(short = '1')]
    pub one: bool,
    #[arg(short = 'a')]
    pub all: bool,
    /// Keep the order the server returned.
    #[arg(short = 'f')]
    pub no_sort: bool,
    #[arg(short = 'h')]
    pub human: bool,
    #[arg(short = 'l')]
    pub long: bool,
    #[arg(short = 'n')]
    pub numeric: bool,
    #[arg(short = 'r')]
    pub reverse: bool,
    #[arg(short = 'S')]
    pub by_size: bool,
    #[arg(short = 't')]
    pub by_time: bool,
    pub targets: Vec<String>,
}

/// One host's (or the local side's) listing, ready for formatting.
#[derive(Debug, Clone, Default)]
pub(crate) struct Listing {
    pub entries: Vec<PathEntry>,
    pub users: HashMap<u32, String>,
    pub groups: HashMap<u32, String>,
}

pub(super) async fn run(ctx: &ShellContext, args: Vec<String>) -> CommandResult {
    let flags: LsFlags = parse_flags(&args)?;
    let targets = if flags.targets.is_empty() {
        TargetSet::all_hosts(&ctx.snapshot())
    } else {
        ctx.resolve(&flags.targets)
    };
    if targets.is_empty() {
        return Ok(CommandOutcome::Continue);
    }
    let multi_host = targets.len() > 1;
    let outputs: BTreeMap<String, HostOutput> = targets
        .iter()
        .map(|(label, t)| (label.clone(), t.session.output().clone()))
        .collect();

    let task_flags = flags.clone();
    let reports = fan_out(targets, move |target, mut out| {
        let flags = task_flags.clone();
        async move {
            let mut report = HostReport::<Listing>::new();
            let session = target.session;
            let paths = if target.paths.is_empty() {
                vec![session.pwd().to_string()]
            } else {
                target.paths
            };
            let entries = expand_paths(&session, &paths, &mut out, &mut report).await;
            report.value.entries = prepare_entries(entries, &flags);
            if flags.long && !flags.numeric {
                let fs = session.fs();
                if let Ok(passwd) = fs.read_file("/etc/passwd").await {
                    report.value.users = parse_id_names(&String::from_utf8_lossy(&passwd));
                }
                if let Ok(group) = fs.read_file("/etc/group").await {
                    report.value.groups = parse_id_names(&String::from_utf8_lossy(&group));
                }
            }
            report
        }
    })
    .await;

    let listings: BTreeMap<String, Listing> = reports
        .into_iter()
        .map(|(label, report)| (label, report.value))
        .collect();

    if flags.long {
        let rendered = long_rows(&listings, &flags);
        for (label, rows) in rendered {
            let Some(output) = outputs.get(&label) else {
                continue;
            };
            let mut w = output.writer(multi_host);
            for row in rows {
                w.line(&row);
            }
        }
        return Ok(CommandOutcome::Continue);
    }

    for (label, listing) in &listings {
        let Some(output) = outputs.get(label) else {
            continue;
        };
        let mut w = output.writer(multi_host);
        let lines = if flags.one {
            listing.entries.iter().map(PathEntry::path).collect()
        } else {
            let tag_width = if multi_host { output.tag_width() } else { 0 };
            let names: Vec<String> = listing.entries.iter().map(|e| e.name.clone()).collect();
            columns(&names, ctx.term_width().saturating_sub(tag_width))
        };
        for line in lines {
            w.line(&line);
        }
    }
    Ok(CommandOutcome::Continue)
}

/// Drop hidden entries unless `-a`, then apply the selected sort.
pub(crate) fn prepare_entries(mut entries: Vec<PathEntry>, flags: &LsFlags) -> Vec<PathEntry> {
    if !flags.all {
        entries.retain(|e| !e.name.starts_with('.'));
    }
    if flags.no_sort {
        return entries;
    }
    if flags.by_size {
        entries.sort_by(|a, b| b.stat.size.cmp(&a.stat.size).then_with(|| a.name.cmp(&b.name)));
    } else if flags.by_time {
        entries.sort_by(|a, b| {
            b.stat
                .mtime
                .cmp(&a.stat.mtime)
                .then_with(|| a.name.cmp(&b.name))
        });
    } else {
        entries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.dir.cmp(&b.dir)));
    }
    if flags.reverse {
        entries.reverse();
    }
    entries
}

/// Map numeric ids to names from `/etc/passwd` or `/etc/group` text.
pub(crate) fn parse_id_names(text: &str) -> HashMap<u32, String> {
    text.lines()
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split(':');
            let name = fields.next()?;
            let _password = fields.next()?;
            let id = fields.next()?.parse().ok()?;
            Some((id, name.to_string()))
        })
        .collect()
}

pub(crate) fn format_size(size: u64, human: bool) -> String {
    if human {
        human_bytes::human_bytes(size as f64)
    } else {
        size.to_string()
    }
}

/// Render long-format rows per listing with widths shared by all listings.
pub(crate) fn long_rows(
    listings: &BTreeMap<String, Listing>,
    flags: &LsFlags,
) -> BTreeMap<String, Vec<String>> {
    struct Row {
        mode: String,
        user: String,
        group: String,
        size: String,
        time: String,
        path: String,
    }

    let lookup = |names: &HashMap<u32, String>, id: u32| {
        if flags.numeric {
            id.to_string()
        } else {
            names.get(&id).cloned().unwrap_or_else(|| id.to_string())
        }
    };

    let rows: BTreeMap<&String, Vec<Row>> = listings
        .iter()
        .map(|(label, listing)| {
            let rows = listing
                .entries
                .iter()
                .map(|e| Row {
                    mode: e.stat.mode_string(),
                    user: lookup(&listing.users, e.stat.uid),
                    group: lookup(&listing.groups, e.stat.gid),
                    size: format_size(e.stat.size, flags.human),
                    time: format_mtime(e.stat.mtime),
                    path: e.path(),
                })
                .collect();
            (label, rows)
        })
        .collect();

    let all = || rows.values().flatten();
    let user_w = all().map(|r| r.user.len()).max().unwrap_or(0);
    let group_w = all().map(|r| r.group.len()).max().unwrap_or(0);
    let size_w = all().map(|r| r.size.len()).max().unwrap_or(0);

    rows.iter()
        .map(|(label, rows)| {
            let lines = rows
                .iter()
                .map(|r| {
                    format!(
                        "{} {:<user_w$} {:<group_w$} {:>size_w$} {} {}",
                        r.mode, r.user, r.group, r.size, r.time, r.path
                    )
                })
                .collect();
            ((*label).clone(), lines)
        })
        .collect()
}

/// Lay out names in column-major order within `width` display columns.
pub(crate) fn columns(names: &[String], width: usize) -> Vec<String> {
    if names.is_empty() {
        return Vec::new();
    }
    let cell = names.iter().map(|n| n.chars().count()).max().unwrap_or(0) + 2;
    let cols = (width / cell).max(1);
    let rows = names.len().div_ceil(cols);
    (0..rows)
        .map(|row| {
            let mut line = String::new();
            for col in 0..cols {
                let Some(name) = names.get(col * rows + row) else {
                    break;
                };
                line.push_str(&format!("{name:<cell$}"));
            }
            line.trim_end().to_string()
        })
        .collect()
}

/// `YYYY MM-DD HH:MM:SS` in UTC.
pub(crate) fn format_mtime(unix_seconds: i64) -> String {
    let days = unix_seconds.div_euclid(86_400);
    let seconds_of_day = unix_seconds.rem_euclid(86_400);
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04} {month:02}-{day:02} {:02}:{:02}:{:02}",
        seconds_of_day / 3600,
        (seconds_of_day % 3600) / 60,
        seconds_of_day % 60
    )
}

fn civil_from_days(days_since_epoch: i64) -> (i32, u32, u32) {
    // Howard Hinnant's civil-from-days algorithm.
    let z = days_since_epoch + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = mp + if mp < 10 { 3 } else { -9 };
    let year = y + if month <= 2 { 1 } else { 0 };
    (year as i32, month as u32, day as u32)
}

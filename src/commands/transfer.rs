//! `get` and `put`: file transfer between the local side and every target.

use clap::Parser;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::local::expand_local;
use super::{parse_flags, CommandOutcome, CommandResult, ShellContext};
use crate::dispatch::{expand_operand, fan_out, HostReport};
use crate::error::{RemoteError, ShellError};
use crate::remote::path;
use crate::session::Session;

#[derive(Parser, Debug)]
#[command(disable_help_flag = true)]
struct TransferArgs {
    operands: Vec<String>,
}

/// Split operands into sources and the trailing destination.
fn split_destination(args: &[String], usage: &str) -> Result<(Vec<String>, String), ShellError> {
    let parsed: TransferArgs = parse_flags(args)?;
    match parsed.operands.split_last() {
        Some((dest, sources)) if !sources.is_empty() => Ok((sources.to_vec(), dest.clone())),
        _ => Err(ShellError::Usage(format!("usage: {usage}"))),
    }
}

pub(super) async fn run_get(ctx: &ShellContext, args: Vec<String>) -> CommandResult {
    let (sources, dest) = split_destination(&args, "get [host,...:]remote... localdir")?;
    let local_dir = ctx.local_path(&dest);
    if !local_dir.is_dir() {
        ctx.err_line(&format!("Error: {dest} is not a directory"));
        return Ok(CommandOutcome::Continue);
    }
    let umask = ctx.local().umask;
    let targets = ctx.resolve(&sources);
    let per_host_dirs = targets.len() > 1;
    let local_dir = Arc::new(local_dir);

    fan_out(targets, move |target, mut out| {
        let local_dir = Arc::clone(&local_dir);
        async move {
            let mut report = HostReport::<()>::new();
            let dest = if per_host_dirs {
                local_dir.join(target.session.label())
            } else {
                (*local_dir).clone()
            };
            let created = tokio::fs::create_dir_all(&dest).await.map_err(RemoteError::from);
            if report.record(&mut out, created).is_none() {
                return report;
            }
            for raw in &target.paths {
                let expanded = expand_operand(&target.session, raw).await;
                let Some(matches) = report.record(&mut out, expanded) else {
                    continue;
                };
                for remote in matches {
                    let local = dest.join(path::base_name(&remote));
                    out.line(&format!("Fetching {remote} to {}", local.display()));
                    let result = download(&target.session, &remote, &local, umask).await;
                    report.record(&mut out, result);
                }
            }
            report
        }
    })
    .await;
    Ok(CommandOutcome::Continue)
}

/// Copy one regular file, applying `umask` to its remote permission bits.
async fn download(
    session: &Session,
    remote: &str,
    local: &Path,
    umask: u32,
) -> Result<(), RemoteError> {
    let fs = session.fs();
    let stat = fs.stat(remote).await?;
    if !stat.is_file() {
        return Err(RemoteError::Protocol(format!("{remote}: not a regular file")));
    }
    let data = fs.read_file(remote).await?;
    tokio::fs::write(local, &data).await?;
    let mode = stat.perm() & 0o777 & !umask;
    tokio::fs::set_permissions(local, std::fs::Permissions::from_mode(mode)).await?;
    Ok(())
}

/// A local file read once and uploaded to every host.
#[derive(Debug)]
struct Upload {
    source: PathBuf,
    name: String,
    data: Vec<u8>,
}

pub(super) async fn run_put(ctx: &ShellContext, args: Vec<String>) -> CommandResult {
    let (sources, dest) = split_destination(&args, "put local... [host,...:]remotedir")?;
    let mut uploads = Vec::new();
    for raw in &sources {
        let paths = match expand_local(ctx, raw) {
            Ok(paths) => paths,
            Err(msg) => {
                ctx.err_line(&format!("Error: {msg}"));
                continue;
            }
        };
        for source in paths {
            match read_upload(&source).await {
                Ok(upload) => uploads.push(upload),
                Err(msg) => ctx.err_line(&format!("Error: {msg}")),
            }
        }
    }
    if uploads.is_empty() {
        return Ok(CommandOutcome::Continue);
    }

    let uploads = Arc::new(uploads);
    let targets = ctx.resolve(&[dest]);
    fan_out(targets, move |target, mut out| {
        let uploads = Arc::clone(&uploads);
        async move {
            let mut report = HostReport::<()>::new();
            let raw_dir = target.paths.first().cloned().unwrap_or_default();
            let dir = remote_directory(&target.session, &raw_dir).await;
            let Some(dir) = report.record(&mut out, dir) else {
                return report;
            };
            for upload in uploads.iter() {
                let remote = path::join(&dir, &upload.name);
                out.line(&format!("Uploading {} to {remote}", upload.source.display()));
                let result = target.session.fs().write_file(&remote, &upload.data).await;
                report.record(&mut out, result);
            }
            report
        }
    })
    .await;
    Ok(CommandOutcome::Continue)
}

async fn read_upload(source: &Path) -> Result<Upload, String> {
    let meta = tokio::fs::metadata(source)
        .await
        .map_err(|e| format!("{}: {e}", source.display()))?;
    if !meta.is_file() {
        return Err(format!("{}: not a regular file", source.display()));
    }
    let data = tokio::fs::read(source)
        .await
        .map_err(|e| format!("{}: {e}", source.display()))?;
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Upload {
        source: source.to_path_buf(),
        name,
        data,
    })
}

async fn remote_directory(session: &Session, raw: &str) -> Result<String, RemoteError> {
    let dir = session.resolve_path(path::trim_one_trailing_separator(raw)).await?;
    if !session.fs().stat(&dir).await?.is_dir() {
        return Err(RemoteError::Protocol(format!("{raw}: is not directory")));
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::super::test_util::Harness;
    use super::*;
    use crate::remote::FileStat;
    use crate::testsupport::{MockFs, TestTempDir};

    fn hosts() -> (Arc<MockFs>, Arc<MockFs>, Harness) {
        let a = Arc::new(MockFs::new("/home/a"));
        let b = Arc::new(MockFs::new("/home/b"));
        a.add_file_with("/data/f.txt", b"from a", FileStat::regular(0o666, 0));
        b.add_file_with("/data/f.txt", b"from b", FileStat::regular(0o600, 0));
        let h = Harness::new(&[("a", Arc::clone(&a)), ("b", Arc::clone(&b))]);
        (a, b, h)
    }

    fn mode_of(p: &Path) -> u32 {
        std::fs::metadata(p).unwrap().permissions().mode() & 0o777
    }

    #[tokio::test]
    async fn get_from_several_hosts_uses_per_host_directories() {
        let (_a, _b, h) = hosts();
        let tmp = TestTempDir::new("get-multi");
        h.run(&format!("get /data/f.txt {}", tmp.path().display()))
            .await
            .unwrap();
        let a_copy = tmp.child("a/f.txt");
        let b_copy = tmp.child("b/f.txt");
        assert_eq!(std::fs::read(&a_copy).unwrap(), b"from a");
        assert_eq!(std::fs::read(&b_copy).unwrap(), b"from b");
        assert_eq!(mode_of(&a_copy), 0o644);
        assert_eq!(mode_of(&b_copy), 0o600);
    }

    #[tokio::test]
    async fn get_from_one_host_writes_directly() {
        let (_a, _b, h) = hosts();
        let tmp = TestTempDir::new("get-single");
        h.run(&format!("get a:/data/*.txt {}", tmp.path().display()))
            .await
            .unwrap();
        assert_eq!(std::fs::read(tmp.child("f.txt")).unwrap(), b"from a");
        assert!(h.out.contents().starts_with("Fetching /data/f.txt to "));
    }

    #[tokio::test]
    async fn get_skips_directories_and_needs_local_directory() {
        let (a, _b, h) = hosts();
        a.add_dir("/data/sub");
        let tmp = TestTempDir::new("get-dir");
        h.run(&format!("get a:/data/sub {}", tmp.path().display()))
            .await
            .unwrap();
        assert!(h.out.contents().contains("/data/sub: not a regular file"));

        let missing = tmp.child("missing");
        h.run(&format!("get a:/data/f.txt {}", missing.display()))
            .await
            .unwrap();
        assert!(h.err.contents().contains("is not a directory"));
        assert!(matches!(h.run("get /data/f.txt").await, Err(ShellError::Usage(_))));
    }

    #[tokio::test]
    async fn put_uploads_local_glob_to_every_host() {
        let (a, b, h) = hosts();
        a.add_dir("/up");
        b.add_dir("/up");
        let tmp = TestTempDir::new("put");
        tmp.write_text("one.txt", "1");
        tmp.write_text("two.txt", "2");
        tmp.write_text("skip.md", "x");
        h.run(&format!("put {}/*.txt /up", tmp.path().display()))
            .await
            .unwrap();
        for fs in [&a, &b] {
            assert_eq!(fs.file("/up/one.txt"), Some(b"1".to_vec()));
            assert_eq!(fs.file("/up/two.txt"), Some(b"2".to_vec()));
            assert!(!fs.exists("/up/skip.md"));
        }
    }

    #[tokio::test]
    async fn put_reports_missing_remote_directory_per_host() {
        let (a, b, h) = hosts();
        a.add_dir("/up");
        let tmp = TestTempDir::new("put-missing");
        let file = tmp.write_text("one.txt", "1");
        h.run(&format!("put {} /up/", file.display())).await.unwrap();
        assert_eq!(a.file("/up/one.txt"), Some(b"1".to_vec()));
        assert!(!b.exists("/up/one.txt"));
        assert!(h.out.contents().contains("b :: Error: "));
    }

    #[tokio::test]
    async fn put_reports_unmatched_local_operand() {
        let (_a, _b, h) = hosts();
        let tmp = TestTempDir::new("put-none");
        h.run(&format!("put {}/*.none /up", tmp.path().display()))
            .await
            .unwrap();
        assert!(h.err.contents().contains("not found."));
    }
}

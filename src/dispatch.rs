//! Per-host fan-out with a join barrier, plus remote path expansion.
//!
//! Every remote command runs through [`fan_out`]: one task per targeted
//! host, each writing to its own [`HostWriter`], all joined before the
//! caller does any cross-host aggregation.

use std::collections::BTreeMap;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use crate::error::RemoteError;
use crate::output::HostWriter;
use crate::remote::{glob, has_meta, path, FileStat};
use crate::session::Session;
use crate::target::{Target, TargetSet};

/// Outcome class of one host's task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    Success,
    PartialFailure,
    Failure,
}

/// What one host's task produced.
#[derive(Debug, Clone, Default)]
pub struct HostReport<T> {
    /// Data handed back for aggregate formatting.
    pub value: T,
    pub succeeded: usize,
    pub failed: usize,
}

impl<T> HostReport<T> {
    pub fn status(&self) -> HostStatus {
        match (self.succeeded, self.failed) {
            (_, 0) => HostStatus::Success,
            (0, _) => HostStatus::Failure,
            _ => HostStatus::PartialFailure,
        }
    }
}

impl<T: Default> HostReport<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one operation's outcome, writing its error to the host output.
    pub fn record<V>(&mut self, out: &mut HostWriter, result: Result<V, RemoteError>) -> Option<V> {
        match result {
            Ok(v) => {
                self.succeeded += 1;
                Some(v)
            }
            Err(err) => {
                self.failed += 1;
                out.line(&format!("Error: {err}"));
                None
            }
        }
    }
}

/// Run `action` once per targeted host, concurrently, and wait for all.
///
/// Writers are tagged when more than one host is targeted. A task that
/// panics is reported as [`HostStatus::Failure`] for its host; it never
/// affects other hosts. There is no deadline: a stalled host delays the
/// whole barrier.
pub async fn fan_out<T, F, Fut>(targets: TargetSet, action: F) -> BTreeMap<String, HostReport<T>>
where
    T: Default + Send + 'static,
    F: Fn(Target, HostWriter) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HostReport<T>> + Send + 'static,
{
    let multi_host = targets.len() > 1;
    tracing::debug!(hosts = targets.len(), "fan-out");
    let action = Arc::new(action);
    let mut handles = Vec::with_capacity(targets.len());
    for (label, target) in targets.into_targets() {
        let writer = target.session.output().writer(multi_host);
        let action = Arc::clone(&action);
        let handle = tokio::spawn(async move { action(target, writer).await });
        handles.push((label, handle));
    }

    let mut reports = BTreeMap::new();
    for (label, handle) in handles {
        let report = match handle.await {
            Ok(report) => report,
            Err(err) => {
                tracing::warn!(host = %label, error = %err, "host task failed");
                HostReport {
                    value: T::default(),
                    succeeded: 0,
                    failed: 1,
                }
            }
        };
        reports.insert(label, report);
    }
    reports
}

/// One listable node produced by [`expand_paths`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    /// Directory holding the node.
    pub dir: String,
    pub name: String,
    pub stat: FileStat,
}

impl PathEntry {
    pub fn path(&self) -> String {
        path::join(&self.dir, &self.name)
    }
}

/// Expand one raw operand into concrete remote paths.
///
/// Trims one trailing `/`, resolves `~` and the session directory, then
/// globs. An operand that matches nothing is an error.
pub async fn expand_operand(session: &Session, raw: &str) -> Result<Vec<String>, RemoteError> {
    let trimmed = path::trim_one_trailing_separator(raw);
    let resolved = session.resolve_path(trimmed).await?;
    let mut matches = glob(session.fs().as_ref(), &resolved).await?;
    // Names containing literal brackets do not match themselves as patterns.
    if matches.is_empty() && has_meta(&resolved) && session.fs().lstat(&resolved).await.is_ok() {
        matches.push(resolved);
    }
    if matches.is_empty() {
        return Err(RemoteError::Protocol(format!("{raw} not found.")));
    }
    Ok(matches)
}

/// Expand every operand into listable entries, in operand order.
///
/// A symlink at the expanded path is followed once. Directories yield their
/// entries, or themselves when empty; anything else yields itself. Errors
/// are written to `out` and counted in `report`; later paths still run.
pub async fn expand_paths<T: Default>(
    session: &Session,
    raw_paths: &[String],
    out: &mut HostWriter,
    report: &mut HostReport<T>,
) -> Vec<PathEntry> {
    let fs = session.fs();
    let mut entries = Vec::new();
    for raw in raw_paths {
        let Some(matches) = report.record(out, expand_operand(session, raw).await) else {
            continue;
        };
        for matched in matches {
            let target = match fs.read_link(&matched).await {
                Ok(link) if path::is_abs(&link) => link,
                Ok(link) => path::join(&path::parent(&matched), &link),
                Err(_) => matched,
            };
            let Some(stat) = report.record(out, fs.lstat(&target).await) else {
                continue;
            };
            if !stat.is_dir() {
                entries.push(PathEntry {
                    dir: path::parent(&target),
                    name: path::base_name(&target),
                    stat,
                });
                continue;
            }
            let Some(children) = report.record(out, fs.read_dir(&target).await) else {
                continue;
            };
            if children.is_empty() {
                entries.push(PathEntry {
                    dir: path::parent(&target),
                    name: path::base_name(&target),
                    stat,
                });
            }
            entries.extend(children.into_iter().map(|child| PathEntry {
                dir: target.clone(),
                name: child.name,
                stat: child.stat,
            }));
        }
    }
    entries
}

/// Stream a remote file's bytes to `out`.
pub async fn copy_to_writer(
    session: &Session,
    remote: &str,
    out: &mut HostWriter,
) -> Result<(), RemoteError> {
    let data = session.fs().read_file(remote).await?;
    out.write_all(&data)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::{capture_sink, mock_registry, CaptureBuffer, MockFs};

    fn setup() -> (Arc<MockFs>, Arc<MockFs>, TargetSet, CaptureBuffer) {
        let (sink, buffer) = capture_sink();
        let a = Arc::new(MockFs::new("/home/a"));
        let b = Arc::new(MockFs::new("/home/b"));
        let registry = mock_registry(&[("a", Arc::clone(&a)), ("b", Arc::clone(&b))], &sink);
        let (set, _) = TargetSet::resolve(&registry.snapshot(), &["/data/f.txt".to_string()]);
        (a, b, set, buffer)
    }

    #[tokio::test]
    async fn failing_host_does_not_affect_others() {
        let (_a, b, set, buffer) = setup();
        b.add_file("/data/f.txt", b"payload\n");

        let reports = fan_out(set, |target, mut out| async move {
            let mut report = HostReport::<()>::new();
            for p in &target.paths {
                let result = copy_to_writer(&target.session, p, &mut out).await;
                report.record(&mut out, result);
            }
            report
        })
        .await;

        assert_eq!(reports["a"].status(), HostStatus::Failure);
        assert_eq!(reports["b"].status(), HostStatus::Success);
        let lines = buffer.sorted_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("a :: Error: "), "got: {lines:?}");
        assert_eq!(lines[1], "b :: payload");
    }

    #[tokio::test]
    async fn panicking_task_is_reported_as_failure() {
        let (_a, _b, set, _buffer) = setup();
        let reports = fan_out(set, |target, _out| async move {
            if target.session.label() == "a" {
                panic!("boom");
            }
            HostReport::<u8> {
                value: 7,
                succeeded: 1,
                failed: 0,
            }
        })
        .await;
        assert_eq!(reports["a"].status(), HostStatus::Failure);
        assert_eq!(reports["b"].value, 7);
    }

    #[tokio::test]
    async fn single_host_output_is_untagged() {
        let (sink, buffer) = capture_sink();
        let a = Arc::new(MockFs::new("/home/a"));
        a.add_file("/x", b"hi\n");
        let registry = mock_registry(&[("a", a)], &sink);
        let (set, _) = TargetSet::resolve(&registry.snapshot(), &["/x".to_string()]);
        fan_out(set, |target, mut out| async move {
            let mut report = HostReport::<()>::new();
            let result = copy_to_writer(&target.session, "/x", &mut out).await;
            report.record(&mut out, result);
            report
        })
        .await;
        assert_eq!(buffer.contents(), "hi\n");
    }

    #[tokio::test]
    async fn expand_lists_directories_and_keeps_going_after_errors() {
        let (sink, buffer) = capture_sink();
        let fs = Arc::new(MockFs::new("/home/a"));
        fs.add_file("/srv/one", b"1");
        fs.add_file("/srv/two", b"22");
        fs.add_dir("/srv/empty");
        fs.add_file("/home/a/notes", b"n");
        let registry = mock_registry(&[("a", Arc::clone(&fs))], &sink);
        let session = registry.snapshot()["a"].clone();
        let mut out = session.output().writer(false);
        let mut report = HostReport::<()>::new();

        let raw = vec![
            "/srv/".to_string(),
            "/missing".to_string(),
            "/srv/empty".to_string(),
            "~/notes".to_string(),
        ];
        let entries = expand_paths(&session, &raw, &mut out, &mut report).await;
        drop(out);

        let paths: Vec<String> = entries.iter().map(PathEntry::path).collect();
        assert!(paths.contains(&"/srv/one".to_string()));
        assert!(paths.contains(&"/srv/two".to_string()));
        assert!(paths.contains(&"/srv/empty".to_string()));
        assert!(paths.contains(&"/home/a/notes".to_string()));
        assert_eq!(report.status(), HostStatus::PartialFailure);
        assert_eq!(buffer.contents(), "Error: /missing not found.\n");
    }

    #[tokio::test]
    async fn expand_follows_symlinked_directory() {
        let (sink, _) = capture_sink();
        let fs = Arc::new(MockFs::new("/home/a"));
        fs.add_file("/real/inside", b"x");
        fs.add_symlink("/link", "/real");
        let registry = mock_registry(&[("a", Arc::clone(&fs))], &sink);
        let session = registry.snapshot()["a"].clone();
        let mut out = session.output().writer(false);
        let mut report = HostReport::<()>::new();
        let entries = expand_paths(&session, &["/link".to_string()], &mut out, &mut report).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path(), "/real/inside");
    }

    #[tokio::test]
    async fn relative_operands_use_session_directory() {
        let (sink, _) = capture_sink();
        let fs = Arc::new(MockFs::new("/home/a"));
        fs.add_file("/var/log/syslog", b"x");
        let registry = mock_registry(&[("a", Arc::clone(&fs))], &sink);
        let session = registry.snapshot()["a"].with_pwd("/var");
        let matches = expand_operand(&session, "log/sys*").await.unwrap();
        assert_eq!(matches, vec!["/var/log/syslog"]);
    }
}

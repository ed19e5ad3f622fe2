//! Periodic liveness sweeps over the session registry.

use std::collections::BTreeSet;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::error::RemoteError;
use crate::output::SharedSink;
use crate::session::SessionRegistry;

/// Probe every session once and evict the ones that fail.
///
/// Probes run concurrently against a snapshot. Failed sessions are closed,
/// reported on `diag`, and then removed from whatever mapping is current at
/// swap time, so directory changes made during the sweep survive. Returns
/// the evicted labels.
pub async fn sweep(registry: &SessionRegistry, diag: &SharedSink) -> Vec<String> {
    let snapshot = registry.snapshot();
    let mut probes = Vec::with_capacity(snapshot.len());
    for session in snapshot.values() {
        let fs = Arc::clone(session.fs());
        let handle = tokio::spawn(async move { fs.check_alive().await });
        probes.push((session.clone(), handle));
    }

    let mut evicted = BTreeSet::new();
    for (session, handle) in probes {
        let result = match handle.await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(
                    host = %session.label(),
                    error = %err,
                    "keepalive probe task failed"
                );
                Err(RemoteError::Protocol(format!("keepalive probe failed: {err}")))
            }
        };
        if let Err(err) = result {
            tracing::warn!(host = %session.label(), error = %err, "keepalive failed, evicting");
            session.fs().close().await;
            let _ = writeln!(
                diag.lock(),
                "Exit Connect {}, Error: {err}",
                session.label()
            );
            evicted.insert(session.label().to_string());
        }
    }

    if !evicted.is_empty() {
        registry.rebuild(|current| {
            current
                .iter()
                .filter(|(label, _)| !evicted.contains(*label))
                .map(|(label, session)| (label.clone(), session.clone()))
                .collect()
        });
    }
    evicted.into_iter().collect()
}

/// Spawn the sweep loop. It ends when the pool becomes empty or the handle
/// is aborted.
pub fn spawn(
    registry: Arc<SessionRegistry>,
    interval: Duration,
    diag: SharedSink,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = sweep(&registry, &diag).await;
            tracing::debug!(
                evicted = evicted.len(),
                remaining = registry.len(),
                "keepalive sweep"
            );
            if registry.is_empty() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::{capture_sink, mock_registry, MockFs};

    #[tokio::test]
    async fn failed_probe_evicts_and_keeps_survivor_directory() {
        let (sink, _) = capture_sink();
        let (diag, diag_buf) = capture_sink();
        let a = Arc::new(MockFs::new("/home/a"));
        let b = Arc::new(MockFs::new("/home/b"));
        let registry = mock_registry(&[("a", Arc::clone(&a)), ("b", Arc::clone(&b))], &sink);
        registry.rebuild(|current| {
            let mut next = current.clone();
            let moved = next["a"].with_pwd("/srv/app");
            next.insert("a".into(), moved);
            next
        });
        b.set_alive(false);

        let evicted = sweep(&registry, &diag).await;

        assert_eq!(evicted, vec!["b"]);
        assert!(b.is_closed());
        let snap = registry.snapshot();
        assert_eq!(snap.keys().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(snap["a"].pwd(), "/srv/app");
        assert!(diag_buf.contents().starts_with("Exit Connect b, Error:"));
    }

    #[tokio::test]
    async fn panicking_probe_evicts_its_host() {
        let (sink, _) = capture_sink();
        let (diag, diag_buf) = capture_sink();
        let a = Arc::new(MockFs::new("/home/a"));
        let b = Arc::new(MockFs::new("/home/b"));
        let registry = mock_registry(&[("a", Arc::clone(&a)), ("b", Arc::clone(&b))], &sink);
        a.set_probe_panics(true);

        let evicted = sweep(&registry, &diag).await;

        assert_eq!(evicted, vec!["a"]);
        assert_eq!(registry.labels(), vec!["b"]);
        assert!(diag_buf.contents().starts_with("Exit Connect a, Error:"));
    }

    #[tokio::test]
    async fn healthy_pool_is_unchanged() {
        let (sink, _) = capture_sink();
        let registry = mock_registry(&[("a", Arc::new(MockFs::new("/home/a")))], &sink);
        let before = registry.snapshot();
        assert!(sweep(&registry, &sink).await.is_empty());
        assert!(Arc::ptr_eq(&before, &registry.snapshot()));
    }

    #[tokio::test]
    async fn loop_stops_once_pool_is_empty() {
        let (sink, _) = capture_sink();
        let a = Arc::new(MockFs::new("/home/a"));
        let registry = Arc::new(mock_registry(&[("a", Arc::clone(&a))], &sink));
        a.set_alive(false);
        let handle = spawn(Arc::clone(&registry), Duration::from_millis(10), sink);
        handle.await.expect("keepalive loop");
        assert!(registry.is_empty());
    }
}

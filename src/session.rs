//! Live host sessions and the process-wide registry that holds them.
//!
//! The registry never hands out mutable access to its map. Readers take an
//! `Arc` snapshot; writers (keepalive eviction, `cd`) rebuild a new map from
//! the current one and swap it in under the write lock.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::error::RemoteError;
use crate::output::{HostOutput, SharedSink};
use crate::remote::{path, Connector, RemoteFs};

/// Directory a fresh session starts in (the remote login directory).
pub const DEFAULT_PWD: &str = "./";

/// One connected host plus its shell-level state.
#[derive(Clone)]
pub struct Session {
    label: String,
    fs: Arc<dyn RemoteFs>,
    pwd: String,
    output: HostOutput,
}

impl Session {
    pub fn new(label: &str, fs: Arc<dyn RemoteFs>, output: HostOutput) -> Self {
        Self {
            label: label.to_string(),
            fs,
            pwd: DEFAULT_PWD.to_string(),
            output,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn fs(&self) -> &Arc<dyn RemoteFs> {
        &self.fs
    }

    pub fn pwd(&self) -> &str {
        &self.pwd
    }

    pub fn output(&self) -> &HostOutput {
        &self.output
    }

    /// Copy of this session with a different working directory.
    pub fn with_pwd(&self, pwd: impl Into<String>) -> Self {
        Self {
            pwd: pwd.into(),
            ..self.clone()
        }
    }

    /// Resolve `~` and relative paths against this session's directories.
    ///
    /// The home directory is only fetched when the path needs it.
    pub async fn resolve_path(&self, raw: &str) -> Result<String, RemoteError> {
        let home = if raw == "~" || raw.starts_with("~/") {
            self.fs.home_dir().await?
        } else {
            String::new()
        };
        Ok(path::resolve(raw, &home, &self.pwd))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("label", &self.label)
            .field("pwd", &self.pwd)
            .finish()
    }
}

pub type SessionMap = BTreeMap<String, Session>;

/// Authoritative label → session mapping, replaced wholesale on change.
#[derive(Default)]
pub struct SessionRegistry {
    live: RwLock<Arc<SessionMap>>,
}

impl SessionRegistry {
    pub fn new(map: SessionMap) -> Self {
        Self {
            live: RwLock::new(Arc::new(map)),
        }
    }

    /// Current view; unaffected by later swaps.
    pub fn snapshot(&self) -> Arc<SessionMap> {
        Arc::clone(&self.live.read())
    }

    /// Replace the live mapping.
    pub fn swap(&self, map: SessionMap) {
        *self.live.write() = Arc::new(map);
    }

    /// Build a new mapping from the current one and swap it in atomically.
    ///
    /// Holding the write lock across `f` serializes concurrent rebuilders,
    /// so neither can overwrite the other's change. `f` must not block.
    pub fn rebuild<F>(&self, f: F)
    where
        F: FnOnce(&SessionMap) -> SessionMap,
    {
        let mut live = self.live.write();
        let next = f(&live);
        *live = Arc::new(next);
    }

    pub fn is_empty(&self) -> bool {
        self.live.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.live.read().len()
    }

    pub fn labels(&self) -> Vec<String> {
        self.live.read().keys().cloned().collect()
    }
}

/// Settings applied to every session's output binding.
#[derive(Clone)]
pub struct PoolOptions {
    pub template: String,
    pub color: bool,
    pub sink: SharedSink,
}

/// Connect to every requested host concurrently.
///
/// Hosts that fail to connect are reported on `diag` and left out; the
/// remaining hosts still join the pool. An empty result is the caller's
/// fatal condition.
pub async fn build_pool(
    labels: &[String],
    connector: Arc<dyn Connector>,
    options: &PoolOptions,
    diag: &mut dyn Write,
) -> SessionRegistry {
    let mut tasks = JoinSet::new();
    for label in labels {
        let label = label.clone();
        let connector = Arc::clone(&connector);
        tasks.spawn(async move {
            tracing::debug!(host = %label, "connecting");
            let result = connector.connect(&label).await;
            (label, result)
        });
    }

    let mut map = SessionMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((label, Ok(fs))) => {
                tracing::info!(host = %label, "connected");
                let output = HostOutput::new(
                    &label,
                    &options.template,
                    options.color,
                    Arc::clone(&options.sink),
                );
                map.insert(label.clone(), Session::new(&label, fs, output));
            }
            Ok((label, Err(err))) => {
                tracing::warn!(host = %label, error = %err, "connect failed");
                let _ = writeln!(diag, "{label} connect error: {err}");
            }
            Err(err) => {
                let _ = writeln!(diag, "connect task failed: {err}");
            }
        }
    }
    SessionRegistry::new(map)
}

/// Close every pooled connection; used at process exit.
pub async fn close_all(registry: &SessionRegistry) {
    let snapshot = registry.snapshot();
    for session in snapshot.values() {
        session.fs().close().await;
    }
    registry.swap(SessionMap::new());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::{capture_sink, mock_registry, MockConnector, MockFs};

    #[tokio::test]
    async fn build_pool_skips_unreachable_hosts() {
        let h1 = Arc::new(MockFs::new("/home/a"));
        let h3 = Arc::new(MockFs::new("/home/c"));
        let connector = MockConnector::default()
            .with_host("h1", h1)
            .with_host("h3", h3);
        let (sink, _) = capture_sink();
        let options = PoolOptions {
            template: "${SERVER} :: ".into(),
            color: false,
            sink,
        };
        let mut diag = Vec::new();
        let labels = vec!["h1".to_string(), "h2".to_string(), "h3".to_string()];

        let registry = build_pool(&labels, Arc::new(connector), &options, &mut diag).await;

        assert_eq!(registry.labels(), vec!["h1", "h3"]);
        let diag = String::from_utf8(diag).unwrap();
        assert!(diag.contains("h2 connect error:"), "got: {diag}");
        assert_eq!(registry.snapshot()["h1"].pwd(), DEFAULT_PWD);
    }

    #[tokio::test]
    async fn snapshot_is_isolated_from_swap() {
        let (sink, _) = capture_sink();
        let registry = mock_registry(&[("a", Arc::new(MockFs::new("/home/a")))], &sink);
        let before = registry.snapshot();
        registry.swap(SessionMap::new());
        assert_eq!(before.len(), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn rebuild_applies_to_current_map() {
        let (sink, _) = capture_sink();
        let registry = mock_registry(
            &[
                ("a", Arc::new(MockFs::new("/home/a"))),
                ("b", Arc::new(MockFs::new("/home/b"))),
            ],
            &sink,
        );
        registry.rebuild(|current| {
            let mut next = current.clone();
            let moved = next["a"].with_pwd("/srv");
            next.insert("a".into(), moved);
            next
        });
        registry.rebuild(|current| {
            let mut next = current.clone();
            next.remove("b");
            next
        });
        let snap = registry.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap["a"].pwd(), "/srv");
    }

    #[tokio::test]
    async fn resolve_path_expands_home_lazily() {
        let (sink, _) = capture_sink();
        let fs = Arc::new(MockFs::new("/home/a"));
        let registry = mock_registry(&[("a", fs)], &sink);
        let session = registry.snapshot()["a"].with_pwd("/var");
        assert_eq!(session.resolve_path("~/x").await.unwrap(), "/home/a/x");
        assert_eq!(session.resolve_path("log").await.unwrap(), "/var/log");
        assert_eq!(session.resolve_path("/etc").await.unwrap(), "/etc");
    }

    #[tokio::test]
    async fn close_all_empties_registry() {
        let (sink, _) = capture_sink();
        let fs = Arc::new(MockFs::new("/home/a"));
        let registry = mock_registry(&[("a", Arc::clone(&fs))], &sink);
        close_all(&registry).await;
        assert!(fs.is_closed());
        assert!(registry.is_empty());
    }
}

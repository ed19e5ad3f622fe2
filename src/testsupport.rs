//! Shared test fixtures: an in-memory remote filesystem, a connector over it,
//! output capture, and temp-dir helpers.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::RemoteError;
use crate::output::{HostOutput, SharedSink};
use crate::remote::{path, Connector, DirEntry, FileStat, RemoteFs};
use crate::session::{Session, SessionRegistry};

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temporary directory fixture with best-effort cleanup.
#[derive(Debug)]
pub struct TestTempDir {
    path: PathBuf,
}

impl TestTempDir {
    /// Create a unique temporary directory with a readable prefix.
    pub fn new(prefix: &str) -> Self {
        let suffix = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let dir = std::env::temp_dir().join(format!("msftp-{prefix}-{millis}-{suffix}"));
        fs::create_dir_all(&dir).expect("failed to create temporary fixture directory");
        Self { path: dir }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn child(&self, relative: &str) -> PathBuf {
        self.path.join(relative)
    }

    /// Write UTF-8 text to a child path, creating parent directories as needed.
    pub fn write_text(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.child(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent directories for fixture");
        }
        fs::write(&path, content).expect("failed to write fixture file");
        path
    }
}

impl Drop for TestTempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

// ---------------------------------------------------------------------------
// Output capture
// ---------------------------------------------------------------------------

/// Cloneable in-memory writer.
#[derive(Clone, Default)]
pub struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

impl CaptureBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    /// Captured lines, sorted, for assertions that ignore host interleaving.
    pub fn sorted_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.contents().lines().map(str::to_string).collect();
        lines.sort();
        lines
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn capture_sink() -> (SharedSink, CaptureBuffer) {
    let buffer = CaptureBuffer::default();
    let sink: SharedSink = Arc::new(Mutex::new(Box::new(buffer.clone())));
    (sink, buffer)
}

// ---------------------------------------------------------------------------
// MockFs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Node {
    File { data: Vec<u8>, stat: FileStat },
    Dir { stat: FileStat },
    Symlink { target: String },
}

impl Node {
    fn lstat(&self) -> FileStat {
        match self {
            Node::File { data, stat } => FileStat {
                size: data.len() as u64,
                ..*stat
            },
            Node::Dir { stat } => *stat,
            Node::Symlink { target } => FileStat {
                size: target.len() as u64,
                ..FileStat::symlink()
            },
        }
    }
}

/// In-memory [`RemoteFs`] with failure injection and a liveness switch.
#[derive(Debug)]
pub struct MockFs {
    home: String,
    nodes: Mutex<BTreeMap<String, Node>>,
    failing: Mutex<BTreeSet<String>>,
    alive: AtomicBool,
    closed: AtomicBool,
    probe_panics: AtomicBool,
}

impl MockFs {
    pub fn new(home: &str) -> Self {
        let fs = Self {
            home: home.to_string(),
            nodes: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(BTreeSet::new()),
            alive: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            probe_panics: AtomicBool::new(false),
        };
        fs.nodes.lock().insert(
            "/".to_string(),
            Node::Dir {
                stat: FileStat::directory(0o755),
            },
        );
        fs.add_dir(home);
        fs
    }

    fn abs(&self, p: &str) -> String {
        if path::is_abs(p) {
            path::clean(p)
        } else {
            path::join(&self.home, p)
        }
    }

    fn ensure_parents(&self, abs: &str) {
        let parent = path::parent(abs);
        if parent != abs {
            self.add_dir(&parent);
        }
    }

    pub fn add_dir(&self, p: &str) {
        let abs = self.abs(p);
        if abs != "/" {
            self.ensure_parents(&abs);
        }
        self.nodes.lock().entry(abs).or_insert(Node::Dir {
            stat: FileStat::directory(0o755),
        });
    }

    pub fn add_file(&self, p: &str, data: &[u8]) {
        self.add_file_with(p, data, FileStat::regular(0o644, 0));
    }

    /// Add a file whose size is taken from `data` and other attributes from `stat`.
    pub fn add_file_with(&self, p: &str, data: &[u8], stat: FileStat) {
        let abs = self.abs(p);
        self.ensure_parents(&abs);
        self.nodes.lock().insert(
            abs,
            Node::File {
                data: data.to_vec(),
                stat,
            },
        );
    }

    pub fn add_symlink(&self, link: &str, target: &str) {
        let abs = self.abs(link);
        self.ensure_parents(&abs);
        self.nodes.lock().insert(
            abs,
            Node::Symlink {
                target: target.to_string(),
            },
        );
    }

    /// Every call touching `p` fails from now on.
    pub fn fail_on(&self, p: &str) {
        self.failing.lock().insert(self.abs(p));
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Make `check_alive` panic instead of answering.
    pub fn set_probe_panics(&self, panics: bool) {
        self.probe_panics.store(panics, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn exists(&self, p: &str) -> bool {
        self.nodes.lock().contains_key(&self.abs(p))
    }

    pub fn file(&self, p: &str) -> Option<Vec<u8>> {
        match self.nodes.lock().get(&self.abs(p)) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn stat_of(&self, p: &str) -> Option<FileStat> {
        self.nodes.lock().get(&self.abs(p)).map(Node::lstat)
    }

    fn check(&self, abs: &str) -> Result<(), RemoteError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RemoteError::Connect("connection closed".into()));
        }
        if self.failing.lock().contains(abs) {
            return Err(RemoteError::Protocol(format!("{abs}: permission denied")));
        }
        Ok(())
    }

    /// Follow symlinks at `abs` (final component only) up to a fixed depth.
    fn follow(&self, abs: &str) -> Result<(String, Node), RemoteError> {
        let nodes = self.nodes.lock();
        let mut current = abs.to_string();
        for _ in 0..8 {
            match nodes.get(&current) {
                Some(Node::Symlink { target }) => {
                    current = if path::is_abs(target) {
                        path::clean(target)
                    } else {
                        path::join(&path::parent(&current), target)
                    };
                }
                Some(node) => return Ok((current, node.clone())),
                None => return Err(RemoteError::NotFound(abs.to_string())),
            }
        }
        Err(RemoteError::Protocol(format!("{abs}: too many levels of symbolic links")))
    }

    fn children(&self, dir: &str) -> Vec<String> {
        let prefix = if dir == "/" {
            "/".to_string()
        } else {
            format!("{dir}/")
        };
        self.nodes
            .lock()
            .keys()
            .filter(|k| k.starts_with(&prefix) && k.len() > prefix.len())
            .filter(|k| !k[prefix.len()..].contains('/'))
            .cloned()
            .collect()
    }

    fn require_parent_dir(&self, abs: &str) -> Result<(), RemoteError> {
        match self.nodes.lock().get(&path::parent(abs)) {
            Some(Node::Dir { .. }) => Ok(()),
            Some(_) => Err(RemoteError::Protocol(format!("{abs}: not a directory"))),
            None => Err(RemoteError::NotFound(abs.to_string())),
        }
    }

    fn update_stat(&self, p: &str, f: impl FnOnce(&mut FileStat)) -> Result<(), RemoteError> {
        let abs = self.abs(p);
        self.check(&abs)?;
        let (target, _) = self.follow(&abs)?;
        let mut nodes = self.nodes.lock();
        match nodes.get_mut(&target) {
            Some(Node::File { stat, .. }) | Some(Node::Dir { stat }) => {
                f(stat);
                Ok(())
            }
            _ => Err(RemoteError::NotFound(p.to_string())),
        }
    }
}

fn parse_id(raw: &str) -> Result<u32, RemoteError> {
    raw.parse()
        .map_err(|_| RemoteError::Protocol(format!("invalid id: {raw}")))
}

#[async_trait]
impl RemoteFs for MockFs {
    async fn home_dir(&self) -> Result<String, RemoteError> {
        self.check("")?;
        Ok(self.home.clone())
    }

    async fn stat(&self, p: &str) -> Result<FileStat, RemoteError> {
        let abs = self.abs(p);
        self.check(&abs)?;
        let (_, node) = self.follow(&abs).map_err(|_| RemoteError::NotFound(p.into()))?;
        Ok(node.lstat())
    }

    async fn lstat(&self, p: &str) -> Result<FileStat, RemoteError> {
        let abs = self.abs(p);
        self.check(&abs)?;
        self.nodes
            .lock()
            .get(&abs)
            .map(Node::lstat)
            .ok_or_else(|| RemoteError::NotFound(p.to_string()))
    }

    async fn read_link(&self, p: &str) -> Result<String, RemoteError> {
        let abs = self.abs(p);
        self.check(&abs)?;
        match self.nodes.lock().get(&abs) {
            Some(Node::Symlink { target }) => Ok(target.clone()),
            Some(_) => Err(RemoteError::Protocol(format!("{p}: not a symlink"))),
            None => Err(RemoteError::NotFound(p.to_string())),
        }
    }

    async fn read_dir(&self, p: &str) -> Result<Vec<DirEntry>, RemoteError> {
        let abs = self.abs(p);
        self.check(&abs)?;
        let (dir, node) = self.follow(&abs).map_err(|_| RemoteError::NotFound(p.into()))?;
        if !matches!(node, Node::Dir { .. }) {
            return Err(RemoteError::Protocol(format!("{p}: not a directory")));
        }
        let children = self.children(&dir);
        let nodes = self.nodes.lock();
        Ok(children
            .into_iter()
            .filter_map(|child| {
                let stat = nodes.get(&child)?.lstat();
                Some(DirEntry {
                    name: path::base_name(&child),
                    stat,
                })
            })
            .collect())
    }

    async fn read_file(&self, p: &str) -> Result<Vec<u8>, RemoteError> {
        let abs = self.abs(p);
        self.check(&abs)?;
        match self.follow(&abs).map_err(|_| RemoteError::NotFound(p.into()))? {
            (_, Node::File { data, .. }) => Ok(data),
            _ => Err(RemoteError::Protocol(format!("{p}: is a directory"))),
        }
    }

    async fn write_file(&self, p: &str, data: &[u8]) -> Result<(), RemoteError> {
        let abs = self.abs(p);
        self.check(&abs)?;
        self.require_parent_dir(&abs)?;
        let mut nodes = self.nodes.lock();
        let stat = match nodes.get(&abs) {
            Some(Node::Dir { .. }) => {
                return Err(RemoteError::Protocol(format!("{p}: is a directory")))
            }
            Some(Node::File { stat, .. }) => *stat,
            _ => FileStat::regular(0o644, 0),
        };
        nodes.insert(
            abs,
            Node::File {
                data: data.to_vec(),
                stat,
            },
        );
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), RemoteError> {
        let src = self.abs(from);
        let dst = self.abs(to);
        self.check(&src)?;
        self.check(&dst)?;
        self.require_parent_dir(&dst)?;
        let mut nodes = self.nodes.lock();
        if !nodes.contains_key(&src) {
            return Err(RemoteError::NotFound(from.to_string()));
        }
        let prefix = format!("{src}/");
        let moved: Vec<String> = nodes
            .keys()
            .filter(|k| **k == src || k.starts_with(&prefix))
            .cloned()
            .collect();
        for key in moved {
            if let Some(node) = nodes.remove(&key) {
                let new_key = format!("{dst}{}", &key[src.len()..]);
                nodes.insert(new_key, node);
            }
        }
        Ok(())
    }

    async fn remove_file(&self, p: &str) -> Result<(), RemoteError> {
        let abs = self.abs(p);
        self.check(&abs)?;
        let mut nodes = self.nodes.lock();
        let is_dir = nodes.get(&abs).map(|n| matches!(n, Node::Dir { .. }));
        match is_dir {
            Some(true) => Err(RemoteError::Protocol(format!("{p}: is a directory"))),
            Some(false) => {
                nodes.remove(&abs);
                Ok(())
            }
            None => Err(RemoteError::NotFound(p.to_string())),
        }
    }

    async fn remove_dir(&self, p: &str) -> Result<(), RemoteError> {
        let abs = self.abs(p);
        self.check(&abs)?;
        if !self.children(&abs).is_empty() {
            return Err(RemoteError::Protocol(format!("{p}: directory not empty")));
        }
        let mut nodes = self.nodes.lock();
        let is_dir = nodes.get(&abs).map(|n| matches!(n, Node::Dir { .. }));
        match is_dir {
            Some(true) => {
                nodes.remove(&abs);
                Ok(())
            }
            Some(false) => Err(RemoteError::Protocol(format!("{p}: not a directory"))),
            None => Err(RemoteError::NotFound(p.to_string())),
        }
    }

    async fn mkdir(&self, p: &str, parents: bool) -> Result<(), RemoteError> {
        let abs = self.abs(p);
        self.check(&abs)?;
        let existing = self.nodes.lock().get(&abs).cloned();
        match existing {
            Some(Node::Dir { .. }) if parents => return Ok(()),
            Some(_) => return Err(RemoteError::Protocol(format!("{p}: file exists"))),
            None => {}
        }
        if parents {
            self.add_dir(&abs);
            return Ok(());
        }
        self.require_parent_dir(&abs)?;
        self.nodes.lock().insert(
            abs,
            Node::Dir {
                stat: FileStat::directory(0o755),
            },
        );
        Ok(())
    }

    async fn symlink(&self, target: &str, link: &str) -> Result<(), RemoteError> {
        let abs = self.abs(link);
        self.check(&abs)?;
        self.require_parent_dir(&abs)?;
        if self.nodes.lock().contains_key(&abs) {
            return Err(RemoteError::Protocol(format!("{link}: file exists")));
        }
        self.add_symlink(&abs, target);
        Ok(())
    }

    async fn hard_link(&self, target: &str, link: &str) -> Result<(), RemoteError> {
        let src = self.abs(target);
        let dst = self.abs(link);
        self.check(&src)?;
        self.require_parent_dir(&dst)?;
        let mut nodes = self.nodes.lock();
        match nodes.get(&src).cloned() {
            Some(node @ Node::File { .. }) => {
                if nodes.contains_key(&dst) {
                    return Err(RemoteError::Protocol(format!("{link}: file exists")));
                }
                nodes.insert(dst, node);
                Ok(())
            }
            Some(_) => Err(RemoteError::Protocol(format!("{target}: not a regular file"))),
            None => Err(RemoteError::NotFound(target.to_string())),
        }
    }

    async fn chmod(&self, p: &str, mode: u32) -> Result<(), RemoteError> {
        self.update_stat(p, |stat| stat.mode = (stat.mode & !0o7777) | (mode & 0o7777))
    }

    async fn chown(&self, p: &str, owner: &str) -> Result<(), RemoteError> {
        let uid = parse_id(owner)?;
        self.update_stat(p, |stat| stat.uid = uid)
    }

    async fn chgrp(&self, p: &str, group: &str) -> Result<(), RemoteError> {
        let gid = parse_id(group)?;
        self.update_stat(p, |stat| stat.gid = gid)
    }

    async fn disk_usage(
        &self,
        p: &str,
        _human: bool,
        inodes: bool,
    ) -> Result<String, RemoteError> {
        self.stat(p).await?;
        let header = if inodes {
            "Filesystem Inodes IUsed IFree IUse% Mounted on"
        } else {
            "Filesystem 1024-blocks Used Available Capacity Mounted on"
        };
        Ok(format!("{header}\nmockfs 100 10 90 10% /\n"))
    }

    async fn check_alive(&self) -> Result<(), RemoteError> {
        if self.probe_panics.load(Ordering::SeqCst) {
            panic!("liveness probe crashed");
        }
        if self.alive.load(Ordering::SeqCst) && !self.is_closed() {
            Ok(())
        } else {
            Err(RemoteError::Connect("control master is gone".into()))
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.alive.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Connector + pool helpers
// ---------------------------------------------------------------------------

/// Connector handing out pre-built mock hosts; unknown labels fail to dial.
#[derive(Default)]
pub struct MockConnector {
    hosts: BTreeMap<String, Arc<MockFs>>,
}

impl MockConnector {
    pub fn with_host(mut self, label: &str, fs: Arc<MockFs>) -> Self {
        self.hosts.insert(label.to_string(), fs);
        self
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, label: &str) -> Result<Arc<dyn RemoteFs>, RemoteError> {
        match self.hosts.get(label) {
            Some(fs) => Ok(Arc::clone(fs) as Arc<dyn RemoteFs>),
            None => Err(RemoteError::Connect(format!("dial {label}: connection refused"))),
        }
    }
}

/// Registry over the given mock hosts, all writing untinted tags to `sink`.
pub fn mock_registry(hosts: &[(&str, Arc<MockFs>)], sink: &SharedSink) -> SessionRegistry {
    let map = hosts
        .iter()
        .map(|(label, fs)| {
            let output = HostOutput::new(label, "${SERVER} :: ", false, Arc::clone(sink));
            let session = Session::new(label, Arc::clone(fs) as Arc<dyn RemoteFs>, output);
            (label.to_string(), session)
        })
        .collect();
    SessionRegistry::new(map)
}

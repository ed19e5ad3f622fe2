//! `[host[,host...]:]path` operand parsing and target-set construction.

use std::collections::BTreeMap;

use crate::error::ShellError;
use crate::session::{Session, SessionMap};

/// Split an operand into its host list and path.
///
/// The text before the first unescaped `:` is a host list only if it holds
/// no `/`; otherwise the whole operand is a path. An empty host list means
/// "every pooled host". `\:` in the path is unescaped to `:`.
pub fn parse_host_path(operand: &str) -> (Vec<String>, String) {
    if let Some(idx) = find_unescaped_colon(operand) {
        let (head, rest) = operand.split_at(idx);
        if !head.contains('/') && !head.is_empty() {
            let hosts = head
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_string)
                .collect();
            return (hosts, unescape_colons(&rest[1..]));
        }
    }
    (Vec::new(), unescape_colons(operand))
}

fn find_unescaped_colon(s: &str) -> Option<usize> {
    let mut escaped = false;
    for (idx, ch) in s.char_indices() {
        match ch {
            '\\' if !escaped => escaped = true,
            ':' if !escaped => return Some(idx),
            _ => escaped = false,
        }
    }
    None
}

fn unescape_colons(s: &str) -> String {
    s.replace("\\:", ":")
}

/// One host's share of a command: its session snapshot and requested paths.
#[derive(Debug, Clone)]
pub struct Target {
    pub session: Session,
    pub paths: Vec<String>,
}

/// Host label → requested paths, in operand order per host.
#[derive(Debug, Clone, Default)]
pub struct TargetSet {
    targets: BTreeMap<String, Target>,
}

impl TargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every operand against `pool`, collecting unknown-host errors.
    pub fn resolve(pool: &SessionMap, operands: &[String]) -> (Self, Vec<ShellError>) {
        let mut set = Self::new();
        let mut errors = Vec::new();
        for operand in operands {
            errors.extend(set.resolve_into(pool, operand));
        }
        (set, errors)
    }

    /// Add one operand. Paths append to existing host entries; unknown hosts
    /// are returned as errors and never inserted.
    pub fn resolve_into(&mut self, pool: &SessionMap, operand: &str) -> Vec<ShellError> {
        let (hosts, path) = parse_host_path(operand);
        let hosts = if hosts.is_empty() {
            pool.keys().cloned().collect()
        } else {
            hosts
        };
        let mut errors = Vec::new();
        let mut seen: Vec<&str> = Vec::new();
        for host in &hosts {
            // A host listed twice in one segment still gets the path once.
            if seen.contains(&host.as_str()) {
                continue;
            }
            seen.push(host);
            match pool.get(host) {
                Some(session) => self.push(session, path.clone()),
                None => errors.push(ShellError::UnknownHost(host.clone())),
            }
        }
        errors
    }

    /// Add `path` for every host already in the set.
    ///
    /// Used for the second operand of two-path commands, which applies on the
    /// hosts pinned by the first. A host list on the operand is ignored.
    pub fn push_pinned(&mut self, operand: &str) {
        let (_, path) = parse_host_path(operand);
        for target in self.targets.values_mut() {
            target.paths.push(path.clone());
        }
    }

    fn push(&mut self, session: &Session, path: String) {
        self.targets
            .entry(session.label().to_string())
            .or_insert_with(|| Target {
                session: session.clone(),
                paths: Vec::new(),
            })
            .paths
            .push(path);
    }

    /// Add every pooled host with no paths (for argument-less commands).
    pub fn all_hosts(pool: &SessionMap) -> Self {
        let targets = pool
            .iter()
            .map(|(label, session)| {
                (
                    label.clone(),
                    Target {
                        session: session.clone(),
                        paths: Vec::new(),
                    },
                )
            })
            .collect();
        Self { targets }
    }

    /// One `path` on each named host; an empty list means every pooled host.
    /// Unknown names are skipped silently.
    pub fn select(pool: &SessionMap, hosts: &[String], path: &str) -> Self {
        let mut set = Self::new();
        let chosen: Vec<&Session> = if hosts.is_empty() {
            pool.values().collect()
        } else {
            hosts.iter().filter_map(|h| pool.get(h)).collect()
        };
        for session in chosen {
            set.push(session, path.to_string());
        }
        set
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.targets.keys().cloned().collect()
    }

    pub fn get(&self, label: &str) -> Option<&Target> {
        self.targets.get(label)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Target)> {
        self.targets.iter()
    }

    pub fn into_targets(self) -> BTreeMap<String, Target> {
        self.targets
    }
}

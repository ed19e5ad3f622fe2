//! Completion engine for the interactive prompt.
//!
//! The command table decides what the argument under the cursor is (remote
//! path, local path, permission digits, flags). Remote candidates are probed
//! on every candidate host concurrently through the dispatcher fan-out and
//! merged by name, remembering which hosts produced each one. The last remote
//! and the last local listing are kept so typing within one directory does
//! not re-probe.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::commands::{expand_home, lookup, ArgKind, COMMANDS};
use crate::dispatch::{fan_out, HostReport};
use crate::error::RemoteError;
use crate::remote::{glob, path};
use crate::session::{Session, SessionRegistry};
use crate::target::{parse_host_path, TargetSet};

/// Characters that end the fragment a suggestion replaces.
const SEPARATORS: [char; 4] = [' ', '/', ',', ':'];

const OCTAL_DIGITS: [char; 8] = ['0', '1', '2', '3', '4', '5', '6', '7'];

/// One completion candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub text: String,
    pub description: String,
    /// Hosts that produced a remote path candidate.
    pub hosts: Vec<String>,
}

impl Suggestion {
    fn new(text: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            description: description.into(),
            hosts: Vec::new(),
        }
    }
}

/// Every string of `len` symbols over `alphabet`, in lexicographic order of
/// the alphabet as given.
pub fn permutations(alphabet: &[char], len: usize) -> Vec<String> {
    if len == 0 {
        return vec![String::new()];
    }
    let tails = permutations(alphabet, len - 1);
    alphabet
        .iter()
        .flat_map(|head| tails.iter().map(move |tail| format!("{head}{tail}")))
        .collect()
}

/// Byte offset where the fragment under the cursor begins.
pub fn fragment_start(line: &str) -> usize {
    let mut start = 0;
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if SEPARATORS.contains(&ch) {
            start = idx + ch.len_utf8();
        }
    }
    start
}

/// Split on unescaped spaces, keeping escapes. The last element is the
/// argument being typed and may be empty.
fn split_args(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for ch in line.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => {
                current.push(ch);
                escaped = true;
            }
            ' ' => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }
    words.push(current);
    words
}

fn escape(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if matches!(ch, '[' | ']' | ' ' | '(' | ')' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.extend(chars.next()),
            _ => out.push(ch),
        }
    }
    out
}

/// Directory part of a partially typed path, including the final `/`.
fn dir_part(raw: &str) -> &str {
    match raw.rfind('/') {
        Some(idx) => &raw[..=idx],
        None => "",
    }
}

/// Merge per-host name lists into one suggestion per distinct name.
fn merge_remote<I>(per_host: I) -> Vec<Suggestion>
where
    I: IntoIterator<Item = (String, Vec<String>)>,
{
    let mut merged: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (host, names) in per_host {
        for name in names {
            let hosts = merged.entry(name).or_default();
            if !hosts.contains(&host) {
                hosts.push(host.clone());
            }
        }
    }
    merged
        .into_iter()
        .map(|(name, hosts)| Suggestion {
            text: escape(&name),
            description: format!("remote path. from:{}", hosts.join(",")),
            hosts,
        })
        .collect()
}

fn filter_prefix(items: Vec<Suggestion>, word: &str) -> Vec<Suggestion> {
    let word = word.to_lowercase();
    items
        .into_iter()
        .filter(|s| s.text.to_lowercase().starts_with(&word))
        .collect()
}

/// Base names directly under `dir` (globbed) on one host.
async fn list_names(session: &Session, dir: &str) -> Result<Vec<String>, RemoteError> {
    let base = if dir.is_empty() {
        session.pwd().to_string()
    } else {
        session.resolve_path(dir).await?
    };
    let matches = glob(session.fs().as_ref(), &path::join(&base, "*")).await?;
    Ok(matches.iter().map(|m| path::base_name(m)).collect())
}

struct Slot {
    key: String,
    items: Vec<Suggestion>,
}

fn cached(slot: &Mutex<Option<Slot>>, key: &str) -> Option<Vec<Suggestion>> {
    slot.lock()
        .as_ref()
        .filter(|s| s.key == key)
        .map(|s| s.items.clone())
}

fn store(slot: &Mutex<Option<Slot>>, key: String, items: &[Suggestion]) {
    *slot.lock() = Some(Slot {
        key,
        items: items.to_vec(),
    });
}

pub struct Completer {
    registry: Arc<SessionRegistry>,
    remote: Mutex<Option<Slot>>,
    local: Mutex<Option<Slot>>,
}

impl Completer {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            remote: Mutex::new(None),
            local: Mutex::new(None),
        }
    }

    /// Forget cached listings; called after every executed command.
    pub fn invalidate(&self) {
        *self.remote.lock() = None;
        *self.local.lock() = None;
    }

    /// Suggestions for the text left of the cursor.
    pub async fn complete(&self, line: &str, local_cwd: &Path) -> Vec<Suggestion> {
        let words = split_args(line);
        let word = &line[fragment_start(line)..];
        let candidates = if words.len() == 1 {
            COMMANDS
                .iter()
                .map(|spec| Suggestion::new(spec.name, spec.description))
                .collect()
        } else {
            self.argument_candidates(&words, local_cwd).await
        };
        filter_prefix(candidates, word)
    }

    async fn argument_candidates(&self, words: &[String], local_cwd: &Path) -> Vec<Suggestion> {
        let Some(spec) = lookup(&words[0]) else {
            return Vec::new();
        };
        let Some((current, before)) = words.split_last() else {
            return Vec::new();
        };
        if current.starts_with('-') {
            return spec
                .flags
                .iter()
                .map(|(flag, desc)| Suggestion::new(*flag, *desc))
                .collect();
        }
        let positional: Vec<&String> = before[1..].iter().filter(|w| !w.starts_with('-')).collect();
        match spec.arg_kind(positional.len()) {
            ArgKind::None => Vec::new(),
            ArgKind::Mode => permutations(&OCTAL_DIGITS, 3)
                .into_iter()
                .map(|mode| Suggestion::new(mode, ""))
                .collect(),
            ArgKind::Remote => self.remote_candidates(current, None).await,
            ArgKind::RemotePinned => {
                let pinned = positional
                    .last()
                    .map(|first| parse_host_path(first).0)
                    .unwrap_or_default();
                self.remote_candidates(current, Some(pinned)).await
            }
            ArgKind::Local => self.local_candidates(current, local_cwd),
            ArgKind::RemoteOrLocal => {
                let mut items = self.remote_candidates(current, None).await;
                items.extend(self.local_candidates(current, local_cwd));
                items
            }
        }
    }

    async fn remote_candidates(&self, arg: &str, pinned: Option<Vec<String>>) -> Vec<Suggestion> {
        let pool = self.registry.snapshot();
        let typing_hosts = pinned.is_none() && !arg.contains(':') && !arg.contains('/');
        let host_items: Vec<Suggestion> = pool
            .keys()
            .map(|label| Suggestion::new(label.as_str(), "remote host."))
            .collect();
        if typing_hosts && arg.contains(',') {
            return host_items;
        }

        let (named, path_part) = parse_host_path(arg);
        let hosts = pinned.unwrap_or(named);
        let dir = unescape(dir_part(&path_part));
        let pool_labels: Vec<&str> = pool.keys().map(String::as_str).collect();
        let key = format!("{}|{}|{dir}", pool_labels.join(","), hosts.join(","));

        let mut items = match cached(&self.remote, &key) {
            Some(items) => items,
            None => {
                let targets = TargetSet::select(&pool, &hosts, &dir);
                let reports = fan_out(targets, |target, _out| async move {
                    let mut report = HostReport::<Vec<String>>::new();
                    let dir = target.paths.first().cloned().unwrap_or_default();
                    match list_names(&target.session, &dir).await {
                        Ok(names) => {
                            report.value = names;
                            report.succeeded += 1;
                        }
                        Err(err) => {
                            tracing::debug!(
                                host = %target.session.label(),
                                error = %err,
                                "completion probe failed"
                            );
                            report.failed += 1;
                        }
                    }
                    report
                })
                .await;
                let items = merge_remote(reports.into_iter().map(|(label, r)| (label, r.value)));
                store(&self.remote, key, &items);
                items
            }
        };
        if typing_hosts {
            items.extend(host_items);
        }
        items
    }

    fn local_candidates(&self, arg: &str, local_cwd: &Path) -> Vec<Suggestion> {
        let dir = unescape(dir_part(arg));
        let key = format!("{}|{dir}", local_cwd.display());
        if let Some(items) = cached(&self.local, &key) {
            return items;
        }
        let base = if dir.is_empty() {
            local_cwd.to_path_buf()
        } else {
            let expanded = expand_home(&dir);
            if expanded.is_absolute() {
                expanded
            } else {
                local_cwd.join(expanded)
            }
        };
        let base = base.to_string_lossy();
        let pattern = format!("{}/*", ::glob::Pattern::escape(base.trim_end_matches('/')));
        let mut names: Vec<String> = match ::glob::glob(&pattern) {
            Ok(paths) => paths
                .filter_map(Result::ok)
                .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        let items: Vec<Suggestion> = names
            .iter()
            .map(|name| Suggestion::new(escape(name), "local path."))
            .collect();
        store(&self.local, key, &items);
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::{capture_sink, mock_registry, MockFs, TestTempDir};
    use std::collections::BTreeSet;

    fn completer(hosts: &[(&str, Arc<MockFs>)]) -> Completer {
        let (sink, _) = capture_sink();
        Completer::new(Arc::new(mock_registry(hosts, &sink)))
    }

    fn texts(items: &[Suggestion]) -> Vec<&str> {
        items.iter().map(|s| s.text.as_str()).collect()
    }

    fn two_hosts() -> (Arc<MockFs>, Arc<MockFs>, Completer) {
        let a = Arc::new(MockFs::new("/home/a"));
        let b = Arc::new(MockFs::new("/home/b"));
        a.add_file("/srv/foo", b"");
        a.add_file("/srv/bar", b"");
        b.add_file("/srv/bar", b"");
        b.add_file("/srv/baz", b"");
        let c = completer(&[("a", Arc::clone(&a)), ("b", Arc::clone(&b))]);
        (a, b, c)
    }

    #[test]
    fn octal_permutations_are_complete_and_ordered() {
        let modes = permutations(&OCTAL_DIGITS, 3);
        assert_eq!(modes.len(), 512);
        assert_eq!(modes.iter().collect::<BTreeSet<_>>().len(), 512);
        assert_eq!(modes[0], "000");
        assert_eq!(modes[1], "001");
        assert_eq!(modes[511], "777");
        assert!(modes.iter().all(|m| m.len() == 3));
        assert_eq!(permutations(&['a', 'b'], 2), vec!["aa", "ab", "ba", "bb"]);
    }

    #[test]
    fn merge_deduplicates_and_records_hosts() {
        let merged = merge_remote(vec![
            ("a".to_string(), vec!["foo".to_string(), "bar".to_string()]),
            ("b".to_string(), vec!["bar".to_string(), "baz".to_string()]),
        ]);
        assert_eq!(texts(&merged), vec!["bar", "baz", "foo"]);
        assert_eq!(merged[0].hosts, vec!["a", "b"]);
        assert_eq!(merged[0].description, "remote path. from:a,b");
        assert_eq!(merged[2].hosts, vec!["a"]);
    }

    #[test]
    fn fragment_starts_after_last_unescaped_separator() {
        assert_eq!(fragment_start("ls a,b:/srv/lo"), "ls a,b:/srv/".len());
        assert_eq!(fragment_start("cat my\\ fi"), "cat ".len());
        assert_eq!(fragment_start("ls"), 0);
    }

    #[test]
    fn escapes_shell_sensitive_characters() {
        assert_eq!(escape("my file[1] (x)"), "my\\ file\\[1\\]\\ \\(x\\)");
        assert_eq!(unescape("my\\ file\\[1\\]"), "my file[1]");
        assert_eq!(split_args("put a\\ b "), vec!["put", "a\\ b", ""]);
    }

    #[tokio::test]
    async fn command_names_filter_case_insensitively() {
        let c = completer(&[]);
        let items = c.complete("LC", Path::new("/")).await;
        assert_eq!(texts(&items), vec!["lcat", "lcd"]);
        assert_eq!(items[0].description, "Print local file contents");
    }

    #[tokio::test]
    async fn remote_paths_merge_across_hosts() {
        let (_a, _b, c) = two_hosts();
        let items = c.complete("ls /srv/", Path::new("/")).await;
        assert_eq!(texts(&items), vec!["bar", "baz", "foo"]);
        assert_eq!(items[0].hosts, vec!["a", "b"]);

        let filtered = c.complete("cat /srv/BA", Path::new("/")).await;
        assert_eq!(texts(&filtered), vec!["bar", "baz"]);
    }

    #[tokio::test]
    async fn explicit_host_list_limits_probes() {
        let (_a, _b, c) = two_hosts();
        let items = c.complete("ls b:/srv/", Path::new("/")).await;
        assert_eq!(texts(&items), vec!["bar", "baz"]);
        assert!(items.iter().all(|s| s.hosts == vec!["b"]));
    }

    #[tokio::test]
    async fn failing_host_is_skipped() {
        let (_a, b, c) = two_hosts();
        b.fail_on("/srv");
        let items = c.complete("rm /srv/", Path::new("/")).await;
        assert_eq!(texts(&items), vec!["bar", "foo"]);
    }

    #[tokio::test]
    async fn host_names_offered_before_a_path() {
        let (a, _b, c) = two_hosts();
        a.add_file("/home/a/notes", b"");
        let items = c.complete("ls ", Path::new("/")).await;
        assert_eq!(texts(&items), vec!["notes", "a", "b"]);

        let hosts_only = c.complete("ls a,", Path::new("/")).await;
        assert_eq!(texts(&hosts_only), vec!["a", "b"]);
        assert!(hosts_only.iter().all(|s| s.description == "remote host."));
    }

    #[tokio::test]
    async fn second_operand_uses_hosts_pinned_by_first() {
        let (_a, _b, c) = two_hosts();
        let items = c.complete("rename a:/srv/foo /srv/", Path::new("/")).await;
        assert_eq!(texts(&items), vec!["bar", "foo"]);
    }

    #[tokio::test]
    async fn flags_and_modes_come_from_the_table() {
        let c = completer(&[]);
        let flags = c.complete("ls -l", Path::new("/")).await;
        assert_eq!(texts(&flags), vec!["-l"]);
        let modes = c.complete("chmod 75", Path::new("/")).await;
        assert_eq!(modes.len(), 8);
        assert_eq!(modes[0].text, "750");
        assert!(c.complete("pwd ", Path::new("/")).await.is_empty());
        assert!(c.complete("nosuch ", Path::new("/")).await.is_empty());
    }

    #[tokio::test]
    async fn local_paths_complete_against_local_directory() {
        let c = completer(&[]);
        let tmp = TestTempDir::new("complete");
        tmp.write_text("alpha.txt", "");
        tmp.write_text("beta dir/inner", "");
        let items = c.complete("lcat ", tmp.path()).await;
        assert_eq!(texts(&items), vec!["alpha.txt", "beta\\ dir"]);
        assert!(items.iter().all(|s| s.description == "local path."));

        let nested = c.complete("lcd beta\\ dir/in", tmp.path()).await;
        assert_eq!(texts(&nested), vec!["inner"]);
    }

    #[tokio::test]
    async fn remote_or_local_merges_both_sides() {
        let (_a, _b, c) = two_hosts();
        let tmp = TestTempDir::new("complete-get");
        tmp.write_text("bar.local", "");
        let line = format!("get /srv/foo {}/ba", tmp.path().display());
        let items = c.complete(&line, tmp.path()).await;
        assert_eq!(texts(&items), vec!["bar.local"]);
    }

    #[tokio::test]
    async fn cached_listing_is_reused_until_invalidated() {
        let (a, _b, c) = two_hosts();
        assert_eq!(c.complete("ls a:/srv/", Path::new("/")).await.len(), 2);
        a.add_file("/srv/new", b"");
        assert_eq!(c.complete("ls a:/srv/n", Path::new("/")).await.len(), 0);
        c.invalidate();
        assert_eq!(texts(&c.complete("ls a:/srv/n", Path::new("/")).await), vec!["new"]);
    }
}

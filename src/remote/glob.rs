//! Client-side glob expansion over [`RemoteFs`] directory listings.

use glob::Pattern;

use super::{path, RemoteFs};
use crate::error::RemoteError;

/// Whether `s` contains glob metacharacters.
pub fn has_meta(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Expand `pattern` against the remote filesystem.
///
/// A pattern without metacharacters yields itself when it exists. Matches
/// are returned sorted. Directories that cannot be read are skipped; only a
/// malformed pattern is an error.
pub async fn glob(fs: &dyn RemoteFs, pattern: &str) -> Result<Vec<String>, RemoteError> {
    if !has_meta(pattern) {
        return Ok(match fs.lstat(pattern).await {
            Ok(_) => vec![pattern.to_string()],
            Err(_) => Vec::new(),
        });
    }

    let rooted = pattern.starts_with('/');
    let components: Vec<&str> = pattern.split('/').filter(|c| !c.is_empty()).collect();
    let mut candidates = vec![if rooted { "/".to_string() } else { String::new() }];
    let mut last_was_literal = false;

    for component in components {
        let mut next = Vec::new();
        if has_meta(component) {
            let matcher = Pattern::new(component)
                .map_err(|e| RemoteError::Protocol(format!("bad pattern {pattern}: {e}")))?;
            for base in &candidates {
                let dir = if base.is_empty() { "." } else { base.as_str() };
                let Ok(entries) = fs.read_dir(dir).await else {
                    continue;
                };
                let mut names: Vec<String> = entries
                    .into_iter()
                    .map(|e| e.name)
                    .filter(|name| matcher.matches(name))
                    .collect();
                names.sort();
                next.extend(names.into_iter().map(|name| append(base, &name)));
            }
            last_was_literal = false;
        } else {
            next.extend(candidates.iter().map(|base| append(base, component)));
            last_was_literal = true;
        }
        candidates = next;
        if candidates.is_empty() {
            break;
        }
    }

    if last_was_literal {
        let mut existing = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if fs.lstat(&candidate).await.is_ok() {
                existing.push(candidate);
            }
        }
        candidates = existing;
    }
    candidates.sort();
    Ok(candidates)
}

fn append(base: &str, name: &str) -> String {
    match base {
        "" => name.to_string(),
        "/" => format!("/{name}"),
        _ => path::join(base, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::MockFs;

    fn fixture() -> MockFs {
        let fs = MockFs::new("/home/u");
        fs.add_file("/srv/a.log", b"a");
        fs.add_file("/srv/b.log", b"b");
        fs.add_file("/srv/.hidden.log", b"h");
        fs.add_file("/srv/notes.txt", b"n");
        fs.add_file("/srv/x/conf", b"1");
        fs.add_file("/srv/y/conf", b"2");
        fs.add_dir("/srv/z");
        fs
    }

    #[test]
    fn detects_meta() {
        assert!(has_meta("*.log"));
        assert!(has_meta("a?"));
        assert!(has_meta("[ab]"));
        assert!(!has_meta("/plain/path"));
    }

    #[tokio::test]
    async fn literal_pattern_yields_itself_when_present() {
        let fs = fixture();
        assert_eq!(glob(&fs, "/srv/a.log").await.unwrap(), vec!["/srv/a.log"]);
        assert!(glob(&fs, "/srv/missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn star_matches_sorted_including_dotfiles() {
        let fs = fixture();
        assert_eq!(
            glob(&fs, "/srv/*.log").await.unwrap(),
            vec!["/srv/.hidden.log", "/srv/a.log", "/srv/b.log"]
        );
    }

    #[tokio::test]
    async fn meta_in_directory_component_checks_trailing_literal() {
        let fs = fixture();
        assert_eq!(
            glob(&fs, "/srv/*/conf").await.unwrap(),
            vec!["/srv/x/conf", "/srv/y/conf"]
        );
    }

    #[tokio::test]
    async fn relative_patterns_list_login_directory() {
        let fs = fixture();
        fs.add_file("/home/u/one.txt", b"1");
        fs.add_file("/home/u/two.txt", b"2");
        assert_eq!(glob(&fs, "*.txt").await.unwrap(), vec!["one.txt", "two.txt"]);
    }

    #[tokio::test]
    async fn malformed_pattern_is_an_error() {
        let fs = fixture();
        assert!(glob(&fs, "/srv/[").await.is_err());
    }
}

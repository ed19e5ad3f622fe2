//! POSIX path helpers for remote paths.
//!
//! Remote paths are plain `/`-separated strings regardless of the local
//! platform, so these helpers avoid `std::path`.

/// Lexically clean a path: collapse repeated separators, drop `.` elements,
/// and resolve `..` against preceding elements.
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Join two path fragments and clean the result.
pub fn join(base: &str, rel: &str) -> String {
    if base.is_empty() {
        return clean(rel);
    }
    if rel.is_empty() {
        return clean(base);
    }
    clean(&format!("{base}/{rel}"))
}

/// All but the last element of a path (`path.Dir` semantics).
pub fn parent(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => clean(&path[..idx]),
        None => ".".to_string(),
    }
}

/// Last element of a path, ignoring trailing separators.
pub fn base_name(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.is_empty() { ".".into() } else { "/".into() };
    }
    match trimmed.rfind('/') {
        Some(idx) => trimmed[idx + 1..].to_string(),
        None => trimmed.to_string(),
    }
}

pub fn is_abs(path: &str) -> bool {
    path.starts_with('/')
}

/// Strip exactly one trailing separator, keeping a bare root intact.
pub fn trim_one_trailing_separator(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

/// Resolve `~`, `~/rest` and relative paths against a home and a working
/// directory, producing an absolute-or-cwd-relative remote path.
pub fn resolve(path: &str, home: &str, cwd: &str) -> String {
    if path == "~" {
        return home.to_string();
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return join(home, rest);
    }
    if is_abs(path) {
        return path.to_string();
    }
    join(cwd, path)
}

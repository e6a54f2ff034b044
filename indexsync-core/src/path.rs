//! Repository path helpers and SQL-LIKE pattern translation

use crate::error::SyncError;
use regex::Regex;

/// Normalize a repository path: collapse repeated slashes and drop any
/// trailing slash except on the root.
pub fn canonicalize(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return "/".to_string();
    }
    let joined = segments.join("/");
    if path.starts_with('/') {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Parent collection of `path`, or `None` for the root.
pub fn parent(path: &str) -> Option<String> {
    let path = canonicalize(path);
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(idx) => Some(path[..idx].to_string()),
        None => None,
    }
}

/// Last segment of `path` (the document label).
pub fn basename(path: &str) -> String {
    let path = canonicalize(path);
    if path == "/" {
        return path;
    }
    path.rsplit('/').next().unwrap_or_default().to_string()
}

/// True if `candidate` is `root` itself or lies beneath it.
pub fn is_within(root: &str, candidate: &str) -> bool {
    let root = canonicalize(root);
    let candidate = canonicalize(candidate);
    if root == "/" {
        return candidate.starts_with('/');
    }
    candidate == root
        || candidate
            .strip_prefix(root.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Replace the `from` prefix of `path` with `to`, respecting segment boundaries.
pub fn rebase(path: &str, from: &str, to: &str) -> Option<String> {
    if !is_within(from, path) {
        return None;
    }
    let path = canonicalize(path);
    let from = canonicalize(from);
    let rest = if from == "/" {
        &path[..]
    } else {
        &path[from.len()..]
    };
    Some(canonicalize(&format!("{}/{}", canonicalize(to), rest)))
}

/// Translate a SQL-LIKE pattern into an anchored regex source string.
///
/// `%` matches any run of characters (including none), `_` matches exactly
/// one character, and everything else is matched literally. Wildcards match
/// newlines too.
pub fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 12);
    out.push_str("(?s)^");
    let mut buf = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    out.push('$');
    out
}

/// Compile a SQL-LIKE pattern into a label matcher.
pub fn like_matcher(pattern: &str) -> crate::Result<Regex> {
    Regex::new(&like_to_regex(pattern))
        .map_err(|e| SyncError::InvalidPattern(format!("{}: {}", pattern, e)))
}

//! Helpers for the `/`-separated virtual path namespace used by the tree.
//!
//! Tree paths are not host paths: `/drive/root` or `/drive_recent` may not
//! exist anywhere on disk, so these operate on plain strings.

/// Path separator of the virtual namespace.
pub const SEPARATOR: char = '/';

/// True if `child` equals `parent` or lies somewhere below it.
///
/// The match respects segment boundaries: `/a/b` is not a parent of `/a/bc`.
pub fn is_parent_path(parent: &str, child: &str) -> bool {
    if parent == child {
        return true;
    }
    if parent == "/" {
        return child.starts_with(SEPARATOR);
    }
    child
        .strip_prefix(parent)
        .is_some_and(|rest| rest.starts_with(SEPARATOR))
}

/// Join a directory path with a child name.
pub fn join(parent: &str, name: &str) -> String {
    if parent.ends_with(SEPARATOR) {
        format!("{}{}", parent, name)
    } else {
        format!("{}{}{}", parent, SEPARATOR, name)
    }
}

/// Last segment of a path, or the path itself for `/`.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches(SEPARATOR);
    match trimmed.rfind(SEPARATOR) {
        Some(idx) => &trimmed[idx + 1..],
        None if trimmed.is_empty() => path,
        None => trimmed,
    }
}

/// Parent directory of a path. `None` for `/` and relative names.
pub fn parent(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches(SEPARATOR);
    let idx = trimmed.rfind(SEPARATOR)?;
    if idx == 0 {
        if trimmed.len() > 1 {
            Some("/")
        } else {
            None
        }
    } else {
        Some(&trimmed[..idx])
    }
}

/// Normalize a user-supplied path: leading `/`, no duplicate or trailing
/// separators, `.` segments dropped.
pub fn normalize(path: &str) -> String {
    let segments: Vec<&str> = path
        .split(SEPARATOR)
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    if segments.is_empty() {
        return "/".to_string();
    }
    let mut out = String::with_capacity(path.len() + 1);
    for segment in segments {
        out.push(SEPARATOR);
        out.push_str(segment);
    }
    out
}

/// The first `count` segments of `path` as a path (`/a/b/c`, 2 -> `/a/b`).
pub fn leading_segments(path: &str, count: usize) -> String {
    let mut out = String::new();
    for segment in path.split(SEPARATOR).filter(|s| !s.is_empty()).take(count) {
        out.push(SEPARATOR);
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push(SEPARATOR);
    }
    out
}

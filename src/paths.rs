use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

// `..` is left alone; scope is decided after canonicalization.
pub fn join_under(root: &Path, requested: &str) -> Option<PathBuf> {
    if requested.contains('\0') {
        return None;
    }
    let trimmed = requested.trim_start_matches('/');
    if trimmed.is_empty() {
        return Some(root.to_path_buf());
    }
    Some(root.join(trimmed))
}

pub fn millis_since_epoch(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_millis()).unwrap_or(i64::MAX),
    }
}

pub fn entry_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "/".to_string())
}

pub fn display_relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let mut out = String::new();
    for c in rel.components() {
        if let Component::Normal(seg) = c {
            out.push('/');
            out.push_str(&seg.to_string_lossy());
        }
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

//! Root path helpers. Root paths are absolute ('/'-prefixed); folder paths end with '/'.

use anyhow::{bail, Result};
use unicode_normalization::UnicodeNormalization;

/// Normalize a UTF-8 string to NFC.
pub fn normalize_nfc(input: &str) -> String {
    input.nfc().collect::<String>()
}

/// Validate a root path:
/// - starts with '/'
/// - NUL ("\u{0000}") not allowed
/// - no empty segments ('//') and no '.' or '..' segments
pub fn validate_root_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("root path cannot be empty");
    }
    if !path.starts_with('/') {
        bail!("root path must start with '/'");
    }
    if path.chars().any(|c| c == '\u{0000}') {
        bail!("root path cannot contain NUL characters");
    }
    if path.contains("//") {
        bail!("empty segments ('//') are not allowed in root paths");
    }
    for seg in path.split('/').filter(|s| !s.is_empty()) {
        if seg == "." || seg == ".." {
            bail!("segments '.' and '..' are not allowed");
        }
    }
    Ok(())
}

#[inline]
pub fn is_folder_path(path: &str) -> bool {
    path.ends_with('/')
}

/// Parent folder of a root path; `None` for "/".
pub fn parent_folder(path: &str) -> Option<String> {
    if path == "/" || path.is_empty() { return None; }
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    let idx = trimmed.rfind('/')?;
    Some(trimmed[..=idx].to_string())
}

/// Last segment of a root path; folders keep their trailing '/'.
pub fn resource_name(path: &str) -> &str {
    if path == "/" { return path; }
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    match trimmed.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Join a folder path and a resource name.
pub fn join(folder: &str, name: &str) -> String {
    let name = name.trim_start_matches('/');
    if folder.ends_with('/') { format!("{}{}", folder, name) } else { format!("{}/{}", folder, name) }
}

/// Ancestor folders of a root path, outermost first, excluding the path itself.
pub fn ancestor_folders(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = parent_folder(path);
    while let Some(p) = cur {
        cur = parent_folder(&p);
        out.push(p);
    }
    out.reverse();
    out
}

/// True when `path` is `prefix` or sits below it.
#[inline]
pub fn is_under(path: &str, prefix: &str) -> bool {
    path.starts_with(prefix)
}

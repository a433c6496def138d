//! Validation of template-supplied relative paths.
//!
//! Paths inside the engine are root-relative strings that always use `/`.
//! They are converted to host paths only when joined onto a root.

use std::path::{Component, Path, PathBuf};

use crate::error::{RenderError, RenderResult};

/// Validate a relative path and make it root-relative.
///
/// One leading `/` is stripped, so `/src` means `src` under the root rather
/// than an absolute path. Any `..` segment is rejected. A trailing `/` is
/// kept.
pub fn safe_rel_path(path: &str) -> RenderResult<String> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.split('/').any(|segment| segment == "..") {
        return Err(RenderError::PathTraversal {
            path: path.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// Reject patterns containing a backslash.
pub fn reject_backslash(pattern: &str) -> RenderResult<()> {
    if pattern.contains('\\') {
        return Err(RenderError::BackslashInGlob {
            pattern: pattern.to_string(),
        });
    }
    Ok(())
}

/// Join a `/`-separated relative path onto a root using host separators.
pub fn to_native(root: &Path, rel: &str) -> PathBuf {
    let mut out = root.to_path_buf();
    for segment in rel.split('/').filter(|s| !s.is_empty() && *s != ".") {
        out.push(segment);
    }
    out
}

/// Render a host relative path in `/`-separated form.
pub fn to_slash(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Canonical form of a relative path: no empty or `.` segments, no trailing `/`.
pub fn clean_rel(rel: &str) -> String {
    rel.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Join two `/`-separated relative paths.
pub fn join_rel(base: &str, name: &str) -> String {
    let base = base.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    match (base.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}/{}", base, name),
    }
}

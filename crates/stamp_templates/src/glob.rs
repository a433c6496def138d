//! Glob expansion against a directory root.
//!
//! Patterns are matched one path segment at a time with POSIX shell rules
//! (`*`, `?`, `[...]`), case-sensitively, on every platform. Unlike a shell,
//! `*` also matches names starting with a dot.

use std::fs;
use std::io;
use std::path::Path;

use ::glob::{MatchOptions, Pattern};
use stamp_spec::PathExpr;
use tracing::debug;

use crate::error::{RenderError, RenderResult};
use crate::sandbox::{join_rel, reject_backslash, safe_rel_path, to_native};

pub(crate) const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Whether a string contains glob metacharacters.
pub fn has_glob_meta(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Expand patterns into root-relative, `/`-separated paths.
///
/// Patterns without metacharacters are validated but returned unchanged and
/// unchecked for existence. Each glob must match at least one entry.
pub fn expand_globs(root: &Path, patterns: &[PathExpr]) -> RenderResult<Vec<String>> {
    let mut out = Vec::new();
    for pattern in patterns {
        let matches = expand_one(root, pattern.as_str()).map_err(|e| e.at(pattern.pos))?;
        out.extend(matches);
    }
    Ok(out)
}

fn expand_one(root: &Path, pattern: &str) -> RenderResult<Vec<String>> {
    reject_backslash(pattern)?;
    let rel = safe_rel_path(pattern)?;
    if !has_glob_meta(&rel) {
        return Ok(vec![rel]);
    }

    let mut candidates = vec![String::new()];
    for segment in rel.split('/').filter(|s| !s.is_empty() && *s != ".") {
        let mut next = Vec::new();
        if has_glob_meta(segment) {
            let matcher = Pattern::new(segment).map_err(|e| {
                RenderError::InvalidParams(format!("invalid glob {:?}: {}", pattern, e))
            })?;
            for candidate in &candidates {
                next.extend(matching_children(root, candidate, &matcher)?);
            }
        } else {
            next.extend(candidates.iter().map(|c| join_rel(c, segment)));
        }
        candidates = next;
    }

    candidates.retain(|c| fs::symlink_metadata(to_native(root, c)).is_ok());
    candidates.sort();
    candidates.dedup();

    if candidates.is_empty() {
        return Err(RenderError::NoGlobMatch {
            pattern: pattern.to_string(),
        });
    }
    debug!("Glob {:?} matched {} paths", pattern, candidates.len());
    Ok(candidates)
}

fn matching_children(root: &Path, dir_rel: &str, matcher: &Pattern) -> RenderResult<Vec<String>> {
    let dir = to_native(root, dir_rel);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        // Missing directories and plain files simply contribute no matches.
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(_) if !fs::symlink_metadata(&dir).map_or(false, |m| m.is_dir()) => {
            return Ok(Vec::new())
        }
        Err(e) => return Err(RenderError::io("read_dir", &dir, e)),
    };

    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| RenderError::io("read_dir", &dir, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if matcher.matches_with(name, MATCH_OPTIONS) {
            out.push(join_rel(dir_rel, name));
        }
    }
    Ok(out)
}

//! Read-transform-write over a set of files addressed by path patterns.

use std::collections::HashSet;
use std::io;
use std::path::Path;

use stamp_spec::PathExpr;
use tracing::debug;
use walkdir::WalkDir;

use crate::cancel::CancellationToken;
use crate::error::{RenderError, RenderResult};
use crate::fs::{FileInfo, FileSystem};
use crate::glob::expand_globs;
use crate::sandbox::{clean_rel, to_native, to_slash};

/// What a walk did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Every file visited, in processing order
    pub visited: Vec<String>,
    /// The subset of `visited` that was rewritten
    pub modified: Vec<String>,
}

/// Apply `transform` to every file matched by `patterns` under `root`.
///
/// Directories are expanded to all the files beneath them. Each file is
/// processed once even when several patterns reach it, and is only written
/// when the transform changed its bytes. The first error stops the walk;
/// files already rewritten stay rewritten.
pub fn walk_and_modify<F>(
    fs: &dyn FileSystem,
    root: &Path,
    patterns: &[PathExpr],
    cancel: Option<&CancellationToken>,
    mut transform: F,
) -> RenderResult<WalkStats>
where
    F: FnMut(&[u8]) -> RenderResult<Vec<u8>>,
{
    let files = resolve_files(fs, root, patterns)?;
    let mut stats = WalkStats::default();

    for (rel, info) in files {
        if let Some(token) = cancel {
            token.check()?;
        }

        let path = to_native(root, &rel);
        let before = fs
            .read_file(&path)
            .map_err(|e| RenderError::io("read_file", &path, e))?;
        let after = transform(&before)?;

        if after != before {
            fs.write_file(&path, &after, info.mode)
                .map_err(|e| RenderError::io("write_file", &path, e))?;
            debug!("Modified {:?}", rel);
            stats.modified.push(rel.clone());
        } else {
            debug!("Unchanged {:?}", rel);
        }
        stats.visited.push(rel);
    }

    Ok(stats)
}

/// Expand patterns into a deduplicated, first-seen-ordered list of files.
fn resolve_files(
    fs: &dyn FileSystem,
    root: &Path,
    patterns: &[PathExpr],
) -> RenderResult<Vec<(String, FileInfo)>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for pattern in patterns {
        for rel in expand_globs(root, std::slice::from_ref(pattern))? {
            let rel = clean_rel(&rel);
            let path = to_native(root, &rel);
            let info = match fs.stat(&path) {
                Ok(info) => info,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(RenderError::NoGlobMatch {
                        pattern: pattern.value.clone(),
                    }
                    .at(pattern.pos));
                }
                Err(e) => return Err(RenderError::io("stat", &path, e)),
            };

            if !info.is_dir() {
                if seen.insert(rel.clone()) {
                    files.push((rel, info));
                }
                continue;
            }

            for entry in WalkDir::new(&path).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_dir() {
                    continue;
                }
                let child = entry
                    .path()
                    .strip_prefix(root)
                    .map(to_slash)
                    .unwrap_or_default();
                if !seen.insert(child.clone()) {
                    continue;
                }
                let info = fs
                    .stat(entry.path())
                    .map_err(|e| RenderError::io("stat", entry.path(), e))?;
                files.push((child, info));
            }
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{ErrorFs, FsOp, MockFileSystem, OsFs};
    use std::fs;
    use tempfile::tempdir;

    fn exprs(patterns: &[&str]) -> Vec<PathExpr> {
        patterns.iter().map(|p| PathExpr::new(*p)).collect()
    }

    fn upper(input: &[u8]) -> RenderResult<Vec<u8>> {
        Ok(input.to_ascii_uppercase())
    }

    #[test]
    fn test_unchanged_content_is_not_written() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("same.txt");

        let mut mock = MockFileSystem::new();
        let stat_path = path.clone();
        mock.expect_stat()
            .withf(move |p| p == stat_path)
            .returning(|_| Ok(FileInfo::file(0o644, 5)));
        mock.expect_read_file()
            .withf(move |p| p == path)
            .times(1)
            .returning(|_| Ok(b"hello".to_vec()));
        mock.expect_write_file().never();

        let stats = walk_and_modify(&mock, temp.path(), &exprs(&["same.txt"]), None, |b| {
            Ok(b.to_vec())
        })
        .unwrap();
        assert_eq!(stats.visited, vec!["same.txt"]);
        assert!(stats.modified.is_empty());
    }

    #[test]
    fn test_changed_content_keeps_mode() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("run.sh");

        let mut mock = MockFileSystem::new();
        mock.expect_stat()
            .returning(|_| Ok(FileInfo::file(0o755, 2)));
        mock.expect_read_file().returning(|_| Ok(b"hi".to_vec()));
        mock.expect_write_file()
            .withf(move |p, contents, mode| p == path && contents == b"HI" && *mode == 0o755)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let stats = walk_and_modify(&mock, temp.path(), &exprs(&["run.sh"]), None, upper).unwrap();
        assert_eq!(stats.modified, vec!["run.sh"]);
    }

    #[test]
    fn test_overlapping_patterns_transform_once() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("a/c")).unwrap();
        fs::write(temp.path().join("a/b.txt"), "b").unwrap();
        fs::write(temp.path().join("a/c/d.txt"), "d").unwrap();

        let mut calls = 0;
        let stats = walk_and_modify(
            &OsFs,
            temp.path(),
            &exprs(&["a/b.txt", "a/", "./a/b.txt", "a/*"]),
            None,
            |b| {
                calls += 1;
                let mut out = b.to_vec();
                out.push(b'!');
                Ok(out)
            },
        )
        .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(stats.visited, vec!["a/b.txt", "a/c/d.txt"]);
        assert_eq!(fs::read_to_string(temp.path().join("a/b.txt")).unwrap(), "b!");
        assert_eq!(fs::read_to_string(temp.path().join("a/c/d.txt")).unwrap(), "d!");
    }

    #[test]
    fn test_missing_literal_is_no_glob_match() {
        let temp = tempdir().unwrap();
        let err = walk_and_modify(&OsFs, temp.path(), &exprs(&["nope.txt"]), None, upper)
            .unwrap_err();
        assert_eq!(err.to_string(), "glob \"nope.txt\" did not match any files");
    }

    #[test]
    fn test_error_aborts_remaining_files() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("1.txt"), "one").unwrap();
        fs::write(temp.path().join("2.txt"), "two").unwrap();

        let fs_impl = ErrorFs::new(OsFs, FsOp::WriteFile).only_for("2.txt");
        let err = walk_and_modify(&fs_impl, temp.path(), &exprs(&["*.txt"]), None, upper)
            .unwrap_err();

        assert!(matches!(err, RenderError::Io { op: "write_file", .. }));
        assert_eq!(fs::read_to_string(temp.path().join("1.txt")).unwrap(), "ONE");
        assert_eq!(fs::read_to_string(temp.path().join("2.txt")).unwrap(), "two");
    }

    #[test]
    fn test_transform_error_propagates() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("x.txt"), "x").unwrap();
        let err = walk_and_modify(&OsFs, temp.path(), &exprs(&["x.txt"]), None, |_| {
            Err(RenderError::TemplateSyntax("bad".to_string()))
        })
        .unwrap_err();
        assert!(matches!(err, RenderError::TemplateSyntax(_)));
    }

    #[test]
    fn test_cancel_between_files() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("1.txt"), "one").unwrap();
        fs::write(temp.path().join("2.txt"), "two").unwrap();

        let token = CancellationToken::new();
        let handle = token.clone();
        let err = walk_and_modify(&OsFs, temp.path(), &exprs(&["*.txt"]), Some(&token), |b| {
            handle.cancel();
            upper(b)
        })
        .unwrap_err();

        assert!(matches!(err, RenderError::Cancelled));
        assert_eq!(fs::read_to_string(temp.path().join("1.txt")).unwrap(), "ONE");
        assert_eq!(fs::read_to_string(temp.path().join("2.txt")).unwrap(), "two");
    }
}

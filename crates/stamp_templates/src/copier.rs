//! Recursive copy of a directory tree under a per-entry policy.
//!
//! The copier walks the source depth-first (directories before their
//! children, siblings sorted by name) and asks an optional visitor for a
//! [`CopyHint`] per entry. Destination directories are only created when a
//! file is written beneath them, so empty source directories never appear in
//! the destination.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use sha2::digest::DynDigest;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::cancel::CancellationToken;
use crate::error::{RenderError, RenderResult};
use crate::fs::{FileInfo, FileSystem};
use crate::sandbox::{to_native, to_slash};

/// Constructs a fresh streaming hasher for each copied file.
pub type HasherFactory = fn() -> Box<dyn DynDigest>;

/// SHA-256 hasher factory.
pub fn sha256_hasher() -> Box<dyn DynDigest> {
    Box::new(Sha256::new())
}

/// Per-entry copy decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyHint {
    /// Omit this file, or this directory and everything below it
    pub skip: bool,
    /// Allow replacing a file that already exists in the destination
    pub allow_preexisting: bool,
    /// Back up a file before replacing it
    pub backup_if_exists: bool,
}

/// The entry a visitor is asked about.
#[derive(Debug, Clone, Copy)]
pub struct CopyEntry<'a> {
    /// `/`-separated path relative to the source root; empty for the root
    pub rel: &'a str,
    pub is_dir: bool,
}

type Visitor<'a> = Box<dyn FnMut(&CopyEntry<'_>) -> RenderResult<CopyHint> + 'a>;
type BackupDirMaker<'a> = Box<dyn FnMut(&dyn FileSystem) -> RenderResult<PathBuf> + 'a>;

/// Parameters of one copy.
pub struct CopyParams<'a> {
    pub src_root: PathBuf,
    pub dst_root: PathBuf,
    pub dry_run: bool,
    visitor: Option<Visitor<'a>>,
    hasher: Option<HasherFactory>,
    backup_dir_maker: Option<BackupDirMaker<'a>>,
    cancel: Option<CancellationToken>,
}

impl<'a> CopyParams<'a> {
    pub fn new(src_root: impl Into<PathBuf>, dst_root: impl Into<PathBuf>) -> Self {
        Self {
            src_root: src_root.into(),
            dst_root: dst_root.into(),
            dry_run: false,
            visitor: None,
            hasher: None,
            backup_dir_maker: None,
            cancel: None,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_visitor(
        mut self,
        visitor: impl FnMut(&CopyEntry<'_>) -> RenderResult<CopyHint> + 'a,
    ) -> Self {
        self.visitor = Some(Box::new(visitor));
        self
    }

    pub fn with_hasher(mut self, hasher: HasherFactory) -> Self {
        self.hasher = Some(hasher);
        self
    }

    /// Set the factory called, at most once, when the first backup is needed.
    pub fn with_backup_dir(
        mut self,
        maker: impl FnMut(&dyn FileSystem) -> RenderResult<PathBuf> + 'a,
    ) -> Self {
        self.backup_dir_maker = Some(Box::new(maker));
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// What a copy did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyOutcome {
    /// Hex digests keyed by `/`-separated relative path
    pub hashes: BTreeMap<String, String>,
    /// Backup directory, if any file was backed up
    pub backup_dir: Option<PathBuf>,
    /// Relative paths of the files copied (or that would be, in a dry run)
    pub copied: Vec<String>,
}

/// Copy `params.src_root` to `params.dst_root`.
///
/// Symlinks anywhere in the source abort the copy. Files copied before an
/// error stay in place.
pub fn copy_recursive(fs: &dyn FileSystem, mut params: CopyParams<'_>) -> RenderResult<CopyOutcome> {
    info!(
        "Copying {:?} to {:?}{}",
        params.src_root,
        params.dst_root,
        if params.dry_run { " (dry run)" } else { "" }
    );

    let mut outcome = CopyOutcome::default();
    let mut walker = WalkDir::new(&params.src_root)
        .follow_links(false)
        .follow_root_links(false)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry?;
        if let Some(token) = &params.cancel {
            token.check()?;
        }

        let rel = entry
            .path()
            .strip_prefix(&params.src_root)
            .map(to_slash)
            .unwrap_or_default();

        if entry.path_is_symlink() {
            let path = if rel.is_empty() {
                entry.path().display().to_string()
            } else {
                rel
            };
            return Err(RenderError::SymlinkForbidden { path });
        }

        let is_dir = entry.file_type().is_dir();
        let hint = match params.visitor.as_mut() {
            Some(visitor) => visitor(&CopyEntry { rel: &rel, is_dir })?,
            None => CopyHint::default(),
        };
        if hint.skip {
            debug!("Skipping {:?}", rel);
            if is_dir {
                walker.skip_current_dir();
            }
            continue;
        }

        let dst = to_native(&params.dst_root, &rel);
        let existing = stat_if_exists(fs, &dst)?;

        if is_dir {
            if let Some(info) = existing {
                if !info.is_dir() {
                    return Err(RenderError::overwrite(
                        &dst,
                        format!(
                            "cannot overwrite a {} with a directory of the same name",
                            info.kind.describe()
                        ),
                    ));
                }
            }
            continue;
        }

        if let Some(info) = existing {
            if info.is_dir() {
                return Err(RenderError::overwrite(
                    &dst,
                    "cannot overwrite a directory with a file of the same name",
                ));
            }
            if !hint.allow_preexisting {
                return Err(RenderError::overwrite(
                    &dst,
                    "destination file already exists and overwriting was not enabled",
                ));
            }
            if hint.backup_if_exists && !params.dry_run {
                backup_existing(fs, &mut params, &mut outcome, &rel, &dst, info)?;
            }
        }

        copy_file(fs, entry.path(), &dst, &rel, &params, &mut outcome)?;
    }

    info!("Copied {} files", outcome.copied.len());
    Ok(outcome)
}

fn stat_if_exists(fs: &dyn FileSystem, path: &Path) -> RenderResult<Option<FileInfo>> {
    match fs.stat(path) {
        Ok(info) => Ok(Some(info)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RenderError::io("stat", path, e)),
    }
}

fn copy_file(
    fs: &dyn FileSystem,
    src: &Path,
    dst: &Path,
    rel: &str,
    params: &CopyParams<'_>,
    outcome: &mut CopyOutcome,
) -> RenderResult<()> {
    let info = fs.stat(src).map_err(|e| RenderError::io("stat", src, e))?;
    let contents = fs
        .read_file(src)
        .map_err(|e| RenderError::io("read_file", src, e))?;

    if let Some(factory) = params.hasher {
        let mut hasher = factory();
        hasher.update(&contents);
        outcome.hashes.insert(rel.to_string(), to_hex(&hasher.finalize()));
    }

    if !params.dry_run {
        if let Some(parent) = dst.parent() {
            fs.mkdir_all(parent)
                .map_err(|e| RenderError::io("mkdir_all", parent, e))?;
        }
        fs.write_file(dst, &contents, info.mode)
            .map_err(|e| RenderError::io("write_file", dst, e))?;
    }

    debug!("Copied {:?}", rel);
    outcome.copied.push(rel.to_string());
    Ok(())
}

fn backup_existing(
    fs: &dyn FileSystem,
    params: &mut CopyParams<'_>,
    outcome: &mut CopyOutcome,
    rel: &str,
    dst: &Path,
    info: FileInfo,
) -> RenderResult<()> {
    let backup_root = match &outcome.backup_dir {
        Some(dir) => dir.clone(),
        None => {
            let maker = params.backup_dir_maker.as_mut().ok_or_else(|| {
                RenderError::InvalidParams(
                    "a backup was requested but no backup directory was configured".to_string(),
                )
            })?;
            let dir = maker(fs)?;
            info!("Backing up overwritten files to {:?}", dir);
            outcome.backup_dir = Some(dir.clone());
            dir
        }
    };

    let backup_path = to_native(&backup_root, rel);
    if let Some(parent) = backup_path.parent() {
        fs.mkdir_all(parent)
            .map_err(|e| RenderError::io("mkdir_all", parent, e))?;
    }
    let existing = fs
        .read_file(dst)
        .map_err(|e| RenderError::io("read_file", dst, e))?;
    fs.write_file(&backup_path, &existing, info.mode)
        .map_err(|e| RenderError::io("write_file", &backup_path, e))?;

    debug!("Backed up {:?}", rel);
    Ok(())
}

/// Lowercase hex encoding of a digest.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

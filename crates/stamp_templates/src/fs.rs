//! Filesystem capabilities used by the engine.
//!
//! Every read, write and directory mutation the engine performs goes through
//! [`FileSystem`] so tests can inject failures or observe calls. Directory
//! traversal itself (`walkdir`, `read_dir`) reads the real disk.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::Builder;

/// Kind of a filesystem entry, as reported without following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Dir,
    Symlink,
    Other,
}

impl FileKind {
    pub fn describe(&self) -> &'static str {
        match self {
            FileKind::File => "file",
            FileKind::Dir => "directory",
            FileKind::Symlink => "symlink",
            FileKind::Other => "special file",
        }
    }
}

/// Metadata returned by [`FileSystem::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    pub kind: FileKind,
    /// Permission bits (`0o777` mask)
    pub mode: u32,
    pub len: u64,
}

impl FileInfo {
    pub fn file(mode: u32, len: u64) -> Self {
        Self {
            kind: FileKind::File,
            mode,
            len,
        }
    }

    pub fn dir() -> Self {
        Self {
            kind: FileKind::Dir,
            mode: 0o755,
            len: 0,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Dir
    }

    pub fn from_metadata(meta: &fs::Metadata) -> Self {
        let file_type = meta.file_type();
        let kind = if file_type.is_symlink() {
            FileKind::Symlink
        } else if file_type.is_dir() {
            FileKind::Dir
        } else if file_type.is_file() {
            FileKind::File
        } else {
            FileKind::Other
        };

        Self {
            kind,
            mode: mode_of(meta),
            len: meta.len(),
        }
    }
}

#[cfg(unix)]
fn mode_of(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn mode_of(meta: &fs::Metadata) -> u32 {
    if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// The set of filesystem operations the engine needs.
#[cfg_attr(test, mockall::automock)]
pub trait FileSystem {
    /// Stat a path without following symlinks.
    fn stat(&self, path: &Path) -> io::Result<FileInfo>;

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Write a file, creating or truncating it, and apply `mode`.
    fn write_file(&self, path: &Path, contents: &[u8], mode: u32) -> io::Result<()>;

    fn mkdir_all(&self, path: &Path) -> io::Result<()>;

    /// Create a new uniquely named directory under `parent`.
    fn mkdir_temp(&self, parent: &Path, prefix: &str) -> io::Result<PathBuf>;

    fn remove(&self, path: &Path) -> io::Result<()>;

    fn remove_all(&self, path: &Path) -> io::Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// The real, OS-backed filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl FileSystem for OsFs {
    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        fs::symlink_metadata(path).map(|m| FileInfo::from_metadata(&m))
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_file(&self, path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
        fs::write(path, contents)?;
        set_mode(path, mode)
    }

    fn mkdir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn mkdir_temp(&self, parent: &Path, prefix: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(parent)?;
        Ok(Builder::new().prefix(prefix).tempdir_in(parent)?.keep())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        if fs::symlink_metadata(path)?.is_dir() {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        }
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        match fs::remove_dir_all(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(mode & 0o200 == 0);
    fs::set_permissions(path, perms)
}

/// Operations that [`ErrorFs`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOp {
    Stat,
    ReadFile,
    WriteFile,
    MkdirAll,
    MkdirTemp,
    Remove,
    RemoveAll,
    Rename,
}

impl fmt::Display for FsOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FsOp::Stat => "stat",
            FsOp::ReadFile => "read_file",
            FsOp::WriteFile => "write_file",
            FsOp::MkdirAll => "mkdir_all",
            FsOp::MkdirTemp => "mkdir_temp",
            FsOp::Remove => "remove",
            FsOp::RemoveAll => "remove_all",
            FsOp::Rename => "rename",
        };
        f.write_str(name)
    }
}

/// A fault-injecting filesystem wrapping another implementation.
///
/// Calls to `op` fail with an error of `kind`; when a path suffix is set only
/// calls whose path ends with it fail. Everything else is delegated.
pub struct ErrorFs<F> {
    inner: F,
    op: FsOp,
    kind: io::ErrorKind,
    path_suffix: Option<PathBuf>,
}

impl<F: FileSystem> ErrorFs<F> {
    pub fn new(inner: F, op: FsOp) -> Self {
        Self {
            inner,
            op,
            kind: io::ErrorKind::PermissionDenied,
            path_suffix: None,
        }
    }

    pub fn with_kind(mut self, kind: io::ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn only_for(mut self, path_suffix: impl Into<PathBuf>) -> Self {
        self.path_suffix = Some(path_suffix.into());
        self
    }

    fn check(&self, op: FsOp, path: &Path) -> io::Result<()> {
        if op != self.op {
            return Ok(());
        }
        if let Some(suffix) = &self.path_suffix {
            if !path.ends_with(suffix) {
                return Ok(());
            }
        }
        Err(io::Error::new(self.kind, format!("injected {} failure", op)))
    }
}

impl<F: FileSystem> FileSystem for ErrorFs<F> {
    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        self.check(FsOp::Stat, path)?;
        self.inner.stat(path)
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.check(FsOp::ReadFile, path)?;
        self.inner.read_file(path)
    }

    fn write_file(&self, path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
        self.check(FsOp::WriteFile, path)?;
        self.inner.write_file(path, contents, mode)
    }

    fn mkdir_all(&self, path: &Path) -> io::Result<()> {
        self.check(FsOp::MkdirAll, path)?;
        self.inner.mkdir_all(path)
    }

    fn mkdir_temp(&self, parent: &Path, prefix: &str) -> io::Result<PathBuf> {
        self.check(FsOp::MkdirTemp, parent)?;
        self.inner.mkdir_temp(parent, prefix)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.check(FsOp::Remove, path)?;
        self.inner.remove(path)
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        self.check(FsOp::RemoveAll, path)?;
        self.inner.remove_all(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.check(FsOp::Rename, from)?;
        self.inner.rename(from, to)
    }
}

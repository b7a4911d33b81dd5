//! Filesystem failures that remember the operation and path involved.
//!
//! `std::io::Error` drops the path it failed on; the helpers at the bottom of
//! this module wrap the common `std::fs` calls so the path survives.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// An operation on a single path failed
#[derive(Debug, thiserror::Error)]
#[error("{op} {}: {source}", path.display())]
pub struct PathError {
    pub op: String,
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl PathError {
    pub fn new(op: impl Into<String>, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            op: op.into(),
            path: path.into(),
            source,
        }
    }
}

/// An operation on a pair of paths (link, rename) failed
#[derive(Debug, thiserror::Error)]
#[error("{op} {} {}: {source}", old.display(), new.display())]
pub struct LinkError {
    pub op: String,
    pub old: PathBuf,
    pub new: PathBuf,
    #[source]
    pub source: io::Error,
}

impl LinkError {
    pub fn new(
        op: impl Into<String>,
        old: impl Into<PathBuf>,
        new: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        Self {
            op: op.into(),
            old: old.into(),
            new: new.into(),
            source,
        }
    }
}

/// A raw system call failed
#[derive(Debug, thiserror::Error)]
#[error("{syscall}: {source}")]
pub struct SyscallError {
    pub syscall: String,
    #[source]
    pub source: io::Error,
}

impl SyscallError {
    pub fn new(syscall: impl Into<String>, source: io::Error) -> Self {
        Self {
            syscall: syscall.into(),
            source,
        }
    }

    /// Captures the calling thread's last OS error
    pub fn last_os_error(syscall: impl Into<String>) -> Self {
        Self::new(syscall, io::Error::last_os_error())
    }
}

pub fn open(path: impl AsRef<Path>) -> Result<fs::File, PathError> {
    let path = path.as_ref();
    fs::File::open(path).map_err(|e| PathError::new("open", path, e))
}

pub fn read_to_string(path: impl AsRef<Path>) -> Result<String, PathError> {
    let path = path.as_ref();
    fs::read_to_string(path).map_err(|e| PathError::new("read", path, e))
}

pub fn write(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<(), PathError> {
    let path = path.as_ref();
    fs::write(path, contents).map_err(|e| PathError::new("write", path, e))
}

pub fn remove_file(path: impl AsRef<Path>) -> Result<(), PathError> {
    let path = path.as_ref();
    fs::remove_file(path).map_err(|e| PathError::new("remove", path, e))
}

pub fn rename(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<(), LinkError> {
    let (from, to) = (from.as_ref(), to.as_ref());
    fs::rename(from, to).map_err(|e| LinkError::new("rename", from, to, e))
}

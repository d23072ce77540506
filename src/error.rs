//! Error taxonomy shared by traversal, organize and undo.
//!
//! Only `RootUnavailable` (and `InvalidPattern`, which fails before any I/O)
//! ends a directory-wide command. `EntryUnreadable` and `MutationFailed` are
//! collected or reported per entry while the batch keeps going.

use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// The traversal root could not be opened or is not a directory
    #[error("cannot open {}: {source}", .path.display())]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A single entry could not be stat'd or read mid-walk
    #[error("cannot read {}: {source}", .path.display())]
    EntryUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A move/create/delete failed during organize, undo or a file command
    #[error("{operation} failed for {}: {source}", .path.display())]
    MutationFailed {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid name pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A worker task panicked or was aborted
    #[error("worker task failed: {0}")]
    TaskFailed(String),
}

impl FsError {
    pub fn root_unavailable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FsError::RootUnavailable {
            path: path.into(),
            source,
        }
    }

    pub fn entry_unreadable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FsError::EntryUnreadable {
            path: path.into(),
            source,
        }
    }

    pub fn mutation_failed(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        FsError::MutationFailed {
            operation,
            path: path.into(),
            source,
        }
    }

    pub fn invalid_pattern(pattern: &str, reason: impl Into<String>) -> Self {
        FsError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }

    /// Convert a walkdir error, keeping the offending path when walkdir knows it
    pub fn from_walkdir(err: walkdir::Error, fallback: &Path) -> Self {
        let path = err
            .path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| fallback.to_path_buf());
        let source = err
            .into_io_error()
            .unwrap_or_else(|| io::Error::other("filesystem loop detected"));
        FsError::EntryUnreadable { path, source }
    }

    /// Path the error is about, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            FsError::RootUnavailable { path, .. }
            | FsError::EntryUnreadable { path, .. }
            | FsError::MutationFailed { path, .. } => Some(path),
            FsError::InvalidPattern { .. } | FsError::TaskFailed(_) => None,
        }
    }

    /// Underlying io error kind, if the failure came from the OS
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            FsError::RootUnavailable { source, .. }
            | FsError::EntryUnreadable { source, .. }
            | FsError::MutationFailed { source, .. } => Some(source.kind()),
            FsError::InvalidPattern { .. } | FsError::TaskFailed(_) => None,
        }
    }
}

impl From<FsError> for String {
    fn from(err: FsError) -> Self {
        err.to_string()
    }
}

//! Error types for storage backends and table-relative I/O.

use std::{error::Error, fmt, io};

use snafu::{Backtrace, prelude::*};

/// Raw failure reported by a storage backend.
///
/// [`StorageError`] wraps it together with the path being accessed.
#[derive(Debug)]
pub enum BackendError {
    /// Local filesystem failure.
    Local(io::Error),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Local(e) => write!(f, "local I/O error: {e}"),
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BackendError::Local(e) => Some(e),
        }
    }
}

/// Failures of table-relative reads, writes and listings.
///
/// `NotFound` and `AlreadyExists` are split out because the commit path
/// relies on them: a missing `CURRENT` means an empty log, and an existing
/// commit file means another writer won the version.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    /// Nothing exists at `path`.
    #[snafu(display("Path not found: {path}"))]
    NotFound {
        /// Table-relative or absolute path, as accessed.
        path: String,
        /// Backend failure.
        source: BackendError,
        /// Captured backtrace.
        backtrace: Backtrace,
    },

    /// A create-new write found `path` already present.
    #[snafu(display("Path already exists: {path}"))]
    AlreadyExists {
        /// Path that was to be created.
        path: String,
        /// Backend failure.
        source: BackendError,
        /// Captured backtrace.
        backtrace: Backtrace,
    },

    /// Any other I/O failure.
    #[snafu(display("I/O error at {path}: {source}"))]
    OtherIo {
        /// Path being accessed.
        path: String,
        /// Backend failure.
        source: BackendError,
        /// Captured backtrace.
        backtrace: Backtrace,
    },
}

impl StorageError {
    /// Path the failing operation was working on.
    pub fn path(&self) -> &str {
        match self {
            StorageError::NotFound { path, .. }
            | StorageError::AlreadyExists { path, .. }
            | StorageError::OtherIo { path, .. } => path,
        }
    }
}

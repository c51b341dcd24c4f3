//! Append-only metadata log and table state.
//!
//! This module implements the log that makes snapshot publication atomic:
//!
//! - A simple append-only commit log stored as JSON files under a
//!   `_snapshot_log/` directory (for example, `_snapshot_log/0000000001.json`).
//! - A `CURRENT` pointer that tracks the latest committed log version.
//! - [`LogAction`] values describing table creation, property updates,
//!   snapshot registration, and moves of the current-snapshot pointer.
//! - An optimistic concurrency model based on version guards, so that
//!   commits fail cleanly with a conflict error when the expected
//!   version does not match the current version.
//! - A [`TableState`] representation materialized from the log.
//!
//! The log never mutates existing files. Manifests and manifest lists are
//! not stored here; a snapshot in the log only points at its manifest list.
//!
//! ## On-disk layout (high level)
//!
//! ```text
//! table_root/
//!   _snapshot_log/
//!     CURRENT                  # latest committed version (e.g. "3\n")
//!     0000000001.json          # CreateTable
//!     0000000002.json          # AddSnapshot + SetCurrentSnapshot
//!     0000000003.json          # SetCurrentSnapshot (rollback)
//!   metadata/                  # manifest lists and manifests
//! ```
//!
//! Each `*.json` file contains a single [`Commit`] value, for example:
//!
//! ```json
//! {
//!   "version": 3,
//!   "base_version": 2,
//!   "timestamp": "2025-01-01T00:00:00Z",
//!   "actions": [
//!     {
//!       "SetCurrentSnapshot": {
//!         "snapshot_id": 1,
//!         "parent_id": null,
//!         "made_current_at": "2025-01-01T00:00:00Z"
//!       }
//!     }
//!   ]
//! }
//! ```
pub mod actions;
pub mod log_store;
pub mod table_state;

pub use actions::{Commit, LogAction};
pub use log_store::TransactionLogStore;
pub use table_state::TableState;

use snafu::{Backtrace, prelude::*};

use crate::storage::StorageError;

/// Errors that can occur while reading or writing the commit log.
#[derive(Debug, Snafu)]
pub enum CommitError {
    /// The caller's expected_version does not match the CURRENT pointer.
    #[snafu(display("Commit conflict: expected version {expected}, but CURRENT is {found}"))]
    Conflict {
        /// The version the caller expected to be current.
        expected: u64,
        /// The actual current version found.
        found: u64,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },

    /// Underlying storage error while working with the log or CURRENT file.
    ///
    /// Backtraces are delegated to the inner StorageError.
    #[snafu(display("Storage error while accessing commit log: {source}"))]
    Storage {
        /// Underlying storage error returned by the storage backend.
        #[snafu(backtrace)]
        source: StorageError,
    },

    /// The log or CURRENT file is in an unexpected / malformed state.
    #[snafu(display("Corrupt log state: {msg}"))]
    CorruptState {
        /// A description of the corrupt state.
        msg: String,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },
}

impl CommitError {
    /// True when another writer got to the next log version first, either by
    /// moving CURRENT or by creating the commit file.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            CommitError::Conflict { .. }
                | CommitError::Storage {
                    source: StorageError::AlreadyExists { .. }
                }
        )
    }
}

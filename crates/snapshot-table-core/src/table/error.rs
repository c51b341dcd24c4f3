//! Error types and SNAFU context selectors for the table API.
//!
//! This module centralizes the `TableError` enum used by the public API and
//! exposes context selectors (via `#[snafu(visibility(pub(crate)))]`) so
//! sibling modules can attach error context without re-exporting everything
//! at the crate root.

use arrow::error::ArrowError;
use chrono::{DateTime, Utc};
use snafu::prelude::*;

use crate::{
    expressions::ExpressionError,
    helpers::parquet::ParquetImportError,
    metadata::SnapshotId,
    storage::StorageError,
    transaction_log::CommitError,
};

/// Errors from table operations.
///
/// Callers can retry after [`TableError::CommitConflict`]; every other
/// variant reports a problem a retry will not fix.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TableError {
    /// Another commit landed between the caller's read and this commit.
    ///
    /// `expected` and `found` are equal when that commit did not move the
    /// current snapshot (a property update, for example).
    #[snafu(display(
        "Commit conflict: the table changed after it was read at snapshot {expected:?} \
         (current snapshot is now {found:?}); refresh and retry"
    ))]
    CommitConflict {
        /// Snapshot the caller based the change on.
        expected: Option<SnapshotId>,
        /// Snapshot found to be current when committing.
        found: Option<SnapshotId>,
    },

    /// A precondition of the requested change does not hold.
    #[snafu(display("Validation failed: {message}"))]
    Validation {
        /// Human-readable reason.
        message: String,
    },

    /// The requested snapshot id is not known to the table.
    #[snafu(display("Cannot find snapshot with ID {snapshot_id}"))]
    SnapshotNotFound {
        /// Missing id.
        snapshot_id: SnapshotId,
    },

    /// The metadata table name is not recognized.
    #[snafu(display("Unknown metadata table {name:?}"))]
    UnknownMetadataTable {
        /// Name as given.
        name: String,
    },

    /// No snapshot was current at the requested time.
    #[snafu(display("No snapshot was current at {timestamp}"))]
    NoSnapshotAsOf {
        /// Requested time.
        timestamp: DateTime<Utc>,
    },

    /// Attempting to open a table that has no commits at all.
    #[snafu(display("Cannot open table with no commits (CURRENT version is 0)"))]
    EmptyTable,

    /// Attempt to create a table where commits already exist.
    #[snafu(display("Table already exists; current transaction log version is {current_version}"))]
    AlreadyExists {
        /// Current transaction log version.
        current_version: u64,
    },

    /// Any error coming from the transaction log / commit machinery.
    #[snafu(display("Transaction log error: {source}"))]
    TransactionLog {
        /// Underlying transaction log error.
        #[snafu(source, backtrace)]
        source: CommitError,
    },

    /// Storage error while reading or writing manifests and manifest lists.
    #[snafu(display("Storage error while accessing table metadata: {source}"))]
    Storage {
        /// Underlying storage error.
        #[snafu(source, backtrace)]
        source: StorageError,
    },

    /// A manifest or manifest list could not be decoded or encoded.
    #[snafu(display("Corrupt metadata file {path}: {source}"))]
    CorruptMetadata {
        /// File that failed.
        path: String,
        /// JSON error.
        source: serde_json::Error,
    },

    /// A row filter could not be bound to the table schema.
    #[snafu(display("Invalid row filter: {source}"))]
    Expression {
        /// Binding error.
        source: ExpressionError,
    },

    /// Building an Arrow record batch for a metadata table failed.
    #[snafu(display("Arrow error while building metadata table: {source}"))]
    Arrow {
        /// Underlying Arrow error.
        source: ArrowError,
    },

    /// Reading a Parquet file during import failed.
    #[snafu(display("Parquet import error: {source}"))]
    Import {
        /// Underlying import error.
        #[snafu(source, backtrace)]
        source: ParquetImportError,
    },
}

impl TableError {
    /// True only for [`TableError::CommitConflict`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, TableError::CommitConflict { .. })
    }

    /// True for the not-found family (unknown snapshot, metadata table, or
    /// time-travel target).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TableError::SnapshotNotFound { .. }
                | TableError::UnknownMetadataTable { .. }
                | TableError::NoSnapshotAsOf { .. }
        )
    }
}

/// Shorthand for a [`TableError::Validation`] result.
pub(crate) fn validation<T>(message: impl Into<String>) -> Result<T, TableError> {
    ValidationSnafu {
        message: message.into(),
    }
    .fail()
}

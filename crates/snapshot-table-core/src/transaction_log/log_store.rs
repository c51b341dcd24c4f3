//! Reading and writing `_snapshot_log/`.
//!
//! A missing `CURRENT` file is version `0`. Commit files are created with
//! create-new semantics, so a version can be written by one writer only.
use std::path::Path;

use chrono::Utc;
use log::{debug, info, warn};
use snafu::{Backtrace, prelude::*};

use crate::storage::{self, StorageError, TableLocation, layout};
use crate::transaction_log::actions::{Commit, LogAction};
use crate::transaction_log::*;

/// Commit log of one table.
///
/// Files:
///   <root>/_snapshot_log/0000000001.json
///   <root>/_snapshot_log/0000000002.json
///   <root>/_snapshot_log/CURRENT
#[derive(Debug, Clone)]
pub struct TransactionLogStore {
    location: TableLocation,
}

impl TransactionLogStore {
    /// Log store for the table at `location`.
    pub fn new(location: TableLocation) -> Self {
        Self { location }
    }

    /// Table root.
    pub fn location(&self) -> &TableLocation {
        &self.location
    }

    async fn read_to_string_rel(&self, rel: &Path) -> Result<String, CommitError> {
        storage::read_to_string(self.location.as_ref(), rel)
            .await
            .context(StorageSnafu)
    }

    /// Read commit `version`. Unparseable JSON is `CorruptState`.
    pub async fn load_commit(&self, version: u64) -> Result<Commit, CommitError> {
        let rel = layout::commit_rel_path(version);
        let json = self.read_to_string_rel(&rel).await?;

        serde_json::from_str(&json).map_err(|e| CommitError::CorruptState {
            msg: format!("failed to parse commit {version}: {e}"),
            backtrace: Backtrace::capture(),
        })
    }

    /// Latest committed version according to `CURRENT`, or `0` when the
    /// pointer file does not exist yet.
    pub async fn load_current_version(&self) -> Result<u64, CommitError> {
        let rel = layout::current_rel_path();

        let contents = match storage::read_to_string(self.location.as_ref(), &rel).await {
            Ok(s) => s,
            Err(StorageError::NotFound { .. }) => return Ok(0),
            Err(source) => return Err(CommitError::Storage { source }),
        };

        let trimmed = contents.trim();
        ensure!(
            !trimmed.is_empty(),
            CorruptStateSnafu {
                msg: format!("CURRENT has empty content at {rel:?}"),
            }
        );

        trimmed.parse::<u64>().map_err(|e| CommitError::CorruptState {
            msg: format!("CURRENT has invalid content {trimmed:?}: {e}"),
            backtrace: Backtrace::capture(),
        })
    }

    /// Write `actions` as version `expected + 1` and advance `CURRENT`.
    ///
    /// Returns `Conflict` when `CURRENT` is not `expected`, or when commit
    /// `expected + 1` already exists. In the second case `CURRENT` is first
    /// moved onto that commit, so a caller that reloads and retries
    /// proceeds even if the other writer never finished.
    pub async fn commit_with_expected_version(
        &self,
        expected: u64,
        actions: Vec<LogAction>,
    ) -> Result<u64, CommitError> {
        let current = self.load_current_version().await?;
        if current != expected {
            return ConflictSnafu {
                expected,
                found: current,
            }
            .fail();
        }

        let version = expected.checked_add(1).context(CorruptStateSnafu {
            msg: format!("log version {expected} cannot be advanced"),
        })?;

        let commit = Commit {
            version,
            base_version: expected,
            timestamp: Utc::now(),
            actions,
        };

        let json = serde_json::to_vec(&commit).map_err(|e| CommitError::CorruptState {
            msg: format!("failed to serialize commit {version}: {e}"),
            backtrace: Backtrace::capture(),
        })?;

        let commit_rel = layout::commit_rel_path(version);
        match storage::write_new(self.location.as_ref(), &commit_rel, &json).await {
            Ok(()) => {}
            Err(e @ StorageError::AlreadyExists { .. }) => {
                warn!("{} already exists at log version {expected}", e.path());
                self.publish_unreferenced_commit(expected, version).await?;
                return ConflictSnafu {
                    expected,
                    found: version,
                }
                .fail();
            }
            Err(source) => return Err(CommitError::Storage { source }),
        }

        self.write_current(version).await?;

        debug!(
            "committed log version {version} ({} actions)",
            commit.actions.len()
        );
        Ok(version)
    }

    async fn write_current(&self, version: u64) -> Result<(), CommitError> {
        let contents = format!("{version}\n");
        storage::write_atomic(
            self.location.as_ref(),
            &layout::current_rel_path(),
            contents.as_bytes(),
        )
        .await
        .context(StorageSnafu)
    }

    /// Point `CURRENT` at commit `version` when the file exists but
    /// `CURRENT` still names its base.
    ///
    /// That state is left by a writer that stopped between creating the
    /// commit file and advancing `CURRENT`, or by one that is about to
    /// advance it; both end with `CURRENT == version`. A commit file that
    /// does not continue from `expected` is `CorruptState`.
    async fn publish_unreferenced_commit(
        &self,
        expected: u64,
        version: u64,
    ) -> Result<(), CommitError> {
        let existing = self.load_commit(version).await?;
        ensure!(
            existing.version == version && existing.base_version == expected,
            CorruptStateSnafu {
                msg: format!(
                    "commit {version} records version {} based on {}, expected base {expected}",
                    existing.version, existing.base_version
                ),
            }
        );

        if self.load_current_version().await? == expected {
            info!("advancing CURRENT to unreferenced commit {version}");
            self.write_current(version).await?;
        }
        Ok(())
    }
}

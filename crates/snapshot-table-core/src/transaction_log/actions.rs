//! Log actions and commit payload definitions.
//!
//! Each commit file stores a [`Commit`] containing ordered [`LogAction`]
//! values. Snapshots and manifests are written to `metadata/` before a commit
//! references them; the log only records which snapshots exist and which one
//! is current.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metadata::{Snapshot, SnapshotId, TableMeta};

/// An action recorded in a commit.
///
/// Actions are applied in order when table state is rebuilt.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogAction {
    /// Bootstrap the table: schema, partition spec, initial properties.
    CreateTable(TableMeta),

    /// Set and remove table properties.
    UpdateProperties {
        /// Properties to set or overwrite.
        #[serde(default)]
        set: BTreeMap<String, String>,
        /// Property keys to remove.
        #[serde(default)]
        remove: Vec<String>,
    },

    /// Register a new snapshot. Does not change the current pointer.
    AddSnapshot(Snapshot),

    /// Move the current-snapshot pointer and append a history entry.
    SetCurrentSnapshot {
        /// Snapshot that becomes current.
        snapshot_id: SnapshotId,
        /// Previous current snapshot for commits, `None` for rollbacks.
        #[serde(default)]
        parent_id: Option<SnapshotId>,
        /// When the pointer moved.
        made_current_at: DateTime<Utc>,
    },
}

/// A single, immutable commit in the metadata log.
///
/// Commits are written to files such as `_snapshot_log/0000000001.json`.
/// The version field must match the file name; `base_version` records what
/// the writer believed was the current version when the commit was prepared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Commit {
    /// The version number of this commit (monotonic, starting from 1).
    pub version: u64,

    /// The version that the writer believed was current when preparing this
    /// commit. Used by the OCC layer as a guard.
    pub base_version: u64,

    /// Commit creation timestamp, stored as RFC3339 UTC.
    pub timestamp: DateTime<Utc>,

    /// Ordered list of actions applied by this commit.
    pub actions: Vec<LogAction>,
}

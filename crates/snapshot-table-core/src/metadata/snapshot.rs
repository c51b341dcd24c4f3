//! Snapshots, snapshot ids, and snapshot summaries.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metadata::{DataFile, PartitionValues};

/// Summary key: files added by the snapshot.
pub const ADDED_DATA_FILES: &str = "added-data-files";
/// Summary key: rows added by the snapshot.
pub const ADDED_RECORDS: &str = "added-records";
/// Summary key: files removed by the snapshot.
pub const DELETED_DATA_FILES: &str = "deleted-data-files";
/// Summary key: rows removed by the snapshot.
pub const DELETED_RECORDS: &str = "deleted-records";
/// Summary key: distinct partitions touched by the snapshot.
pub const CHANGED_PARTITION_COUNT: &str = "changed-partition-count";
/// Summary key: live files after the snapshot.
pub const TOTAL_DATA_FILES: &str = "total-data-files";
/// Summary key: live rows after the snapshot.
pub const TOTAL_RECORDS: &str = "total-records";

/// Identifier of a snapshot, unique within a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(pub i64);

impl SnapshotId {
    /// Id handed to the first snapshot of a table.
    pub const FIRST: SnapshotId = SnapshotId(1);

    /// The id following `self`, or `None` on overflow.
    pub fn next(self) -> Option<SnapshotId> {
        self.0.checked_add(1).map(SnapshotId)
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of change a snapshot made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Only adds files.
    Append,
    /// Only removes files.
    Delete,
    /// Adds and removes files, changing table content.
    Overwrite,
    /// Rewrites files without changing table content.
    Replace,
}

impl Operation {
    /// Lowercase name as stored in the snapshots table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Append => "append",
            Operation::Delete => "delete",
            Operation::Overwrite => "overwrite",
            Operation::Replace => "replace",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of table content at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unique id.
    pub snapshot_id: SnapshotId,
    /// Structural parent: the current snapshot when this one was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_snapshot_id: Option<SnapshotId>,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Manifest list path relative to the table root.
    pub manifest_list: String,
    /// Kind of change.
    pub operation: Operation,
    /// String-keyed statistics (see the `*_RECORDS`/`*_FILES` constants).
    #[serde(default)]
    pub summary: BTreeMap<String, String>,
}

/// Compute a snapshot summary from the files a commit added and removed and
/// the live file set it produced.
///
/// Added and deleted counters are omitted when zero; totals and
/// `changed-partition-count` are always present.
pub fn build_summary(
    added: &[DataFile],
    deleted: &[DataFile],
    live_after: &[DataFile],
) -> BTreeMap<String, String> {
    let mut summary = BTreeMap::new();

    let mut put_nonzero = |key: &str, value: u64| {
        if value > 0 {
            summary.insert(key.to_string(), value.to_string());
        }
    };

    put_nonzero(ADDED_DATA_FILES, added.len() as u64);
    put_nonzero(ADDED_RECORDS, added.iter().map(|f| f.record_count).sum());
    put_nonzero(DELETED_DATA_FILES, deleted.len() as u64);
    put_nonzero(DELETED_RECORDS, deleted.iter().map(|f| f.record_count).sum());

    let changed: BTreeSet<&PartitionValues> = added
        .iter()
        .chain(deleted.iter())
        .map(|f| &f.partition)
        .collect();
    summary.insert(
        CHANGED_PARTITION_COUNT.to_string(),
        changed.len().to_string(),
    );

    summary.insert(TOTAL_DATA_FILES.to_string(), live_after.len().to_string());
    let total_records: u64 = live_after.iter().map(|f| f.record_count).sum();
    summary.insert(TOTAL_RECORDS.to_string(), total_records.to_string());

    summary
}

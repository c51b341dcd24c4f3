//! Row types of the metadata tables.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::{
    metadata::{
        DataFile, EntryStatus, FileEntry, HistoryEntry, ManifestFile, Operation,
        PartitionFieldSummary, PartitionValues, Snapshot, SnapshotId,
    },
    metadata_tables::BoundEncoding,
};

/// Row of `entries` and `all_entries`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRow {
    /// Entry status.
    pub status: EntryStatus,
    /// Snapshot that added or deleted the file, inherited ids resolved.
    pub snapshot_id: Option<SnapshotId>,
    /// The file reference.
    pub data_file: DataFile,
}

impl From<FileEntry> for EntryRow {
    fn from(entry: FileEntry) -> Self {
        Self {
            status: entry.status,
            snapshot_id: entry.snapshot_id,
            data_file: entry.data_file,
        }
    }
}

/// Partition field summary as shown in manifest rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSummaryRow {
    /// True when some entry has a null value for the field.
    pub contains_null: bool,
    /// Encoded lower bound.
    pub lower_bound: Option<String>,
    /// Encoded upper bound.
    pub upper_bound: Option<String>,
}

impl PartitionSummaryRow {
    pub(crate) fn encode(summary: &PartitionFieldSummary, encoding: &dyn BoundEncoding) -> Self {
        Self {
            contains_null: summary.contains_null,
            lower_bound: summary.lower_bound.as_ref().map(|d| encoding.encode(d)),
            upper_bound: summary.upper_bound.as_ref().map(|d| encoding.encode(d)),
        }
    }
}

/// Row of `manifests` and `all_manifests`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRow {
    /// Manifest path relative to the table root.
    pub path: String,
    /// Manifest size in bytes.
    pub length: u64,
    /// Partition spec the manifest was written with.
    pub partition_spec_id: i32,
    /// Snapshot that added the manifest.
    pub added_snapshot_id: SnapshotId,
    /// Entries with status `ADDED`.
    pub added_data_files_count: u32,
    /// Entries with status `EXISTING`.
    pub existing_data_files_count: u32,
    /// Entries with status `DELETED`.
    pub deleted_data_files_count: u32,
    /// One summary per partition field.
    pub partition_summaries: Vec<PartitionSummaryRow>,
}

impl ManifestRow {
    pub(crate) fn encode(file: &ManifestFile, encoding: &dyn BoundEncoding) -> Self {
        Self {
            path: file.path.clone(),
            length: file.length,
            partition_spec_id: file.partition_spec_id,
            added_snapshot_id: file.added_snapshot_id,
            added_data_files_count: file.added_data_files_count,
            existing_data_files_count: file.existing_data_files_count,
            deleted_data_files_count: file.deleted_data_files_count,
            partition_summaries: file
                .partitions
                .iter()
                .map(|s| PartitionSummaryRow::encode(s, encoding))
                .collect(),
        }
    }
}

/// Row of `history`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    /// When the snapshot became current.
    pub made_current_at: DateTime<Utc>,
    /// Snapshot that became current.
    pub snapshot_id: SnapshotId,
    /// Snapshot current before this one was made current by a commit.
    pub parent_id: Option<SnapshotId>,
    /// Whether the snapshot is an ancestor of the present current snapshot.
    pub is_current_ancestor: bool,
}

impl From<&HistoryEntry> for HistoryRow {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            made_current_at: entry.made_current_at,
            snapshot_id: entry.snapshot_id,
            parent_id: entry.parent_id,
            is_current_ancestor: entry.is_current_ancestor,
        }
    }
}

/// Row of `snapshots`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRow {
    /// Commit time.
    pub committed_at: DateTime<Utc>,
    /// Snapshot id.
    pub snapshot_id: SnapshotId,
    /// Structural parent.
    pub parent_id: Option<SnapshotId>,
    /// Operation that produced the snapshot.
    pub operation: Operation,
    /// Manifest list path relative to the table root.
    pub manifest_list: String,
    /// Snapshot summary.
    pub summary: BTreeMap<String, String>,
}

impl From<&Snapshot> for SnapshotRow {
    fn from(s: &Snapshot) -> Self {
        Self {
            committed_at: s.timestamp,
            snapshot_id: s.snapshot_id,
            parent_id: s.parent_snapshot_id,
            operation: s.operation,
            manifest_list: s.manifest_list.clone(),
            summary: s.summary.clone(),
        }
    }
}

/// Row of `partitions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRow {
    /// Partition tuple; empty for unpartitioned tables.
    pub partition: PartitionValues,
    /// Sum of record counts of the live files in the partition.
    pub record_count: u64,
    /// Number of live files in the partition.
    pub file_count: u64,
}

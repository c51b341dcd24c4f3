//! Data file descriptors and manifest entries.
//!
//! A [`DataFile`] describes one immutable file of table data: where it lives,
//! which partition it belongs to, and the column metrics used by row-filter
//! evaluation. A [`FileEntry`] wraps a data file with its lifecycle status
//! inside one manifest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::metadata::{Datum, PartitionValues, SnapshotId};

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Apache Parquet.
    #[default]
    Parquet,
}

impl FileFormat {
    /// Lowercase name as shown in metadata tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Parquet => "parquet",
        }
    }
}

/// Status of a file within one manifest.
///
/// The numeric codes are the ones exposed by the `entries` metadata table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    /// Carried forward from an earlier snapshot.
    Existing,
    /// Added by the snapshot that wrote the manifest.
    Added,
    /// Removed by the snapshot that wrote the manifest.
    Deleted,
}

impl EntryStatus {
    /// Numeric status code (`0` existing, `1` added, `2` deleted).
    pub fn code(&self) -> i32 {
        match self {
            EntryStatus::Existing => 0,
            EntryStatus::Added => 1,
            EntryStatus::Deleted => 2,
        }
    }

    /// True for `Existing` and `Added`.
    pub fn is_live(&self) -> bool {
        !matches!(self, EntryStatus::Deleted)
    }
}

/// Immutable descriptor of one data file.
///
/// All column metrics are keyed by schema field id. Missing keys mean the
/// metric is unknown for that column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFile {
    /// Path of the file, relative to the table root or absolute.
    pub file_path: String,
    /// On-disk format.
    #[serde(default)]
    pub file_format: FileFormat,
    /// Partition tuple.
    #[serde(default)]
    pub partition: PartitionValues,
    /// Number of rows in the file.
    pub record_count: u64,
    /// File size in bytes.
    pub file_size_in_bytes: u64,
    /// Bytes per column.
    #[serde(default)]
    pub column_sizes: BTreeMap<i32, u64>,
    /// Values per column, nulls included.
    #[serde(default)]
    pub value_counts: BTreeMap<i32, u64>,
    /// Nulls per column.
    #[serde(default)]
    pub null_value_counts: BTreeMap<i32, u64>,
    /// Lower bound per column.
    #[serde(default)]
    pub lower_bounds: BTreeMap<i32, Datum>,
    /// Upper bound per column.
    #[serde(default)]
    pub upper_bounds: BTreeMap<i32, Datum>,
}

impl DataFile {
    /// Build a Parquet data file descriptor with no column metrics.
    pub fn new(
        file_path: impl Into<String>,
        partition: PartitionValues,
        record_count: u64,
        file_size_in_bytes: u64,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            file_format: FileFormat::Parquet,
            partition,
            record_count,
            file_size_in_bytes,
            column_sizes: BTreeMap::new(),
            value_counts: BTreeMap::new(),
            null_value_counts: BTreeMap::new(),
            lower_bounds: BTreeMap::new(),
            upper_bounds: BTreeMap::new(),
        }
    }

    /// Record value/null counts and bounds for one column.
    pub fn with_column_metrics(
        mut self,
        field_id: i32,
        value_count: u64,
        null_count: u64,
        bounds: Option<(Datum, Datum)>,
    ) -> Self {
        self.value_counts.insert(field_id, value_count);
        self.null_value_counts.insert(field_id, null_count);
        if let Some((lower, upper)) = bounds {
            self.lower_bounds.insert(field_id, lower);
            self.upper_bounds.insert(field_id, upper);
        }
        self
    }
}

/// One record of a manifest: a data file plus its status in that manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Lifecycle status in this manifest.
    pub status: EntryStatus,
    /// Snapshot that added or deleted the file.
    ///
    /// `None` only in staged manifests, where the id is inherited from the
    /// committing snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<SnapshotId>,
    /// The data file itself.
    pub data_file: DataFile,
}

impl FileEntry {
    /// An `ADDED` entry stamped with `snapshot_id`.
    pub fn added(snapshot_id: Option<SnapshotId>, data_file: DataFile) -> Self {
        Self {
            status: EntryStatus::Added,
            snapshot_id,
            data_file,
        }
    }

    /// Resolve a missing snapshot id to `inherited`.
    pub fn with_inherited_id(mut self, inherited: SnapshotId) -> Self {
        if self.snapshot_id.is_none() {
            self.snapshot_id = Some(inherited);
        }
        self
    }
}

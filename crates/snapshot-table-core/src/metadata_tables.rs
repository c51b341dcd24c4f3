//! Read-only metadata tables derived from the snapshot graph.
//!
//! [`MetadataTables`] projects snapshots, manifest lists, manifests and file
//! entries into rows:
//!
//! | Table            | Rows                                                  |
//! |------------------|-------------------------------------------------------|
//! | `entries`        | every entry of one snapshot's manifests               |
//! | `all_entries`    | `entries` of every snapshot, concatenated             |
//! | `files`          | live data files of one snapshot                       |
//! | `all_data_files` | `files` of every snapshot, concatenated               |
//! | `manifests`      | manifests of one snapshot with partition summaries    |
//! | `all_manifests`  | `manifests` of every snapshot, concatenated           |
//! | `history`        | the history log in append order                       |
//! | `snapshots`      | one row per snapshot with its structural parent       |
//! | `partitions`     | live files of one snapshot grouped by partition value |
//!
//! Single-snapshot tables take an optional snapshot id for time travel; the
//! default is the current snapshot. The snapshot is resolved once at the
//! start of a read, and a table with no snapshot yields no rows. Rows come
//! from the handle's cached state; call [`crate::table::SnapshotTable::refresh`]
//! to see newer commits.
//!
//! [`MetadataTables::scan`] renders any table as an Arrow `RecordBatch`.

mod projector;
mod record_batch;
mod rows;

use std::{fmt, str::FromStr};

use snafu::OptionExt;

pub use projector::MetadataTables;
pub use rows::{EntryRow, HistoryRow, ManifestRow, PartitionRow, PartitionSummaryRow, SnapshotRow};

use crate::{
    metadata::Datum,
    table::{TableError, error::UnknownMetadataTableSnafu},
};

/// Converts partition bounds to the strings shown in manifest rows.
///
/// The default renders the value's display form (`1`, `true`, `abc`).
pub trait BoundEncoding: Send + Sync {
    /// Encode one bound.
    fn encode(&self, value: &Datum) -> String {
        value.to_string()
    }
}

/// [`BoundEncoding`] using the human-readable display form.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayBounds;

impl BoundEncoding for DisplayBounds {}

/// The metadata tables a table exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataTableKind {
    /// Entries of one snapshot.
    Entries,
    /// Entries of every snapshot.
    AllEntries,
    /// Live files of one snapshot.
    Files,
    /// Live files of every snapshot.
    AllDataFiles,
    /// Manifests of one snapshot.
    Manifests,
    /// Manifests of every snapshot.
    AllManifests,
    /// History log.
    History,
    /// Snapshots.
    Snapshots,
    /// Per-partition aggregates of one snapshot.
    Partitions,
}

impl MetadataTableKind {
    /// Every kind, in documentation order.
    pub const ALL: [MetadataTableKind; 9] = [
        MetadataTableKind::Entries,
        MetadataTableKind::AllEntries,
        MetadataTableKind::Files,
        MetadataTableKind::AllDataFiles,
        MetadataTableKind::Manifests,
        MetadataTableKind::AllManifests,
        MetadataTableKind::History,
        MetadataTableKind::Snapshots,
        MetadataTableKind::Partitions,
    ];

    /// Table name as used in identifiers such as `db.tbl.files`.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataTableKind::Entries => "entries",
            MetadataTableKind::AllEntries => "all_entries",
            MetadataTableKind::Files => "files",
            MetadataTableKind::AllDataFiles => "all_data_files",
            MetadataTableKind::Manifests => "manifests",
            MetadataTableKind::AllManifests => "all_manifests",
            MetadataTableKind::History => "history",
            MetadataTableKind::Snapshots => "snapshots",
            MetadataTableKind::Partitions => "partitions",
        }
    }

    /// True for tables that read a single snapshot and honor time travel.
    pub fn supports_time_travel(&self) -> bool {
        matches!(
            self,
            MetadataTableKind::Entries
                | MetadataTableKind::Files
                | MetadataTableKind::Manifests
                | MetadataTableKind::Partitions
        )
    }
}

impl fmt::Display for MetadataTableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetadataTableKind {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        MetadataTableKind::ALL
            .into_iter()
            .find(|k| k.as_str() == lowered)
            .context(UnknownMetadataTableSnafu { name: s })
    }
}

//! Manifests and their summary records.
//!
//! A [`Manifest`] is an immutable JSON document listing [`FileEntry`] values.
//! The manifest list of a snapshot refers to each manifest through a
//! [`ManifestFile`], which carries counts and per-partition-field summaries
//! folded from the entries when the record is produced.

use serde::{Deserialize, Serialize};

use crate::metadata::{Datum, EntryStatus, FileEntry, PartitionSpec, SnapshotId};

/// Immutable list of file entries written under `metadata/manifests/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Partition spec the entries were written with.
    pub spec_id: i32,
    /// Entries in write order.
    pub entries: Vec<FileEntry>,
}

impl Manifest {
    /// Build a manifest for `spec_id`.
    pub fn new(spec_id: i32, entries: Vec<FileEntry>) -> Self {
        Self { spec_id, entries }
    }

    /// Entries whose status is `ADDED` or `EXISTING`.
    pub fn live_entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.iter().filter(|e| e.status.is_live())
    }

    /// True when no entry is live.
    pub fn has_no_live_entries(&self) -> bool {
        self.live_entries().next().is_none()
    }

    /// Resolve missing entry snapshot ids to `inherited`.
    pub fn with_inherited_ids(self, inherited: SnapshotId) -> Self {
        Self {
            spec_id: self.spec_id,
            entries: self
                .entries
                .into_iter()
                .map(|e| e.with_inherited_id(inherited))
                .collect(),
        }
    }
}

/// Summary of one partition field across a manifest's entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PartitionFieldSummary {
    /// True when at least one entry has a null value for this field.
    pub contains_null: bool,
    /// Smallest non-null value.
    #[serde(default)]
    pub lower_bound: Option<Datum>,
    /// Largest non-null value.
    #[serde(default)]
    pub upper_bound: Option<Datum>,
}

impl PartitionFieldSummary {
    fn update(&mut self, value: Option<&Datum>) {
        let Some(v) = value else {
            self.contains_null = true;
            return;
        };

        if self.lower_bound.as_ref().is_none_or(|lo| v < lo) {
            self.lower_bound = Some(v.clone());
        }
        if self.upper_bound.as_ref().is_none_or(|hi| v > hi) {
            self.upper_bound = Some(v.clone());
        }
    }
}

/// Record of a manifest inside a manifest list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    /// Manifest path relative to the table root.
    pub path: String,
    /// Manifest size in bytes.
    pub length: u64,
    /// Partition spec id of the manifest.
    pub partition_spec_id: i32,
    /// Snapshot that added the manifest; inherited by entries without an id.
    pub added_snapshot_id: SnapshotId,
    /// Number of `ADDED` entries.
    pub added_data_files_count: u32,
    /// Number of `EXISTING` entries.
    pub existing_data_files_count: u32,
    /// Number of `DELETED` entries.
    pub deleted_data_files_count: u32,
    /// Rows in `ADDED` entries.
    pub added_rows_count: u64,
    /// Rows in `EXISTING` entries.
    pub existing_rows_count: u64,
    /// Rows in `DELETED` entries.
    pub deleted_rows_count: u64,
    /// One summary per partition field, in spec order.
    #[serde(default)]
    pub partitions: Vec<PartitionFieldSummary>,
}

impl ManifestFile {
    /// Produce the manifest-list record for `manifest`.
    ///
    /// Counts and partition summaries are always folded from the entries.
    pub fn summarize(
        path: impl Into<String>,
        length: u64,
        manifest: &Manifest,
        spec: &PartitionSpec,
        added_snapshot_id: SnapshotId,
    ) -> Self {
        let mut out = ManifestFile {
            path: path.into(),
            length,
            partition_spec_id: manifest.spec_id,
            added_snapshot_id,
            added_data_files_count: 0,
            existing_data_files_count: 0,
            deleted_data_files_count: 0,
            added_rows_count: 0,
            existing_rows_count: 0,
            deleted_rows_count: 0,
            partitions: vec![PartitionFieldSummary::default(); spec.fields.len()],
        };

        for entry in &manifest.entries {
            let rows = entry.data_file.record_count;
            match entry.status {
                EntryStatus::Added => {
                    out.added_data_files_count += 1;
                    out.added_rows_count += rows;
                }
                EntryStatus::Existing => {
                    out.existing_data_files_count += 1;
                    out.existing_rows_count += rows;
                }
                EntryStatus::Deleted => {
                    out.deleted_data_files_count += 1;
                    out.deleted_rows_count += rows;
                }
            }

            for (idx, summary) in out.partitions.iter_mut().enumerate() {
                summary.update(entry.data_file.partition.get(idx));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        DataFile, PartitionValues, PrimitiveType, SchemaField, TableSchema,
    };

    fn id_spec() -> PartitionSpec {
        let schema = TableSchema::new(vec![
            SchemaField::optional(1, "id", PrimitiveType::Int),
            SchemaField::optional(2, "data", PrimitiveType::String),
        ])
        .expect("schema");
        PartitionSpec::identity(&schema, &["id"]).expect("spec")
    }

    fn file(path: &str, id: Option<i32>, rows: u64) -> DataFile {
        DataFile::new(path, PartitionValues(vec![id.map(Datum::Int)]), rows, 100)
    }

    #[test]
    fn summarize_counts_entries_by_status() {
        let manifest = Manifest::new(
            0,
            vec![
                FileEntry::added(Some(SnapshotId(2)), file("a", Some(1), 10)),
                FileEntry {
                    status: EntryStatus::Existing,
                    snapshot_id: Some(SnapshotId(1)),
                    data_file: file("b", Some(3), 5),
                },
                FileEntry {
                    status: EntryStatus::Deleted,
                    snapshot_id: Some(SnapshotId(2)),
                    data_file: file("c", Some(2), 7),
                },
            ],
        );

        let mf = ManifestFile::summarize("m.json", 123, &manifest, &id_spec(), SnapshotId(2));
        assert_eq!(mf.added_data_files_count, 1);
        assert_eq!(mf.existing_data_files_count, 1);
        assert_eq!(mf.deleted_data_files_count, 1);
        assert_eq!(mf.added_rows_count, 10);
        assert_eq!(mf.existing_rows_count, 5);
        assert_eq!(mf.deleted_rows_count, 7);
        assert_eq!(mf.length, 123);

        assert_eq!(mf.partitions.len(), 1);
        assert!(!mf.partitions[0].contains_null);
        assert_eq!(mf.partitions[0].lower_bound, Some(Datum::Int(1)));
        assert_eq!(mf.partitions[0].upper_bound, Some(Datum::Int(3)));
    }

    #[test]
    fn summarize_tracks_null_partition_values() {
        let manifest = Manifest::new(0, vec![FileEntry::added(None, file("a", None, 1))]);
        let mf = ManifestFile::summarize("m.json", 1, &manifest, &id_spec(), SnapshotId(1));
        assert!(mf.partitions[0].contains_null);
        assert_eq!(mf.partitions[0].lower_bound, None);
    }

    #[test]
    fn unpartitioned_manifest_has_no_summaries() {
        let manifest = Manifest::new(
            0,
            vec![FileEntry::added(
                None,
                DataFile::new("a", PartitionValues::empty(), 1, 1),
            )],
        );
        let mf = ManifestFile::summarize(
            "m.json",
            1,
            &manifest,
            &PartitionSpec::unpartitioned(),
            SnapshotId(1),
        );
        assert!(mf.partitions.is_empty());
    }

    #[test]
    fn inherited_ids_fill_staged_entries() {
        let manifest = Manifest::new(0, vec![FileEntry::added(None, file("a", Some(1), 1))])
            .with_inherited_ids(SnapshotId(4));
        assert_eq!(manifest.entries[0].snapshot_id, Some(SnapshotId(4)));
        assert!(!manifest.has_no_live_entries());
    }
}

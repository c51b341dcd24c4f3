//! Row accessors for the metadata tables.

use std::collections::BTreeMap;

use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use snafu::prelude::*;

use crate::{
    metadata::{DataFile, PartitionValues, Snapshot, SnapshotId},
    metadata_tables::{
        BoundEncoding, DisplayBounds, EntryRow, HistoryRow, ManifestRow, MetadataTableKind,
        PartitionRow, SnapshotRow, record_batch,
    },
    table::{
        SnapshotTable,
        error::{ArrowSnafu, NoSnapshotAsOfSnafu, TableError},
    },
};

/// Read-only view over the metadata tables of a [`SnapshotTable`].
///
/// Obtained from [`SnapshotTable::metadata_tables`].
#[derive(Debug, Clone, Copy)]
pub struct MetadataTables<'a> {
    table: &'a SnapshotTable,
}

impl SnapshotTable {
    /// Metadata tables over the cached state of this handle.
    pub fn metadata_tables(&self) -> MetadataTables<'_> {
        MetadataTables { table: self }
    }

    /// Shorthand for [`MetadataTables::scan`].
    pub async fn scan_metadata_table(
        &self,
        kind: MetadataTableKind,
        snapshot_id: Option<SnapshotId>,
    ) -> Result<RecordBatch, TableError> {
        self.metadata_tables().scan(kind, snapshot_id).await
    }
}

impl<'a> MetadataTables<'a> {
    /// The table being inspected.
    pub fn table(&self) -> &'a SnapshotTable {
        self.table
    }

    /// Resolve an explicit id, or the current snapshot.
    ///
    /// `Ok(None)` means the table has no current snapshot yet.
    fn resolve(&self, snapshot_id: Option<SnapshotId>) -> Result<Option<&'a Snapshot>, TableError> {
        match snapshot_id {
            Some(id) => self.table.snapshot(id).map(Some),
            None => Ok(self.table.current_snapshot()),
        }
    }

    async fn entries_of(&self, snapshot: &Snapshot) -> Result<Vec<EntryRow>, TableError> {
        let manifests = self.table.load_manifests(snapshot).await?;
        Ok(manifests
            .into_iter()
            .flat_map(|(_, manifest)| manifest.entries)
            .map(EntryRow::from)
            .collect())
    }

    async fn live_files_of(&self, snapshot: &Snapshot) -> Result<Vec<DataFile>, TableError> {
        Ok(self
            .entries_of(snapshot)
            .await?
            .into_iter()
            .filter(|row| row.status.is_live())
            .map(|row| row.data_file)
            .collect())
    }

    async fn manifests_of(
        &self,
        snapshot: &Snapshot,
        encoding: &dyn BoundEncoding,
    ) -> Result<Vec<ManifestRow>, TableError> {
        let list = self.table.load_manifest_list(&snapshot.manifest_list).await?;
        Ok(list
            .manifests
            .iter()
            .map(|mf| ManifestRow::encode(mf, encoding))
            .collect())
    }

    /// Every entry in the manifests of one snapshot.
    pub async fn entries(&self, snapshot_id: Option<SnapshotId>) -> Result<Vec<EntryRow>, TableError> {
        match self.resolve(snapshot_id)? {
            Some(snapshot) => self.entries_of(snapshot).await,
            None => Ok(Vec::new()),
        }
    }

    /// `entries` of every snapshot in id order. A manifest shared by several
    /// snapshots is reported once per snapshot.
    pub async fn all_entries(&self) -> Result<Vec<EntryRow>, TableError> {
        let per_snapshot = try_join_all(self.table.snapshots().map(|s| self.entries_of(s))).await?;
        Ok(per_snapshot.into_iter().flatten().collect())
    }

    /// Live data files of one snapshot.
    pub async fn files(&self, snapshot_id: Option<SnapshotId>) -> Result<Vec<DataFile>, TableError> {
        match self.resolve(snapshot_id)? {
            Some(snapshot) => self.live_files_of(snapshot).await,
            None => Ok(Vec::new()),
        }
    }

    /// Live data files of every snapshot, concatenated in snapshot id order.
    pub async fn all_data_files(&self) -> Result<Vec<DataFile>, TableError> {
        let per_snapshot =
            try_join_all(self.table.snapshots().map(|s| self.live_files_of(s))).await?;
        Ok(per_snapshot.into_iter().flatten().collect())
    }

    /// Manifests of one snapshot, bounds in display form.
    pub async fn manifests(
        &self,
        snapshot_id: Option<SnapshotId>,
    ) -> Result<Vec<ManifestRow>, TableError> {
        self.manifests_with_encoding(snapshot_id, &DisplayBounds).await
    }

    /// Manifests of one snapshot, bounds rendered by `encoding`.
    pub async fn manifests_with_encoding(
        &self,
        snapshot_id: Option<SnapshotId>,
        encoding: &dyn BoundEncoding,
    ) -> Result<Vec<ManifestRow>, TableError> {
        match self.resolve(snapshot_id)? {
            Some(snapshot) => self.manifests_of(snapshot, encoding).await,
            None => Ok(Vec::new()),
        }
    }

    /// `manifests` of every snapshot in id order.
    pub async fn all_manifests(&self) -> Result<Vec<ManifestRow>, TableError> {
        let per_snapshot = try_join_all(
            self.table
                .snapshots()
                .map(|s| self.manifests_of(s, &DisplayBounds)),
        )
        .await?;
        Ok(per_snapshot.into_iter().flatten().collect())
    }

    /// The history log in append order.
    pub fn history(&self) -> Vec<HistoryRow> {
        self.table.state().history.iter().map(HistoryRow::from).collect()
    }

    /// One row per snapshot in id order.
    pub fn snapshots(&self) -> Vec<SnapshotRow> {
        self.table.snapshots().map(SnapshotRow::from).collect()
    }

    /// Live files of one snapshot grouped by partition tuple, in partition
    /// order.
    pub async fn partitions(
        &self,
        snapshot_id: Option<SnapshotId>,
    ) -> Result<Vec<PartitionRow>, TableError> {
        let files = self.files(snapshot_id).await?;

        let mut groups: BTreeMap<PartitionValues, (u64, u64)> = BTreeMap::new();
        for file in files {
            let (records, count) = groups.entry(file.partition).or_default();
            *records += file.record_count;
            *count += 1;
        }

        Ok(groups
            .into_iter()
            .map(|(partition, (record_count, file_count))| PartitionRow {
                partition,
                record_count,
                file_count,
            })
            .collect())
    }

    /// Snapshot that was current at `timestamp`, according to the history
    /// log.
    ///
    /// Fails with [`TableError::NoSnapshotAsOf`] when `timestamp` precedes
    /// the first history entry.
    pub fn snapshot_id_as_of(&self, timestamp: DateTime<Utc>) -> Result<SnapshotId, TableError> {
        self.table
            .state()
            .history
            .iter()
            .take_while(|h| h.made_current_at <= timestamp)
            .last()
            .map(|h| h.snapshot_id)
            .context(NoSnapshotAsOfSnafu { timestamp })
    }

    /// Render `kind` as an Arrow record batch.
    ///
    /// `snapshot_id` is only used by tables that read a single snapshot (see
    /// [`MetadataTableKind::supports_time_travel`]); an unknown id fails with
    /// [`TableError::SnapshotNotFound`] either way.
    pub async fn scan(
        &self,
        kind: MetadataTableKind,
        snapshot_id: Option<SnapshotId>,
    ) -> Result<RecordBatch, TableError> {
        // Pin the snapshot before any manifest I/O.
        let pinned = self.resolve(snapshot_id)?.map(|s| s.snapshot_id);
        let meta = self.table.table_meta();

        let batch = match kind {
            MetadataTableKind::Entries => {
                record_batch::entries_batch(&self.entries(pinned).await?, meta)
            }
            MetadataTableKind::AllEntries => {
                record_batch::entries_batch(&self.all_entries().await?, meta)
            }
            MetadataTableKind::Files => record_batch::files_batch(&self.files(pinned).await?, meta),
            MetadataTableKind::AllDataFiles => {
                record_batch::files_batch(&self.all_data_files().await?, meta)
            }
            MetadataTableKind::Manifests => {
                record_batch::manifests_batch(&self.manifests(pinned).await?)
            }
            MetadataTableKind::AllManifests => {
                record_batch::manifests_batch(&self.all_manifests().await?)
            }
            MetadataTableKind::History => record_batch::history_batch(&self.history()),
            MetadataTableKind::Snapshots => record_batch::snapshots_batch(&self.snapshots()),
            MetadataTableKind::Partitions => {
                record_batch::partitions_batch(&self.partitions(pinned).await?, meta)
            }
        };

        batch.context(ArrowSnafu)
    }
}

//! Table layer.
//!
//! [`SnapshotTable`] is the user-facing handle: it owns a
//! [`TransactionLogStore`] and an in-memory [`TableState`], and exposes
//! the write path (append, delete, overwrite, rollback, property updates) and,
//! through [`crate::metadata_tables`], the read-only metadata tables.
//!
//! Every write goes through [`SnapshotTable::commit`], which reloads the
//! latest state, checks that the caller's base snapshot is still current,
//! writes manifests and the manifest list, and then publishes the snapshot
//! with a single log commit.

pub mod append;
pub mod commit;
pub mod delete;
pub mod error;
pub mod import;
pub mod properties;
pub mod rollback;

use std::path::Path;

use futures::future::try_join_all;
use log::info;
use snafu::prelude::*;

pub use commit::FileChanges;
pub use error::TableError;

use crate::{
    metadata::{
        Manifest, ManifestFile, ManifestList, PartitionSpec, Snapshot, SnapshotId, TableMeta,
        TableSchema,
    },
    storage::{self, StorageError, TableLocation, layout},
    table::error::{
        AlreadyExistsSnafu, CorruptMetadataSnafu, EmptyTableSnafu, SnapshotNotFoundSnafu,
        StorageSnafu, TransactionLogSnafu,
    },
    transaction_log::{LogAction, TableState, TransactionLogStore},
};

/// Handle to a table rooted at a [`TableLocation`].
///
/// A handle caches the state it last loaded. Writers always reload before
/// committing; readers see the cached state until [`SnapshotTable::refresh`].
#[derive(Debug, Clone)]
pub struct SnapshotTable {
    location: TableLocation,
    log: TransactionLogStore,
    state: TableState,
}

impl SnapshotTable {
    /// Create a new table at `location`.
    ///
    /// Fails with [`TableError::AlreadyExists`] if the location already has
    /// commits.
    pub async fn create(location: TableLocation, table_meta: TableMeta) -> Result<Self, TableError> {
        let log = TransactionLogStore::new(location.clone());

        let current_version = log
            .load_current_version()
            .await
            .context(TransactionLogSnafu)?;
        ensure!(current_version == 0, AlreadyExistsSnafu { current_version });

        let version = log
            .commit_with_expected_version(0, vec![LogAction::CreateTable(table_meta.clone())])
            .await
            .context(TransactionLogSnafu)?;

        info!("created table at {location:?} (log version {version})");
        Ok(Self {
            location,
            log,
            state: TableState::new(version, table_meta),
        })
    }

    /// Open an existing table by replaying its log.
    pub async fn open(location: TableLocation) -> Result<Self, TableError> {
        let log = TransactionLogStore::new(location.clone());

        let current_version = log
            .load_current_version()
            .await
            .context(TransactionLogSnafu)?;
        ensure!(current_version > 0, EmptyTableSnafu);

        let state = log.rebuild_table_state().await.context(TransactionLogSnafu)?;
        Ok(Self {
            location,
            log,
            state,
        })
    }

    /// Read the latest committed state without touching the cached one.
    pub async fn load_latest_state(&self) -> Result<TableState, TableError> {
        self.log
            .rebuild_table_state()
            .await
            .context(TransactionLogSnafu)
    }

    /// Reload the cached state from the log.
    pub async fn refresh(&mut self) -> Result<(), TableError> {
        self.state = self.load_latest_state().await?;
        Ok(())
    }

    /// Root location of the table.
    pub fn location(&self) -> &TableLocation {
        &self.location
    }

    /// Cached table state.
    pub fn state(&self) -> &TableState {
        &self.state
    }

    /// Table metadata (schema, partition spec, properties).
    pub fn table_meta(&self) -> &TableMeta {
        &self.state.table_meta
    }

    /// Table schema.
    pub fn schema(&self) -> &TableSchema {
        &self.state.table_meta.schema
    }

    /// Partition spec.
    pub fn spec(&self) -> &PartitionSpec {
        &self.state.table_meta.partition_spec
    }

    /// The current snapshot, if any.
    pub fn current_snapshot(&self) -> Option<&Snapshot> {
        self.state.current_snapshot()
    }

    /// Every snapshot, in id order.
    pub fn snapshots(&self) -> impl Iterator<Item = &Snapshot> {
        self.state.snapshots.values()
    }

    /// Snapshot by id, or [`TableError::SnapshotNotFound`].
    pub fn snapshot(&self, snapshot_id: SnapshotId) -> Result<&Snapshot, TableError> {
        self.state
            .snapshot(snapshot_id)
            .context(SnapshotNotFoundSnafu { snapshot_id })
    }

    pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
        &self,
        rel_path: &str,
    ) -> Result<(T, u64), TableError> {
        let bytes = storage::read_all_bytes(self.location.as_ref(), Path::new(rel_path))
            .await
            .context(StorageSnafu)?;
        let value = serde_json::from_slice(&bytes).context(CorruptMetadataSnafu {
            path: rel_path.to_string(),
        })?;
        Ok((value, bytes.len() as u64))
    }

    /// Serialize `value` and write it once under a content-derived path.
    ///
    /// An existing file at that path holds identical bytes, so it is reused.
    pub(crate) async fn write_json_once<T: serde::Serialize>(
        &self,
        value: &T,
        rel_path_for: impl FnOnce(&[u8]) -> std::path::PathBuf,
    ) -> Result<(String, u64), TableError> {
        let bytes = serde_json::to_vec(value).context(CorruptMetadataSnafu {
            path: "<new metadata file>".to_string(),
        })?;
        let rel = rel_path_for(&bytes);

        match storage::write_new(self.location.as_ref(), &rel, &bytes).await {
            Ok(()) | Err(StorageError::AlreadyExists { .. }) => {}
            Err(source) => return Err(TableError::Storage { source }),
        }

        Ok((self.location.display_rel(&rel), bytes.len() as u64))
    }

    /// Load the manifest list at `rel_path`.
    pub(crate) async fn load_manifest_list(
        &self,
        rel_path: &str,
    ) -> Result<ManifestList, TableError> {
        self.read_json(rel_path).await.map(|(list, _)| list)
    }

    /// Load every manifest of `snapshot`, resolving inherited entry ids.
    ///
    /// Manifests are read concurrently; the result keeps manifest-list order.
    pub(crate) async fn load_manifests(
        &self,
        snapshot: &Snapshot,
    ) -> Result<Vec<(ManifestFile, Manifest)>, TableError> {
        let list = self.load_manifest_list(&snapshot.manifest_list).await?;

        let loads = list.manifests.into_iter().map(|mf| async move {
            let (manifest, _): (Manifest, u64) = self.read_json(&mf.path).await?;
            let manifest = manifest.with_inherited_ids(mf.added_snapshot_id);
            Ok::<_, TableError>((mf, manifest))
        });

        try_join_all(loads).await
    }

    /// Write a manifest into `metadata/manifests/` and summarize it.
    pub(crate) async fn write_manifest(
        &self,
        manifest: &Manifest,
        added_snapshot_id: SnapshotId,
    ) -> Result<ManifestFile, TableError> {
        let (path, length) = self
            .write_json_once(manifest, layout::manifest_rel_path)
            .await?;
        Ok(ManifestFile::summarize(
            path,
            length,
            manifest,
            self.spec(),
            added_snapshot_id,
        ))
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use crate::metadata::{
        DataFile, Datum, PartitionSpec, PartitionValues, PrimitiveType, SchemaField, TableMeta,
        TableSchema,
    };

    pub(crate) type TestResult = Result<(), Box<dyn std::error::Error>>;

    pub(crate) fn id_data_schema() -> TableSchema {
        TableSchema::new(vec![
            SchemaField::optional(1, "id", PrimitiveType::Int),
            SchemaField::optional(2, "data", PrimitiveType::String),
        ])
        .expect("valid schema")
    }

    pub(crate) fn unpartitioned_meta() -> TableMeta {
        TableMeta::new(id_data_schema(), PartitionSpec::unpartitioned()).expect("valid meta")
    }

    pub(crate) fn partitioned_meta() -> TableMeta {
        let schema = id_data_schema();
        let spec = PartitionSpec::identity(&schema, &["id"]).expect("valid spec");
        TableMeta::new(schema, spec).expect("valid meta")
    }

    /// One-row file whose `id` column holds `id`, partitioned by `id` when
    /// `partitioned` is set.
    pub(crate) fn id_file(path: &str, id: i32, partitioned: bool) -> DataFile {
        let partition = if partitioned {
            PartitionValues(vec![Some(Datum::Int(id))])
        } else {
            PartitionValues::empty()
        };
        DataFile::new(path, partition, 1, 100).with_column_metrics(
            1,
            1,
            0,
            Some((Datum::Int(id), Datum::Int(id))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn create_then_open_round_trips_metadata() -> TestResult {
        let tmp = TempDir::new()?;
        let location = TableLocation::local(tmp.path());
        let meta = partitioned_meta();

        let created = SnapshotTable::create(location.clone(), meta.clone()).await?;
        assert_eq!(created.state().version, 1);
        assert!(created.current_snapshot().is_none());

        let opened = SnapshotTable::open(location).await?;
        assert_eq!(opened.table_meta(), &meta);
        assert_eq!(opened.spec().fields.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn create_twice_fails() -> TestResult {
        let tmp = TempDir::new()?;
        let location = TableLocation::local(tmp.path());
        SnapshotTable::create(location.clone(), unpartitioned_meta()).await?;

        let err = SnapshotTable::create(location, unpartitioned_meta())
            .await
            .expect_err("second create");
        assert!(matches!(err, TableError::AlreadyExists { current_version: 1 }));
        Ok(())
    }

    #[tokio::test]
    async fn open_empty_location_fails() -> TestResult {
        let tmp = TempDir::new()?;
        let err = SnapshotTable::open(TableLocation::local(tmp.path()))
            .await
            .expect_err("empty table");
        assert!(matches!(err, TableError::EmptyTable));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_snapshot_lookup_is_not_found() -> TestResult {
        let tmp = TempDir::new()?;
        let table = SnapshotTable::create(TableLocation::local(tmp.path()), unpartitioned_meta())
            .await?;
        let err = table.snapshot(SnapshotId(5)).expect_err("missing");
        assert!(err.is_not_found());
        Ok(())
    }
}

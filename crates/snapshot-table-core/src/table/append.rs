//! Append operations.
//!
//! Appends are based on the snapshot the handle last saw. A handle that is
//! behind the log gets [`TableError::CommitConflict`] and should
//! [`SnapshotTable::refresh`] before retrying.

use crate::{
    metadata::{DataFile, FileEntry, Manifest, Operation, Snapshot},
    storage::layout,
    table::{FileChanges, SnapshotTable, TableError},
};

impl SnapshotTable {
    /// Add `files` in a new `append` snapshot.
    pub async fn append(&mut self, files: Vec<DataFile>) -> Result<Snapshot, TableError> {
        let base = self.state.current_snapshot_id;
        self.commit(base, Operation::Append, FileChanges::add_files(files))
            .await
    }

    /// Commit previously staged manifests in a new `append` snapshot.
    ///
    /// With snapshot-id inheritance enabled the manifests are referenced as
    /// they are; otherwise they are copied with snapshot ids filled in.
    pub async fn append_manifests(
        &mut self,
        manifest_paths: Vec<String>,
    ) -> Result<Snapshot, TableError> {
        let base = self.state.current_snapshot_id;
        self.commit(base, Operation::Append, FileChanges::staged(manifest_paths))
            .await
    }

    /// Write `files` into a staged manifest under `metadata/staging/`.
    ///
    /// Entries carry no snapshot id; the committing snapshot supplies it.
    /// Returns the manifest path to pass to
    /// [`SnapshotTable::append_manifests`].
    pub async fn stage_manifest(&self, files: Vec<DataFile>) -> Result<String, TableError> {
        let manifest = Manifest::new(
            self.spec().spec_id,
            files.into_iter().map(|f| FileEntry::added(None, f)).collect(),
        );
        let (path, _) = self
            .write_json_once(&manifest, layout::staged_manifest_rel_path)
            .await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{SnapshotId, table_properties::SNAPSHOT_ID_INHERITANCE_ENABLED};
    use crate::storage::TableLocation;
    use crate::table::test_util::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn append_updates_state_and_summary() -> TestResult {
        let tmp = TempDir::new()?;
        let mut table =
            SnapshotTable::create(TableLocation::local(tmp.path()), unpartitioned_meta()).await?;

        let snapshot = table.append(vec![id_file("data/a.parquet", 1, false)]).await?;

        assert_eq!(snapshot.operation, Operation::Append);
        assert_eq!(table.current_snapshot(), Some(&snapshot));
        assert_eq!(snapshot.summary.get("added-records").map(String::as_str), Some("1"));
        assert_eq!(snapshot.summary.get("total-data-files").map(String::as_str), Some("1"));

        // A fresh handle sees the same snapshot.
        let reopened = SnapshotTable::open(table.location().clone()).await?;
        assert_eq!(reopened.current_snapshot(), Some(&snapshot));
        Ok(())
    }

    #[tokio::test]
    async fn staged_manifest_is_copied_without_inheritance() -> TestResult {
        let tmp = TempDir::new()?;
        let mut table =
            SnapshotTable::create(TableLocation::local(tmp.path()), unpartitioned_meta()).await?;

        let staged = table
            .stage_manifest(vec![id_file("data/a.parquet", 1, false)])
            .await?;
        assert!(staged.starts_with("metadata/staging/"));

        let snapshot = table.append_manifests(vec![staged.clone()]).await?;
        let list = table.load_manifest_list(&snapshot.manifest_list).await?;
        assert_eq!(list.manifests.len(), 1);
        assert_ne!(list.manifests[0].path, staged);

        let (copied, _): (Manifest, u64) = table.read_json(&list.manifests[0].path).await?;
        assert_eq!(copied.entries[0].snapshot_id, Some(SnapshotId(1)));
        Ok(())
    }

    #[tokio::test]
    async fn staged_manifest_is_adopted_with_inheritance() -> TestResult {
        let tmp = TempDir::new()?;
        let meta = unpartitioned_meta().with_property(SNAPSHOT_ID_INHERITANCE_ENABLED, "true");
        let mut table = SnapshotTable::create(TableLocation::local(tmp.path()), meta).await?;

        let staged = table
            .stage_manifest(vec![id_file("data/a.parquet", 1, false)])
            .await?;
        let snapshot = table.append_manifests(vec![staged.clone()]).await?;

        let list = table.load_manifest_list(&snapshot.manifest_list).await?;
        assert_eq!(list.manifests[0].path, staged);
        assert_eq!(list.manifests[0].added_snapshot_id, snapshot.snapshot_id);

        // On disk the entry still has no id; readers inherit it.
        let (raw, _): (Manifest, u64) = table.read_json(&staged).await?;
        assert_eq!(raw.entries[0].snapshot_id, None);
        let loaded = table.load_manifests(&snapshot).await?;
        assert_eq!(loaded[0].1.entries[0].snapshot_id, Some(snapshot.snapshot_id));
        Ok(())
    }
}

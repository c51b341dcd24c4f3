//! The commit protocol.
//!
//! [`SnapshotTable::commit`] is the only place that creates snapshots. The
//! flow is:
//!
//! 1. Reload the latest state and check the caller's base snapshot is still
//!    current (`CommitConflict` otherwise).
//! 2. Validate the requested changes against the base live file set.
//! 3. Build manifests: drop base manifests with no live entries, rewrite the
//!    ones holding deleted files, reuse the rest, add one manifest for new
//!    files, and adopt or copy staged manifests.
//! 4. Write manifests and the manifest list, then publish the snapshot and
//!    move the current pointer in one log commit.
//!
//! A crash before step 4 completes leaves only unreferenced metadata files.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use log::{debug, info, warn};
use snafu::prelude::*;

use crate::{
    expressions::Expression,
    metadata::{
        DataFile, EntryStatus, FileEntry, Manifest, ManifestFile, ManifestList, Operation,
        Snapshot, SnapshotId, build_summary, table_properties,
    },
    storage::layout,
    table::{
        SnapshotTable,
        error::{
            CommitConflictSnafu, ExpressionSnafu, TableError, TransactionLogSnafu, validation,
        },
    },
    transaction_log::LogAction,
};

/// File-level changes requested by one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileChanges {
    /// New data files, written into one new manifest.
    pub added_files: Vec<DataFile>,
    /// Paths of live files to remove.
    pub deleted_paths: Vec<String>,
    /// Remove every live file whose rows all match this filter.
    pub row_filter: Option<Expression>,
    /// Paths (relative to the table root) of staged manifests to commit.
    pub staged_manifests: Vec<String>,
}

impl FileChanges {
    /// Changes that only add `files`.
    pub fn add_files(files: Vec<DataFile>) -> Self {
        Self {
            added_files: files,
            ..Self::default()
        }
    }

    /// Changes that only remove `paths`.
    pub fn delete_paths(paths: Vec<String>) -> Self {
        Self {
            deleted_paths: paths,
            ..Self::default()
        }
    }

    /// Changes that only remove files matching `filter`.
    pub fn delete_matching(filter: Expression) -> Self {
        Self {
            row_filter: Some(filter),
            ..Self::default()
        }
    }

    /// Changes that only commit staged manifests.
    pub fn staged(manifests: Vec<String>) -> Self {
        Self {
            staged_manifests: manifests,
            ..Self::default()
        }
    }

    fn adds_files(&self) -> bool {
        !self.added_files.is_empty() || !self.staged_manifests.is_empty()
    }

    fn removes_files(&self) -> bool {
        !self.deleted_paths.is_empty() || self.row_filter.is_some()
    }
}

fn validate_operation(operation: Operation, changes: &FileChanges) -> Result<(), TableError> {
    match operation {
        Operation::Append if changes.removes_files() => {
            validation("append commits cannot remove files")
        }
        Operation::Delete if changes.adds_files() => validation("delete commits cannot add files"),
        Operation::Delete if !changes.removes_files() => {
            validation("delete commits need file paths or a row filter")
        }
        Operation::Replace if changes.row_filter.is_some() => {
            validation("replace commits remove files by path, not by row filter")
        }
        Operation::Replace if !changes.adds_files() || !changes.removes_files() => {
            validation("replace commits must both add and remove files")
        }
        _ => Ok(()),
    }
}

impl SnapshotTable {
    /// Next snapshot id: `last + 1`, or the first id for a new table.
    fn next_snapshot_id(&self) -> Result<SnapshotId, TableError> {
        match self.state.last_snapshot_id() {
            Some(last) => match last.next() {
                Some(id) => Ok(id),
                None => validation("snapshot id space exhausted"),
            },
            None => Ok(SnapshotId::FIRST),
        }
    }

    /// Append `actions` to the log guarded by the cached log version, then
    /// apply them to the cached state.
    ///
    /// A lost race on the log version surfaces as
    /// [`TableError::CommitConflict`] against `expected`.
    pub(crate) async fn commit_log_actions(
        &mut self,
        expected: Option<SnapshotId>,
        actions: Vec<LogAction>,
    ) -> Result<(), TableError> {
        match self
            .log
            .commit_with_expected_version(self.state.version, actions.clone())
            .await
        {
            Ok(version) => {
                for action in actions {
                    self.state.apply(action).context(TransactionLogSnafu)?;
                }
                self.state.version = version;
                Ok(())
            }
            Err(e) if e.is_conflict() => {
                let found = self
                    .load_latest_state()
                    .await
                    .ok()
                    .and_then(|s| s.current_snapshot_id);
                warn!("lost commit race at log version {}: {e}", self.state.version);
                CommitConflictSnafu { expected, found }.fail()
            }
            Err(source) => Err(TableError::TransactionLog { source }),
        }
    }

    /// Commit `changes` as a new snapshot based on `base_snapshot_id`.
    ///
    /// Fails with [`TableError::CommitConflict`] if `base_snapshot_id` is no
    /// longer current, and with [`TableError::Validation`] if the changes do
    /// not fit `operation` or the base live file set.
    pub async fn commit(
        &mut self,
        base_snapshot_id: Option<SnapshotId>,
        operation: Operation,
        changes: FileChanges,
    ) -> Result<Snapshot, TableError> {
        let latest = self.load_latest_state().await?;
        ensure!(
            latest.current_snapshot_id == base_snapshot_id,
            CommitConflictSnafu {
                expected: base_snapshot_id,
                found: latest.current_snapshot_id,
            }
        );
        self.state = latest;

        validate_operation(operation, &changes)?;
        let snapshot_id = self.next_snapshot_id()?;
        let spec = self.spec().clone();

        // Base manifests, with inherited entry ids resolved.
        let base_manifests = match self.state.current_snapshot().cloned() {
            Some(current) => self.load_manifests(&current).await?,
            None => Vec::new(),
        };

        let base_live: BTreeMap<String, DataFile> = base_manifests
            .iter()
            .flat_map(|(_, m)| m.live_entries())
            .map(|e| (e.data_file.file_path.clone(), e.data_file.clone()))
            .collect();

        // Files to remove.
        let mut to_delete: BTreeSet<String> = BTreeSet::new();
        for path in &changes.deleted_paths {
            if !base_live.contains_key(path) {
                return validation(format!("cannot delete {path}: not a live file"));
            }
            to_delete.insert(path.clone());
        }

        if let Some(filter) = &changes.row_filter {
            let bound = filter.bind(self.schema()).context(ExpressionSnafu)?;
            for (path, file) in &base_live {
                if bound.all_rows_match(file, &spec) {
                    to_delete.insert(path.clone());
                } else if bound.might_match(file, &spec) {
                    return validation(format!(
                        "cannot delete file where some, but not all, rows match filter: {path}"
                    ));
                }
            }
        }

        // Staged manifests.
        let mut staged = Vec::with_capacity(changes.staged_manifests.len());
        for path in &changes.staged_manifests {
            let (manifest, length): (Manifest, u64) = self.read_json(path).await?;
            if manifest.spec_id != spec.spec_id {
                return validation(format!(
                    "staged manifest {path} uses partition spec {} but the table uses {}",
                    manifest.spec_id, spec.spec_id
                ));
            }
            if manifest.entries.iter().any(|e| e.status != EntryStatus::Added) {
                return validation(format!(
                    "staged manifest {path} may only contain ADDED entries"
                ));
            }
            staged.push((path.clone(), manifest, length));
        }

        // Files to add.
        let added: Vec<DataFile> = changes
            .added_files
            .iter()
            .cloned()
            .chain(
                staged
                    .iter()
                    .flat_map(|(_, m, _)| m.entries.iter().map(|e| e.data_file.clone())),
            )
            .collect();

        let mut seen = BTreeSet::new();
        for file in &added {
            if file.partition.0.len() != spec.fields.len() {
                return validation(format!(
                    "file {} has {} partition values, spec has {} fields",
                    file.file_path,
                    file.partition.0.len(),
                    spec.fields.len()
                ));
            }
            if base_live.contains_key(&file.file_path) {
                return validation(format!(
                    "cannot add {}: file is already live in the table",
                    file.file_path
                ));
            }
            if !seen.insert(file.file_path.as_str()) {
                return validation(format!("cannot add {} twice", file.file_path));
            }
        }

        if operation == Operation::Replace {
            let added_rows: u64 = added.iter().map(|f| f.record_count).sum();
            let deleted_rows: u64 = to_delete
                .iter()
                .filter_map(|p| base_live.get(p))
                .map(|f| f.record_count)
                .sum();
            if added_rows != deleted_rows {
                return validation(format!(
                    "replace must keep row count: adds {added_rows} rows, removes {deleted_rows}"
                ));
            }
        }

        // New manifests first, carried-over manifests after.
        let mut new_manifests: Vec<ManifestFile> = Vec::new();

        if !changes.added_files.is_empty() {
            let entries = changes
                .added_files
                .iter()
                .map(|f| FileEntry::added(Some(snapshot_id), f.clone()))
                .collect();
            let manifest = Manifest::new(spec.spec_id, entries);
            new_manifests.push(self.write_manifest(&manifest, snapshot_id).await?);
        }

        let inherit = table_properties::snapshot_id_inheritance_enabled(
            &self.state.table_meta.properties,
        );
        for (path, manifest, length) in staged {
            if inherit {
                debug!("adopting staged manifest {path} for snapshot {snapshot_id}");
                new_manifests.push(ManifestFile::summarize(
                    path,
                    length,
                    &manifest,
                    &spec,
                    snapshot_id,
                ));
            } else {
                let copied = manifest.with_inherited_ids(snapshot_id);
                new_manifests.push(self.write_manifest(&copied, snapshot_id).await?);
            }
        }

        let mut carried = Vec::new();
        let mut deleted: Vec<DataFile> = Vec::new();
        for (manifest_file, manifest) in base_manifests {
            if manifest.has_no_live_entries() {
                continue;
            }

            let touched = manifest
                .live_entries()
                .any(|e| to_delete.contains(&e.data_file.file_path));
            if !touched {
                carried.push(manifest_file);
                continue;
            }

            let entries = manifest
                .entries
                .into_iter()
                .filter(|e| e.status.is_live())
                .map(|e| {
                    if to_delete.contains(&e.data_file.file_path) {
                        deleted.push(e.data_file.clone());
                        FileEntry {
                            status: EntryStatus::Deleted,
                            snapshot_id: Some(snapshot_id),
                            data_file: e.data_file,
                        }
                    } else {
                        FileEntry {
                            status: EntryStatus::Existing,
                            ..e
                        }
                    }
                })
                .collect();
            let rewritten = Manifest::new(manifest.spec_id, entries);
            new_manifests.push(self.write_manifest(&rewritten, snapshot_id).await?);
        }

        let live_after: Vec<DataFile> = base_live
            .into_iter()
            .filter(|(path, _)| !to_delete.contains(path))
            .map(|(_, f)| f)
            .chain(added.iter().cloned())
            .collect();
        let summary = build_summary(&added, &deleted, &live_after);

        new_manifests.extend(carried);
        let list = ManifestList::new(snapshot_id, new_manifests);
        let (manifest_list, _) = self
            .write_json_once(&list, |bytes| {
                layout::manifest_list_rel_path(snapshot_id, bytes)
            })
            .await?;

        let snapshot = Snapshot {
            snapshot_id,
            parent_snapshot_id: base_snapshot_id,
            timestamp: Utc::now(),
            manifest_list,
            operation,
            summary,
        };

        self.commit_log_actions(
            base_snapshot_id,
            vec![
                LogAction::AddSnapshot(snapshot.clone()),
                LogAction::SetCurrentSnapshot {
                    snapshot_id,
                    parent_id: base_snapshot_id,
                    made_current_at: snapshot.timestamp,
                },
            ],
        )
        .await?;

        info!(
            "committed {operation} snapshot {snapshot_id} (+{} / -{} files)",
            added.len(),
            deleted.len()
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::PartitionValues;
    use crate::storage::TableLocation;
    use crate::table::test_util::*;
    use tempfile::TempDir;

    async fn new_table(tmp: &TempDir) -> Result<SnapshotTable, TableError> {
        SnapshotTable::create(TableLocation::local(tmp.path()), unpartitioned_meta()).await
    }

    #[test]
    fn operation_and_changes_must_agree() {
        let adds = FileChanges::add_files(vec![id_file("a", 1, false)]);
        let removes = FileChanges::delete_paths(vec!["a".to_string()]);

        assert!(validate_operation(Operation::Append, &adds).is_ok());
        assert!(validate_operation(Operation::Append, &removes).is_err());
        assert!(validate_operation(Operation::Delete, &adds).is_err());
        assert!(validate_operation(Operation::Delete, &FileChanges::default()).is_err());
        assert!(validate_operation(Operation::Overwrite, &adds).is_ok());
        assert!(validate_operation(Operation::Replace, &adds).is_err());
    }

    #[tokio::test]
    async fn stale_base_is_a_conflict() -> TestResult {
        let tmp = TempDir::new()?;
        let mut table = new_table(&tmp).await?;
        let s1 = table
            .commit(None, Operation::Append, FileChanges::add_files(vec![id_file("a", 1, false)]))
            .await?;

        let err = table
            .commit(None, Operation::Append, FileChanges::add_files(vec![id_file("b", 2, false)]))
            .await
            .expect_err("stale base");
        match err {
            TableError::CommitConflict { expected, found } => {
                assert_eq!(expected, None);
                assert_eq!(found, Some(s1.snapshot_id));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn adding_a_live_path_twice_is_rejected() -> TestResult {
        let tmp = TempDir::new()?;
        let mut table = new_table(&tmp).await?;
        let s1 = table
            .commit(None, Operation::Append, FileChanges::add_files(vec![id_file("a", 1, false)]))
            .await?;

        let err = table
            .commit(
                Some(s1.snapshot_id),
                Operation::Append,
                FileChanges::add_files(vec![id_file("a", 1, false)]),
            )
            .await
            .expect_err("duplicate live path");
        assert!(matches!(err, TableError::Validation { .. }));

        let err = table
            .commit(
                Some(s1.snapshot_id),
                Operation::Append,
                FileChanges::add_files(vec![id_file("b", 1, false), id_file("b", 1, false)]),
            )
            .await
            .expect_err("duplicate new path");
        assert!(matches!(err, TableError::Validation { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn partition_arity_is_checked() -> TestResult {
        let tmp = TempDir::new()?;
        let mut table = new_table(&tmp).await?;
        let bad = DataFile::new("a", PartitionValues(vec![None]), 1, 1);
        let err = table
            .commit(None, Operation::Append, FileChanges::add_files(vec![bad]))
            .await
            .expect_err("unpartitioned table");
        assert!(matches!(err, TableError::Validation { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn replace_keeps_rows_and_rewrites_manifest() -> TestResult {
        let tmp = TempDir::new()?;
        let mut table = new_table(&tmp).await?;
        let s1 = table
            .commit(
                None,
                Operation::Append,
                FileChanges::add_files(vec![id_file("a", 1, false), id_file("b", 2, false)]),
            )
            .await?;

        let compacted = DataFile::new("ab", PartitionValues::empty(), 2, 150);
        let s2 = table
            .commit(
                Some(s1.snapshot_id),
                Operation::Replace,
                FileChanges {
                    added_files: vec![compacted],
                    deleted_paths: vec!["a".to_string(), "b".to_string()],
                    ..FileChanges::default()
                },
            )
            .await?;
        assert_eq!(s2.operation, Operation::Replace);
        assert_eq!(s2.summary.get("total-records").map(String::as_str), Some("2"));
        assert_eq!(s2.summary.get("total-data-files").map(String::as_str), Some("1"));

        let lossy = DataFile::new("c", PartitionValues::empty(), 1, 10);
        let err = table
            .commit(
                Some(s2.snapshot_id),
                Operation::Replace,
                FileChanges {
                    added_files: vec![lossy],
                    deleted_paths: vec!["ab".to_string()],
                    ..FileChanges::default()
                },
            )
            .await
            .expect_err("row count changes");
        assert!(matches!(err, TableError::Validation { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn snapshot_ids_are_sequential_and_parents_link() -> TestResult {
        let tmp = TempDir::new()?;
        let mut table = new_table(&tmp).await?;
        let s1 = table
            .commit(None, Operation::Append, FileChanges::add_files(vec![id_file("a", 1, false)]))
            .await?;
        let s2 = table
            .commit(
                Some(s1.snapshot_id),
                Operation::Append,
                FileChanges::add_files(vec![id_file("b", 2, false)]),
            )
            .await?;

        assert_eq!(s1.snapshot_id, SnapshotId(1));
        assert_eq!(s2.snapshot_id, SnapshotId(2));
        assert_eq!(s2.parent_snapshot_id, Some(s1.snapshot_id));
        assert_eq!(table.state().current_snapshot_id, Some(s2.snapshot_id));
        assert_eq!(table.state().history.len(), 2);

        // The manifest list of S2 holds the new manifest first, then S1's.
        let list = table.load_manifest_list(&s2.manifest_list).await?;
        assert_eq!(list.manifests.len(), 2);
        assert_eq!(list.manifests[0].added_snapshot_id, s2.snapshot_id);
        assert_eq!(list.manifests[1].added_snapshot_id, s1.snapshot_id);
        Ok(())
    }
}

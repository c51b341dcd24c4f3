//! Delete and overwrite operations.

use crate::{
    expressions::Expression,
    metadata::{DataFile, Operation, Snapshot},
    table::{FileChanges, SnapshotTable, TableError},
};

impl SnapshotTable {
    /// Remove the live file at `path` in a new `delete` snapshot.
    pub async fn delete_file(&mut self, path: impl Into<String>) -> Result<Snapshot, TableError> {
        self.delete_files(vec![path.into()]).await
    }

    /// Remove the live files at `paths` in a new `delete` snapshot.
    pub async fn delete_files(&mut self, paths: Vec<String>) -> Result<Snapshot, TableError> {
        let base = self.state.current_snapshot_id;
        self.commit(base, Operation::Delete, FileChanges::delete_paths(paths))
            .await
    }

    /// Remove every live file whose rows all match `filter`.
    ///
    /// Files where only some rows may match make the whole operation fail
    /// with [`TableError::Validation`]. A filter matching nothing still
    /// commits an empty `delete` snapshot.
    pub async fn delete_from_row_filter(
        &mut self,
        filter: Expression,
    ) -> Result<Snapshot, TableError> {
        let base = self.state.current_snapshot_id;
        self.commit(base, Operation::Delete, FileChanges::delete_matching(filter))
            .await
    }

    /// Replace the files matching `filter` with `files` in one `overwrite`
    /// snapshot.
    pub async fn overwrite(
        &mut self,
        filter: Expression,
        files: Vec<DataFile>,
    ) -> Result<Snapshot, TableError> {
        let base = self.state.current_snapshot_id;
        let changes = FileChanges {
            added_files: files,
            row_filter: Some(filter),
            ..FileChanges::default()
        };
        self.commit(base, Operation::Overwrite, changes).await
    }
}

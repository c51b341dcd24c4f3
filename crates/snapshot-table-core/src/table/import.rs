//! Importing existing Parquet files as a single append.
//!
//! Every `.parquet` file below a directory becomes one [`DataFile`] whose
//! metrics come from the Parquet footer. Partition values for partitioned
//! tables are taken from Hive-style `<column>=<value>` directories. The files
//! are written into one staged manifest and committed with
//! [`SnapshotTable::append_manifests`], so snapshot-id inheritance applies.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::future::try_join_all;
use log::{debug, info};
use snafu::prelude::*;

use crate::{
    helpers::parquet::{data_file_from_parquet_bytes, partition_from_hive_path},
    metadata::{DataFile, PartitionValues, Snapshot},
    storage,
    table::{
        SnapshotTable,
        error::{ImportSnafu, StorageSnafu, TableError, ValidationSnafu},
    },
};

fn is_importable(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return false;
    };
    // Writer markers and hidden files (`_SUCCESS`, `.crc`).
    if name.starts_with('_') || name.starts_with('.') {
        return false;
    }
    path.extension().is_some_and(|ext| ext == "parquet")
}

impl SnapshotTable {
    /// Import every Parquet file below `rel_dir` in one `append` snapshot.
    ///
    /// Fails with [`TableError::Validation`] if the directory holds no
    /// Parquet files, and with [`TableError::Import`] if a file is not valid
    /// Parquet or its path lacks a partition value.
    pub async fn import_parquet_directory(
        &mut self,
        rel_dir: &str,
    ) -> Result<Snapshot, TableError> {
        let dir = PathBuf::from(rel_dir);
        let found = storage::list_files(self.location.as_ref(), &dir)
            .await
            .context(StorageSnafu)?;
        let paths: Vec<PathBuf> = found.into_iter().filter(|p| is_importable(p)).collect();

        ensure!(
            !paths.is_empty(),
            ValidationSnafu {
                message: format!("no Parquet files found under {rel_dir}"),
            }
        );
        debug!("importing {} Parquet files from {rel_dir}", paths.len());

        let this = &*self;
        let loads = paths.iter().map(|rel| {
            let dir = dir.as_path();
            async move {
                let bytes = storage::read_all_bytes(this.location.as_ref(), rel)
                    .await
                    .context(StorageSnafu)?;
                this.describe_parquet(dir, rel, Bytes::from(bytes))
            }
        });
        let files = try_join_all(loads).await?;

        let staged = self.stage_manifest(files).await?;
        let snapshot = self.append_manifests(vec![staged]).await?;
        info!(
            "imported {} files from {rel_dir} as snapshot {}",
            paths.len(),
            snapshot.snapshot_id
        );
        Ok(snapshot)
    }

    fn describe_parquet(
        &self,
        dir: &Path,
        rel: &Path,
        bytes: Bytes,
    ) -> Result<DataFile, TableError> {
        let partition = if self.spec().is_unpartitioned() {
            PartitionValues::empty()
        } else {
            let within = rel.strip_prefix(dir).unwrap_or(rel);
            partition_from_hive_path(within, self.schema(), self.spec()).context(ImportSnafu)?
        };

        data_file_from_parquet_bytes(&self.location.display_rel(rel), bytes, self.schema(), partition)
            .context(ImportSnafu)
    }
}

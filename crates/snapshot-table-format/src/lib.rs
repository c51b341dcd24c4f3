//! # snapshot-table-format
//!
//! Snapshot-based table format: immutable snapshots over manifest lists and
//! manifests, optimistic commits, rollback, and read-only metadata tables.
//!
//! This crate is the supported public entry point and provides a small,
//! stable surface over `snapshot-table-core`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use snapshot_table_format::prelude::*;
//!
//! let schema = TableSchema::new(vec![
//!     SchemaField::optional(1, "id", PrimitiveType::Int),
//!     SchemaField::optional(2, "data", PrimitiveType::String),
//! ])?;
//! let spec = PartitionSpec::identity(&schema, &["id"])?;
//! let mut table = SnapshotTable::create(
//!     TableLocation::parse("/tmp/my_table")?,
//!     TableMeta::new(schema, spec)?,
//! )
//! .await?;
//!
//! table.import_parquet_directory("data").await?;
//! let partitions = table.metadata_tables().partitions(None).await?;
//! ```

/// Convenience prelude with the stable, supported surface.
pub mod prelude;

/// Row filters.
pub mod expressions {
    pub use snapshot_table_core::expressions::{CompareOp, Expression, ExpressionError};
}

/// Metadata table rows and kinds.
pub mod metadata_tables {
    pub use snapshot_table_core::metadata_tables::*;
}

pub use snapshot_table_core::metadata::{
    DataFile, Datum, EntryStatus, FileEntry, HistoryEntry, ManifestFile, Operation,
    PartitionSpec, PartitionValues, PrimitiveType, SchemaError, SchemaField, Snapshot, SnapshotId,
    TableMeta, TableSchema, table_properties,
};
pub use snapshot_table_core::storage::{StorageError, TableLocation};
pub use snapshot_table_core::table::{
    FileChanges, SnapshotTable, TableError, properties::PropertyUpdates,
};

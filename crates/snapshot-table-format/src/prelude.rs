//! Wrapper prelude.
//!
//! The `snapshot-table-format` crate is the supported public entry point.
//! Downstream code should prefer importing from this prelude instead of
//! depending on internal core module paths.

pub use crate::expressions::Expression;
pub use crate::metadata_tables::{MetadataTableKind, MetadataTables};
pub use crate::{
    DataFile, Datum, Operation, PartitionSpec, PartitionValues, PrimitiveType, PropertyUpdates,
    SchemaField, Snapshot, SnapshotId, SnapshotTable, TableError, TableLocation, TableMeta,
    TableSchema,
};

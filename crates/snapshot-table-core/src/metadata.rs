//! Durable metadata model.
//!
//! Everything here is plain data with serde derives: schemas and partition
//! specs, data files and manifest entries, manifests and manifest lists,
//! snapshots, and the history log. Persistence and the commit protocol live
//! in [`crate::transaction_log`] and [`crate::table`].

pub mod data_file;
pub mod history;
pub mod manifest;
pub mod manifest_list;
pub mod schema;
pub mod snapshot;
pub mod table_metadata;

pub use data_file::{DataFile, EntryStatus, FileEntry, FileFormat};
pub use history::{HistoryEntry, ancestors_of, recompute_ancestry};
pub use manifest::{Manifest, ManifestFile, PartitionFieldSummary};
pub use manifest_list::ManifestList;
pub use schema::{
    Datum, PartitionField, PartitionSpec, PartitionValues, PrimitiveType, SchemaError,
    SchemaField, TableSchema, Transform,
};
pub use snapshot::{Operation, Snapshot, SnapshotId, build_summary};
pub use table_metadata::{TableMeta, table_properties};

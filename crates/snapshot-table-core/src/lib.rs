//! Core engine for a snapshot-based table format.
//!
//! A table is an append-only sequence of immutable snapshots. Each snapshot
//! points at a manifest list, which lists manifests, which list data files
//! with a per-snapshot status (`ADDED`, `EXISTING`, `DELETED`). This crate
//! provides:
//!
//! - A Delta-inspired, append-only commit log with version-guard optimistic
//!   concurrency control (`transaction_log` module), which records table
//!   creation, property changes, new snapshots and every move of the
//!   current-snapshot pointer.
//! - The snapshot model: schemas, partition specs, data files, manifests,
//!   manifest lists, snapshots and the history log (`metadata` module).
//! - [`table::SnapshotTable`], the commit protocol and its specializations
//!   (append, delete, overwrite, rollback, property updates, Parquet import).
//! - Row filters with inclusive and strict evaluation over file metrics
//!   (`expressions` module).
//! - Read-only metadata tables (`entries`, `files`, `manifests`, `history`,
//!   `snapshots`, `partitions` and their `all_*` variants) as rows or Arrow
//!   record batches (`metadata_tables` module).
//! - Local storage helpers and the on-disk layout (`storage` module).
//!
//! Higher-level integration crates are expected to depend on this core crate
//! (usually through the `snapshot-table-format` facade) rather than
//! re-implementing the storage and metadata logic.
#![deny(missing_docs)]

pub mod expressions;
pub mod helpers;
pub mod metadata;
pub mod metadata_tables;
pub mod storage;
pub mod table;
pub mod transaction_log;

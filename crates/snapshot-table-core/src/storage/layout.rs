//! On-disk layout helpers for a table root.
//!
//! This module centralizes all *relative* path conventions under a table root:
//!
//! ```text
//! table_root/
//!   _snapshot_log/
//!     CURRENT                          # latest committed log version ("3\n")
//!     0000000001.json                  # log commit 1 (create table)
//!     0000000002.json                  # log commit 2 (snapshot 1 + pointer)
//!   metadata/
//!     snap-1-<hash>.json               # manifest list of snapshot 1
//!     manifests/m-<hash>.json          # manifests (shared across snapshots)
//!     staging/m-<hash>.json            # manifests written outside a commit
//!   data/                              # data files (convention only)
//! ```
//!
//! The functions here return relative [`PathBuf`] values. Callers join them
//! with a [`crate::storage::TableLocation`] before doing IO.

use std::path::PathBuf;

use crate::metadata::SnapshotId;

/// Conventional directory where data files are stored.
pub const DATA_DIR_NAME: &str = "data";

/// Name of the subdirectory containing the commit log.
pub const LOG_DIR_NAME: &str = "_snapshot_log";

/// Name of the file that stores the current log version pointer.
pub const CURRENT_FILE_NAME: &str = "CURRENT";

/// Number of digits used in zero-padded commit file names.
pub const COMMIT_FILENAME_DIGITS: usize = 10;

/// Directory holding manifest lists.
pub const METADATA_DIR_NAME: &str = "metadata";

/// Directory (under `metadata/`) holding committed manifests.
pub const MANIFEST_DIR_NAME: &str = "manifests";

/// Directory (under `metadata/`) holding staged manifests.
pub const STAGING_DIR_NAME: &str = "staging";

/// Number of hex chars of the content hash kept in metadata file names.
const CONTENT_ID_HEX_CHARS: usize = 32;

/// Relative path: `data/`
pub fn data_rel_dir() -> PathBuf {
    PathBuf::from(DATA_DIR_NAME)
}

/// Relative path: `_snapshot_log/`
pub fn log_rel_dir() -> PathBuf {
    PathBuf::from(LOG_DIR_NAME)
}

/// Relative path: `_snapshot_log/CURRENT`
pub fn current_rel_path() -> PathBuf {
    log_rel_dir().join(CURRENT_FILE_NAME)
}

/// Relative path: `_snapshot_log/<zero-padded>.json`
pub fn commit_rel_path(version: u64) -> PathBuf {
    let file_name = format!("{:0width$}.json", version, width = COMMIT_FILENAME_DIGITS);
    log_rel_dir().join(file_name)
}

/// Relative path: `metadata/`
pub fn metadata_rel_dir() -> PathBuf {
    PathBuf::from(METADATA_DIR_NAME)
}

/// Content id used in metadata file names.
///
/// The id is domain-separated so a manifest and a manifest list with equal
/// bytes still get different names.
pub fn content_id_v1(domain: &str, bytes: &[u8]) -> String {
    let mut h = blake3::Hasher::new();
    h.update(domain.as_bytes());
    h.update(b"\0");
    h.update(bytes);
    let hex = h.finalize().to_hex();
    hex[..CONTENT_ID_HEX_CHARS].to_string()
}

/// Relative path: `metadata/manifests/m-<hash>.json`
pub fn manifest_rel_path(bytes: &[u8]) -> PathBuf {
    metadata_rel_dir()
        .join(MANIFEST_DIR_NAME)
        .join(format!("m-{}.json", content_id_v1("manifest-v1", bytes)))
}

/// Relative path: `metadata/staging/m-<hash>.json`
pub fn staged_manifest_rel_path(bytes: &[u8]) -> PathBuf {
    metadata_rel_dir()
        .join(STAGING_DIR_NAME)
        .join(format!("m-{}.json", content_id_v1("manifest-v1", bytes)))
}

/// Relative path: `metadata/snap-<snapshot_id>-<hash>.json`
pub fn manifest_list_rel_path(snapshot_id: SnapshotId, bytes: &[u8]) -> PathBuf {
    metadata_rel_dir().join(format!(
        "snap-{}-{}.json",
        snapshot_id,
        content_id_v1("manifest-list-v1", bytes)
    ))
}

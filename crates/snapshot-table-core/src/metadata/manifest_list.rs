//! Manifest lists: the per-snapshot index of manifests.

use serde::{Deserialize, Serialize};

use crate::metadata::{ManifestFile, SnapshotId};

/// Ordered manifests making up one snapshot.
///
/// Persisted once as `metadata/snap-<snapshot_id>-<hash>.json` and never
/// rewritten. New manifests come first; carried-over manifests keep their
/// previous relative order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestList {
    /// Snapshot that owns this list.
    pub snapshot_id: SnapshotId,
    /// Manifest records.
    pub manifests: Vec<ManifestFile>,
}

impl ManifestList {
    /// Build a list for `snapshot_id`.
    pub fn new(snapshot_id: SnapshotId, manifests: Vec<ManifestFile>) -> Self {
        Self {
            snapshot_id,
            manifests,
        }
    }
}

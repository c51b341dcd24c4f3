//! Snapshot lineage: the history log and current-ancestry computation.
//!
//! The history log records every change of the current-snapshot pointer in
//! append order. Rollbacks append an entry that reuses an existing snapshot
//! id; older entries are never edited. The `is_current_ancestor` flag is
//! derived state: it is recomputed for every entry whenever the pointer moves
//! and whenever state is rebuilt from the log.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::metadata::{Snapshot, SnapshotId};

/// One change of the current-snapshot pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// When the snapshot became current.
    pub made_current_at: DateTime<Utc>,
    /// Snapshot that became current.
    pub snapshot_id: SnapshotId,
    /// Previous current snapshot for commits; `None` for rollbacks.
    pub parent_id: Option<SnapshotId>,
    /// Whether `snapshot_id` is an ancestor of (or equal to) the current
    /// snapshot.
    pub is_current_ancestor: bool,
}

/// Ids reachable by walking structural parents from `current`, inclusive.
pub fn ancestors_of(
    current: Option<SnapshotId>,
    snapshots: &BTreeMap<SnapshotId, Snapshot>,
) -> BTreeSet<SnapshotId> {
    let mut out = BTreeSet::new();
    let mut cursor = current;

    while let Some(id) = cursor {
        // A parent cycle would mean a corrupt log; stop instead of spinning.
        if !out.insert(id) {
            break;
        }
        cursor = snapshots.get(&id).and_then(|s| s.parent_snapshot_id);
    }

    out
}

/// Recompute `is_current_ancestor` for every history entry.
pub fn recompute_ancestry(
    history: &mut [HistoryEntry],
    current: Option<SnapshotId>,
    snapshots: &BTreeMap<SnapshotId, Snapshot>,
) {
    let ancestors = ancestors_of(current, snapshots);
    for entry in history.iter_mut() {
        entry.is_current_ancestor = ancestors.contains(&entry.snapshot_id);
    }
}

//! Reconstructing table state by replaying log commits.
//!
//! [`TableState`] materializes the metadata stored in `_snapshot_log/`:
//! table metadata, every registered snapshot, the history log and the current
//! pointer. [`TransactionLogStore::rebuild_table_state`] walks all commits
//! from version 1 up to `CURRENT` and applies their actions in order; the
//! commit path applies the same actions to its in-memory copy after a
//! successful write, so both views agree.
use std::collections::BTreeMap;

use snafu::prelude::*;

use crate::metadata::{HistoryEntry, Snapshot, SnapshotId, TableMeta, recompute_ancestry};
use crate::transaction_log::*;

/// In-memory view of table metadata and snapshots, reconstructed from the log.
///
/// Invariants:
/// - `version` matches the CURRENT pointer at load time.
/// - `history[i].is_current_ancestor` reflects `current_snapshot_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableState {
    /// Latest committed log version.
    pub version: u64,
    /// Table-level metadata.
    pub table_meta: TableMeta,
    /// Every snapshot ever registered, keyed by id.
    pub snapshots: BTreeMap<SnapshotId, Snapshot>,
    /// Pointer changes in append order.
    pub history: Vec<HistoryEntry>,
    /// Current snapshot, `None` until the first commit.
    pub current_snapshot_id: Option<SnapshotId>,
}

impl TableState {
    /// Fresh state after the `CreateTable` commit.
    pub fn new(version: u64, table_meta: TableMeta) -> Self {
        Self {
            version,
            table_meta,
            snapshots: BTreeMap::new(),
            history: Vec::new(),
            current_snapshot_id: None,
        }
    }

    /// The current snapshot, if any.
    pub fn current_snapshot(&self) -> Option<&Snapshot> {
        self.current_snapshot_id
            .and_then(|id| self.snapshots.get(&id))
    }

    /// Snapshot by id.
    pub fn snapshot(&self, id: SnapshotId) -> Option<&Snapshot> {
        self.snapshots.get(&id)
    }

    /// Highest snapshot id handed out so far.
    pub fn last_snapshot_id(&self) -> Option<SnapshotId> {
        self.snapshots.keys().next_back().copied()
    }

    /// Whether `id` is the current snapshot or one of its ancestors.
    pub fn is_current_ancestor(&self, id: SnapshotId) -> bool {
        crate::metadata::ancestors_of(self.current_snapshot_id, &self.snapshots).contains(&id)
    }

    /// Apply a single log action. `CreateTable` is only valid as the first
    /// action of the log and is rejected here.
    pub(crate) fn apply(&mut self, action: LogAction) -> Result<(), CommitError> {
        match action {
            LogAction::CreateTable(_) => {
                return CorruptStateSnafu {
                    msg: "CreateTable found after table was created".to_string(),
                }
                .fail();
            }
            LogAction::UpdateProperties { set, remove } => {
                for key in remove {
                    self.table_meta.properties.remove(&key);
                }
                self.table_meta.properties.extend(set);
            }
            LogAction::AddSnapshot(snapshot) => {
                ensure!(
                    !self.snapshots.contains_key(&snapshot.snapshot_id),
                    CorruptStateSnafu {
                        msg: format!("snapshot {} registered twice", snapshot.snapshot_id),
                    }
                );
                self.snapshots.insert(snapshot.snapshot_id, snapshot);
            }
            LogAction::SetCurrentSnapshot {
                snapshot_id,
                parent_id,
                made_current_at,
            } => {
                ensure!(
                    self.snapshots.contains_key(&snapshot_id),
                    CorruptStateSnafu {
                        msg: format!("current pointer set to unknown snapshot {snapshot_id}"),
                    }
                );
                self.current_snapshot_id = Some(snapshot_id);
                self.history.push(HistoryEntry {
                    made_current_at,
                    snapshot_id,
                    parent_id,
                    is_current_ancestor: false,
                });
                recompute_ancestry(&mut self.history, self.current_snapshot_id, &self.snapshots);
            }
        }
        Ok(())
    }
}

impl TransactionLogStore {
    /// Rebuild the current TableState by replaying all commits up to CURRENT.
    ///
    /// - If CURRENT == 0 (no commits), this returns CommitError::CorruptState.
    /// - The first action of the first commit must be `CreateTable`.
    pub async fn rebuild_table_state(&self) -> Result<TableState, CommitError> {
        let current_version = self.load_current_version().await?;

        ensure!(
            current_version > 0,
            CorruptStateSnafu {
                msg: "Cannot rebuild TableState: CURRENT is 0 (no commits)".to_string(),
            }
        );

        let mut state: Option<TableState> = None;

        for v in 1..=current_version {
            let commit = self.load_commit(v).await?;

            ensure!(
                commit.version == v,
                CorruptStateSnafu {
                    msg: format!(
                        "Commit version mismatch: expected {v}, found {} in payload",
                        commit.version
                    ),
                }
            );

            for action in commit.actions {
                if let Some(s) = state.as_mut() {
                    s.apply(action)?;
                    continue;
                }

                match action {
                    LogAction::CreateTable(meta) => state = Some(TableState::new(v, meta)),
                    _ => {
                        return CorruptStateSnafu {
                            msg: format!("commit {v} modifies a table that was never created"),
                        }
                        .fail();
                    }
                }
            }
        }

        let mut state = state.context(CorruptStateSnafu {
            msg: format!("No CreateTable found in commits up to version {current_version}"),
        })?;
        state.version = current_version;
        Ok(state)
    }
}

//! Moving the current-snapshot pointer without creating a snapshot.

use chrono::Utc;
use log::info;
use snafu::prelude::*;

use crate::{
    metadata::SnapshotId,
    table::{
        SnapshotTable,
        error::{TableError, ValidationSnafu},
    },
    transaction_log::LogAction,
};

impl SnapshotTable {
    /// Make `snapshot_id` current again.
    ///
    /// The target must be the current snapshot or one of its ancestors. A new
    /// history entry with no parent is appended; earlier entries are kept and
    /// their ancestry flags recomputed.
    pub async fn rollback_to(&mut self, snapshot_id: SnapshotId) -> Result<(), TableError> {
        self.refresh().await?;
        ensure!(
            self.state.snapshot(snapshot_id).is_some(),
            ValidationSnafu {
                message: format!("cannot roll back to unknown snapshot {snapshot_id}"),
            }
        );
        ensure!(
            self.state.is_current_ancestor(snapshot_id),
            ValidationSnafu {
                message: format!(
                    "cannot roll back to snapshot {snapshot_id}: not an ancestor of the current snapshot"
                ),
            }
        );
        self.move_current_pointer(snapshot_id).await
    }

    /// Make any known snapshot current, ancestor or not.
    pub async fn set_current_snapshot(&mut self, snapshot_id: SnapshotId) -> Result<(), TableError> {
        self.refresh().await?;
        ensure!(
            self.state.snapshot(snapshot_id).is_some(),
            ValidationSnafu {
                message: format!("cannot set current snapshot to unknown snapshot {snapshot_id}"),
            }
        );
        self.move_current_pointer(snapshot_id).await
    }

    async fn move_current_pointer(&mut self, snapshot_id: SnapshotId) -> Result<(), TableError> {
        let expected = self.state.current_snapshot_id;
        self.commit_log_actions(
            expected,
            vec![LogAction::SetCurrentSnapshot {
                snapshot_id,
                parent_id: None,
                made_current_at: Utc::now(),
            }],
        )
        .await?;
        info!("current snapshot is now {snapshot_id}");
        Ok(())
    }
}

//! Table property updates.

use std::collections::BTreeMap;

use crate::{
    table::{SnapshotTable, TableError},
    transaction_log::LogAction,
};

/// A batch of property changes applied in one log commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyUpdates {
    set: BTreeMap<String, String>,
    remove: Vec<String>,
}

impl PropertyUpdates {
    /// Empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set.insert(key.into(), value.into());
        self
    }

    /// Remove `key`.
    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.remove.push(key.into());
        self
    }
}

impl SnapshotTable {
    /// Apply `updates` to the table properties.
    ///
    /// Removals are applied before sets. The commit is guarded by the log
    /// version of the cached state.
    pub async fn update_properties(&mut self, updates: PropertyUpdates) -> Result<(), TableError> {
        let expected = self.state.current_snapshot_id;
        self.commit_log_actions(
            expected,
            vec![LogAction::UpdateProperties {
                set: updates.set,
                remove: updates.remove,
            }],
        )
        .await
    }
}

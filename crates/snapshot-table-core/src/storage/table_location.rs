//! Table root locations.

use std::path::{Path, PathBuf};

use crate::storage::{StorageLocation, StorageResult};

/// Table root location with table-scoped semantics.
///
/// This wraps [`StorageLocation`] and is used when callers need to treat the
/// location as a table root (commit log layout, metadata paths, data paths).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLocation(StorageLocation);

impl From<TableLocation> for StorageLocation {
    fn from(t: TableLocation) -> Self {
        t.0
    }
}

impl AsRef<StorageLocation> for TableLocation {
    fn as_ref(&self) -> &StorageLocation {
        &self.0
    }
}

impl TableLocation {
    /// Creates a new `TableLocation` for a local filesystem path.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        TableLocation(StorageLocation::Local(root.into()))
    }

    /// Parse a user-facing table location string into a `TableLocation`.
    pub fn parse(spec: &str) -> StorageResult<Self> {
        StorageLocation::parse(spec).map(TableLocation)
    }

    /// Return the underlying `StorageLocation`.
    pub fn storage(&self) -> &StorageLocation {
        &self.0
    }

    /// Render a relative path under this root the way it is recorded in
    /// metadata (manifest-list locations, manifest paths).
    pub fn display_rel(&self, rel: &Path) -> String {
        rel.to_string_lossy().replace('\\', "/")
    }
}

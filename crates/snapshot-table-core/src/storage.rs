//! Storage backend abstraction and filesystem helpers.
//!
//! This module centralizes all storage-related logic for
//! `snapshot-table-core`. It maps a table root to the objects the metadata
//! engine reads and writes:
//!
//! - The commit log directory (for example, `<root>/_snapshot_log/`) and
//!   its `CURRENT` pointer.
//! - Manifests and manifest lists under `<root>/metadata/`.
//! - Data files referenced by manifests (read only, for Parquet import).
//!
//! Two write primitives back the commit protocol:
//!
//! - [`write_new`]: "create only if not exists", used for commit files,
//!   manifests and manifest lists so every immutable object is written once.
//! - [`write_atomic`]: write-then-rename, used for the mutable `CURRENT`
//!   pointer.
//!
//! Only the local filesystem is supported for now, but callers go through a
//! [`StorageLocation`] so object-store adapters can be added without touching
//! the log or table logic.

pub mod error;
pub mod layout;
mod table_location;

use std::{
    io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use snafu::{IntoError, prelude::*};
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
};

pub use error::{BackendError, StorageError};
pub(crate) use error::{AlreadyExistsSnafu, NotFoundSnafu, OtherIoSnafu};
pub use table_location::TableLocation;

/// General result type used by storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Represents the backend root where objects are stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageLocation {
    /// Objects stored on the local filesystem under the given root.
    Local(PathBuf),
    // Future:
    // S3 { bucket: String, prefix: String },
}

impl StorageLocation {
    /// Parse a user-facing location string.
    ///
    /// Accepts plain paths and `file://` URIs. Any other scheme is rejected
    /// because only local storage is implemented.
    pub fn parse(spec: &str) -> StorageResult<Self> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Err(OtherIoSnafu {
                path: "<empty location>".to_string(),
            }
            .into_error(BackendError::Local(io::Error::new(
                io::ErrorKind::InvalidInput,
                "location is empty",
            ))));
        }

        if let Some(rest) = trimmed.strip_prefix("file://") {
            return Ok(StorageLocation::Local(PathBuf::from(rest)));
        }

        if let Some((scheme, _)) = trimmed.split_once("://") {
            return Err(OtherIoSnafu {
                path: trimmed.to_string(),
            }
            .into_error(BackendError::Local(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unsupported storage scheme {scheme:?}"),
            ))));
        }

        Ok(StorageLocation::Local(PathBuf::from(trimmed)))
    }
}

/// Join a storage location with a relative path into an absolute local path.
pub(crate) fn join_local(location: &StorageLocation, rel: &Path) -> PathBuf {
    match location {
        StorageLocation::Local(root) => root.join(rel),
    }
}

pub(crate) async fn create_parent_dir(abs: &Path) -> StorageResult<()> {
    if let Some(parent) = abs.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: parent.display().to_string(),
            })?;
    }
    Ok(())
}

/// Guard that removes a temporary file on drop unless disarmed.
/// Used to ensure cleanup on error paths during atomic writes.
pub(crate) struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Call after a successful rename.
    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            // Best-effort cleanup; we are usually already unwinding another error.
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

fn classify_io(path: String, e: io::Error) -> StorageError {
    match e.kind() {
        io::ErrorKind::NotFound => NotFoundSnafu { path }.into_error(BackendError::Local(e)),
        io::ErrorKind::AlreadyExists => {
            AlreadyExistsSnafu { path }.into_error(BackendError::Local(e))
        }
        _ => OtherIoSnafu { path }.into_error(BackendError::Local(e)),
    }
}

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Hidden sibling of `abs`, unique per process and call, for staging writes.
fn staging_path(abs: &Path) -> PathBuf {
    let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
    let name = abs
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    abs.with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()))
}

/// Create `tmp_path`, write `contents` and sync it.
async fn write_staged(tmp_path: &Path, contents: &[u8]) -> StorageResult<()> {
    let path = || tmp_path.display().to_string();

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(tmp_path)
        .await
        .map_err(BackendError::Local)
        .context(OtherIoSnafu { path: path() })?;

    file.write_all(contents)
        .await
        .map_err(BackendError::Local)
        .context(OtherIoSnafu { path: path() })?;

    file.sync_all()
        .await
        .map_err(BackendError::Local)
        .context(OtherIoSnafu { path: path() })
}

/// Write `contents` to `rel_path` inside `location` using an atomic write.
///
/// The payload goes to a temporary sibling file which is synced and then
/// renamed over the target, so readers observe either the old or the new
/// contents, never a torn write.
pub async fn write_atomic(
    location: &StorageLocation,
    rel_path: &Path,
    contents: &[u8],
) -> StorageResult<()> {
    match location {
        StorageLocation::Local(_) => {
            let abs = join_local(location, rel_path);
            create_parent_dir(&abs).await?;

            let tmp_path = staging_path(&abs);
            let mut guard = TempFileGuard::new(tmp_path.clone());
            write_staged(&tmp_path, contents).await?;

            fs::rename(&tmp_path, &abs)
                .await
                .map_err(BackendError::Local)
                .context(OtherIoSnafu {
                    path: abs.display().to_string(),
                })?;

            guard.disarm();
            Ok(())
        }
    }
}

/// Create a *new* file at `rel_path` and write `contents`, failing with
/// [`StorageError::AlreadyExists`] if the file already exists.
///
/// The file appears with its full contents or not at all: the payload is
/// staged in a synced sibling and hard-linked into place, and linking fails
/// when the target exists. Commit files rely on this for per-version
/// uniqueness; manifests and manifest lists rely on it for immutability.
pub async fn write_new(
    location: &StorageLocation,
    rel_path: &Path,
    contents: &[u8],
) -> StorageResult<()> {
    match location {
        StorageLocation::Local(_) => {
            let abs = join_local(location, rel_path);
            create_parent_dir(&abs).await?;

            let tmp_path = staging_path(&abs);
            // Removed on drop whether or not the link succeeds.
            let _guard = TempFileGuard::new(tmp_path.clone());
            write_staged(&tmp_path, contents).await?;

            fs::hard_link(&tmp_path, &abs)
                .await
                .map_err(|e| classify_io(abs.display().to_string(), e))
        }
    }
}

/// Read the file at `rel_path` within `location` as UTF-8 text.
///
/// Missing files map to [`StorageError::NotFound`].
pub async fn read_to_string(location: &StorageLocation, rel_path: &Path) -> StorageResult<String> {
    match location {
        StorageLocation::Local(_) => {
            let abs = join_local(location, rel_path);
            fs::read_to_string(&abs)
                .await
                .map_err(|e| classify_io(abs.display().to_string(), e))
        }
    }
}

/// Read the full contents of the file at `rel_path` within `location`.
pub async fn read_all_bytes(location: &StorageLocation, rel_path: &Path) -> StorageResult<Vec<u8>> {
    match location {
        StorageLocation::Local(_) => {
            let abs = join_local(location, rel_path);
            fs::read(&abs)
                .await
                .map_err(|e| classify_io(abs.display().to_string(), e))
        }
    }
}

/// Recursively list regular files below `rel_dir`.
///
/// Returned paths are relative to the location root and sorted, so callers
/// get a deterministic order regardless of directory iteration order.
pub async fn list_files(location: &StorageLocation, rel_dir: &Path) -> StorageResult<Vec<PathBuf>> {
    match location {
        StorageLocation::Local(root) => {
            let mut out = Vec::new();
            let mut pending = vec![join_local(location, rel_dir)];

            while let Some(dir) = pending.pop() {
                let mut entries = fs::read_dir(&dir)
                    .await
                    .map_err(|e| classify_io(dir.display().to_string(), e))?;

                while let Some(entry) = entries
                    .next_entry()
                    .await
                    .map_err(BackendError::Local)
                    .context(OtherIoSnafu {
                        path: dir.display().to_string(),
                    })?
                {
                    let path = entry.path();
                    let file_type = entry
                        .file_type()
                        .await
                        .map_err(BackendError::Local)
                        .context(OtherIoSnafu {
                            path: path.display().to_string(),
                        })?;

                    if file_type.is_dir() {
                        pending.push(path);
                    } else if file_type.is_file() {
                        let rel = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
                        out.push(rel);
                    }
                }
            }

            out.sort();
            Ok(out)
        }
    }
}

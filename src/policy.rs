//! Reconciliation policy
//!
//! Two pure classifiers, one per enumeration side. Each maps a descriptor
//! plus the observed state of its counterpart to the action required
//! under a given mode. Nothing here performs I/O.
//!
//! File side (local descriptor, remote counterpart):
//!
//! | Mode         | missing    | stale          | otherwise |
//! |--------------|------------|----------------|-----------|
//! | Backup*      | UploadFile | UploadFile     | None      |
//! | Restore*     | DeleteFile | DownloadObject | None      |
//!
//! Object side (remote descriptor, local counterpart):
//!
//! | Mode         | missing/dir    | stale          | otherwise |
//! |--------------|----------------|----------------|-----------|
//! | Backup*      | DeleteObject   | UploadFile     | None      |
//! | Restore*     | DownloadObject | DownloadObject | None      |
//!
//! "Stale" means the sizes differ or the local side is strictly newer.
//! Live and mock variants classify identically; only execution differs.

use crate::types::{Action, Direction, LocalFile, LocalState, Meta, RemoteObject, SyncMode};
use chrono::{DateTime, Utc};

/// Classify a local file against the remote object at its key
pub fn classify_file(mode: SyncMode, file: &LocalFile, remote: Option<&Meta>) -> Action {
    let local = Meta {
        size: file.size,
        modified: file.modified,
    };

    match (mode.direction(), remote) {
        (Direction::Backup, None) => Action::UploadFile,
        (Direction::Restore, None) => Action::DeleteFile,
        (Direction::Backup, Some(remote)) if is_stale(&local, remote) => Action::UploadFile,
        (Direction::Restore, Some(remote)) if is_stale(&local, remote) => Action::DownloadObject,
        _ => Action::None,
    }
}

/// Classify a remote object against the local path it maps to
pub fn classify_object(mode: SyncMode, object: &RemoteObject, local: &LocalState) -> Action {
    let remote = Meta {
        size: object.size,
        modified: object.modified,
    };

    match (mode.direction(), local) {
        (Direction::Backup, LocalState::Missing | LocalState::Directory) => Action::DeleteObject,
        (Direction::Restore, LocalState::Missing | LocalState::Directory) => {
            Action::DownloadObject
        }
        (Direction::Backup, LocalState::File(local)) if is_stale(local, &remote) => {
            Action::UploadFile
        }
        (Direction::Restore, LocalState::File(local)) if is_stale(local, &remote) => {
            Action::DownloadObject
        }
        _ => Action::None,
    }
}

/// True if the sides differ in size or the local side is newer
pub fn is_stale(local: &Meta, remote: &Meta) -> bool {
    local.size != remote.size || is_newer(local.modified, remote.modified)
}

/// Strict "a is later than b", at the store's one-second precision
///
/// Object stores report modification times truncated to whole seconds,
/// so sub-second differences are not meaningful.
pub fn is_newer(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.timestamp() > b.timestamp()
}

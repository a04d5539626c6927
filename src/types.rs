//! Core value types for a reconciliation run
//!
//! Descriptors are immutable snapshots taken at enumeration time; they
//! live only for their pass through a queue and a worker.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;

/// Direction of a sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Local files => remote objects
    Backup,
    /// Remote objects => local files
    Restore,
}

/// Sync mode: direction x execution
///
/// Fixed for the lifetime of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncMode {
    BackupLive,
    BackupMock,
    RestoreLive,
    RestoreMock,
}

impl SyncMode {
    /// Build a mode from its two components
    pub fn new(direction: Direction, live: bool) -> Self {
        match (direction, live) {
            (Direction::Backup, true) => SyncMode::BackupLive,
            (Direction::Backup, false) => SyncMode::BackupMock,
            (Direction::Restore, true) => SyncMode::RestoreLive,
            (Direction::Restore, false) => SyncMode::RestoreMock,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            SyncMode::BackupLive | SyncMode::BackupMock => Direction::Backup,
            SyncMode::RestoreLive | SyncMode::RestoreMock => Direction::Restore,
        }
    }

    /// True if actions are physically applied
    pub fn is_live(&self) -> bool {
        matches!(self, SyncMode::BackupLive | SyncMode::RestoreLive)
    }

    /// The report-only variant of this mode
    pub fn to_mock(self) -> Self {
        SyncMode::new(self.direction(), false)
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncMode::BackupLive => "Backup : File --> S3",
            SyncMode::BackupMock => "Backup (mock) : File --> S3",
            SyncMode::RestoreLive => "Restore : S3 --> File",
            SyncMode::RestoreMock => "Restore (mock) : S3 --> File",
        };
        f.write_str(s)
    }
}

/// Outcome of classifying one descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    None,
    UploadFile,
    DownloadObject,
    DeleteFile,
    DeleteObject,
}

impl Action {
    /// All actions, in report order
    pub const ALL: [Action; 5] = [
        Action::None,
        Action::UploadFile,
        Action::DownloadObject,
        Action::DeleteFile,
        Action::DeleteObject,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Action::None => "None",
            Action::UploadFile => "UploadFile",
            Action::DownloadObject => "DownloadObject",
            Action::DeleteFile => "DeleteFile",
            Action::DeleteObject => "DeleteObject",
        }
    }

    /// True if applying this action changes either side
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Action::None)
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Action::None => 0,
            Action::UploadFile => 1,
            Action::DownloadObject => 2,
            Action::DeleteFile => 3,
            Action::DeleteObject => 4,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A regular file found under the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Absolute path
    pub path: PathBuf,

    /// Last modification time, in UTC
    pub modified: DateTime<Utc>,

    /// Size in bytes
    pub size: u64,
}

impl fmt::Display for LocalFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// An object found in the bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    /// Store-relative key
    pub key: String,

    /// Last modification time, in UTC
    pub modified: DateTime<Utc>,

    /// Size in bytes
    pub size: u64,
}

impl fmt::Display for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Metadata of a counterpart on the other side (object head or file stat)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Meta {
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Observed state of the local path an object maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalState {
    Missing,
    Directory,
    File(Meta),
}

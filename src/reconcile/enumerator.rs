//! Enumerators: the single producer of each pipeline
//!
//! Both functions take the queue sender by value. Whatever way they
//! return, the sender is dropped and the queue closes, so waiting
//! workers always see end-of-stream.

use crate::error::{EnumerateError, Result};
use crate::keys::normalize;
use crate::reconcile::actions::is_part_file;
use crate::reconcile::queue::{QueueSender, SendError};
use crate::reconcile::RunContext;
use crate::types::{LocalFile, RemoteObject};
use chrono::{DateTime, Utc};
use std::sync::atomic::AtomicBool;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Outcome of a completed (or cancelled) enumeration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnumerationStats {
    /// Descriptors handed to the queue
    pub emitted: u64,

    /// Total size of the emitted descriptors
    pub bytes: u64,

    /// Stopped early because the run was cancelled
    pub cancelled: bool,
}

/// Walk the root directory, queueing one descriptor per regular file
///
/// Directories and symlinks are never emitted. A path at or over the
/// maximum key length, or any traversal error, aborts the walk.
pub fn walk_files(
    ctx: &RunContext,
    tx: QueueSender<LocalFile>,
    cancel: &AtomicBool,
) -> Result<EnumerationStats> {
    let root = ctx.keys.root();
    info!(root = %root.display(), "File walker started");

    let mut stats = EnumerationStats::default();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| EnumerateError::Walk {
            path: e
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| root.display().to_string()),
            reason: e.to_string(),
        })?;

        if !entry.file_type().is_file() || is_part_file(entry.path()) {
            continue;
        }

        let path = normalize(entry.path());
        let len = path.as_os_str().len();
        if len >= ctx.max_key_length {
            return Err(EnumerateError::KeyTooLong {
                path: path.display().to_string(),
                len,
                max: ctx.max_key_length,
            }
            .into());
        }

        let walk_error = |reason: String| EnumerateError::Walk {
            path: path.display().to_string(),
            reason,
        };
        let metadata = entry.metadata().map_err(|e| walk_error(e.to_string()))?;
        let modified: DateTime<Utc> = metadata
            .modified()
            .map_err(|e| walk_error(e.to_string()))?
            .into();

        let file = LocalFile {
            path,
            modified,
            size: metadata.len(),
        };
        let size = file.size;

        match tx.send(file, cancel) {
            Ok(()) => {
                stats.emitted += 1;
                stats.bytes += size;
            }
            Err(SendError::Cancelled) | Err(SendError::Disconnected) => {
                debug!("File walker cancelled");
                stats.cancelled = true;
                return Ok(stats);
            }
        }
    }

    info!(files = stats.emitted, "File walker finished walking the files");
    Ok(stats)
}

/// Page through the bucket listing, queueing one descriptor per object
pub fn list_objects(
    ctx: &RunContext,
    tx: QueueSender<RemoteObject>,
    cancel: &AtomicBool,
) -> Result<EnumerationStats> {
    let bucket = ctx.store.bucket().to_string();
    info!(bucket = %bucket, "Object walker started");

    let mut stats = EnumerationStats::default();
    let mut token: Option<String> = None;
    let mut pages = 0u64;

    loop {
        let page = ctx
            .store
            .list_page(token.as_deref())
            .map_err(|source| EnumerateError::Listing {
                bucket: bucket.clone(),
                source,
            })?;
        pages += 1;

        for object in page.objects {
            let size = object.size;
            match tx.send(object, cancel) {
                Ok(()) => {
                    stats.emitted += 1;
                    stats.bytes += size;
                }
                Err(SendError::Cancelled) | Err(SendError::Disconnected) => {
                    debug!("Object walker cancelled");
                    stats.cancelled = true;
                    return Ok(stats);
                }
            }
        }

        match page.next {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    info!(objects = stats.emitted, pages = pages, "Finished walking objects");
    Ok(stats)
}

//! Physical actions against the bucket and the local tree
//!
//! Only live runs reach this module. Each function returns the number
//! of bytes moved so the run summary can report transfer volume.

use crate::error::ActionCause;
use crate::store::ObjectStore;
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

type ActionResult<T> = std::result::Result<T, ActionCause>;

/// Suffix of in-flight download files; enumerators skip these
pub const PART_SUFFIX: &str = ".s3sync-part";

/// Upload the file at `path` to `key`, overwriting any existing object
pub fn upload_file(store: &dyn ObjectStore, path: &Path, key: &str) -> ActionResult<u64> {
    let data = fs::read(path)?;
    let len = data.len() as u64;
    store.put_object(key, data)?;
    debug!(path = %path.display(), key = %key, bytes = len, "Uploaded");
    Ok(len)
}

/// Download `key` to `path`, creating parent directories as needed
///
/// The data lands in a sibling temp file first and is renamed into place,
/// so an interrupted download never leaves a truncated file behind. The
/// file's mtime is set to the object's, which keeps a repeated restore
/// from seeing the fresh file as newer than the object.
pub fn download_object(
    store: &dyn ObjectStore,
    key: &str,
    path: &Path,
    modified: DateTime<Utc>,
) -> ActionResult<u64> {
    let data = store.get_object(key)?;
    let len = data.len() as u64;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(&data)?;
        file.set_modified(SystemTime::from(modified))?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    debug!(key = %key, path = %path.display(), bytes = len, "Downloaded");
    Ok(len)
}

/// Remove a local file
pub fn delete_file(path: &Path) -> ActionResult<u64> {
    fs::remove_file(path)?;
    debug!(path = %path.display(), "Deleted file");
    Ok(0)
}

/// Remove a remote object
pub fn delete_object(store: &dyn ObjectStore, key: &str) -> ActionResult<u64> {
    store.delete_object(key)?;
    debug!(key = %key, "Deleted object");
    Ok(0)
}

/// True for a partially downloaded file
pub fn is_part_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.') && n.ends_with(PART_SUFFIX))
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}{PART_SUFFIX}"))
}

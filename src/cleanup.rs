//! Empty-directory pruning
//!
//! Restores create parent directories on demand, and deletes leave empty
//! directories behind. `prune_empty_dirs` tidies the tree afterwards. It
//! is never run implicitly by a sync.

use crate::error::{EnumerateError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Remove every empty directory below `root`, leaves first
///
/// Directories are visited after their contents, so a chain of nested
/// empty directories collapses in a single pass. The root itself is
/// never removed. Returns the removed directories in removal order.
pub fn prune_empty_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    info!(root = %root.display(), "Pruning empty directories");

    let mut removed = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .contents_first(true)
    {
        let entry = entry.map_err(|e| EnumerateError::Walk {
            path: e
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| root.display().to_string()),
            reason: e.to_string(),
        })?;

        if !entry.file_type().is_dir() {
            continue;
        }

        let dir = entry.path();
        if is_empty_dir(dir)? {
            fs::remove_dir(dir)?;
            debug!(dir = %dir.display(), "Removed empty directory");
            removed.push(dir.to_path_buf());
        }
    }

    info!(removed = removed.len(), "Pruning finished");
    Ok(removed)
}

fn is_empty_dir(dir: &Path) -> Result<bool> {
    Ok(fs::read_dir(dir)?.next().is_none())
}

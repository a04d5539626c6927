//! Translation between local absolute paths and remote object keys
//!
//! A key is the path with the root prefix stripped, using `/` as the
//! separator and keeping the leading `/` (`<root>/a/b.txt` -> `/a/b.txt`).
//! The reverse joins the key onto the root, and only accepts keys in the
//! exact form `to_key` produces, so every accepted key names one path and
//! that path maps back to the same key.
//!
//! Both directions return `None` when no valid mapping exists; callers
//! classify such items to `Action::None` without probing.

use std::path::{Component, Path, PathBuf};

/// Maps paths under one root to keys and back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMapper {
    root: PathBuf,
}

impl KeyMapper {
    /// Create a mapper for an absolute root directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: normalize(&root.into()),
        }
    }

    /// The normalized root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Key for a path under the root
    ///
    /// Returns `None` if the path is outside the root, is the root itself,
    /// or is not valid UTF-8.
    pub fn to_key(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;

        let mut key = String::new();
        for component in rel.components() {
            match component {
                Component::Normal(part) => {
                    key.push('/');
                    key.push_str(part.to_str()?);
                }
                _ => return None,
            }
        }

        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }

    /// Absolute path for a key
    ///
    /// Returns `None` for any key that is not in canonical form: missing
    /// leading `/`, empty segments, `.` or `..` segments, or a trailing `/`
    /// (folder markers). Such keys are never produced by `to_key`.
    pub fn to_path(&self, key: &str) -> Option<PathBuf> {
        let rel = key.strip_prefix('/')?;
        if rel.is_empty() {
            return None;
        }

        let path = normalize(&self.root.join(rel));
        if self.to_key(&path).as_deref() != Some(key) {
            return None;
        }
        Some(path)
    }
}

/// Lexically clean a path: drop `.`, resolve `..`, collapse separators
///
/// Does not touch the filesystem, so it works for paths that do not
/// exist yet (a restore target).
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping past the root is a no-op, as with `/..`
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

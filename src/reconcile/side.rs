//! The two pipeline sides
//!
//! A side knows how to probe the opposite side for one descriptor, ask
//! the policy for an action, and (in live mode) apply it. Workers are
//! generic over the side, so the file-driven and object-driven pipelines
//! share one implementation.

use crate::error::{ActionCause, ActionError, ProbeError, Result};
use crate::policy;
use crate::reconcile::actions;
use crate::reconcile::enumerator::{self, EnumerationStats};
use crate::reconcile::queue::QueueSender;
use crate::reconcile::RunContext;
use crate::types::{Action, LocalFile, LocalState, Meta, RemoteObject};
use chrono::{DateTime, Utc};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::AtomicBool;

/// Result of reconciling one descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Classified action
    pub action: Action,

    /// True if the action was physically performed
    pub applied: bool,

    /// Bytes moved by the action (zero in mock mode)
    pub bytes: u64,
}

impl Outcome {
    fn planned(action: Action) -> Self {
        Self {
            action,
            applied: false,
            bytes: 0,
        }
    }
}

/// One side of the reconciliation: what is enumerated and how it is judged
pub trait Side: Send + Sync + 'static {
    /// Descriptor type flowing through this side's queue
    type Item: Send + fmt::Display + 'static;

    /// Short name used in worker ids and logs
    const NAME: &'static str;

    /// Produce this side's descriptors into the queue, closing it on return
    fn enumerate(
        ctx: &RunContext,
        tx: QueueSender<Self::Item>,
        cancel: &AtomicBool,
    ) -> Result<EnumerationStats>;

    /// Classify one descriptor and apply the action if the mode is live
    fn reconcile(ctx: &RunContext, item: &Self::Item) -> Result<Outcome>;
}

/// File-driven side: local descriptors probed against the bucket
pub struct FileSide;

impl Side for FileSide {
    type Item = LocalFile;
    const NAME: &'static str = "file";

    fn enumerate(
        ctx: &RunContext,
        tx: QueueSender<LocalFile>,
        cancel: &AtomicBool,
    ) -> Result<EnumerationStats> {
        enumerator::walk_files(ctx, tx, cancel)
    }

    fn reconcile(ctx: &RunContext, file: &LocalFile) -> Result<Outcome> {
        let Some(key) = ctx.keys.to_key(&file.path) else {
            return Ok(Outcome::planned(Action::None));
        };

        let remote = ctx.store.head_object(&key)?;
        let action = policy::classify_file(ctx.mode, file, remote.as_ref());

        if !ctx.mode.is_live() || !action.is_mutation() {
            return Ok(Outcome::planned(action));
        }

        let store = ctx.store.as_ref();
        let result = match (action, remote) {
            (Action::UploadFile, _) => actions::upload_file(store, &file.path, &key),
            (Action::DownloadObject, Some(remote)) => {
                actions::download_object(store, &key, &file.path, remote.modified)
            }
            (Action::DeleteFile, _) => actions::delete_file(&file.path),
            _ => return Ok(Outcome::planned(action)),
        };

        applied(action, file, result)
    }
}

/// Object-driven side: remote descriptors probed against the local tree
pub struct ObjectSide;

impl Side for ObjectSide {
    type Item = RemoteObject;
    const NAME: &'static str = "object";

    fn enumerate(
        ctx: &RunContext,
        tx: QueueSender<RemoteObject>,
        cancel: &AtomicBool,
    ) -> Result<EnumerationStats> {
        enumerator::list_objects(ctx, tx, cancel)
    }

    fn reconcile(ctx: &RunContext, object: &RemoteObject) -> Result<Outcome> {
        let Some(path) = ctx.keys.to_path(&object.key) else {
            return Ok(Outcome::planned(Action::None));
        };

        let local = probe_local(&object.key, &path)?;
        let action = policy::classify_object(ctx.mode, object, &local);

        if !ctx.mode.is_live() || !action.is_mutation() {
            return Ok(Outcome::planned(action));
        }

        let store = ctx.store.as_ref();
        let result = match action {
            Action::UploadFile => actions::upload_file(store, &path, &object.key),
            Action::DownloadObject => {
                actions::download_object(store, &object.key, &path, object.modified)
            }
            Action::DeleteObject => actions::delete_object(store, &object.key),
            _ => return Ok(Outcome::planned(action)),
        };

        applied(action, object, result)
    }
}

/// Stat the local path an object maps to
fn probe_local(key: &str, path: &Path) -> Result<LocalState> {
    let failed = |source| ProbeError {
        key: key.to_string(),
        path: path.to_path_buf(),
        source,
    };

    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(LocalState::Directory),
        Ok(meta) => {
            let modified: DateTime<Utc> = meta.modified().map_err(failed)?.into();
            Ok(LocalState::File(Meta {
                size: meta.len(),
                modified,
            }))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(LocalState::Missing),
        Err(e) => Err(failed(e).into()),
    }
}

fn applied(
    action: Action,
    item: &impl fmt::Display,
    result: std::result::Result<u64, ActionCause>,
) -> Result<Outcome> {
    let bytes = result.map_err(|source| ActionError {
        action,
        item: item.to_string(),
        source,
    })?;

    Ok(Outcome {
        action,
        applied: true,
        bytes,
    })
}

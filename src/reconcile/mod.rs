//! Concurrent reconciliation pipeline
//!
//! Each side (local files, remote objects) is one pipeline: a single
//! enumerator feeding a bounded queue drained by a pool of workers. A
//! completion barrier tracks every task of a run.

pub mod actions;
pub mod barrier;
pub mod coordinator;
pub mod enumerator;
pub mod queue;
pub mod side;
pub mod worker;

pub use coordinator::{
    check, reconcile_files, reconcile_objects, PipelineResult, ReconcileCoordinator, RunResult,
};
pub use side::{FileSide, ObjectSide, Outcome, Side};
pub use worker::{CollectingSink, ReportLine, ReportSink, StdoutSink};

use crate::keys::KeyMapper;
use crate::store::ObjectStore;
use crate::types::SyncMode;
use std::path::Path;
use std::sync::Arc;

/// Default number of workers per pipeline
pub const DEFAULT_WORKERS: usize = 10;

/// Default capacity of each descriptor queue
pub const DEFAULT_QUEUE_SIZE: usize = 2000;

/// Everything a run needs, fixed for its lifetime and shared by all tasks
#[derive(Clone)]
pub struct RunContext {
    /// Direction and live/mock execution
    pub mode: SyncMode,

    /// Path <-> key translation rooted at the sync directory
    pub keys: KeyMapper,

    /// Remote store client
    pub store: Arc<dyn ObjectStore>,

    /// Paths must be strictly shorter than this
    pub max_key_length: usize,

    /// Workers per pipeline
    pub worker_count: usize,

    /// Capacity of each queue
    pub queue_size: usize,
}

impl RunContext {
    pub fn new(
        mode: SyncMode,
        root: &Path,
        store: Arc<dyn ObjectStore>,
        max_key_length: usize,
    ) -> Self {
        Self {
            mode,
            keys: KeyMapper::new(root),
            store,
            max_key_length,
            worker_count: DEFAULT_WORKERS,
            queue_size: DEFAULT_QUEUE_SIZE,
        }
    }

    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }

    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size.max(1);
        self
    }

    /// Same run settings under a different mode
    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn root(&self) -> &Path {
        self.keys.root()
    }
}

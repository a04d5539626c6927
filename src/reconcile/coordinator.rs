//! Run coordinator - orchestrates the reconciliation pipelines
//!
//! The coordinator is responsible for:
//! - Registering every enumerator and worker with the completion barrier
//! - Starting the pipelines the run asks for
//! - Waiting on the barrier, then joining every thread
//! - Surfacing the first fatal error, or an interrupt, to the caller
//! - Final statistics

use crate::config::Scope;
use crate::error::{Result, SyncError, WorkerError};
use crate::reconcile::barrier::{CompletionBarrier, TaskToken};
use crate::reconcile::enumerator::EnumerationStats;
use crate::reconcile::queue::work_queue;
use crate::reconcile::side::{FileSide, ObjectSide, Side};
use crate::reconcile::worker::{aggregate_stats, PoolTotals, ReportSink, Worker};
use crate::reconcile::RunContext;
use crate::types::{Action, SyncMode};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How often a waiting run logs its outstanding tasks
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// Result of one pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineResult {
    /// What the enumerator produced
    pub enumeration: EnumerationStats,

    /// What the workers did with it
    pub totals: PoolTotals,

    /// Times the enumerator found the queue full
    pub backpressure: u64,
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Mode the run executed in
    pub mode: SyncMode,

    /// File pipeline, if it ran
    pub files: Option<PipelineResult>,

    /// Object pipeline, if it ran
    pub objects: Option<PipelineResult>,

    /// Wall time of the run
    pub duration: Duration,
}

impl RunResult {
    /// Totals across both pipelines
    pub fn totals(&self) -> PoolTotals {
        [self.files, self.objects]
            .iter()
            .flatten()
            .fold(PoolTotals::default(), |acc, p| acc.merge(&p.totals))
    }

    /// Items classified to `action` across both pipelines
    pub fn count(&self, action: Action) -> u64 {
        self.totals().count(action)
    }

    /// Items handled across both pipelines
    pub fn items(&self) -> u64 {
        self.totals().items
    }

    /// Bytes moved by applied actions
    pub fn bytes(&self) -> u64 {
        self.totals().bytes
    }

    fn then(self, next: RunResult) -> RunResult {
        RunResult {
            mode: self.mode,
            files: next.files.or(self.files),
            objects: next.objects.or(self.objects),
            duration: self.duration + next.duration,
        }
    }
}

/// A started pipeline: its enumerator thread and worker pool
struct Pipeline<S: Side> {
    enumerator: JoinHandle<Result<EnumerationStats>>,
    workers: Vec<Worker<S>>,
    backpressure: Arc<AtomicU64>,
}

/// Coordinates one or both reconciliation pipelines
pub struct ReconcileCoordinator {
    /// Run settings shared by every task
    ctx: Arc<RunContext>,

    /// Where report lines go
    sink: Arc<dyn ReportSink>,

    /// Set by the first fatal error or by an external shutdown request
    cancel: Arc<AtomicBool>,
}

impl ReconcileCoordinator {
    pub fn new(ctx: RunContext, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            ctx: Arc::new(ctx),
            sink,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a clone of the cancel flag (for signal handlers)
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Apply the run's mode to the pipelines in `scope`
    ///
    /// With both sides in scope the object pipeline runs to completion
    /// first, then the file pipeline. Each is its own barrier-guarded run.
    pub fn reconcile(&self, scope: Scope) -> Result<RunResult> {
        match scope {
            Scope::Files => self.run(&self.ctx, false, true),
            Scope::Objects => self.run(&self.ctx, true, false),
            Scope::All => {
                let objects = self.run(&self.ctx, true, false)?;
                let files = self.run(&self.ctx, false, true)?;
                Ok(objects.then(files))
            }
        }
    }

    /// Run both pipelines concurrently in report-only mode
    pub fn check(&self) -> Result<RunResult> {
        let ctx = Arc::new(self.ctx.as_ref().clone().with_mode(self.ctx.mode.to_mock()));
        self.run(&ctx, true, true)
    }

    fn run(&self, ctx: &Arc<RunContext>, objects: bool, files: bool) -> Result<RunResult> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(SyncError::Interrupted);
        }

        let start_time = Instant::now();
        info!(
            mode = %ctx.mode,
            bucket = %ctx.store.bucket(),
            root = %ctx.root().display(),
            workers = ctx.worker_count,
            "Starting reconciliation"
        );

        // Register every task before any of them starts
        let barrier = CompletionBarrier::new();
        let per_pipeline = ctx.worker_count + 1;
        let mut object_tokens = barrier.register(if objects { per_pipeline } else { 0 });
        let mut file_tokens = barrier.register(if files { per_pipeline } else { 0 });

        let object_pipeline = if objects {
            Some(self.start::<ObjectSide>(ctx, &mut object_tokens)?)
        } else {
            None
        };
        let file_pipeline = if files {
            match self.start::<FileSide>(ctx, &mut file_tokens) {
                Ok(p) => Some(p),
                Err(e) => {
                    self.cancel.store(true, Ordering::SeqCst);
                    if let Some(p) = object_pipeline {
                        let _ = self.finish(p);
                    }
                    return Err(e);
                }
            }
        } else {
            None
        };

        self.wait_for_completion(&barrier);

        let mut first_error: Option<SyncError> = None;
        let mut keep = |result: Result<PipelineResult>| match result {
            Ok(r) => Some(r),
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
                None
            }
        };
        let objects_result = object_pipeline.map(|p| self.finish(p)).and_then(&mut keep);
        let files_result = file_pipeline.map(|p| self.finish(p)).and_then(&mut keep);

        if let Some(e) = first_error {
            return Err(e);
        }
        if self.cancel.load(Ordering::Relaxed) {
            warn!("Run interrupted before completion");
            return Err(SyncError::Interrupted);
        }

        let result = RunResult {
            mode: ctx.mode,
            files: files_result,
            objects: objects_result,
            duration: start_time.elapsed(),
        };

        info!(
            items = result.items(),
            bytes = result.bytes(),
            duration_ms = result.duration.as_millis() as u64,
            "Reconciliation completed"
        );

        Ok(result)
    }

    /// Spawn the workers and then the enumerator of one pipeline
    fn start<S: Side>(
        &self,
        ctx: &Arc<RunContext>,
        tokens: &mut Vec<TaskToken>,
    ) -> Result<Pipeline<S>> {
        let (tx, rx) = work_queue::<S::Item>(ctx.queue_size);
        let queue_stats = tx.stats();

        let mut workers = Vec::with_capacity(ctx.worker_count);
        for id in 0..ctx.worker_count {
            let Some(token) = tokens.pop() else { break };
            let worker = Worker::<S>::spawn(
                id,
                Arc::clone(ctx),
                rx.clone(),
                Arc::clone(&self.sink),
                Arc::clone(&self.cancel),
                token,
            )?;
            workers.push(worker);
        }
        drop(rx);
        debug!(side = S::NAME, count = workers.len(), "Workers spawned");

        let backpressure = Arc::new(AtomicU64::new(0));
        let enumerator = {
            let ctx = Arc::clone(ctx);
            let cancel = Arc::clone(&self.cancel);
            let backpressure = Arc::clone(&backpressure);
            let token = tokens.pop();
            thread::Builder::new()
                .name(format!("{}-enumerator", S::NAME))
                .spawn(move || {
                    let _token = token;
                    let result = S::enumerate(&ctx, tx, &cancel);
                    backpressure.store(queue_stats.backpressure_count(), Ordering::Relaxed);
                    if let Err(e) = &result {
                        error!(side = S::NAME, error = %e, "Enumeration failed, cancelling run");
                        cancel.store(true, Ordering::SeqCst);
                    }
                    result
                })
                .map_err(|e| WorkerError::SpawnFailed {
                    name: format!("{}-enumerator", S::NAME),
                    reason: e.to_string(),
                })?
        };

        Ok(Pipeline {
            enumerator,
            workers,
            backpressure,
        })
    }

    /// Block until the barrier opens
    fn wait_for_completion(&self, barrier: &CompletionBarrier) {
        while !barrier.wait_timeout(STATUS_INTERVAL) {
            debug!(
                outstanding = barrier.outstanding(),
                cancelled = self.cancel.load(Ordering::Relaxed),
                "Waiting for tasks"
            );
        }
    }

    /// Join a pipeline's threads and collect its result
    fn finish<S: Side>(&self, pipeline: Pipeline<S>) -> Result<PipelineResult> {
        let totals = aggregate_stats(&pipeline.workers);
        let mut first_error = None;

        let enumeration = match pipeline.enumerator.join() {
            Ok(Ok(stats)) => stats,
            Ok(Err(e)) => {
                first_error = Some(e);
                EnumerationStats::default()
            }
            Err(_) => {
                first_error = Some(SyncError::Worker(WorkerError::Panicked {
                    name: format!("{}-enumerator", S::NAME),
                    message: "Enumerator thread panicked".into(),
                }));
                EnumerationStats::default()
            }
        };

        for worker in pipeline.workers {
            let name = worker.name().to_string();
            if let Err(e) = worker.join() {
                debug!(worker = %name, error = %e, "Worker finished with error");
                first_error.get_or_insert(e);
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        Ok(PipelineResult {
            enumeration,
            totals,
            backpressure: pipeline.backpressure.load(Ordering::Relaxed),
        })
    }
}

/// Drive the file pipeline under the context's mode
pub fn reconcile_files(ctx: RunContext, sink: Arc<dyn ReportSink>) -> Result<RunResult> {
    ReconcileCoordinator::new(ctx, sink).reconcile(Scope::Files)
}

/// Drive the object pipeline under the context's mode
pub fn reconcile_objects(ctx: RunContext, sink: Arc<dyn ReportSink>) -> Result<RunResult> {
    ReconcileCoordinator::new(ctx, sink).reconcile(Scope::Objects)
}

/// Drive both pipelines in report-only mode
pub fn check(ctx: RunContext, sink: Arc<dyn ReportSink>) -> Result<RunResult> {
    ReconcileCoordinator::new(ctx, sink).check()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::worker::CollectingSink;
    use crate::store::MemoryStore;
    use chrono::Utc;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_empty_root_and_bucket_finish() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MemoryStore::new("b"));
        let ctx = RunContext::new(SyncMode::BackupLive, dir.path(), store, 1000).with_workers(3);

        let result = check(ctx, Arc::new(CollectingSink::new())).unwrap();
        assert_eq!(result.mode, SyncMode::BackupMock);
        assert_eq!(result.items(), 0);
        assert!(result.files.is_some());
        assert!(result.objects.is_some());
    }

    #[test]
    fn test_sequential_scope_all() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("local.txt"), b"local").unwrap();
        let store = Arc::new(MemoryStore::new("b"));
        store.insert("/remote-only.txt", b"r".to_vec(), Utc::now());

        let ctx = RunContext::new(SyncMode::BackupLive, dir.path(), store.clone(), 1000)
            .with_workers(2)
            .with_queue_size(1);
        let sink = Arc::new(CollectingSink::new());
        let result = ReconcileCoordinator::new(ctx, sink.clone())
            .reconcile(Scope::All)
            .unwrap();

        assert_eq!(result.count(Action::DeleteObject), 1);
        assert_eq!(result.count(Action::UploadFile), 1);
        assert_eq!(store.keys(), vec!["/local.txt".to_string()]);
        assert_eq!(sink.lines().len(), 2);
    }

    #[test]
    fn test_cancelled_coordinator_reports_interrupt() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MemoryStore::new("b"));
        let ctx = RunContext::new(SyncMode::RestoreMock, dir.path(), store, 1000);
        let coordinator = ReconcileCoordinator::new(ctx, Arc::new(CollectingSink::new()));

        coordinator.shutdown_flag().store(true, Ordering::SeqCst);
        assert!(matches!(
            coordinator.reconcile(Scope::Files),
            Err(SyncError::Interrupted)
        ));
    }

    #[test]
    fn test_enumeration_error_is_returned() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent");
        let store = Arc::new(MemoryStore::new("b"));
        let ctx = RunContext::new(SyncMode::BackupLive, &missing, store, 1000).with_workers(4);

        let err = reconcile_files(ctx, Arc::new(CollectingSink::new())).unwrap_err();
        assert!(matches!(err, SyncError::Enumerate(_)), "{err}");
    }
}

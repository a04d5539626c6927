//! Worker thread logic for the reconciliation pools
//!
//! Each worker:
//! - Pulls descriptors from its side's queue until it is closed and drained
//! - Reconciles each one (probe, classify, apply in live mode)
//! - Emits one report line per item
//! - Stops taking work as soon as the run is cancelled
//!
//! The first fatal error a worker hits sets the shared cancel flag, so
//! the enumerator and sibling workers wind down instead of draining.

use crate::error::{Result, SyncError, WorkerError};
use crate::reconcile::barrier::TaskToken;
use crate::reconcile::queue::{QueueReceiver, Recv, POLL_INTERVAL};
use crate::reconcile::side::{Outcome, Side};
use crate::reconcile::RunContext;
use crate::types::Action;
use parking_lot::Mutex;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info, trace};

/// One classified item, as shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub worker: String,
    pub action: Action,
    pub item: String,
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\tAction: {}\tItem: {}", self.worker, self.action, self.item)
    }
}

/// Destination for report lines
pub trait ReportSink: Send + Sync {
    fn report(&self, line: &ReportLine);
}

/// Prints every line to stdout
#[derive(Debug, Default)]
pub struct StdoutSink;

impl ReportSink for StdoutSink {
    fn report(&self, line: &ReportLine) {
        println!("{line}");
    }
}

/// Keeps every line in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    lines: Mutex<Vec<ReportLine>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<ReportLine> {
        self.lines.lock().clone()
    }

    /// Lines classified to `action`
    pub fn with_action(&self, action: Action) -> Vec<ReportLine> {
        self.lines
            .lock()
            .iter()
            .filter(|l| l.action == action)
            .cloned()
            .collect()
    }
}

impl ReportSink for CollectingSink {
    fn report(&self, line: &ReportLine) {
        self.lines.lock().push(line.clone());
    }
}

/// Statistics collected by a worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Items processed
    pub items: AtomicU64,

    /// Items per action, indexed in `Action::ALL` order
    pub actions: [AtomicU64; 5],

    /// Actions physically applied
    pub applied: AtomicU64,

    /// Bytes moved by applied actions
    pub bytes: AtomicU64,
}

impl WorkerStats {
    fn record(&self, outcome: &Outcome) {
        self.items.fetch_add(1, Ordering::Relaxed);
        self.actions[outcome.action.index()].fetch_add(1, Ordering::Relaxed);
        if outcome.applied {
            self.applied.fetch_add(1, Ordering::Relaxed);
        }
        self.bytes.fetch_add(outcome.bytes, Ordering::Relaxed);
    }

    pub fn action_count(&self, action: Action) -> u64 {
        self.actions[action.index()].load(Ordering::Relaxed)
    }
}

/// Totals across a pool of workers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolTotals {
    pub items: u64,
    pub actions: [u64; 5],
    pub applied: u64,
    pub bytes: u64,
}

impl PoolTotals {
    pub fn count(&self, action: Action) -> u64 {
        self.actions[action.index()]
    }

    /// Element-wise sum with another total
    pub fn merge(&self, other: &PoolTotals) -> PoolTotals {
        let mut actions = self.actions;
        for (a, b) in actions.iter_mut().zip(other.actions.iter()) {
            *a += b;
        }
        PoolTotals {
            items: self.items + other.items,
            actions,
            applied: self.applied + other.applied,
            bytes: self.bytes + other.bytes,
        }
    }
}

/// A worker thread that reconciles descriptors of one side
pub struct Worker<S: Side> {
    /// Worker name, e.g. `file-3`
    name: String,

    /// Thread handle
    handle: Option<JoinHandle<Result<()>>>,

    /// Worker statistics
    stats: Arc<WorkerStats>,

    _side: PhantomData<S>,
}

impl<S: Side> Worker<S> {
    /// Spawn a new worker thread
    ///
    /// The token is moved into the thread and signals the barrier when
    /// the thread exits, whether it returns or panics.
    pub fn spawn(
        id: usize,
        ctx: Arc<RunContext>,
        queue: QueueReceiver<S::Item>,
        sink: Arc<dyn ReportSink>,
        cancel: Arc<AtomicBool>,
        token: TaskToken,
    ) -> std::result::Result<Self, WorkerError> {
        let name = format!("{}-{}", S::NAME, id);
        let stats = Arc::new(WorkerStats::default());
        let stats_clone = Arc::clone(&stats);
        let thread_name = name.clone();

        let handle = thread::Builder::new()
            .name(format!("{}-worker-{}", S::NAME, id))
            .spawn(move || {
                let _token = token;
                worker_loop::<S>(&thread_name, &ctx, &queue, sink.as_ref(), &cancel, &stats_clone)
            })
            .map_err(|e| WorkerError::SpawnFailed {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            name,
            handle: Some(handle),
            stats,
            _side: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get worker statistics
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Wait for the worker to finish
    pub fn join(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(_) => Err(SyncError::Worker(WorkerError::Panicked {
                    name: self.name.clone(),
                    message: "Worker thread panicked".into(),
                })),
            },
            None => Ok(()),
        }
    }
}

/// Main worker loop
fn worker_loop<S: Side>(
    name: &str,
    ctx: &RunContext,
    queue: &QueueReceiver<S::Item>,
    sink: &dyn ReportSink,
    cancel: &AtomicBool,
    stats: &WorkerStats,
) -> Result<()> {
    info!(worker = %name, "Worker started");

    loop {
        if cancel.load(Ordering::Relaxed) {
            info!(worker = %name, "Worker cancelled");
            break;
        }

        let item = match queue.recv_timeout(POLL_INTERVAL) {
            Recv::Item(item) => item,
            Recv::Empty => continue,
            Recv::Closed => break,
        };

        match S::reconcile(ctx, &item) {
            Ok(outcome) => {
                trace!(worker = %name, item = %item, action = %outcome.action, "Item reconciled");
                stats.record(&outcome);
                sink.report(&ReportLine {
                    worker: name.to_string(),
                    action: outcome.action,
                    item: item.to_string(),
                });
            }
            Err(e) => {
                error!(worker = %name, item = %item, error = %e, "Fatal error, cancelling run");
                cancel.store(true, Ordering::SeqCst);
                return Err(e);
            }
        }
    }

    info!(
        worker = %name,
        items = stats.items.load(Ordering::Relaxed),
        "Worker finished"
    );

    Ok(())
}

/// Aggregate statistics from a pool of workers
pub fn aggregate_stats<S: Side>(workers: &[Worker<S>]) -> PoolTotals {
    let mut totals = PoolTotals::default();

    for worker in workers {
        totals.items += worker.stats.items.load(Ordering::Relaxed);
        for action in Action::ALL {
            totals.actions[action.index()] += worker.stats.action_count(action);
        }
        totals.applied += worker.stats.applied.load(Ordering::Relaxed);
        totals.bytes += worker.stats.bytes.load(Ordering::Relaxed);
    }

    totals
}

//! s3-sync - Concurrent local directory / S3 bucket reconciliation
//!
//! Compares a local directory tree with an S3 bucket and brings one side
//! in line with the other, or reports what it would do.
//!
//! # Features
//!
//! - **Two Directions**: backup makes the bucket match the directory,
//!   restore makes the directory match the bucket.
//!
//! - **Dry Runs**: mock modes classify every item and print the action
//!   they would take, touching nothing but read-only probes.
//!
//! - **Parallel Pipelines**: each side is walked by one enumerator and
//!   reconciled by a pool of worker threads.
//!
//! - **Memory Bounded**: descriptor queues are bounded, so a fast walker
//!   waits for slow network-bound workers.
//!
//! - **Fail Fast**: the first fatal error cancels the whole run and is
//!   returned with the operation and item that caused it.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────────┐                       ┌──────────────────┐
//!  │  Local directory │                       │    S3 bucket     │
//!  └────────┬─────────┘                       └────────┬─────────┘
//!           │ walkdir                                  │ ListObjectsV2
//!           ▼                                          ▼
//!  ┌──────────────────┐                       ┌──────────────────┐
//!  │  File enumerator │                       │ Object enumerator│
//!  └────────┬─────────┘                       └────────┬─────────┘
//!           ▼                                          ▼
//!  ┌──────────────────┐                       ┌──────────────────┐
//!  │  bounded queue   │                       │  bounded queue   │
//!  └────────┬─────────┘                       └────────┬─────────┘
//!           ▼                                          ▼
//!  ┌──────────────────┐   HeadObject   ┌─────┐ stat ┌──────────────────┐
//!  │   file workers   │ ─────────────▶ │ S3  │ ◀─── │  object workers  │
//!  │ classify + apply │                │ / fs│      │ classify + apply │
//!  └────────┬─────────┘                └─────┘      └────────┬─────────┘
//!           └──────────────────────┬─────────────────────────┘
//!                                  ▼
//!                       ┌──────────────────────┐
//!                       │  Completion barrier  │
//!                       │ (enumerators+workers)│
//!                       └──────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # What would a backup do?
//! s3-sync -b my-bucket -r /data backup --dry-run
//!
//! # Restore, then tidy up empty directories
//! s3-sync -b my-bucket -r /data restore
//! s3-sync -r /data prune
//! ```

pub mod cleanup;
pub mod config;
pub mod error;
pub mod keys;
pub mod policy;
pub mod progress;
pub mod reconcile;
pub mod store;
pub mod types;

pub use config::{CliArgs, Scope, SyncConfig, Task};
pub use error::{Result, SyncError};
pub use keys::KeyMapper;
pub use reconcile::{ReconcileCoordinator, RunContext, RunResult};
pub use store::{MemoryStore, ObjectStore, S3Store};
pub use types::{Action, Direction, LocalFile, RemoteObject, SyncMode};

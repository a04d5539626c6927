//! Error types for s3-sync
//!
//! This module defines the error hierarchy for a reconciliation run:
//! - Configuration errors (CLI validation)
//! - Remote store errors (requests against the bucket)
//! - Enumeration errors (walking the tree, listing the bucket)
//! - Probe errors (stat of an object's local path)
//! - Action errors (a failed upload/download/delete in a live run)
//! - Worker thread errors
//!
//! A missing counterpart is never an error: probes return `Ok(None)`
//! and the policy treats that as the "missing" branch.

use crate::types::Action;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for a sync run
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote store errors outside of an action (e.g. a failed probe)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Enumeration errors, fatal to the whole run
    #[error("Enumeration error: {0}")]
    Enumerate(#[from] EnumerateError),

    /// Looking at the local counterpart of an object failed
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    /// A physical action failed in a live run
    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Interrupted by signal
    #[error("Operation interrupted by signal")]
    Interrupted,
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid queue size
    #[error("Invalid queue size {size}: must be at least {min}")]
    InvalidQueueSize { size: usize, min: usize },

    /// Invalid maximum key length
    #[error("Invalid maximum key length {len}: must be between 1 and {max}")]
    InvalidKeyLength { len: usize, max: usize },

    /// Root directory is unusable
    #[error("Invalid root directory '{path}': {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    /// Bucket name is unusable
    #[error("Invalid bucket name '{bucket}': {reason}")]
    InvalidBucket { bucket: String, reason: String },

    /// A subcommand that needs a bucket was run without one
    #[error("A bucket is required for '{command}'")]
    MissingBucket { command: String },
}

/// Remote store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// A request against the store failed
    #[error("{operation} failed for '{key}': {reason}")]
    Request {
        operation: &'static str,
        key: String,
        reason: String,
    },

    /// Reading a response body failed
    #[error("Failed to read body of '{key}': {reason}")]
    Body { key: String, reason: String },

    /// The async runtime driving the client is unavailable
    #[error("Store runtime error: {0}")]
    Runtime(String),
}

/// Enumeration errors
#[derive(Error, Debug)]
pub enum EnumerateError {
    /// Path too long to be used as a key
    #[error("File name exceeds allowed length ({len} >= {max}): '{path}'")]
    KeyTooLong { path: String, len: usize, max: usize },

    /// Filesystem traversal failed
    #[error("Failed to walk '{path}': {reason}")]
    Walk { path: String, reason: String },

    /// Bucket listing failed
    #[error("Failed to list bucket '{bucket}': {source}")]
    Listing {
        bucket: String,
        #[source]
        source: StoreError,
    },
}

/// A local stat that failed for a reason other than a missing file
#[derive(Error, Debug)]
#[error("Failed to stat '{}' for object '{key}': {source}", path.display())]
pub struct ProbeError {
    pub key: String,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// A physical action that failed, with the item it was applied to
#[derive(Error, Debug)]
#[error("{action} failed for '{item}': {source}")]
pub struct ActionError {
    pub action: Action,
    pub item: String,
    #[source]
    pub source: ActionCause,
}

/// Underlying cause of an action failure
#[derive(Error, Debug)]
pub enum ActionCause {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker {name} panicked: {message}")]
    Panicked { name: String, message: String },

    /// Worker initialization failed
    #[error("Failed to spawn worker {name}: {reason}")]
    SpawnFailed { name: String, reason: String },
}

/// Result type alias for SyncError
pub type Result<T> = std::result::Result<T, SyncError>;

/// Result type alias for StoreError
pub type StoreResult<T> = std::result::Result<T, StoreError>;

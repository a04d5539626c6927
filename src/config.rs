//! Configuration types for s3-sync
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - Bucket name checks

use crate::error::ConfigError;
use crate::reconcile::RunContext;
use crate::store::{ObjectStore, S3StoreConfig};
use crate::types::{Direction, SyncMode};
use clap::{Parser, Subcommand, ValueEnum};
use regex::Regex;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 512;

/// Minimum queue size
const MIN_QUEUE_SIZE: usize = 1;

/// Longest key the store accepts
const MAX_KEY_LENGTH: usize = 1024;

/// S3 bucket naming rules: 3-63 chars, lowercase, digits, dots and hyphens
static BUCKET_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("Invalid bucket name regex")
});

/// Reconcile a local directory with an S3 bucket
#[derive(Parser, Debug, Clone)]
#[command(
    name = "s3-sync",
    version,
    about = "Reconcile a local directory tree with an S3 bucket",
    long_about = "Walks a local directory and an S3 bucket concurrently and brings one side in line \
                  with the other.\n\n\
                  backup makes the bucket match the directory, restore makes the directory match \
                  the bucket, check reports what either would do without changing anything.",
    after_help = "EXAMPLES:\n    \
        s3-sync -b my-bucket -r /data backup\n    \
        s3-sync -b my-bucket -r /data backup --dry-run\n    \
        s3-sync -b my-bucket -r /data restore --scope objects\n    \
        s3-sync -b my-bucket -r /data check --direction restore\n    \
        s3-sync -r /data prune"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Bucket to reconcile against
    #[arg(short = 'b', long, global = true, value_name = "BUCKET")]
    pub bucket: Option<String>,

    /// Local root directory
    #[arg(short = 'r', long, global = true, default_value = ".", value_name = "DIR")]
    pub root: PathBuf,

    /// AWS region of the bucket
    #[arg(long, global = true, default_value = "eu-west-1", value_name = "REGION")]
    pub region: String,

    /// Custom endpoint for S3-compatible stores
    #[arg(long, global = true, value_name = "URL")]
    pub endpoint_url: Option<String>,

    /// Workers per pipeline
    #[arg(short = 'w', long, global = true, default_value_t = 10, value_name = "NUM")]
    pub workers: usize,

    /// Capacity of each descriptor queue
    #[arg(long, global = true, default_value_t = 2000, value_name = "NUM")]
    pub queue_size: usize,

    /// Local paths must be shorter than this
    #[arg(long, global = true, default_value_t = 1000, value_name = "LEN")]
    pub max_key_length: usize,

    /// Quiet mode - suppress the header and progress spinner
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Make the bucket match the local directory
    Backup {
        /// Report actions without performing them
        #[arg(long)]
        dry_run: bool,

        /// Which side(s) to enumerate
        #[arg(long, value_enum, default_value_t = Scope::All)]
        scope: Scope,
    },

    /// Make the local directory match the bucket
    Restore {
        /// Report actions without performing them
        #[arg(long)]
        dry_run: bool,

        /// Which side(s) to enumerate
        #[arg(long, value_enum, default_value_t = Scope::All)]
        scope: Scope,
    },

    /// Run both pipelines in report-only mode
    Check {
        /// Direction whose actions are reported
        #[arg(long, value_enum, default_value_t = CheckDirection::Backup)]
        direction: CheckDirection,
    },

    /// Remove empty directories below the root
    Prune,
}

/// Which pipelines a run drives
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// Local files only
    Files,
    /// Remote objects only
    Objects,
    /// Objects, then files
    #[default]
    All,
}

/// Direction argument for `check`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckDirection {
    Backup,
    Restore,
}

impl From<CheckDirection> for Direction {
    fn from(d: CheckDirection) -> Self {
        match d {
            CheckDirection::Backup => Direction::Backup,
            CheckDirection::Restore => Direction::Restore,
        }
    }
}

/// What the binary has been asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Backup or restore, live or dry-run
    Sync { mode: SyncMode, scope: Scope },
    /// Both pipelines, report-only
    Check { mode: SyncMode },
    /// Empty-directory pruning
    Prune,
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::Sync { mode, .. } => match mode.direction() {
                Direction::Backup => "backup",
                Direction::Restore => "restore",
            },
            Task::Check { .. } => "check",
            Task::Prune => "prune",
        }
    }

    fn needs_bucket(&self) -> bool {
        !matches!(self, Task::Prune)
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// What to run
    pub task: Task,

    /// Bucket name (absent only for `prune`)
    pub bucket: Option<String>,

    /// Absolute root directory
    pub root: PathBuf,

    /// AWS region
    pub region: String,

    /// Custom S3 endpoint
    pub endpoint_url: Option<String>,

    /// Workers per pipeline
    pub worker_count: usize,

    /// Queue capacity
    pub queue_size: usize,

    /// Key length ceiling
    pub max_key_length: usize,

    /// Show the header and progress spinner
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl SyncConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let task = match args.command {
            Command::Backup { dry_run, scope } => Task::Sync {
                mode: SyncMode::new(Direction::Backup, !dry_run),
                scope,
            },
            Command::Restore { dry_run, scope } => Task::Sync {
                mode: SyncMode::new(Direction::Restore, !dry_run),
                scope,
            },
            Command::Check { direction } => Task::Check {
                mode: SyncMode::new(direction.into(), false),
            },
            Command::Prune => Task::Prune,
        };

        // Validate worker count
        if args.workers == 0 || args.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.workers,
                max: MAX_WORKERS,
            });
        }

        // Validate queue size
        if args.queue_size < MIN_QUEUE_SIZE {
            return Err(ConfigError::InvalidQueueSize {
                size: args.queue_size,
                min: MIN_QUEUE_SIZE,
            });
        }

        if args.max_key_length == 0 || args.max_key_length > MAX_KEY_LENGTH {
            return Err(ConfigError::InvalidKeyLength {
                len: args.max_key_length,
                max: MAX_KEY_LENGTH,
            });
        }

        let bucket = match args.bucket {
            Some(bucket) => {
                validate_bucket(&bucket)?;
                Some(bucket)
            }
            None if task.needs_bucket() => {
                return Err(ConfigError::MissingBucket {
                    command: task.name().to_string(),
                })
            }
            None => None,
        };

        // Root must be an existing directory; resolve it to an absolute path
        let root = fs::canonicalize(&args.root).map_err(|e| ConfigError::InvalidRoot {
            path: args.root.clone(),
            reason: e.to_string(),
        })?;
        if !root.is_dir() {
            return Err(ConfigError::InvalidRoot {
                path: args.root,
                reason: "Not a directory".to_string(),
            });
        }

        Ok(Self {
            task,
            bucket,
            root,
            region: args.region,
            endpoint_url: args.endpoint_url,
            worker_count: args.workers,
            queue_size: args.queue_size,
            max_key_length: args.max_key_length,
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }

    /// Connection settings for the S3 client
    pub fn store_config(&self) -> Result<S3StoreConfig, ConfigError> {
        let bucket = self.bucket.as_ref().ok_or_else(|| ConfigError::MissingBucket {
            command: self.task.name().to_string(),
        })?;

        let mut config = S3StoreConfig::new(bucket.clone(), self.region.clone());
        config.endpoint_url = self.endpoint_url.clone();
        Ok(config)
    }

    /// Build the run context for `mode` against `store`
    pub fn run_context(&self, mode: SyncMode, store: Arc<dyn ObjectStore>) -> RunContext {
        RunContext::new(mode, &self.root, store, self.max_key_length)
            .with_workers(self.worker_count)
            .with_queue_size(self.queue_size)
    }
}

/// Check a bucket name against S3 naming rules
pub fn validate_bucket(bucket: &str) -> Result<(), ConfigError> {
    let reason = if !BUCKET_NAME_REGEX.is_match(bucket) {
        Some("must be 3-63 lowercase letters, digits, dots or hyphens")
    } else if bucket.contains("..") {
        Some("must not contain consecutive dots")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ConfigError::InvalidBucket {
            bucket: bucket.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

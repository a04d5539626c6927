//! s3-sync - Concurrent local directory / S3 bucket reconciliation
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use s3_sync::cleanup::prune_empty_dirs;
use s3_sync::config::{CliArgs, SyncConfig, Task};
use s3_sync::progress::{finished_line, print_header, print_summary, ProgressReporter};
use s3_sync::reconcile::{ReconcileCoordinator, ReportSink, StdoutSink};
use s3_sync::store::{ObjectStore, S3Store};
use s3_sync::types::SyncMode;
use s3_sync::SyncError;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = SyncConfig::from_args(args).context("Invalid configuration")?;

    match config.task {
        Task::Prune => run_prune(&config),
        Task::Sync { mode, .. } | Task::Check { mode } => run_sync(&config, mode),
    }
}

/// Backup, restore or check against the bucket
fn run_sync(config: &SyncConfig, mode: SyncMode) -> Result<()> {
    let store_config = config.store_config()?;
    let store: Arc<dyn ObjectStore> =
        Arc::new(S3Store::connect(&store_config).context("Failed to create S3 client")?);

    if config.show_progress {
        print_header(mode, &store_config.bucket, &config.root, config.worker_count);
    }

    // Report lines always reach stdout; the spinner is optional
    let progress = config.show_progress.then(|| Arc::new(ProgressReporter::new()));
    let sink: Arc<dyn ReportSink> = match &progress {
        Some(p) => Arc::clone(p) as Arc<dyn ReportSink>,
        None => Arc::new(StdoutSink),
    };

    let coordinator = ReconcileCoordinator::new(config.run_context(mode, store), sink);

    // Setup signal handler for graceful shutdown
    let shutdown_flag = coordinator.shutdown_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    if let Some(p) = &progress {
        p.set_status("Reconciling...");
    }

    let result = match config.task {
        Task::Sync { scope, .. } => coordinator.reconcile(scope),
        _ => coordinator.check(),
    };

    if let Some(p) = &progress {
        p.finish_and_clear();
    }

    let result = match result {
        Ok(result) => result,
        Err(SyncError::Interrupted) => {
            info!("Run was interrupted before completion");
            return Err(SyncError::Interrupted.into());
        }
        Err(e) => return Err(e).context(format!("{} failed", config.task.name())),
    };

    if config.show_progress {
        print_summary(&result);
        println!();
        println!("{}", style(finished_line(&config.task)).green().bold());
    } else {
        println!("{}", finished_line(&config.task));
    }

    Ok(())
}

/// Remove empty directories below the root
fn run_prune(config: &SyncConfig) -> Result<()> {
    let removed = prune_empty_dirs(&config.root).context("Pruning failed")?;

    for dir in &removed {
        println!("Removed empty dir: {}", dir.display());
    }
    println!("{} ({} removed)", finished_line(&config.task), removed.len());

    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("s3_sync=debug,warn")
    } else {
        EnvFilter::new("s3_sync=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}

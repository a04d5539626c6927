//! Progress reporting for a sync run
//!
//! A spinner on stderr shows live per-action counts. Report lines go to
//! stdout whether or not the spinner is drawn. The header and summary are
//! printed around the run.

use crate::config::Task;
use crate::reconcile::{PipelineResult, ReportLine, ReportSink, RunResult, StdoutSink};
use crate::types::{Action, SyncMode};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Spinner that doubles as the run's report sink
pub struct ProgressReporter {
    /// Progress bar
    bar: ProgressBar,

    /// Items seen per action
    counts: [AtomicU64; 5],

    /// Where report lines are written
    output: Arc<dyn ReportSink>,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        let spinner = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        bar.set_style(spinner);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            bar,
            counts: Default::default(),
            output: Arc::new(StdoutSink),
        }
    }

    /// Reporter that draws nothing
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            counts: Default::default(),
            output: Arc::new(StdoutSink),
        }
    }

    /// Send report lines to `output` instead of stdout
    pub fn with_output(mut self, output: Arc<dyn ReportSink>) -> Self {
        self.output = output;
        self
    }

    fn status(&self) -> String {
        Action::ALL
            .iter()
            .map(|a| {
                format!(
                    "{}: {}",
                    a.name(),
                    format_number(self.counts[a.index()].load(Ordering::Relaxed))
                )
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportSink for ProgressReporter {
    fn report(&self, line: &ReportLine) {
        self.counts[line.action.index()].fetch_add(1, Ordering::Relaxed);
        // The bar is hidden when stderr is not a terminal; the line is
        // still written.
        self.bar.suspend(|| self.output.report(line));
        self.bar.set_message(self.status());
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }

    out
}

/// Print a header at the start of a run
pub fn print_header(mode: SyncMode, bucket: &str, root: &Path, workers: usize) {
    println!();
    println!(
        "{} {}",
        style("s3-sync").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Mode:").bold(), mode);
    println!("  {} {}", style("Bucket:").bold(), bucket);
    println!("  {} {}", style("Root:").bold(), root.display());
    println!("  {} {} per pipeline", style("Workers:").bold(), workers);
    println!();
}

fn print_pipeline(label: &str, pipeline: Option<&PipelineResult>) {
    if let Some(p) = pipeline {
        println!(
            "  {} {} ({})",
            style(label).bold(),
            format_number(p.enumeration.emitted),
            format_size(p.enumeration.bytes, BINARY)
        );
    }
}

/// Print a summary of the run
pub fn print_summary(result: &RunResult) {
    let totals = result.totals();
    let secs = result.duration.as_secs_f64();
    let rate = if secs > 0.0 {
        totals.items as f64 / secs
    } else {
        0.0
    };

    println!();
    println!("{}", style("Summary").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    print_pipeline("Files:", result.files.as_ref());
    print_pipeline("Objects:", result.objects.as_ref());
    for action in Action::ALL {
        let count = totals.count(action);
        if count > 0 {
            println!("  {:<16} {}", format!("{action}:"), format_number(count));
        }
    }
    if result.mode.is_live() {
        println!(
            "  {} {}",
            style("Transferred:").bold(),
            format_size(totals.bytes, BINARY)
        );
    }
    println!(
        "  {} {:.1}s ({:.0} items/sec)",
        style("Duration:").bold(),
        secs,
        rate
    );
}

/// Closing line for a run of `task`
pub fn finished_line(task: &Task) -> &'static str {
    match task {
        Task::Sync { .. } => "Sync finished",
        Task::Check { .. } => "Check finished",
        Task::Prune => "Prune finished",
    }
}

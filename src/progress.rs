//! Progress reporting for the conversion
//!
//! Provides real-time progress display using indicatif progress bars.

use crate::dispatch::{DispatchProgress, DispatchSummary, JobOutcome};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter that displays conversion status
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        bar.set_style(style);

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &DispatchProgress) {
        let msg = format!(
            "Jobs: {}/{} | Running: {} | Failed: {} | Lines: {} | Rows: {} | Rate: {:.0} rows/s",
            progress.jobs_done(),
            progress.jobs_total,
            progress.jobs_running(),
            progress.jobs_failed,
            format_number(progress.lines),
            format_number(progress.rows),
            progress.rows_per_second(),
        );

        self.bar.set_message(msg);
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut out = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Print a summary of the conversion
pub fn print_summary(summary: &DispatchSummary, output_dir: &str) {
    let totals = summary.totals();
    let duration_secs = summary.duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        totals.rows as f64 / duration_secs
    } else {
        0.0
    };

    println!();
    if summary.interrupted {
        println!("{}", style("Conversion Interrupted").yellow().bold());
    } else {
        println!("{}", style("Conversion Complete").green().bold());
    }
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {} completed, {} failed, {} skipped",
        style("Jobs:").bold(),
        summary.completed(),
        summary.failed(),
        summary.skipped()
    );
    println!("  {} {}", style("Lines:").bold(), format_number(totals.lines));
    println!("  {} {}", style("Rows:").bold(), format_number(totals.rows));
    println!(
        "  {} {:.1}s ({:.0} rows/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    if totals.parse_failures > 0 {
        println!(
            "  {} {}",
            style("Null values:").yellow().bold(),
            format_number(totals.parse_failures)
        );
    }
    println!(
        "  {} {} ({})",
        style("Output:").bold(),
        output_dir,
        format_size(summary.table_bytes(), BINARY)
    );

    let failures: Vec<_> = summary
        .reports
        .iter()
        .filter_map(|r| match &r.outcome {
            JobOutcome::Failed { error, .. } => Some((&r.job.source, error)),
            _ => None,
        })
        .collect();
    if !failures.is_empty() {
        println!();
        println!("{}", style("Failed jobs").red().bold());
        for (source, error) in failures {
            println!("  {} {}", style(source.display()).bold(), error);
        }
    }
    println!();
}

/// Print a header at the start of the conversion
pub fn print_header(group: &str, files: usize, workers: usize, output: &str) {
    println!();
    println!(
        "{} {}",
        style("pcap-parquet").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Group:").bold(), group);
    println!("  {} {}", style("Files:").bold(), files);
    println!("  {} {}", style("Workers:").bold(), workers);
    println!("  {} {}", style("Output:").bold(), output);
    println!();
}

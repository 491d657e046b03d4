//! Dispatcher - runs conversion jobs on a fixed worker pool
//!
//! The dispatcher is responsible for:
//! - Submitting one job per capture file and closing the queue
//! - Starting and joining the workers
//! - Progress reporting
//! - Graceful shutdown (unstarted jobs are skipped)
//! - Accounting for every submitted job exactly once

use crate::decoder::Decoder;
use crate::dispatch::job::{JobOutcome, JobReport, JobStats, Pipeline};
use crate::dispatch::queue::{Job, JobQueue};
use crate::dispatch::worker::Worker;
use crate::error::WorkerError;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Shared counters updated by workers
#[derive(Debug, Default)]
pub struct PipelineCounters {
    jobs_started: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_skipped: AtomicU64,
    lines: AtomicU64,
    rows: AtomicU64,
}

impl PipelineCounters {
    pub(crate) fn record_start(&self) {
        self.jobs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_line(&self) {
        self.lines.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rows(&self, rows: u64) {
        self.rows.fetch_add(rows, Ordering::Relaxed);
    }

    pub(crate) fn record_outcome(&self, outcome: &JobOutcome) {
        let counter = match outcome {
            JobOutcome::Completed { .. } => &self.jobs_completed,
            JobOutcome::Failed { .. } => &self.jobs_failed,
            JobOutcome::Skipped { .. } => &self.jobs_skipped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time view for display
    pub fn snapshot(&self, jobs_total: usize, elapsed: Duration) -> DispatchProgress {
        DispatchProgress {
            jobs_total,
            jobs_started: self.jobs_started.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_skipped: self.jobs_skipped.load(Ordering::Relaxed),
            lines: self.lines.load(Ordering::Relaxed),
            rows: self.rows.load(Ordering::Relaxed),
            elapsed,
        }
    }
}

/// Progress information for display
#[derive(Debug, Clone)]
pub struct DispatchProgress {
    /// Jobs submitted
    pub jobs_total: usize,

    /// Jobs that began running
    pub jobs_started: u64,

    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_skipped: u64,

    /// Decoded lines read across all jobs
    pub lines: u64,

    /// Rows written across all jobs
    pub rows: u64,

    /// Elapsed time
    pub elapsed: Duration,
}

impl DispatchProgress {
    /// Jobs with a final outcome
    pub fn jobs_done(&self) -> u64 {
        self.jobs_completed + self.jobs_failed + self.jobs_skipped
    }

    /// Jobs currently running
    pub fn jobs_running(&self) -> u64 {
        self.jobs_started
            .saturating_sub(self.jobs_completed + self.jobs_failed)
    }

    /// Calculate rows per second rate
    pub fn rows_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.rows as f64 / secs
        } else {
            0.0
        }
    }
}

/// Result of a completed dispatch
#[derive(Debug)]
pub struct DispatchSummary {
    /// One report per submitted job, in submission order
    pub reports: Vec<JobReport>,

    /// Time taken for the whole run
    pub duration: Duration,

    /// Whether shutdown was requested during the run
    pub interrupted: bool,
}

impl DispatchSummary {
    pub fn completed(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_completed()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_failed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_skipped()).count()
    }

    /// Counters summed over every job that ran
    pub fn totals(&self) -> JobStats {
        self.reports
            .iter()
            .filter_map(|r| r.outcome.stats())
            .fold(JobStats::default(), |mut acc, s| {
                acc.lines += s.lines;
                acc.rows += s.rows;
                acc.batches += s.batches;
                acc.parse_failures += s.parse_failures;
                acc.empty_lines += s.empty_lines;
                acc.short_lines += s.short_lines;
                acc.long_lines += s.long_lines;
                acc
            })
    }

    /// Bytes of finalized tables from completed jobs
    pub fn table_bytes(&self) -> u64 {
        self.reports
            .iter()
            .filter_map(|r| match &r.outcome {
                JobOutcome::Completed { table, .. } => Some(table.bytes),
                _ => None,
            })
            .sum()
    }
}

/// Coordinates the parallel conversion
pub struct Dispatcher<D: Decoder> {
    pipeline: Arc<Pipeline<D>>,

    /// Number of worker threads
    worker_count: usize,

    counters: Arc<PipelineCounters>,

    /// Shutdown signal
    shutdown: Arc<AtomicBool>,
}

impl<D: Decoder + 'static> Dispatcher<D> {
    pub fn new(pipeline: Pipeline<D>, worker_count: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            worker_count: worker_count.max(1),
            counters: Arc::new(PipelineCounters::default()),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a clone of the shutdown flag (for signal handlers)
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn counters(&self) -> Arc<PipelineCounters> {
        Arc::clone(&self.counters)
    }

    /// Convert every file; returns once each one has been accounted for.
    ///
    /// Errors only when no worker could be started.
    pub fn run(&self, files: Vec<PathBuf>) -> Result<DispatchSummary, WorkerError> {
        let start = Instant::now();
        let total = files.len();

        let mut queue = JobQueue::new();
        let mut submitted: Vec<Job> = Vec::with_capacity(total);
        for source in files {
            submitted.push(queue.submit(source)?);
        }
        queue.close();

        let worker_count = self.worker_count.min(total.max(1));
        info!(jobs = total, workers = worker_count, "Starting conversion");

        let (report_tx, report_rx) = crossbeam_channel::unbounded::<JobReport>();
        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            match Worker::spawn(
                id,
                Arc::clone(&self.pipeline),
                queue.receiver(),
                report_tx.clone(),
                Arc::clone(&self.counters),
                Arc::clone(&self.shutdown),
            ) {
                Ok(worker) => workers.push(worker),
                Err(e) if workers.is_empty() => return Err(e),
                Err(e) => {
                    warn!(error = %e, "Continuing with fewer workers");
                    break;
                }
            }
        }
        // Workers hold the only senders; the channel closes when they all exit
        drop(report_tx);
        drop(queue);

        let mut slots: Vec<Option<JobReport>> = (0..total).map(|_| None).collect();
        for report in report_rx.iter() {
            let id = report.job.id;
            match slots.get_mut(id) {
                Some(slot) if slot.is_none() => *slot = Some(report),
                _ => warn!(job = id, "Duplicate or unknown job report ignored"),
            }
        }

        for worker in workers {
            let id = worker.id();
            if let Err(e) = worker.join() {
                warn!(worker = id, error = %e, "Worker failed to join cleanly");
            }
        }

        let reports: Vec<JobReport> = slots
            .into_iter()
            .zip(submitted)
            .map(|(slot, job)| {
                slot.unwrap_or_else(|| {
                    warn!(source = %job.source.display(), "Job was never reported");
                    let outcome = JobOutcome::Failed {
                        error: WorkerError::Lost.into(),
                        stats: JobStats::default(),
                    };
                    self.counters.record_outcome(&outcome);
                    JobReport {
                        job,
                        worker: None,
                        outcome,
                        elapsed: Duration::ZERO,
                    }
                })
            })
            .collect();

        let summary = DispatchSummary {
            reports,
            duration: start.elapsed(),
            interrupted: self.shutdown.load(Ordering::Relaxed),
        };

        info!(
            completed = summary.completed(),
            failed = summary.failed(),
            skipped = summary.skipped(),
            duration_secs = summary.duration.as_secs(),
            "Conversion finished"
        );

        Ok(summary)
    }

    /// Like [`run`](Self::run), calling `progress_callback` every 100ms
    pub fn run_with_progress<F>(
        &self,
        files: Vec<PathBuf>,
        progress_callback: F,
    ) -> Result<DispatchSummary, WorkerError>
    where
        F: Fn(DispatchProgress) + Send + 'static,
    {
        let start = Instant::now();
        let total = files.len();
        let counters = Arc::clone(&self.counters);
        let done = Arc::new(AtomicBool::new(false));
        let done_flag = Arc::clone(&done);

        let progress_handle = thread::spawn(move || {
            while !done_flag.load(Ordering::Relaxed) {
                progress_callback(counters.snapshot(total, start.elapsed()));
                thread::sleep(Duration::from_millis(100));
            }
        });

        let result = self.run(files);

        done.store(true, Ordering::SeqCst);
        let _ = progress_handle.join();

        result
    }
}

//! Worker thread logic for parallel conversion
//!
//! Each worker:
//! - Pulls jobs from the shared job queue until it is closed and drained
//! - Runs each job sequentially through the pipeline
//! - Reports exactly one `JobReport` per job it took
//!
//! A panic inside a job is caught at the job boundary and reported as a
//! failure; the worker then moves on to its next job. Once shutdown is
//! requested, remaining jobs are reported as skipped without running.

use crate::decoder::{source_label, Decoder};
use crate::dispatch::coordinator::PipelineCounters;
use crate::dispatch::job::{JobOutcome, JobReport, JobStats, Pipeline};
use crate::dispatch::queue::JobReceiver;
use crate::error::WorkerError;
use crossbeam_channel::Sender;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info};

/// A worker thread that runs conversion jobs
pub struct Worker {
    /// Worker ID
    id: usize,

    /// Thread handle; yields the number of jobs reported
    handle: Option<JoinHandle<u64>>,
}

impl Worker {
    /// Spawn a new worker thread
    pub fn spawn<D: Decoder + 'static>(
        id: usize,
        pipeline: Arc<Pipeline<D>>,
        jobs: JobReceiver,
        reports: Sender<JobReport>,
        counters: Arc<PipelineCounters>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self, WorkerError> {
        let handle = thread::Builder::new()
            .name(format!("worker-{}", id))
            .spawn(move || worker_loop(id, pipeline, jobs, reports, counters, shutdown))
            .map_err(|e| WorkerError::InitFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Wait for the worker to finish; returns the number of jobs it reported
    pub fn join(mut self) -> Result<u64, WorkerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|payload| WorkerError::Panicked {
                id: self.id,
                message: panic_message(payload.as_ref()),
            }),
            None => Ok(0),
        }
    }
}

/// Main worker loop
fn worker_loop<D: Decoder>(
    id: usize,
    pipeline: Arc<Pipeline<D>>,
    jobs: JobReceiver,
    reports: Sender<JobReport>,
    counters: Arc<PipelineCounters>,
    shutdown: Arc<AtomicBool>,
) -> u64 {
    debug!(worker = id, "Worker started");
    let mut reported = 0u64;

    while let Some(job) = jobs.recv() {
        let started = Instant::now();

        let outcome = if shutdown.load(Ordering::Relaxed) {
            JobOutcome::Skipped {
                reason: "interrupted before start".to_string(),
            }
        } else {
            counters.record_start();
            info!(worker = id, source = %source_label(&job.source), "Job started");

            panic::catch_unwind(AssertUnwindSafe(|| pipeline.run_job(&job, &counters)))
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    error!(
                        worker = id,
                        source = %source_label(&job.source),
                        panic = %message,
                        "Job panicked"
                    );
                    JobOutcome::Failed {
                        error: WorkerError::Panicked { id, message }.into(),
                        stats: JobStats::default(),
                    }
                })
        };

        counters.record_outcome(&outcome);

        let report = JobReport {
            job,
            worker: Some(id),
            outcome,
            elapsed: started.elapsed(),
        };
        if reports.send(report).is_err() {
            // Dispatcher is gone; nobody is left to account for jobs
            break;
        }
        reported += 1;
    }

    debug!(worker = id, jobs = reported, "Worker finished");
    reported
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

//! Job queue
//!
//! One unbounded queue of capture files shared by all workers. Every file
//! is submitted up front, then the queue is closed; workers exit once it
//! is closed and drained.

use crate::error::WorkerError;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One capture file to convert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Submission index, unique per dispatch
    pub id: usize,

    /// Capture file path
    pub source: PathBuf,
}

/// Statistics for the job queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total jobs enqueued
    pub enqueued: AtomicU64,

    /// Total jobs taken by workers
    pub dequeued: AtomicU64,
}

impl QueueStats {
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn dequeued(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    /// Jobs submitted but not yet taken
    pub fn pending(&self) -> u64 {
        self.enqueued().saturating_sub(self.dequeued())
    }
}

/// Submission side of the job queue
pub struct JobQueue {
    /// None once closed
    sender: Option<Sender<Job>>,

    receiver: Receiver<Job>,

    next_id: usize,

    stats: Arc<QueueStats>,
}

impl JobQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender: Some(sender),
            receiver,
            next_id: 0,
            stats: Arc::new(QueueStats::default()),
        }
    }

    /// Enqueue a capture file; returns the job
    pub fn submit(&mut self, source: PathBuf) -> Result<Job, WorkerError> {
        let sender = self.sender.as_ref().ok_or(WorkerError::QueueClosed)?;
        let job = Job {
            id: self.next_id,
            source,
        };
        sender.send(job.clone()).map_err(|_| WorkerError::QueueClosed)?;
        self.next_id += 1;
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(job)
    }

    /// No more submissions; workers drain what is left and stop
    pub fn close(&mut self) {
        self.sender = None;
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_none()
    }

    /// Get a receiver for this queue (clone for each worker)
    pub fn receiver(&self) -> JobReceiver {
        JobReceiver {
            receiver: self.receiver.clone(),
            stats: Arc::clone(&self.stats),
        }
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }

    /// Jobs waiting to be taken
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker side of the job queue
#[derive(Clone)]
pub struct JobReceiver {
    receiver: Receiver<Job>,
    stats: Arc<QueueStats>,
}

impl JobReceiver {
    /// Block for the next job; `None` once the queue is closed and empty
    pub fn recv(&self) -> Option<Job> {
        let job = self.receiver.recv().ok()?;
        self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
        Some(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_in_submission_order() {
        let mut queue = JobQueue::new();
        let a = queue.submit("a.pcap".into()).unwrap();
        let b = queue.submit("b.pcap".into()).unwrap();
        assert_eq!(a.id, 0);
        assert_eq!(b.id, 1);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.stats().pending(), 2);
    }

    #[test]
    fn test_receiver_drains_then_stops_after_close() {
        let mut queue = JobQueue::new();
        queue.submit("a.pcap".into()).unwrap();
        queue.close();
        let rx = queue.receiver();

        assert_eq!(rx.recv().map(|j| j.source), Some(PathBuf::from("a.pcap")));
        assert_eq!(rx.recv(), None);
        assert_eq!(queue.stats().dequeued(), 1);
        assert_eq!(queue.stats().pending(), 0);
    }

    #[test]
    fn test_submit_after_close() {
        let mut queue = JobQueue::new();
        queue.close();
        assert!(queue.is_closed());
        assert!(matches!(queue.submit("a.pcap".into()), Err(WorkerError::QueueClosed)));
    }

    #[test]
    fn test_each_job_taken_once() {
        let mut queue = JobQueue::new();
        for i in 0..100 {
            queue.submit(format!("{i}.pcap").into()).unwrap();
        }
        queue.close();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let rx = queue.receiver();
                std::thread::spawn(move || {
                    let mut ids = Vec::new();
                    while let Some(job) = rx.recv() {
                        ids.push(job.id);
                    }
                    ids
                })
            })
            .collect();

        let mut all: Vec<usize> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }
}

//! Parallel job dispatch
//!
//! One job per capture file, run on a fixed pool of worker threads fed by
//! a single job queue. Jobs share nothing but the queue and the progress
//! counters; each owns its decoder process, column builders and output
//! files.
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │       Dispatcher        │
//!                     │  - submit all, close    │
//!                     │  - collect N reports    │
//!                     └───────────┬─────────────┘
//!                                 │ JobQueue
//!       ┌─────────────────────────┼─────────────────────────┐
//!       │                         │                         │
//! ┌─────▼─────┐             ┌─────▼─────┐             ┌─────▼─────┐
//! │  Worker 0 │             │  Worker 1 │             │  Worker N │
//! │  decoder  │             │  decoder  │             │  decoder  │
//! │  parquet  │             │  parquet  │             │  parquet  │
//! └───────────┘             └───────────┘             └───────────┘
//! ```

pub mod coordinator;
pub mod job;
pub mod queue;
pub mod worker;

pub use coordinator::{DispatchProgress, DispatchSummary, Dispatcher, PipelineCounters};
pub use job::{JobOutcome, JobReport, JobSettings, JobStats, Pipeline};
pub use queue::{Job, JobQueue};

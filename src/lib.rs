//! pcap-parquet - Decoded capture files to typed Parquet tables
//!
//! Runs an external protocol decoder (tshark) over capture files and turns
//! its line output into one compressed, typed Parquet table per file,
//! optionally re-exported as delimited text with a fixed column order.
//!
//! # Features
//!
//! - **Multi-occurrence flattening**: a decoded record whose fields carry
//!   several `,`-separated occurrences becomes one row per occurrence, with
//!   the frame fields repeated on every row.
//!
//! - **Typed columns**: string, int32, int64, float32, float64, uint8 and
//!   uint16 columns; unparseable values become nulls and never fail a job.
//!
//! - **Parallel jobs**: one job per capture file on a fixed worker pool;
//!   a failing file never affects the others.
//!
//! - **Bounded memory**: batches are flushed synchronously, one row group
//!   per batch.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Dispatcher                              │
//! │            JobQueue (crossbeam) ──► Worker 0..N                 │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ one job per capture file
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  tshark -r file -e ...   stdout ──► Flattener ──► Accumulator   │
//! │                          stderr ──► tracing            │        │
//! │                                                        ▼        │
//! │                                   TableWriter (<stem>.parquet)  │
//! │                                                        │        │
//! │                                                        ▼        │
//! │                             DelimitedExporter (<stem>.csv)      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # One capture, group from config.toml
//! pcap-parquet -f radar.pcap -g cat048
//!
//! # A directory of captures, 8 jobs in parallel, with CSV export
//! pcap-parquet -d captures/ -g cat048 -j 8 --csv -o out/
//! ```

pub mod config;
pub mod decoder;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod flatten;
pub mod progress;
pub mod schema;
pub mod table;

pub use config::{AppConfig, CliArgs, RunConfig};
pub use decoder::{DecodeStream, Decoder, TsharkDecoder};
pub use dispatch::{Dispatcher, JobOutcome, JobSettings, Pipeline};
pub use error::{PipelineError, Result};
pub use export::{DelimitedExporter, ExportConfig};
pub use flatten::Flattener;
pub use schema::{FieldSpec, Schema, ValueType};

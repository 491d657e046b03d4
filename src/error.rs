//! Error types for pcap-parquet
//!
//! This module defines the error hierarchy for the conversion pipeline:
//! - Configuration and CLI errors (fatal before any job starts)
//! - Schema resolution errors
//! - Decoder process errors (start failure, non-zero exit, stream I/O)
//! - Table (Arrow/Parquet) errors
//! - Delimited export errors
//! - Worker errors
//!
//! Configuration and schema errors stop the run before any job starts and
//! never reach `PipelineError`. `PipelineError` is scoped to a single job:
//! the dispatcher catches it at the job boundary, logs it with the source
//! file name and moves on to the next job.

use crate::schema::ValueType;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the pcap-parquet pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Decoder process errors
    #[error("Decoder error: {0}")]
    Decoder(#[from] DecoderError),

    /// Columnar table errors
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// Delimited export errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Config file is not valid TOML or has the wrong shape
    #[error("Failed to parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Decoder executable not configured
    #[error("Decoder path is empty")]
    MissingDecoderPath,

    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid batch size
    #[error("Invalid batch size {size}: must be between {min} and {max}")]
    InvalidBatchSize { size: usize, min: usize, max: usize },

    /// Delimiter is not a single ASCII character
    #[error("Invalid delimiter '{0}': must be a single ASCII character")]
    InvalidDelimiter(String),

    /// Invalid file name pattern
    #[error("Invalid file pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Output directory error
    #[error("Invalid output directory '{path}': {reason}")]
    InvalidOutputDir { path: PathBuf, reason: String },

    /// Neither a file nor a directory was given
    #[error("No input given: use -f <FILE> or -d <DIR>")]
    NoInput,

    /// Input directory could not be listed
    #[error("Failed to read input directory '{path}': {source}")]
    InputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input file does not exist
    #[error("Input file not found: '{0}'")]
    InputNotFound(PathBuf),

    /// Discovery produced nothing
    #[error("No capture files matching '{pattern}' in '{dir}'")]
    NoInputsFound { dir: PathBuf, pattern: String },
}

/// Schema resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Requested field group is not in the configuration
    #[error("Field group '{group}' not found (available: {available})")]
    UnknownGroup { group: String, available: String },

    /// Requested field group has no fields
    #[error("Field group '{0}' has no fields")]
    EmptyGroup(String),

    /// Two fields share an output label
    #[error("Duplicate column label '{0}'")]
    DuplicateLabel(String),
}

/// Decoder process errors
#[derive(Error, Debug)]
pub enum DecoderError {
    /// Executable missing or not runnable
    #[error("Failed to start decoder '{program}': {source}")]
    Start {
        program: String,
        source: std::io::Error,
    },

    /// A pipe was not available after spawn
    #[error("Decoder {0} pipe unavailable")]
    MissingPipe(&'static str),

    /// Reading the primary stream failed
    #[error("Failed to read decoder output: {0}")]
    Stream(#[source] std::io::Error),

    /// Waiting for the process failed
    #[error("Failed to wait for decoder: {0}")]
    Wait(#[source] std::io::Error),

    /// Process finished with a non-zero status after streaming
    #[error("Decoder exited with {status}")]
    Exited { status: String },
}

/// Columnar table errors
#[derive(Error, Debug)]
pub enum TableError {
    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet writer/reader error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Failed to create the output file
    #[error("Failed to create table '{path}': {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Delimited export errors
#[derive(Error, Debug)]
pub enum ExportError {
    /// Failed to open or decode the source table
    #[error("Failed to read table '{path}': {source}")]
    Open { path: PathBuf, source: TableError },

    /// Reading a batch failed
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Delimited writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Job panicked inside a worker
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Worker thread could not be spawned
    #[error("Failed to initialize worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },

    /// Worker exited without reporting a job it took
    #[error("Job was lost: worker terminated before reporting")]
    Lost,

    /// Job submitted after the queue was closed
    #[error("Job queue is closed")]
    QueueClosed,
}

/// A single text value that did not convert to its column type.
///
/// The builder has already appended a null when this is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse '{text}' as {value_type}")]
pub struct ParseError {
    pub value_type: ValueType,
    pub text: String,
}

/// Result type alias for PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result type alias for DecoderError
pub type DecoderResult<T> = std::result::Result<T, DecoderError>;

/// Result type alias for TableError
pub type TableResult<T> = std::result::Result<T, TableError>;

/// Result type alias for ExportError
pub type ExportResult<T> = std::result::Result<T, ExportError>;

impl PipelineError {
    /// True when the decoder ran to completion but reported failure.
    ///
    /// Rows already written before such a failure remain in the table.
    pub fn is_decoder_exit(&self) -> bool {
        matches!(self, PipelineError::Decoder(DecoderError::Exited { .. }))
    }
}

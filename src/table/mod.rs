//! Columnar table output
//!
//! # Module Structure
//!
//! - `builder`: typed column builders and text-to-native conversion
//! - `accumulator`: row buffering with fixed-size batch flush
//! - `writer`: Parquet file writer (one row group per batch)

pub mod accumulator;
pub mod builder;
pub mod writer;

pub use accumulator::{AccumulatorStats, BatchSink, ColumnAccumulator, DEFAULT_BATCH_SIZE};
pub use builder::ColumnBuilder;
pub use writer::{Codec, TableSummary, TableWriter, WriterOptions};

//! Per-job pipeline
//!
//! A job converts one capture file end to end on the worker that took it:
//!
//! ```text
//!   decoder ──lines──► Flattener ──rows──► ColumnAccumulator ──batches──► TableWriter
//!                                                                            │ close
//!                                                                            ▼
//!                                                              DelimitedExporter (optional)
//! ```
//!
//! Order of operations:
//! 1. Start the decoder. Failure fails the job before any file exists.
//! 2. Create the table file. Failure kills the decoder.
//! 3. Stream, flatten and accumulate. A write failure kills the decoder.
//! 4. Wait for the decoder, then close the accumulator and the table. The
//!    table is finalized even when the decoder exited non-zero.
//! 5. A non-zero decoder exit fails the job with its row counts; no export.
//! 6. Otherwise run the optional export.

use crate::config::output_path;
use crate::decoder::{source_label, Decoder};
use crate::dispatch::coordinator::PipelineCounters;
use crate::dispatch::queue::Job;
use crate::error::{PipelineError, Result};
use crate::export::{DelimitedExporter, ExportConfig, ExportStats};
use crate::flatten::Flattener;
use crate::schema::Schema;
use crate::table::{ColumnAccumulator, TableSummary, TableWriter, WriterOptions, DEFAULT_BATCH_SIZE};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Decoded lines between progress log messages
const LINE_LOG_INTERVAL: u64 = 5000;

/// Settings shared by every job of a run
#[derive(Debug, Clone)]
pub struct JobSettings {
    /// Directory for tables and exports
    pub output_dir: PathBuf,

    /// Rows per batch
    pub batch_size: usize,

    /// Table writer settings
    pub writer_options: WriterOptions,

    /// Decoder display filter
    pub filter: Option<String>,

    /// Delimited export settings; `None` disables the export
    pub export: Option<ExportConfig>,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            batch_size: DEFAULT_BATCH_SIZE,
            writer_options: WriterOptions::default(),
            filter: None,
            export: None,
        }
    }
}

/// Per-job counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobStats {
    /// Decoded lines read
    pub lines: u64,

    /// Rows written to the table
    pub rows: u64,

    /// Batches (row groups) written
    pub batches: u64,

    /// Values stored as null after a failed conversion
    pub parse_failures: u64,

    /// Lines that produced no rows
    pub empty_lines: u64,

    /// Lines with fewer positional fields than the schema
    pub short_lines: u64,

    /// Lines with more positional fields than the schema
    pub long_lines: u64,
}

/// How a job ended
#[derive(Debug)]
pub enum JobOutcome {
    /// Table finalized (and exported when requested)
    Completed {
        table: TableSummary,
        export: Option<ExportStats>,
        stats: JobStats,
    },

    /// Never started (shutdown requested first)
    Skipped { reason: String },

    /// Failed at some step; `stats` holds what was done before the failure
    Failed { error: PipelineError, stats: JobStats },
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, JobOutcome::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, JobOutcome::Skipped { .. })
    }

    /// Counters for a job that ran, `None` if skipped
    pub fn stats(&self) -> Option<&JobStats> {
        match self {
            JobOutcome::Completed { stats, .. } | JobOutcome::Failed { stats, .. } => Some(stats),
            JobOutcome::Skipped { .. } => None,
        }
    }
}

/// Final account of one job
#[derive(Debug)]
pub struct JobReport {
    pub job: Job,

    /// Worker that ran (or skipped) the job; `None` if it was lost
    pub worker: Option<usize>,

    pub outcome: JobOutcome,

    pub elapsed: Duration,
}

/// Everything a worker needs to run jobs; shared read-only by all workers
pub struct Pipeline<D: Decoder> {
    decoder: D,
    schema: Schema,
    flattener: Flattener,
    settings: JobSettings,
}

impl<D: Decoder> Pipeline<D> {
    pub fn new(decoder: D, schema: Schema, settings: JobSettings) -> Self {
        let flattener = Flattener::new(&schema);
        Self {
            decoder,
            schema,
            flattener,
            settings,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn settings(&self) -> &JobSettings {
        &self.settings
    }

    /// Table path for a capture file
    pub fn table_path(&self, source: &Path) -> PathBuf {
        output_path(&self.settings.output_dir, source, "parquet")
    }

    /// Export path for a capture file
    pub fn export_path(&self, source: &Path) -> PathBuf {
        output_path(&self.settings.output_dir, source, "csv")
    }

    /// Run one job to completion. Never returns an error: failures become
    /// `JobOutcome::Failed`.
    pub fn run_job(&self, job: &Job, counters: &PipelineCounters) -> JobOutcome {
        let label = source_label(&job.source);
        let mut stats = JobStats::default();

        match self.execute(job, &label, counters, &mut stats) {
            Ok((table, export)) => {
                info!(
                    source = %label,
                    lines = stats.lines,
                    rows = stats.rows,
                    row_groups = table.row_groups,
                    "Job completed"
                );
                JobOutcome::Completed { table, export, stats }
            }
            Err(error) => {
                warn!(
                    source = %label,
                    error = %error,
                    lines = stats.lines,
                    rows = stats.rows,
                    "Job failed"
                );
                JobOutcome::Failed { error, stats }
            }
        }
    }

    fn execute(
        &self,
        job: &Job,
        label: &str,
        counters: &PipelineCounters,
        stats: &mut JobStats,
    ) -> Result<(TableSummary, Option<ExportStats>)> {
        let keys = self.schema.source_keys();
        let mut stream = self
            .decoder
            .decode(&job.source, &keys, self.settings.filter.as_deref())?;

        // From here on an early return drops `stream`, which kills the decoder
        let table_path = self.table_path(&job.source);
        let writer = TableWriter::create(&table_path, &self.schema, &self.settings.writer_options)?;
        let mut accumulator = ColumnAccumulator::new(&self.schema, self.settings.batch_size, writer);

        let width = self.flattener.width();
        while let Some(line) = stream.next_line()? {
            stats.lines += 1;
            counters.record_line();

            let flattened = self.flattener.flatten(&line);
            if flattened.is_short(width) {
                stats.short_lines += 1;
                debug!(
                    source = %label,
                    line = stats.lines,
                    fields = flattened.field_count,
                    expected = width,
                    "Short line padded with empty values"
                );
            } else if flattened.is_long(width) {
                stats.long_lines += 1;
                debug!(
                    source = %label,
                    line = stats.lines,
                    fields = flattened.field_count,
                    expected = width,
                    "Extra fields ignored"
                );
            }

            if flattened.rows.is_empty() {
                stats.empty_lines += 1;
            }
            for row in &flattened.rows {
                accumulator.write_row(row.values())?;
            }
            stats.rows += flattened.rows.len() as u64;
            counters.record_rows(flattened.rows.len() as u64);

            if stats.lines % LINE_LOG_INTERVAL == 0 {
                debug!(source = %label, lines = stats.lines, rows = stats.rows, "Decoding");
            }
        }

        let decoder_result = stream.finish();

        let (writer, acc_stats) = accumulator.close()?;
        stats.batches = acc_stats.batches_written;
        stats.parse_failures = acc_stats.parse_failures;
        let table = writer.close()?;

        if stats.parse_failures > 0 {
            warn!(
                source = %label,
                count = stats.parse_failures,
                "Values that failed conversion were stored as null"
            );
        }
        if stats.short_lines > 0 || stats.long_lines > 0 {
            warn!(
                source = %label,
                short = stats.short_lines,
                long = stats.long_lines,
                expected = width,
                "Lines did not match the schema width"
            );
        }

        let exit = decoder_result?;
        if exit.diagnostics > 0 {
            debug!(source = %label, lines = exit.diagnostics, "Decoder diagnostics");
        }

        let export = match &self.settings.export {
            Some(config) => {
                let path = self.export_path(&job.source);
                let exporter = DelimitedExporter::new(config.clone());
                Some(exporter.export_file(&table.path, &path)?)
            }
            None => None,
        };

        Ok((table, export))
    }
}

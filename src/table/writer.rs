//! Parquet table writer
//!
//! One writer per job. The Arrow schema is written when the file is
//! opened, every accepted batch becomes exactly one row group, and the
//! footer is written by [`TableWriter::close`]. A file whose writer was
//! never closed has no footer and cannot be read back; the job that
//! produced it has to be rerun.

use crate::error::{TableError, TableResult};
use crate::schema::Schema;
use crate::table::accumulator::BatchSink;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Compression codec for table files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// Snappy (fast, widely supported)
    #[default]
    Snappy,
    /// ZSTD at `WriterOptions::zstd_level`
    Zstd,
    /// No compression
    Uncompressed,
}

/// Table writer configuration
#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub codec: Codec,

    /// ZSTD compression level (1-22), used with `Codec::Zstd`
    pub zstd_level: i32,

    /// Upper bound on rows per row group; must be at least the batch size
    pub max_row_group_size: usize,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            codec: Codec::Snappy,
            zstd_level: 3,
            max_row_group_size: 1_000_000,
        }
    }
}

impl WriterOptions {
    /// Build Parquet writer properties with chunk-level column statistics.
    pub fn writer_properties(&self) -> TableResult<WriterProperties> {
        let compression = match self.codec {
            Codec::Snappy => Compression::SNAPPY,
            Codec::Zstd => Compression::ZSTD(ZstdLevel::try_new(self.zstd_level)?),
            Codec::Uncompressed => Compression::UNCOMPRESSED,
        };

        Ok(WriterProperties::builder()
            .set_compression(compression)
            .set_statistics_enabled(EnabledStatistics::Chunk)
            .set_max_row_group_size(self.max_row_group_size)
            .build())
    }
}

/// Summary of a finalized table file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub path: PathBuf,
    pub rows: u64,
    pub row_groups: u64,
    pub bytes: u64,
}

/// Writer for one table file
pub struct TableWriter {
    path: PathBuf,
    schema: SchemaRef,
    writer: ArrowWriter<File>,
    rows: u64,
    row_groups: u64,
}

impl TableWriter {
    /// Create the file and write the schema.
    pub fn create(path: &Path, schema: &Schema, options: &WriterOptions) -> TableResult<Self> {
        let file = File::create(path).map_err(|e| TableError::Create {
            path: path.to_path_buf(),
            source: e,
        })?;

        let arrow_schema = schema.arrow_schema();
        let props = options.writer_properties()?;
        let writer = ArrowWriter::try_new(file, arrow_schema.clone(), Some(props))?;

        debug!(path = %path.display(), columns = schema.len(), "Table opened");

        Ok(Self {
            path: path.to_path_buf(),
            schema: arrow_schema,
            writer,
            rows: 0,
            row_groups: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Persist one batch as its own row group
    pub fn write(&mut self, batch: &RecordBatch) -> TableResult<()> {
        if batch.num_rows() == 0 {
            return Ok(());
        }
        self.writer.write(batch)?;
        self.writer.flush()?;
        self.rows += batch.num_rows() as u64;
        self.row_groups += 1;
        Ok(())
    }

    /// Write the footer. The file is readable only after this succeeds.
    pub fn close(self) -> TableResult<TableSummary> {
        self.writer.close()?;
        let bytes = fs::metadata(&self.path)?.len();

        debug!(
            path = %self.path.display(),
            rows = self.rows,
            row_groups = self.row_groups,
            bytes = bytes,
            "Table finalized"
        );

        Ok(TableSummary {
            path: self.path,
            rows: self.rows,
            row_groups: self.row_groups,
            bytes,
        })
    }
}

impl BatchSink for TableWriter {
    fn write_batch(&mut self, batch: &RecordBatch) -> TableResult<()> {
        self.write(batch)
    }
}

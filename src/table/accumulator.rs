//! Batched column accumulator
//!
//! Buffers flattened rows as typed columns and hands a `RecordBatch` to a
//! [`BatchSink`] every `batch_size` rows. The flush is synchronous, so at
//! most one batch is held in memory beyond what the sink has persisted.

use crate::error::TableResult;
use crate::schema::Schema;
use crate::table::builder::ColumnBuilder;
use arrow::array::ArrayRef;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use tracing::debug;

/// Default rows per batch
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Destination for completed batches
pub trait BatchSink {
    fn write_batch(&mut self, batch: &RecordBatch) -> TableResult<()>;
}

impl<S: BatchSink + ?Sized> BatchSink for &mut S {
    fn write_batch(&mut self, batch: &RecordBatch) -> TableResult<()> {
        (**self).write_batch(batch)
    }
}

impl BatchSink for Vec<RecordBatch> {
    fn write_batch(&mut self, batch: &RecordBatch) -> TableResult<()> {
        self.push(batch.clone());
        Ok(())
    }
}

/// Statistics from an accumulator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccumulatorStats {
    /// Rows handed to the sink
    pub rows_written: u64,

    /// Batches handed to the sink
    pub batches_written: u64,

    /// Values that failed numeric conversion and were stored as null
    pub parse_failures: u64,
}

/// Typed column accumulator feeding a batch sink
pub struct ColumnAccumulator<S: BatchSink> {
    schema: SchemaRef,
    builders: Vec<ColumnBuilder>,
    batch_size: usize,
    buffered: usize,
    sink: S,
    stats: AccumulatorStats,
}

impl<S: BatchSink> ColumnAccumulator<S> {
    /// Create an accumulator with one builder per schema column
    pub fn new(schema: &Schema, batch_size: usize, sink: S) -> Self {
        let batch_size = batch_size.max(1);
        let builders = schema
            .fields()
            .iter()
            .map(|f| ColumnBuilder::new(f.value_type, batch_size))
            .collect();

        Self {
            schema: schema.arrow_schema(),
            builders,
            batch_size,
            buffered: 0,
            sink,
            stats: AccumulatorStats::default(),
        }
    }

    /// Append one row; flushes when the batch is full.
    ///
    /// A missing trailing value is treated as empty text. Conversion
    /// failures are counted and never abort the row.
    pub fn write_row(&mut self, row: &[&str]) -> TableResult<()> {
        for (idx, builder) in self.builders.iter_mut().enumerate() {
            let text = row.get(idx).copied().unwrap_or("");
            if let Err(e) = builder.append_text(text) {
                self.stats.parse_failures += 1;
                debug!(
                    column = %self.schema.field(idx).name(),
                    error = %e,
                    "Value stored as null"
                );
            }
        }

        self.buffered += 1;
        if self.buffered >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Rows buffered and not yet handed to the sink
    pub fn buffered_rows(&self) -> usize {
        self.buffered
    }

    pub fn stats(&self) -> AccumulatorStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Flush any partial batch and return the sink with final statistics
    pub fn close(mut self) -> TableResult<(S, AccumulatorStats)> {
        if self.buffered > 0 {
            self.flush()?;
        }
        Ok((self.sink, self.stats))
    }

    fn flush(&mut self) -> TableResult<()> {
        let columns: Vec<ArrayRef> = self.builders.iter_mut().map(ColumnBuilder::finish).collect();
        let batch = RecordBatch::try_new(self.schema.clone(), columns)?;
        let rows = self.buffered;
        self.buffered = 0;

        self.sink.write_batch(&batch)?;

        self.stats.rows_written += rows as u64;
        self.stats.batches_written += 1;
        debug!(rows = rows, batch = self.stats.batches_written, "Batch flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, ValueType};
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::{Float64Type, Int32Type};

    fn schema() -> Schema {
        Schema::new(
            vec![FieldSpec::new("TIMESTAMP", "frame.time_epoch", ValueType::String)],
            vec![
                FieldSpec::new("ALT", "asterix.alt", ValueType::Float64),
                FieldSpec::new("SPEED", "asterix.speed", ValueType::Int32),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_exact_batch_triggers_one_flush() {
        let mut acc = ColumnAccumulator::new(&schema(), 4, Vec::new());
        for _ in 0..4 {
            acc.write_row(&["t", "1.0", "2"]).unwrap();
        }
        assert_eq!(acc.sink().len(), 1);
        assert_eq!(acc.buffered_rows(), 0);
        assert_eq!(acc.stats().batches_written, 1);
    }

    #[test]
    fn test_one_past_batch_leaves_one_buffered() {
        let mut acc = ColumnAccumulator::new(&schema(), 4, Vec::new());
        for _ in 0..5 {
            acc.write_row(&["t", "1.0", "2"]).unwrap();
        }
        assert_eq!(acc.sink().len(), 1);
        assert_eq!(acc.buffered_rows(), 1);

        let (batches, stats) = acc.close().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].num_rows(), 1);
        assert_eq!(stats.rows_written, 5);
        assert_eq!(stats.batches_written, 2);
    }

    #[test]
    fn test_close_without_rows_writes_nothing() {
        let acc = ColumnAccumulator::new(&schema(), 4, Vec::new());
        let (batches, stats) = acc.close().unwrap();
        assert!(batches.is_empty());
        assert_eq!(stats, AccumulatorStats::default());
    }

    #[test]
    fn test_typed_values_and_nulls() {
        let mut acc = ColumnAccumulator::new(&schema(), 16, Vec::new());
        acc.write_row(&["1690000000.1", "120.5", "300"]).unwrap();
        acc.write_row(&["1690000000.1", "121.0", ""]).unwrap();
        acc.write_row(&["1690000000.2", "oops", "12"]).unwrap();
        let (batches, stats) = acc.close().unwrap();

        assert_eq!(stats.parse_failures, 1);
        let batch = &batches[0];
        assert_eq!(batch.num_rows(), 3);

        let ts = batch.column(0).as_string::<i32>();
        assert_eq!(ts.value(2), "1690000000.2");

        let alt = batch.column(1).as_primitive::<Float64Type>();
        assert_eq!(alt.value(0), 120.5);
        assert!(alt.is_null(2));

        let speed = batch.column(2).as_primitive::<Int32Type>();
        assert_eq!(speed.value(0), 300);
        assert!(speed.is_null(1));
        assert_eq!(speed.value(2), 12);
    }

    #[test]
    fn test_short_row_padded_with_empty() {
        let mut acc = ColumnAccumulator::new(&schema(), 16, Vec::new());
        acc.write_row(&["t"]).unwrap();
        let (batches, _) = acc.close().unwrap();
        let batch = &batches[0];
        assert_eq!(batch.column(0).as_string::<i32>().value(0), "t");
        assert!(batch.column(1).is_null(0));
        assert!(batch.column(2).is_null(0));
    }

    #[test]
    fn test_builders_reset_between_batches() {
        let mut acc = ColumnAccumulator::new(&schema(), 2, Vec::new());
        for i in 0..6 {
            let speed = i.to_string();
            acc.write_row(&["t", "1.5", speed.as_str()]).unwrap();
        }
        let (batches, _) = acc.close().unwrap();
        assert_eq!(batches.len(), 3);
        let last = batches[2].column(2).as_primitive::<Int32Type>();
        assert_eq!(last.values().to_vec(), vec![4, 5]);
    }
}

//! Delimited text export
//!
//! Reads a finalized table file back and writes one delimited line per
//! row, preceded by a header of column labels. Frame columns are moved to
//! the front in their configured order; every other column keeps its
//! stored order. Row count and row order are those of the table.

use crate::error::{ExportError, ExportResult, TableError};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int32Type, Int64Type, Schema as ArrowSchema, UInt16Type,
    UInt8Type,
};
use arrow::util::display::array_value_to_string;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default field separator
pub const DEFAULT_DELIMITER: u8 = b';';

/// Rows read from the table per batch
pub const EXPORT_BATCH_SIZE: usize = 1024;

/// Exporter configuration
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Field separator
    pub delimiter: u8,

    /// Labels placed first, in this order
    pub frame_labels: Vec<String>,

    /// Rows read per batch
    pub batch_size: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            frame_labels: Vec::new(),
            batch_size: EXPORT_BATCH_SIZE,
        }
    }
}

/// Statistics from an export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportStats {
    pub path: PathBuf,
    pub rows: u64,
    pub columns: usize,
}

/// Output column order: frame labels first (configured order), then the rest
/// in stored order. Frame labels absent from the schema are skipped.
pub fn column_order(schema: &ArrowSchema, frame_labels: &[String]) -> Vec<usize> {
    let mut order: Vec<usize> = frame_labels
        .iter()
        .filter_map(|label| schema.index_of(label).ok())
        .collect();

    for idx in 0..schema.fields().len() {
        if !order.contains(&idx) {
            order.push(idx);
        }
    }
    order
}

/// Canonical text for one cell.
///
/// Null is empty, numbers use the shortest decimal that round-trips
/// (no exponent), strings are verbatim.
pub fn value_text(column: &ArrayRef, row: usize) -> String {
    if column.is_null(row) {
        return String::new();
    }

    match column.data_type() {
        DataType::Utf8 => column.as_string::<i32>().value(row).to_string(),
        DataType::Int32 => column.as_primitive::<Int32Type>().value(row).to_string(),
        DataType::Int64 => column.as_primitive::<Int64Type>().value(row).to_string(),
        DataType::Float32 => column.as_primitive::<Float32Type>().value(row).to_string(),
        DataType::Float64 => column.as_primitive::<Float64Type>().value(row).to_string(),
        DataType::UInt8 => column.as_primitive::<UInt8Type>().value(row).to_string(),
        DataType::UInt16 => column.as_primitive::<UInt16Type>().value(row).to_string(),
        // Tables written by other tools may carry other types
        _ => array_value_to_string(column, row).unwrap_or_default(),
    }
}

/// Table-to-delimited-text exporter
#[derive(Debug, Clone, Default)]
pub struct DelimitedExporter {
    config: ExportConfig,
}

impl DelimitedExporter {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    /// Export `table` to the file `output`.
    pub fn export_file(&self, table: &Path, output: &Path) -> ExportResult<ExportStats> {
        let out = File::create(output)?;
        let (rows, columns) = self.export(table, out)?;

        debug!(
            table = %table.display(),
            output = %output.display(),
            rows = rows,
            "Delimited export written"
        );

        Ok(ExportStats {
            path: output.to_path_buf(),
            rows,
            columns,
        })
    }

    /// Export `table` into any writer; returns (rows, columns).
    pub fn export<W: Write>(&self, table: &Path, out: W) -> ExportResult<(u64, usize)> {
        let open_err = |source: TableError| ExportError::Open {
            path: table.to_path_buf(),
            source,
        };

        let file = File::open(table).map_err(|e| open_err(e.into()))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| open_err(e.into()))?;
        let schema = builder.schema().clone();
        let reader = builder
            .with_batch_size(self.config.batch_size.max(1))
            .build()
            .map_err(|e| open_err(e.into()))?;

        let order = column_order(&schema, &self.config.frame_labels);

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.config.delimiter)
            .terminator(line_terminator())
            .from_writer(out);

        writer.write_record(order.iter().map(|&idx| schema.field(idx).name().as_str()))?;

        let mut rows: u64 = 0;
        let mut record: Vec<String> = Vec::with_capacity(order.len());
        for batch in reader {
            let batch = batch?;
            let columns: Vec<&ArrayRef> = order.iter().map(|&idx| batch.column(idx)).collect();

            for row in 0..batch.num_rows() {
                record.clear();
                record.extend(columns.iter().map(|col| value_text(col, row)));
                if let [only] = record.as_slice() {
                    if only.is_empty() {
                        // csv quotes a lone empty field; an empty cell is a bare line
                        writer.flush()?;
                        writer.get_mut().write_all(LINE_END)?;
                        continue;
                    }
                }
                writer.write_record(&record)?;
            }
            rows += batch.num_rows() as u64;
        }

        writer.flush()?;
        Ok((rows, order.len()))
    }
}

const LINE_END: &[u8] = if cfg!(windows) { b"\r\n" } else { b"\n" };

fn line_terminator() -> csv::Terminator {
    if cfg!(windows) {
        csv::Terminator::CRLF
    } else {
        csv::Terminator::Any(b'\n')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::Flattener;
    use crate::schema::{FieldSpec, Schema, ValueType};
    use crate::table::{ColumnAccumulator, TableWriter, WriterOptions};
    use arrow::array::{Float32Array, Float64Array, Int64Array, StringArray};
    use arrow::datatypes::Field;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn write_table(path: &Path, rows: &[[&str; 4]]) {
        let schema = Schema::new(
            vec![
                FieldSpec::new("TIMESTAMP", "frame.time_epoch", ValueType::String),
                FieldSpec::new("LEN", "frame.len", ValueType::UInt16),
            ],
            vec![
                FieldSpec::new("ALT", "asterix.alt", ValueType::Float64),
                FieldSpec::new("SPEED", "asterix.speed", ValueType::Int32),
            ],
        )
        .unwrap();
        let writer = TableWriter::create(path, &schema, &WriterOptions::default()).unwrap();
        let mut acc = ColumnAccumulator::new(&schema, 2, writer);
        for row in rows {
            acc.write_row(row).unwrap();
        }
        let (writer, _) = acc.close().unwrap();
        writer.close().unwrap();
    }

    fn lines(bytes: Vec<u8>) -> Vec<String> {
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_column_order_frame_first() {
        let schema = ArrowSchema::new(vec![
            Field::new("A", DataType::Int32, true),
            Field::new("TS", DataType::Utf8, true),
            Field::new("B", DataType::Int32, true),
            Field::new("SRC", DataType::Utf8, true),
        ]);
        let order = column_order(&schema, &["SRC".into(), "TS".into(), "MISSING".into()]);
        assert_eq!(order, vec![3, 1, 0, 2]);
    }

    #[test]
    fn test_column_order_no_frame() {
        let schema = ArrowSchema::new(vec![
            Field::new("A", DataType::Int32, true),
            Field::new("B", DataType::Int32, true),
        ]);
        assert_eq!(column_order(&schema, &[]), vec![0, 1]);
    }

    #[test]
    fn test_value_text_canonical() {
        let floats: ArrayRef = Arc::new(Float64Array::from(vec![Some(121.0), Some(120.5), None, Some(1e-7)]));
        assert_eq!(value_text(&floats, 0), "121");
        assert_eq!(value_text(&floats, 1), "120.5");
        assert_eq!(value_text(&floats, 2), "");
        assert_eq!(value_text(&floats, 3), "0.0000001");

        let small: ArrayRef = Arc::new(Float32Array::from(vec![0.1f32]));
        assert_eq!(value_text(&small, 0), "0.1");

        let ints: ArrayRef = Arc::new(Int64Array::from(vec![-5i64]));
        assert_eq!(value_text(&ints, 0), "-5");

        let strings: ArrayRef = Arc::new(StringArray::from(vec![Some(" x;y "), Some("")]));
        assert_eq!(value_text(&strings, 0), " x;y ");
        assert_eq!(value_text(&strings, 1), "");
    }

    #[test]
    fn test_export_header_and_rows() {
        let dir = tempdir().unwrap();
        let table = dir.path().join("t.parquet");
        write_table(
            &table,
            &[
                ["1690000000.1", "64", "120.5", "300"],
                ["1690000000.1", "64", "121.0", ""],
                ["1690000000.2", "", "", "7"],
            ],
        );

        let exporter = DelimitedExporter::new(ExportConfig {
            frame_labels: vec!["LEN".into(), "TIMESTAMP".into()],
            ..Default::default()
        });
        let mut out = Vec::new();
        let (rows, columns) = exporter.export(&table, &mut out).unwrap();

        assert_eq!(rows, 3);
        assert_eq!(columns, 4);
        assert_eq!(
            lines(out),
            vec![
                "LEN;TIMESTAMP;ALT;SPEED",
                "64;1690000000.1;120.5;300",
                "64;1690000000.1;121;",
                ";1690000000.2;;7",
            ]
        );
    }

    #[test]
    fn test_export_custom_delimiter_to_file() {
        let dir = tempdir().unwrap();
        let table = dir.path().join("t.parquet");
        write_table(&table, &[["t", "1", "2.5", "3"]]);

        let exporter = DelimitedExporter::new(ExportConfig {
            delimiter: b'\t',
            ..Default::default()
        });
        let csv_path = dir.path().join("t.csv");
        let stats = exporter.export_file(&table, &csv_path).unwrap();
        assert_eq!(stats.rows, 1);
        assert_eq!(stats.columns, 4);

        let text = std::fs::read_to_string(&csv_path).unwrap();
        let got: Vec<&str> = text.lines().collect();
        assert_eq!(got, vec!["TIMESTAMP\tLEN\tALT\tSPEED", "t\t1\t2.5\t3"]);
    }

    #[test]
    fn test_single_column_empty_cell_is_bare_line() {
        let dir = tempdir().unwrap();
        let table = dir.path().join("speed.parquet");
        let schema = Schema::new(
            vec![],
            vec![FieldSpec::new("SPEED", "asterix.speed", ValueType::Int32)],
        )
        .unwrap();

        let flattened = Flattener::new(&schema).flatten("1,,3");
        let writer = TableWriter::create(&table, &schema, &WriterOptions::default()).unwrap();
        let mut acc = ColumnAccumulator::new(&schema, 8, writer);
        for row in &flattened.rows {
            acc.write_row(row.values()).unwrap();
        }
        let (writer, _) = acc.close().unwrap();
        writer.close().unwrap();

        let mut out = Vec::new();
        let (rows, columns) = DelimitedExporter::default().export(&table, &mut out).unwrap();
        assert_eq!((rows, columns), (3, 1));
        assert!(!out.contains(&b'"'));
        assert_eq!(lines(out), vec!["SPEED", "1", "", "3"]);
    }

    #[test]
    fn test_export_missing_table() {
        let dir = tempdir().unwrap();
        let exporter = DelimitedExporter::default();
        let err = exporter
            .export(&dir.path().join("nope.parquet"), Vec::new())
            .unwrap_err();
        assert!(matches!(err, ExportError::Open { .. }));
    }
}

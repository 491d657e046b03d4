//! Benchmarks for pcap-parquet
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pcap_parquet::flatten::Flattener;
use pcap_parquet::schema::{FieldSpec, Schema, ValueType};
use pcap_parquet::table::ColumnAccumulator;

fn schema() -> Schema {
    Schema::new(
        vec![
            FieldSpec::new("TIMESTAMP", "frame.time_epoch", ValueType::String),
            FieldSpec::new("LEN", "frame.len", ValueType::UInt16),
        ],
        vec![
            FieldSpec::new("SAC", "asterix.010_SAC", ValueType::UInt8),
            FieldSpec::new("SIC", "asterix.010_SIC", ValueType::UInt8),
            FieldSpec::new("ALT", "asterix.048_090_FL", ValueType::Float64),
            FieldSpec::new("SPEED", "asterix.048_200_GS", ValueType::Int32),
            FieldSpec::new("CALLSIGN", "asterix.048_240_ID", ValueType::String),
        ],
    )
    .unwrap()
}

const LINE: &str = "1690000000.123456;412;25,25,25,25;10,10,10,10;120.5,121.0,89.25,300;412,415,0x1F,7;BAW1,AFR22,DLH4,";

fn benchmark_flatten(c: &mut Criterion) {
    let flattener = Flattener::new(&schema());

    c.bench_function("flatten_multi_occurrence_line", |b| {
        b.iter(|| {
            let flattened = flattener.flatten(black_box(LINE));
            black_box(flattened.rows.len());
        })
    });
}

fn benchmark_accumulate(c: &mut Criterion) {
    let schema = schema();
    let flattener = Flattener::new(&schema);
    let flattened = flattener.flatten(LINE);

    c.bench_function("accumulate_4096_rows", |b| {
        b.iter(|| {
            let mut acc = ColumnAccumulator::new(&schema, 1024, Vec::new());
            for _ in 0..1024 {
                for row in &flattened.rows {
                    acc.write_row(row.values()).unwrap();
                }
            }
            let (batches, _) = acc.close().unwrap();
            black_box(batches.len());
        })
    });
}

criterion_group!(benches, benchmark_flatten, benchmark_accumulate);
criterion_main!(benches);

//! Sample data for the scripted session

use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

const TISSUES: [&str; 3] = ["liver", "brain", "heart"];

/// Samples with two principal components, a tissue and a sequencing depth
pub fn sample_batch(samples: usize) -> Result<RecordBatch, ArrowError> {
    let ids: Vec<String> = (0..samples).map(|i| format!("s{:02}", i + 1)).collect();
    let pc1: Vec<f64> = (0..samples)
        .map(|i| (i as f64 * 0.7).sin() * 10.0 + (i % 3) as f64 * 4.0)
        .collect();
    let pc2: Vec<f64> = (0..samples)
        .map(|i| (i as f64 * 0.3).cos() * 8.0 - (i % 3) as f64 * 3.0)
        .collect();
    let tissue: Vec<&str> = (0..samples).map(|i| TISSUES[i % TISSUES.len()]).collect();
    let depth: Vec<i64> = (0..samples).map(|i| 20 + ((i * 37) % 60) as i64).collect();

    let schema = Schema::new(vec![
        Field::new("sample", DataType::Utf8, false),
        Field::new("pc1", DataType::Float64, false),
        Field::new("pc2", DataType::Float64, false),
        Field::new("tissue", DataType::Utf8, false),
        Field::new("depth", DataType::Int64, false),
    ]);

    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(Float64Array::from(pc1)),
            Arc::new(Float64Array::from(pc2)),
            Arc::new(StringArray::from(tissue)),
            Arc::new(Int64Array::from(depth)),
        ],
    )
}

//! Row extraction from Arrow record batches
//!
//! Views keep their rows as [`Record`]s: an id taken from a designated
//! column plus every other column's value, ready for filtering and layout.

use ahash::AHashSet;
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    LargeStringArray, StringArray,
};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use indexmap::{IndexMap, IndexSet};
use lv_core::{Filterable, NumericRange, SelectionId};

use crate::error::{Result, ViewError};

/// A single value in a record
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Null,
}

impl Cell {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(value) => Some(value),
            _ => None,
        }
    }
}

/// One row of a batch, keyed by its id
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: SelectionId,
    pub values: IndexMap<String, Cell>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Cell> {
        self.values.get(field)
    }
}

impl Filterable for Record {
    fn number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Cell::as_number)
    }

    fn category(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Cell::as_text)
    }
}

/// Convert a batch into records keyed by `id_column`.
///
/// Ids must be non-null and unique; selections refer to rows by id.
pub fn records_from_batch(batch: &RecordBatch, id_column: &str) -> Result<Vec<Record>> {
    let id_array = batch
        .column_by_name(id_column)
        .ok_or_else(|| ViewError::MissingColumn(id_column.to_string()))?;
    let ids = id_values(id_column, id_array)?;

    let mut seen = AHashSet::with_capacity(ids.len());
    for id in &ids {
        if !seen.insert(id) {
            return Err(ViewError::DuplicateId {
                column: id_column.to_string(),
                id: id.clone(),
            });
        }
    }

    let schema = batch.schema();
    let mut columns = Vec::with_capacity(batch.num_columns());
    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        if field.name() == id_column {
            continue;
        }
        columns.push((field.name().clone(), cells(field.name(), column)?));
    }

    Ok(ids
        .into_iter()
        .enumerate()
        .map(|(row, id)| Record {
            id,
            values: columns
                .iter()
                .map(|(name, cells)| (name.clone(), cells[row].clone()))
                .collect(),
        })
        .collect())
}

/// Range covered by the numeric values of `field`
pub fn numeric_extent<'a>(
    records: impl IntoIterator<Item = &'a Record>,
    field: &str,
) -> Option<NumericRange> {
    NumericRange::extent(records.into_iter().filter_map(|r| r.number(field)))
}

/// Distinct text values of `field`, in first-seen order
pub fn distinct_categories<'a>(
    records: impl IntoIterator<Item = &'a Record>,
    field: &str,
) -> Vec<String> {
    let mut values = IndexSet::new();
    for record in records {
        if let Some(value) = record.category(field) {
            if !values.contains(value) {
                values.insert(value.to_string());
            }
        }
    }
    values.into_iter().collect()
}

fn downcast<'a, T: 'static>(name: &str, column: &'a ArrayRef) -> Result<&'a T> {
    column
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| ViewError::UnsupportedColumn {
            column: name.to_string(),
            data_type: column.data_type().clone(),
        })
}

fn id_values(name: &str, column: &ArrayRef) -> Result<Vec<SelectionId>> {
    let null_at = |row| ViewError::NullId {
        column: name.to_string(),
        row,
    };
    let mut ids = Vec::with_capacity(column.len());
    match column.data_type() {
        DataType::Utf8 => {
            let array = downcast::<StringArray>(name, column)?;
            for row in 0..array.len() {
                if array.is_null(row) {
                    return Err(null_at(row));
                }
                ids.push(SelectionId::from(array.value(row)));
            }
        }
        DataType::LargeUtf8 => {
            let array = downcast::<LargeStringArray>(name, column)?;
            for row in 0..array.len() {
                if array.is_null(row) {
                    return Err(null_at(row));
                }
                ids.push(SelectionId::from(array.value(row)));
            }
        }
        DataType::Int64 => {
            let array = downcast::<Int64Array>(name, column)?;
            for row in 0..array.len() {
                if array.is_null(row) {
                    return Err(null_at(row));
                }
                ids.push(SelectionId::from(array.value(row)));
            }
        }
        DataType::Int32 => {
            let array = downcast::<Int32Array>(name, column)?;
            for row in 0..array.len() {
                if array.is_null(row) {
                    return Err(null_at(row));
                }
                ids.push(SelectionId::from(array.value(row)));
            }
        }
        other => {
            return Err(ViewError::UnsupportedColumn {
                column: name.to_string(),
                data_type: other.clone(),
            })
        }
    }
    Ok(ids)
}

fn cells(name: &str, column: &ArrayRef) -> Result<Vec<Cell>> {
    let len = column.len();
    let cells = match column.data_type() {
        DataType::Float64 => {
            let array = downcast::<Float64Array>(name, column)?;
            (0..len)
                .map(|i| numeric(array.is_null(i), || array.value(i)))
                .collect()
        }
        DataType::Float32 => {
            let array = downcast::<Float32Array>(name, column)?;
            (0..len)
                .map(|i| numeric(array.is_null(i), || array.value(i) as f64))
                .collect()
        }
        DataType::Int64 => {
            let array = downcast::<Int64Array>(name, column)?;
            (0..len)
                .map(|i| numeric(array.is_null(i), || array.value(i) as f64))
                .collect()
        }
        DataType::Int32 => {
            let array = downcast::<Int32Array>(name, column)?;
            (0..len)
                .map(|i| numeric(array.is_null(i), || array.value(i) as f64))
                .collect()
        }
        DataType::Utf8 => {
            let array = downcast::<StringArray>(name, column)?;
            (0..len)
                .map(|i| text(array.is_null(i), || array.value(i).to_string()))
                .collect()
        }
        DataType::LargeUtf8 => {
            let array = downcast::<LargeStringArray>(name, column)?;
            (0..len)
                .map(|i| text(array.is_null(i), || array.value(i).to_string()))
                .collect()
        }
        DataType::Boolean => {
            let array = downcast::<BooleanArray>(name, column)?;
            (0..len)
                .map(|i| text(array.is_null(i), || array.value(i).to_string()))
                .collect()
        }
        _ => {
            let mut cells = Vec::with_capacity(len);
            for i in 0..len {
                if column.is_null(i) {
                    cells.push(Cell::Null);
                } else {
                    let value = arrow::util::display::array_value_to_string(column, i)?;
                    cells.push(Cell::Text(value));
                }
            }
            cells
        }
    };
    Ok(cells)
}

fn numeric(is_null: bool, value: impl FnOnce() -> f64) -> Cell {
    if is_null {
        Cell::Null
    } else {
        let value = value();
        if value.is_nan() {
            Cell::Null
        } else {
            Cell::Number(value)
        }
    }
}

fn text(is_null: bool, value: impl FnOnce() -> String) -> Cell {
    if is_null {
        Cell::Null
    } else {
        Cell::Text(value())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    /// Six samples with two expression columns, a tissue and a score
    pub fn samples() -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("sample", DataType::Utf8, false),
            Field::new("g1", DataType::Float64, true),
            Field::new("g2", DataType::Float64, true),
            Field::new("tissue", DataType::Utf8, true),
            Field::new("score", DataType::Int64, true),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec!["s1", "s2", "s3", "s4", "s5", "s6"])),
                Arc::new(Float64Array::from(vec![
                    Some(0.0),
                    Some(1.0),
                    Some(2.0),
                    Some(3.0),
                    Some(4.0),
                    None,
                ])),
                Arc::new(Float64Array::from(vec![
                    Some(0.0),
                    Some(1.0),
                    Some(4.0),
                    Some(9.0),
                    Some(16.0),
                    Some(25.0),
                ])),
                Arc::new(StringArray::from(vec![
                    Some("liver"),
                    Some("brain"),
                    Some("liver"),
                    Some("heart"),
                    Some("brain"),
                    None,
                ])),
                Arc::new(Int64Array::from(vec![5, 3, 8, 1, 9, 2])),
            ],
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn single(name: &str, column: ArrayRef) -> RecordBatch {
        let schema = Schema::new(vec![Field::new(name, column.data_type().clone(), true)]);
        RecordBatch::try_new(Arc::new(schema), vec![column]).unwrap()
    }

    #[test]
    fn test_records_keep_column_order() {
        let records = records_from_batch(&fixtures::samples(), "sample").unwrap();
        assert_eq!(records.len(), 6);

        let first = &records[0];
        assert_eq!(first.id, SelectionId::from("s1"));
        let fields: Vec<&str> = first.values.keys().map(String::as_str).collect();
        assert_eq!(fields, vec!["g1", "g2", "tissue", "score"]);
        assert_eq!(first.number("score"), Some(5.0));
        assert_eq!(first.category("tissue"), Some("liver"));
    }

    #[test]
    fn test_nulls_become_null_cells() {
        let records = records_from_batch(&fixtures::samples(), "sample").unwrap();
        let last = &records[5];
        assert_eq!(last.get("g1"), Some(&Cell::Null));
        assert_eq!(last.number("g1"), None);
        assert_eq!(last.category("tissue"), None);
    }

    #[test]
    fn test_integer_ids() {
        let batch = single("row", Arc::new(Int32Array::from(vec![10, 20])));
        let records = records_from_batch(&batch, "row").unwrap();
        assert_eq!(records[1].id, SelectionId::Number(20));
        assert!(records[1].values.is_empty());
    }

    #[test]
    fn test_missing_id_column() {
        let err = records_from_batch(&fixtures::samples(), "gene").unwrap_err();
        assert!(matches!(err, ViewError::MissingColumn(c) if c == "gene"));
    }

    #[test]
    fn test_null_and_duplicate_ids_rejected() {
        let nulls = single("id", Arc::new(StringArray::from(vec![Some("a"), None])));
        assert!(matches!(
            records_from_batch(&nulls, "id"),
            Err(ViewError::NullId { row: 1, .. })
        ));

        let dupes = single("id", Arc::new(StringArray::from(vec!["a", "b", "a"])));
        assert!(matches!(
            records_from_batch(&dupes, "id"),
            Err(ViewError::DuplicateId { .. })
        ));
    }

    #[test]
    fn test_float_ids_unsupported() {
        let batch = single("id", Arc::new(Float64Array::from(vec![1.0])));
        assert!(matches!(
            records_from_batch(&batch, "id"),
            Err(ViewError::UnsupportedColumn { .. })
        ));
    }

    #[test]
    fn test_extent_and_categories() {
        let records = records_from_batch(&fixtures::samples(), "sample").unwrap();
        assert_eq!(
            numeric_extent(&records, "g1"),
            Some(NumericRange::new(0.0, 4.0))
        );
        assert_eq!(numeric_extent(&records, "tissue"), None);
        assert_eq!(
            distinct_categories(&records, "tissue"),
            vec!["liver", "brain", "heart"]
        );
    }
}

//! Errors raised while loading data into a view

use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use lv_core::{CoreError, SelectionId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ViewError {
    #[error("Column '{0}' not found")]
    MissingColumn(String),

    #[error("Column '{column}' has unsupported type {data_type}")]
    UnsupportedColumn { column: String, data_type: DataType },

    #[error("Null id in column '{column}' at row {row}")]
    NullId { column: String, row: usize },

    #[error("Duplicate id {id} in column '{column}'")]
    DuplicateId { column: String, id: SelectionId },

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T, E = ViewError> = std::result::Result<T, E>;

//! Error types for the coordination core

use thiserror::Error;

/// Errors that can occur in core coordination operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("No async runtime available for debounced delivery on '{0}'")]
    NoRuntime(String),

    #[error("Store value for key '{key}' could not be converted: {source}")]
    StoreValue {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid range for '{field}': [{min}, {max}]")]
    InvalidRange { field: String, min: f64, max: f64 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;

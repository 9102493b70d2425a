//! Error types for Stepsense

use thiserror::Error;

/// Errors that can occur while classifying a telemetry stream
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Invalid detector configuration: {0}")]
    InvalidConfig(String),

    #[error("Lookback displacement {displacement} exceeds retained history ({available} records)")]
    LookbackOutOfRange { displacement: usize, available: usize },

    #[error("Record has {found} fields, expected {expected}")]
    FieldCount { expected: usize, found: usize },

    #[error("Sensor field {index} is not numeric: {text:?}")]
    NonNumericField { index: usize, text: String },

    #[error("Sensor field {index} is not finite")]
    NonFiniteField { index: usize },

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

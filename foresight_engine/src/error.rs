//! Error types for the foresight_engine crate

use foresight_math::MathError;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Typed outcomes returned by every public engine operation
#[derive(Debug, Error)]
pub enum EngineError {
    /// Too few observations to derive anything
    #[error("Insufficient data: need {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// Too few training samples for the task kind
    #[error("Insufficient samples: need {required} training samples, got {actual}")]
    InsufficientSamples { required: usize, actual: usize },

    /// A feature vector does not match the schema a model was trained on
    #[error("Model schema mismatch: model expects {expected}, got {found}")]
    ModelSchemaMismatch { expected: String, found: String },

    /// A numerical failure while fitting a model
    #[error("Training error: {0}")]
    TrainingError(String),

    /// Too few records to form the requested number of segments
    #[error("Insufficient data for segmentation: need {required} records, got {actual}")]
    InsufficientDataForSegmentation { required: usize, actual: usize },

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The task id has not been registered
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    /// No active model exists for the task
    #[error("No trained model for task {0}")]
    ModelNotTrained(String),

    /// Training was cancelled between fits
    #[error("Training cancelled for task {0}")]
    Cancelled(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from CSV parsing
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error from JSON (de)serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    Polars(String),
}

impl EngineError {
    /// Sparse or edge-case input the caller is expected to fall back from
    /// (naive forecast, neutral score, empty anomaly list).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::InsufficientData { .. }
                | EngineError::InsufficientSamples { .. }
                | EngineError::InsufficientDataForSegmentation { .. }
                | EngineError::TrainingError(_)
                | EngineError::ModelNotTrained(_)
        )
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, EngineError>;

impl From<MathError> for EngineError {
    fn from(err: MathError) -> Self {
        EngineError::TrainingError(err.to_string())
    }
}

impl From<PolarsError> for EngineError {
    fn from(err: PolarsError) -> Self {
        EngineError::Polars(err.to_string())
    }
}

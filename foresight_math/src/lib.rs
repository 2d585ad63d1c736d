//! # Foresight Math
//!
//! Numeric building blocks shared by the forecasting, scoring and anomaly
//! engines. Everything here works on plain `f64` slices and carries no
//! knowledge of metrics, opportunities or models.

use thiserror::Error;

pub mod linalg;
pub mod regression;
pub mod rolling;
pub mod smoothing;
pub mod stats;

/// Errors that can occur in numeric calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Singular matrix: no unique solution (pivot {pivot} is {value:e})")]
    SingularMatrix { pivot: usize, value: f64 },
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;

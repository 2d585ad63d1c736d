//! Metrics for evaluating trained models
//!
//! Free functions return `NaN` for empty or mismatched inputs so they can be
//! used directly inside reductions; the summary structs are what gets stored
//! on a trained model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Probability threshold separating predicted positives from negatives
pub const CLASSIFICATION_THRESHOLD: f64 = 0.5;

fn paired(actual: &[f64], predicted: &[f64]) -> bool {
    !actual.is_empty() && actual.len() == predicted.len()
}

/// Mean absolute error
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if !paired(actual, predicted) {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

/// Mean squared error
pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if !paired(actual, predicted) {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64
}

/// Root mean squared error
pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    mean_squared_error(actual, predicted).sqrt()
}

/// Mean absolute percentage error as a fraction; zero actuals are skipped
pub fn mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if !paired(actual, predicted) {
        return f64::NAN;
    }
    let terms: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| **a != 0.0)
        .map(|(a, p)| ((a - p) / a).abs())
        .collect();
    if terms.is_empty() {
        return f64::NAN;
    }
    terms.iter().sum::<f64>() / terms.len() as f64
}

/// Symmetric mean absolute percentage error as a fraction in `[0, 2]`
pub fn symmetric_mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if !paired(actual, predicted) {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| {
            let denom = a.abs() + p.abs();
            if denom == 0.0 {
                0.0
            } else {
                2.0 * (a - p).abs() / denom
            }
        })
        .sum::<f64>()
        / actual.len() as f64
}

/// Coefficient of determination.
///
/// A constant actual series has no variance to explain: a perfect fit scores
/// 1.0, anything else 0.0.
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> f64 {
    if !paired(actual, predicted) {
        return f64::NAN;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    if ss_tot <= f64::EPSILON * mean.abs().max(1.0) {
        return if ss_res <= f64::EPSILON * mean.abs().max(1.0) {
            1.0
        } else {
            0.0
        };
    }
    1.0 - ss_res / ss_tot
}

fn confusion(actual: &[f64], predicted: &[f64]) -> (f64, f64, f64, f64) {
    let mut tp = 0.0;
    let mut fp = 0.0;
    let mut tn = 0.0;
    let mut fn_ = 0.0;
    for (a, p) in actual.iter().zip(predicted) {
        match (*a >= CLASSIFICATION_THRESHOLD, *p >= CLASSIFICATION_THRESHOLD) {
            (true, true) => tp += 1.0,
            (false, true) => fp += 1.0,
            (false, false) => tn += 1.0,
            (true, false) => fn_ += 1.0,
        }
    }
    (tp, fp, tn, fn_)
}

/// Share of correct class predictions
pub fn accuracy_score(actual: &[f64], predicted: &[f64]) -> f64 {
    if !paired(actual, predicted) {
        return f64::NAN;
    }
    let (tp, _, tn, _) = confusion(actual, predicted);
    (tp + tn) / actual.len() as f64
}

/// True positives over predicted positives (0 when nothing is predicted positive)
pub fn precision_score(actual: &[f64], predicted: &[f64]) -> f64 {
    if !paired(actual, predicted) {
        return f64::NAN;
    }
    let (tp, fp, _, _) = confusion(actual, predicted);
    if tp + fp == 0.0 {
        0.0
    } else {
        tp / (tp + fp)
    }
}

/// True positives over actual positives (0 when there are none)
pub fn recall_score(actual: &[f64], predicted: &[f64]) -> f64 {
    if !paired(actual, predicted) {
        return f64::NAN;
    }
    let (tp, _, _, fn_) = confusion(actual, predicted);
    if tp + fn_ == 0.0 {
        0.0
    } else {
        tp / (tp + fn_)
    }
}

/// Harmonic mean of precision and recall
pub fn f1_score(actual: &[f64], predicted: &[f64]) -> f64 {
    let precision = precision_score(actual, predicted);
    let recall = recall_score(actual, predicted);
    if precision.is_nan() || recall.is_nan() {
        return f64::NAN;
    }
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Regression performance on held-out samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Coefficient of determination
    pub r2: f64,
    /// Mean Absolute Percentage Error (fraction)
    pub mape: f64,
    /// Symmetric Mean Absolute Percentage Error (fraction)
    pub smape: f64,
}

impl RegressionMetrics {
    pub fn evaluate(actual: &[f64], predicted: &[f64]) -> Self {
        Self {
            mae: mean_absolute_error(actual, predicted),
            mse: mean_squared_error(actual, predicted),
            rmse: root_mean_squared_error(actual, predicted),
            r2: r_squared(actual, predicted),
            mape: mean_absolute_percentage_error(actual, predicted),
            smape: symmetric_mean_absolute_percentage_error(actual, predicted),
        }
    }
}

impl std::fmt::Display for RegressionMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Regression Metrics:")?;
        writeln!(f, "  MAE:   {:.4}", self.mae)?;
        writeln!(f, "  RMSE:  {:.4}", self.rmse)?;
        writeln!(f, "  R²:    {:.4}", self.r2)?;
        writeln!(f, "  MAPE:  {:.2}%", self.mape * 100.0)?;
        writeln!(f, "  SMAPE: {:.2}%", self.smape * 100.0)?;
        Ok(())
    }
}

/// Classification performance on held-out samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl ClassificationMetrics {
    pub fn evaluate(actual: &[f64], predicted: &[f64]) -> Self {
        Self {
            accuracy: accuracy_score(actual, predicted),
            precision: precision_score(actual, predicted),
            recall: recall_score(actual, predicted),
            f1: f1_score(actual, predicted),
        }
    }
}

/// Everything recorded about a model's fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub regression: RegressionMetrics,
    pub classification: Option<ClassificationMetrics>,
    /// Standard deviation of out-of-sample residuals; drives confidence bands
    pub residual_std: f64,
    /// Feature name to relative importance, when the algorithm exposes it
    pub feature_importance: Option<BTreeMap<String, f64>>,
    pub validation_samples: usize,
}

impl PerformanceMetrics {
    /// Quality score in `[0, 1]`: accuracy for classifiers, R² otherwise
    pub fn quality(&self) -> f64 {
        let raw = match &self.classification {
            Some(c) => c.accuracy,
            None => self.regression.r2,
        };
        if raw.is_finite() {
            raw.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Sample standard deviation of residuals (population form below two values)
pub fn residual_std(residuals: &[f64]) -> f64 {
    foresight_math::stats::sample_std(residuals)
        .or_else(|| foresight_math::stats::population_std(residuals))
        .unwrap_or(0.0)
}

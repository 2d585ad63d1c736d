//! Exponential smoothing model for series forecasting

use crate::error::{EngineError, Result};
use crate::models::{require_samples, Estimator, Predictor, TrainingSet};
use foresight_math::smoothing::ExponentialSmoothing;
use serde::{Deserialize, Serialize};

/// Simple exponential smoothing model
#[derive(Debug, Clone)]
pub struct ExponentialSmoothingModel {
    /// Smoothing parameter
    alpha: f64,
}

/// Trained exponential smoothing model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedExponentialSmoothing {
    /// Smoothing parameter
    pub alpha: f64,
    /// Level after the last training value
    pub level: f64,
}

impl ExponentialSmoothingModel {
    /// Create a new exponential smoothing model
    pub fn new(alpha: f64) -> Result<Self> {
        if alpha <= 0.0 || alpha >= 1.0 {
            return Err(EngineError::InvalidParameter(
                "Alpha must be between 0 and 1".to_string(),
            ));
        }

        Ok(Self { alpha })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Estimator for ExponentialSmoothingModel {
    type Fitted = TrainedExponentialSmoothing;

    fn fit(&self, set: &TrainingSet) -> Result<Self::Fitted> {
        require_samples(set, 1, &self.name())?;
        let es = ExponentialSmoothing::fit(self.alpha, &set.targets)?;
        let level = es
            .level()
            .ok_or_else(|| EngineError::TrainingError("Smoothing produced no level".to_string()))?;

        Ok(TrainedExponentialSmoothing {
            alpha: self.alpha,
            level,
        })
    }

    fn name(&self) -> String {
        format!("Exponential Smoothing (alpha={})", self.alpha)
    }
}

impl Predictor for TrainedExponentialSmoothing {
    /// The forecast is the level after smoothing `history`; the stored level
    /// when no history is given
    fn predict(&self, _row: &[f64], history: &[f64]) -> Result<f64> {
        if history.is_empty() {
            return Ok(self.level);
        }
        let es = ExponentialSmoothing::fit(self.alpha, history)?;
        Ok(es.level().unwrap_or(self.level))
    }
}

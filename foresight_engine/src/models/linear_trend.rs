//! Linear trend over the period index

use crate::error::{EngineError, Result};
use crate::models::{require_samples, Estimator, Predictor, TrainingSet};
use foresight_math::regression::LinearTrend;
use serde::{Deserialize, Serialize};

/// Ordinary least-squares line through the ordered targets
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearTrendModel;

/// Trained linear trend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedLinearTrend {
    pub trend: LinearTrend,
}

impl Estimator for LinearTrendModel {
    type Fitted = TrainedLinearTrend;

    fn fit(&self, set: &TrainingSet) -> Result<Self::Fitted> {
        require_samples(set, 2, &self.name())?;
        Ok(TrainedLinearTrend {
            trend: LinearTrend::fit(&set.targets)?,
        })
    }

    fn name(&self) -> String {
        "Linear Trend".to_string()
    }
}

impl Predictor for TrainedLinearTrend {
    /// `row[0]` is the position on the fitted index
    fn predict(&self, row: &[f64], _history: &[f64]) -> Result<f64> {
        let position = row.first().copied().ok_or_else(|| {
            EngineError::InvalidParameter("Linear trend needs a position".to_string())
        })?;
        Ok(self.trend.value_at(position))
    }
}

//! Ridge regression on standardized features

use crate::error::{EngineError, Result};
use crate::models::{require_samples, Estimator, Predictor, TrainingSet};
use foresight_math::regression::RidgeFit;
use foresight_math::stats::StandardScaler;
use serde::{Deserialize, Serialize};

/// L2-penalized linear regression
#[derive(Debug, Clone)]
pub struct RidgeRegression {
    lambda: f64,
}

/// Trained ridge regression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedRidgeRegression {
    pub scaler: StandardScaler,
    pub fit: RidgeFit,
}

impl RidgeRegression {
    pub fn new(lambda: f64) -> Result<Self> {
        if lambda < 0.0 || !lambda.is_finite() {
            return Err(EngineError::InvalidParameter(format!(
                "Ridge penalty must be non-negative, got {}",
                lambda
            )));
        }
        Ok(Self { lambda })
    }
}

impl Estimator for RidgeRegression {
    type Fitted = TrainedRidgeRegression;

    fn fit(&self, set: &TrainingSet) -> Result<Self::Fitted> {
        require_samples(set, 2, &self.name())?;
        let scaler = StandardScaler::fit(&set.rows)?;
        let scaled = scaler.transform_all(&set.rows)?;
        let fit = RidgeFit::fit(&scaled, &set.targets, self.lambda)?;
        Ok(TrainedRidgeRegression { scaler, fit })
    }

    fn name(&self) -> String {
        format!("Ridge (lambda={})", self.lambda)
    }
}

impl Predictor for TrainedRidgeRegression {
    fn predict(&self, row: &[f64], _history: &[f64]) -> Result<f64> {
        let scaled = self.scaler.transform(row)?;
        Ok(self.fit.predict(&scaled)?)
    }

    /// Absolute standardized coefficients, normalized to sum to one
    fn feature_importance(&self) -> Option<Vec<f64>> {
        let abs: Vec<f64> = self.fit.coefficients.iter().map(|c| c.abs()).collect();
        let total: f64 = abs.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return None;
        }
        Some(abs.into_iter().map(|c| c / total).collect())
    }
}

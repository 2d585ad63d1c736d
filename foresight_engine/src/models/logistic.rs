//! L2-regularized logistic regression

use crate::error::{EngineError, Result};
use crate::models::{require_samples, Estimator, Predictor, TrainingSet};
use foresight_math::stats::StandardScaler;
use serde::{Deserialize, Serialize};

/// Logistic regression trained by batch gradient descent
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    lambda: f64,
    epochs: usize,
    learning_rate: f64,
}

/// Trained logistic regression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedLogisticRegression {
    pub scaler: StandardScaler,
    pub weights: Vec<f64>,
    pub bias: f64,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LogisticRegression {
    pub fn new(lambda: f64, epochs: usize, learning_rate: f64) -> Result<Self> {
        if lambda < 0.0 || !lambda.is_finite() {
            return Err(EngineError::InvalidParameter(format!(
                "L2 penalty must be non-negative, got {}",
                lambda
            )));
        }
        if epochs == 0 {
            return Err(EngineError::InvalidParameter(
                "Logistic regression needs at least one epoch".to_string(),
            ));
        }
        if learning_rate <= 0.0 || !learning_rate.is_finite() {
            return Err(EngineError::InvalidParameter(format!(
                "Learning rate must be positive, got {}",
                learning_rate
            )));
        }
        Ok(Self {
            lambda,
            epochs,
            learning_rate,
        })
    }
}

impl Estimator for LogisticRegression {
    type Fitted = TrainedLogisticRegression;

    /// Targets are outcomes in `[0, 1]`
    fn fit(&self, set: &TrainingSet) -> Result<Self::Fitted> {
        require_samples(set, 2, &self.name())?;
        if set.targets.iter().any(|y| !(0.0..=1.0).contains(y)) {
            return Err(EngineError::TrainingError(
                "Logistic targets must lie within [0, 1]".to_string(),
            ));
        }

        let scaler = StandardScaler::fit(&set.rows)?;
        let rows = scaler.transform_all(&set.rows)?;
        let n = rows.len() as f64;
        let width = scaler.width();

        let mut weights = vec![0.0; width];
        let mut bias = 0.0;
        for _ in 0..self.epochs {
            let mut grad_w = vec![0.0; width];
            let mut grad_b = 0.0;
            for (row, &y) in rows.iter().zip(&set.targets) {
                let z = bias + row.iter().zip(&weights).map(|(x, w)| x * w).sum::<f64>();
                let err = sigmoid(z) - y;
                for (g, x) in grad_w.iter_mut().zip(row) {
                    *g += err * x;
                }
                grad_b += err;
            }
            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= self.learning_rate * (g / n + self.lambda * *w);
            }
            bias -= self.learning_rate * grad_b / n;
        }

        if weights.iter().any(|w| !w.is_finite()) || !bias.is_finite() {
            return Err(EngineError::TrainingError(
                "Logistic regression diverged".to_string(),
            ));
        }

        Ok(TrainedLogisticRegression {
            scaler,
            weights,
            bias,
        })
    }

    fn name(&self) -> String {
        format!("Logistic Regression (lambda={})", self.lambda)
    }
}

impl Predictor for TrainedLogisticRegression {
    /// Probability of a positive outcome
    fn predict(&self, row: &[f64], _history: &[f64]) -> Result<f64> {
        let x = self.scaler.transform(row)?;
        let z = self.bias + x.iter().zip(&self.weights).map(|(x, w)| x * w).sum::<f64>();
        Ok(sigmoid(z))
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        let total: f64 = self.weights.iter().map(|w| w.abs()).sum();
        if total <= 0.0 {
            return None;
        }
        Some(self.weights.iter().map(|w| w.abs() / total).collect())
    }
}

//! Gradient-boosted regression stumps
//!
//! Squared-error boosting: start from the target mean, then repeatedly fit a
//! one-split stump to the residuals and add a shrunken copy of it. Each
//! stump picks the split with the largest reduction in squared error; that
//! gain is accumulated per feature and reported as feature importance.

use crate::error::{EngineError, Result};
use crate::models::{require_samples, Estimator, Predictor, TrainingSet};
use serde::{Deserialize, Serialize};

/// Candidate split points examined per feature and round
const MAX_CANDIDATE_SPLITS: usize = 32;

/// Boosting hyper-parameters
#[derive(Debug, Clone)]
pub struct GradientBoosting {
    n_estimators: usize,
    learning_rate: f64,
}

/// One decision stump: `x[feature] <= threshold` goes left
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stump {
    pub feature: usize,
    pub threshold: f64,
    pub left: f64,
    pub right: f64,
}

impl Stump {
    fn value(&self, row: &[f64]) -> f64 {
        match row.get(self.feature) {
            Some(&x) if x <= self.threshold => self.left,
            _ => self.right,
        }
    }
}

/// Trained boosted ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedGradientBoosting {
    pub base: f64,
    pub learning_rate: f64,
    pub stumps: Vec<Stump>,
    pub width: usize,
    /// Total split gain per feature
    gains: Vec<f64>,
}

impl GradientBoosting {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Result<Self> {
        if n_estimators == 0 {
            return Err(EngineError::InvalidParameter(
                "Gradient boosting needs at least one estimator".to_string(),
            ));
        }
        if learning_rate <= 0.0 || learning_rate > 1.0 {
            return Err(EngineError::InvalidParameter(format!(
                "Learning rate must be within (0, 1], got {}",
                learning_rate
            )));
        }
        Ok(Self {
            n_estimators,
            learning_rate,
        })
    }
}

/// Best split of one feature column for the current residuals
fn best_split(order: &[usize], column: &[f64], residuals: &[f64]) -> Option<(f64, f64, f64, f64)> {
    let n = order.len();
    let total: f64 = residuals.iter().sum();

    // Split positions between distinct neighbouring values
    let positions: Vec<usize> = (1..n)
        .filter(|&i| column[order[i - 1]] < column[order[i]])
        .collect();
    if positions.is_empty() {
        return None;
    }
    let step = (positions.len() as f64 / MAX_CANDIDATE_SPLITS as f64).max(1.0);
    let mut candidates: Vec<usize> = (0..positions.len().min(MAX_CANDIDATE_SPLITS))
        .map(|k| positions[(k as f64 * step) as usize])
        .collect();
    candidates.dedup();

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    for &i in order {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + residuals[i]);
    }

    let mut best: Option<(f64, f64, f64, f64)> = None;
    for pos in candidates {
        let left_sum = prefix[pos];
        let right_sum = total - left_sum;
        let n_left = pos as f64;
        let n_right = (n - pos) as f64;
        let gain = left_sum * left_sum / n_left + right_sum * right_sum / n_right
            - total * total / n as f64;
        if best.map_or(true, |(g, ..)| gain > g) {
            let threshold = (column[order[pos - 1]] + column[order[pos]]) / 2.0;
            best = Some((gain, threshold, left_sum / n_left, right_sum / n_right));
        }
    }
    best
}

impl Estimator for GradientBoosting {
    type Fitted = TrainedGradientBoosting;

    fn fit(&self, set: &TrainingSet) -> Result<Self::Fitted> {
        require_samples(set, 2, &self.name())?;
        let n = set.len();
        let width = set.schema.len();
        let base = set.targets.iter().sum::<f64>() / n as f64;

        let columns: Vec<Vec<f64>> = (0..width)
            .map(|j| set.rows.iter().map(|r| r[j]).collect())
            .collect();
        let orders: Vec<Vec<usize>> = columns
            .iter()
            .map(|col| {
                let mut idx: Vec<usize> = (0..n).collect();
                idx.sort_by(|&a, &b| col[a].total_cmp(&col[b]));
                idx
            })
            .collect();

        let mut fitted = vec![base; n];
        let mut stumps = Vec::with_capacity(self.n_estimators);
        let mut gains = vec![0.0; width];

        for _ in 0..self.n_estimators {
            let residuals: Vec<f64> = set
                .targets
                .iter()
                .zip(&fitted)
                .map(|(y, f)| y - f)
                .collect();

            let mut best: Option<(usize, f64, f64, f64, f64)> = None;
            for j in 0..width {
                if let Some((gain, threshold, left, right)) =
                    best_split(&orders[j], &columns[j], &residuals)
                {
                    if best.map_or(true, |(_, g, ..)| gain > g) {
                        best = Some((j, gain, threshold, left, right));
                    }
                }
            }

            let Some((feature, gain, threshold, left, right)) = best else {
                break;
            };
            if gain <= 1e-12 {
                break;
            }

            let stump = Stump {
                feature,
                threshold,
                left,
                right,
            };
            for (f, row) in fitted.iter_mut().zip(&set.rows) {
                *f += self.learning_rate * stump.value(row);
            }
            gains[feature] += gain;
            stumps.push(stump);
        }

        Ok(TrainedGradientBoosting {
            base,
            learning_rate: self.learning_rate,
            stumps,
            width,
            gains,
        })
    }

    fn name(&self) -> String {
        format!(
            "Gradient Boosting (n={}, lr={})",
            self.n_estimators, self.learning_rate
        )
    }
}

impl Predictor for TrainedGradientBoosting {
    fn predict(&self, row: &[f64], _history: &[f64]) -> Result<f64> {
        if row.len() != self.width {
            return Err(EngineError::ModelSchemaMismatch {
                expected: format!("{} features", self.width),
                found: format!("{} features", row.len()),
            });
        }
        Ok(self.base
            + self.learning_rate * self.stumps.iter().map(|s| s.value(row)).sum::<f64>())
    }

    /// Share of total split gain per feature
    fn feature_importance(&self) -> Option<Vec<f64>> {
        let total: f64 = self.gains.iter().sum();
        if total <= 0.0 {
            return None;
        }
        Some(self.gains.iter().map(|g| g / total).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureSchema;

    fn schema() -> FeatureSchema {
        FeatureSchema {
            name: "test".to_string(),
            version: 1,
            features: vec!["signal".to_string(), "noise".to_string()],
        }
    }

    #[test]
    fn test_learns_step_function() {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 2) as f64]).collect();
        let targets: Vec<f64> = (0..40).map(|i| if i < 20 { 1.0 } else { 5.0 }).collect();
        let set = TrainingSet::new(schema(), rows, targets).unwrap();

        let model = GradientBoosting::new(100, 0.1).unwrap().fit(&set).unwrap();
        assert!((model.predict(&[5.0, 1.0], &[]).unwrap() - 1.0).abs() < 0.1);
        assert!((model.predict(&[35.0, 0.0], &[]).unwrap() - 5.0).abs() < 0.1);

        let importance = model.feature_importance().unwrap();
        assert!(importance[0] > 0.9);
    }

    #[test]
    fn test_constant_target_has_no_stumps() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, 0.0]).collect();
        let set = TrainingSet::new(schema(), rows, vec![3.0; 10]).unwrap();
        let model = GradientBoosting::new(10, 0.1).unwrap().fit(&set).unwrap();
        assert!(model.stumps.is_empty());
        assert_eq!(model.predict(&[100.0, 0.0], &[]).unwrap(), 3.0);
        assert!(model.feature_importance().is_none());
    }

    #[test]
    fn test_deterministic() {
        let rows: Vec<Vec<f64>> = (0..30).map(|i| vec![(i * 7 % 11) as f64, i as f64]).collect();
        let targets: Vec<f64> = rows.iter().map(|r| r[0] * 0.5 + r[1]).collect();
        let set = TrainingSet::new(schema(), rows, targets).unwrap();
        let gb = GradientBoosting::new(20, 0.2).unwrap();
        assert_eq!(gb.fit(&set).unwrap(), gb.fit(&set).unwrap());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(GradientBoosting::new(0, 0.1).is_err());
        assert!(GradientBoosting::new(10, 0.0).is_err());
    }
}

//! Last-value-carried-forward baseline

use crate::error::{EngineError, Result};
use crate::models::{require_samples, Estimator, Predictor, TrainingSet};
use serde::{Deserialize, Serialize};

/// Naive baseline: the next value equals the last one seen
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveLastValue;

/// Trained naive baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedNaiveLastValue {
    /// Last training target, used when no history is passed
    pub last_value: f64,
}

impl Estimator for NaiveLastValue {
    type Fitted = TrainedNaiveLastValue;

    fn fit(&self, set: &TrainingSet) -> Result<Self::Fitted> {
        require_samples(set, 1, &self.name())?;
        let last_value = set
            .targets
            .last()
            .copied()
            .ok_or_else(|| EngineError::TrainingError("Empty training set".to_string()))?;
        Ok(TrainedNaiveLastValue { last_value })
    }

    fn name(&self) -> String {
        "Naive Last Value".to_string()
    }
}

impl Predictor for TrainedNaiveLastValue {
    fn predict(&self, _row: &[f64], history: &[f64]) -> Result<f64> {
        Ok(history.last().copied().unwrap_or(self.last_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naive_carries_last_value() {
        let set = TrainingSet::series(&[3.0, 5.0, 8.0]).unwrap();
        let model = NaiveLastValue.fit(&set).unwrap();
        assert_eq!(model.predict(&[3.0], &[]).unwrap(), 8.0);
        assert_eq!(model.predict(&[1.0], &[3.0]).unwrap(), 3.0);
    }

    #[test]
    fn test_naive_empty_set() {
        let set = TrainingSet::series(&[]).unwrap();
        assert!(NaiveLastValue.fit(&set).is_err());
    }
}

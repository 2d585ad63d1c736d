//! Trainable models and their fitted parameters
//!
//! Every algorithm is named by an explicit [`AlgorithmKind`] tag that is
//! recorded on the trained model, so callers switch on the tag instead of on
//! which code path happened to succeed.
//!
//! Two families exist:
//! - series models (`NaiveLastValue`, `LinearTrend`, `ExponentialSmoothing`)
//!   consume the ordered target sequence; their rows only carry a position
//! - feature models (`Ridge`, `GradientBoosting`, `Logistic`) consume
//!   feature vectors and ignore history

use crate::error::{EngineError, Result};
use crate::features::{FeatureSchema, FeatureVector};
use crate::metrics::PerformanceMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

pub mod exponential_smoothing;
pub mod gradient_boosting;
pub mod linear_trend;
pub mod logistic;
pub mod naive;
pub mod ridge;

pub use exponential_smoothing::{ExponentialSmoothingModel, TrainedExponentialSmoothing};
pub use gradient_boosting::{GradientBoosting, Stump, TrainedGradientBoosting};
pub use linear_trend::{LinearTrendModel, TrainedLinearTrend};
pub use logistic::{LogisticRegression, TrainedLogisticRegression};
pub use naive::{NaiveLastValue, TrainedNaiveLastValue};
pub use ridge::{RidgeRegression, TrainedRidgeRegression};

/// Algorithm choice together with its hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlgorithmKind {
    NaiveLastValue,
    LinearTrend,
    ExponentialSmoothing { alpha: f64 },
    Ridge { lambda: f64 },
    GradientBoosting { n_estimators: usize, learning_rate: f64 },
    Logistic { lambda: f64, epochs: usize, learning_rate: f64 },
}

/// Hyper-parameter-free algorithm identity; the registry keys active
/// versions by it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmTag {
    NaiveLastValue,
    LinearTrend,
    ExponentialSmoothing,
    Ridge,
    GradientBoosting,
    Logistic,
}

impl fmt::Display for AlgorithmTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlgorithmTag::NaiveLastValue => "naive_last_value",
            AlgorithmTag::LinearTrend => "linear_trend",
            AlgorithmTag::ExponentialSmoothing => "exponential_smoothing",
            AlgorithmTag::Ridge => "ridge",
            AlgorithmTag::GradientBoosting => "gradient_boosting",
            AlgorithmTag::Logistic => "logistic",
        };
        f.write_str(name)
    }
}

impl AlgorithmKind {
    pub fn tag(&self) -> AlgorithmTag {
        match self {
            AlgorithmKind::NaiveLastValue => AlgorithmTag::NaiveLastValue,
            AlgorithmKind::LinearTrend => AlgorithmTag::LinearTrend,
            AlgorithmKind::ExponentialSmoothing { .. } => AlgorithmTag::ExponentialSmoothing,
            AlgorithmKind::Ridge { .. } => AlgorithmTag::Ridge,
            AlgorithmKind::GradientBoosting { .. } => AlgorithmTag::GradientBoosting,
            AlgorithmKind::Logistic { .. } => AlgorithmTag::Logistic,
        }
    }

    /// Series models read the ordered target sequence instead of features
    pub fn is_series_model(&self) -> bool {
        matches!(
            self,
            AlgorithmKind::NaiveLastValue
                | AlgorithmKind::LinearTrend
                | AlgorithmKind::ExponentialSmoothing { .. }
        )
    }

    /// Classifiers report classification metrics alongside regression ones
    pub fn is_classifier(&self) -> bool {
        matches!(self, AlgorithmKind::Logistic { .. })
    }

    /// Human-readable name including hyper-parameters
    pub fn name(&self) -> String {
        match self {
            AlgorithmKind::NaiveLastValue => NaiveLastValue.name(),
            AlgorithmKind::LinearTrend => LinearTrendModel.name(),
            AlgorithmKind::ExponentialSmoothing { alpha } => {
                format!("Exponential Smoothing (alpha={})", alpha)
            }
            AlgorithmKind::Ridge { lambda } => format!("Ridge (lambda={})", lambda),
            AlgorithmKind::GradientBoosting {
                n_estimators,
                learning_rate,
            } => format!(
                "Gradient Boosting (n={}, lr={})",
                n_estimators, learning_rate
            ),
            AlgorithmKind::Logistic { lambda, .. } => {
                format!("Logistic Regression (lambda={})", lambda)
            }
        }
    }

    /// Fit this algorithm on a training set
    pub fn fit(&self, set: &TrainingSet) -> Result<ModelParameters> {
        if self.is_series_model() && set.schema != FeatureSchema::series_index() {
            return Err(EngineError::ModelSchemaMismatch {
                expected: FeatureSchema::series_index().id(),
                found: set.schema.id(),
            });
        }

        Ok(match *self {
            AlgorithmKind::NaiveLastValue => ModelParameters::NaiveLastValue(NaiveLastValue.fit(set)?),
            AlgorithmKind::LinearTrend => ModelParameters::LinearTrend(LinearTrendModel.fit(set)?),
            AlgorithmKind::ExponentialSmoothing { alpha } => ModelParameters::ExponentialSmoothing(
                ExponentialSmoothingModel::new(alpha)?.fit(set)?,
            ),
            AlgorithmKind::Ridge { lambda } => {
                ModelParameters::Ridge(RidgeRegression::new(lambda)?.fit(set)?)
            }
            AlgorithmKind::GradientBoosting {
                n_estimators,
                learning_rate,
            } => ModelParameters::GradientBoosting(
                GradientBoosting::new(n_estimators, learning_rate)?.fit(set)?,
            ),
            AlgorithmKind::Logistic {
                lambda,
                epochs,
                learning_rate,
            } => ModelParameters::Logistic(
                LogisticRegression::new(lambda, epochs, learning_rate)?.fit(set)?,
            ),
        })
    }
}

/// Trained model that produces one prediction at a time
pub trait Predictor: Debug {
    /// Predict the next value.
    ///
    /// `row` is the feature row (a position for series models); `history`
    /// is the ordered target sequence seen so far (ignored by feature
    /// models).
    fn predict(&self, row: &[f64], history: &[f64]) -> Result<f64>;

    /// Relative importance per feature column, when the algorithm exposes it
    fn feature_importance(&self) -> Option<Vec<f64>> {
        None
    }
}

/// Model that can be fitted on a training set
pub trait Estimator: Debug + Clone {
    /// The type of trained model produced
    type Fitted: Predictor;

    /// Fit the model
    fn fit(&self, set: &TrainingSet) -> Result<Self::Fitted>;

    /// Get the name of the model
    fn name(&self) -> String;
}

/// Fitted state of any algorithm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelParameters {
    NaiveLastValue(TrainedNaiveLastValue),
    LinearTrend(TrainedLinearTrend),
    ExponentialSmoothing(TrainedExponentialSmoothing),
    Ridge(TrainedRidgeRegression),
    GradientBoosting(TrainedGradientBoosting),
    Logistic(TrainedLogisticRegression),
}

impl ModelParameters {
    fn as_predictor(&self) -> &dyn Predictor {
        match self {
            ModelParameters::NaiveLastValue(m) => m,
            ModelParameters::LinearTrend(m) => m,
            ModelParameters::ExponentialSmoothing(m) => m,
            ModelParameters::Ridge(m) => m,
            ModelParameters::GradientBoosting(m) => m,
            ModelParameters::Logistic(m) => m,
        }
    }
}

impl Predictor for ModelParameters {
    fn predict(&self, row: &[f64], history: &[f64]) -> Result<f64> {
        self.as_predictor().predict(row, history)
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        self.as_predictor().feature_importance()
    }
}

/// Rows and targets under one feature schema
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    pub schema: FeatureSchema,
    pub rows: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
    /// Seasonal strength the targets were deseasonalized with (0 = none)
    pub seasonal_strength: f64,
}

impl TrainingSet {
    /// Build a set, checking row widths against the schema
    pub fn new(schema: FeatureSchema, rows: Vec<Vec<f64>>, targets: Vec<f64>) -> Result<Self> {
        if rows.len() != targets.len() {
            return Err(EngineError::InvalidParameter(format!(
                "{} rows but {} targets",
                rows.len(),
                targets.len()
            )));
        }
        if let Some(row) = rows.iter().find(|r| r.len() != schema.len()) {
            return Err(EngineError::ModelSchemaMismatch {
                expected: format!("{} ({} features)", schema.id(), schema.len()),
                found: format!("row with {} values", row.len()),
            });
        }
        if targets.iter().chain(rows.iter().flatten()).any(|v| !v.is_finite()) {
            return Err(EngineError::InvalidParameter(
                "Training data contains non-finite values".to_string(),
            ));
        }

        Ok(Self {
            schema,
            rows,
            targets,
            seasonal_strength: 0.0,
        })
    }

    /// Build a set from feature vectors, rejecting vectors from another schema
    pub fn from_vectors(
        schema: FeatureSchema,
        vectors: &[FeatureVector],
        targets: Vec<f64>,
    ) -> Result<Self> {
        let id = schema.id();
        let mut rows = Vec::with_capacity(vectors.len());
        for fv in vectors {
            if fv.schema != id {
                return Err(EngineError::ModelSchemaMismatch {
                    expected: id,
                    found: fv.schema.clone(),
                });
            }
            rows.push(fv.values.clone());
        }
        Self::new(schema, rows, targets)
    }

    /// Ordered series for series models: row `i` is `[i]`
    pub fn series(values: &[f64]) -> Result<Self> {
        let rows = (0..values.len()).map(|i| vec![i as f64]).collect();
        Self::new(FeatureSchema::series_index(), rows, values.to_vec())
    }

    pub fn with_seasonal_strength(mut self, strength: f64) -> Self {
        self.seasonal_strength = strength;
        self
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// The first `n` samples, in order
    pub fn head(&self, n: usize) -> Self {
        let n = n.min(self.len());
        Self {
            schema: self.schema.clone(),
            rows: self.rows[..n].to_vec(),
            targets: self.targets[..n].to_vec(),
            seasonal_strength: self.seasonal_strength,
        }
    }

    /// Samples at the given indices, in the given order
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            schema: self.schema.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
            seasonal_strength: self.seasonal_strength,
        }
    }
}

/// Stable reference to one stored model version
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRef {
    pub task_id: String,
    pub algorithm: AlgorithmTag,
    pub version: u32,
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/v{}", self.task_id, self.algorithm, self.version)
    }
}

/// Immutable, versioned result of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub task_id: String,
    pub version: u32,
    pub algorithm: AlgorithmKind,
    pub schema: FeatureSchema,
    pub parameters: ModelParameters,
    pub metrics: PerformanceMetrics,
    pub trained_at: DateTime<Utc>,
    pub training_samples: usize,
    pub seasonal_strength: f64,
}

impl TrainedModel {
    pub fn model_ref(&self) -> ModelRef {
        ModelRef {
            task_id: self.task_id.clone(),
            algorithm: self.algorithm.tag(),
            version: self.version,
        }
    }

    /// Schema version this model was trained under (`name@vN`)
    pub fn feature_schema_version(&self) -> String {
        self.schema.id()
    }

    /// Predict from a feature vector, which must come from the model's schema
    pub fn predict(&self, features: &FeatureVector, history: &[f64]) -> Result<f64> {
        let expected = self.schema.id();
        if features.schema != expected || features.values.len() != self.schema.len() {
            return Err(EngineError::ModelSchemaMismatch {
                expected,
                found: features.schema.clone(),
            });
        }
        self.predict_row(&features.values, history)
    }

    /// Predict from a raw row already known to follow the model's schema
    pub(crate) fn predict_row(&self, row: &[f64], history: &[f64]) -> Result<f64> {
        let value = self.parameters.predict(row, history)?;
        if !value.is_finite() {
            return Err(EngineError::TrainingError(format!(
                "{} produced a non-finite prediction",
                self.model_ref()
            )));
        }
        Ok(value)
    }
}

/// Prediction for sample `i` of a set, given only the targets before it
pub(crate) fn predict_at<P: Predictor + ?Sized>(
    model: &P,
    set: &TrainingSet,
    index: usize,
) -> Result<f64> {
    model.predict(&set.rows[index], &set.targets[..index])
}

/// Checks shared by every estimator
pub(crate) fn require_samples(set: &TrainingSet, required: usize, name: &str) -> Result<()> {
    if set.len() < required {
        return Err(EngineError::TrainingError(format!(
            "{} needs at least {} samples, got {}",
            name,
            required,
            set.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_kind_serde_tag() {
        let kind = AlgorithmKind::GradientBoosting {
            n_estimators: 50,
            learning_rate: 0.1,
        };
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("\"kind\":\"gradient_boosting\""));
        let back: AlgorithmKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);
        assert_eq!(back.tag(), AlgorithmTag::GradientBoosting);
    }

    #[test]
    fn test_series_model_rejects_feature_schema() {
        let set = TrainingSet::new(
            FeatureSchema::opportunity(),
            vec![vec![0.0; 8]; 3],
            vec![1.0, 2.0, 3.0],
        )
        .unwrap();
        let err = AlgorithmKind::LinearTrend.fit(&set).unwrap_err();
        assert!(matches!(err, EngineError::ModelSchemaMismatch { .. }));
    }

    #[test]
    fn test_training_set_checks_width() {
        let err = TrainingSet::new(FeatureSchema::series_index(), vec![vec![0.0, 1.0]], vec![1.0])
            .unwrap_err();
        assert!(matches!(err, EngineError::ModelSchemaMismatch { .. }));
    }

    #[test]
    fn test_head_and_select() {
        let set = TrainingSet::series(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(set.head(2).targets, vec![1.0, 2.0]);
        assert_eq!(set.select(&[3, 0]).targets, vec![4.0, 1.0]);
        assert_eq!(set.select(&[3, 0]).rows, vec![vec![3.0], vec![0.0]]);
    }
}

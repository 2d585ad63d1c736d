//! Static engine configuration
//!
//! Every lookup table and threshold the engine consumes lives here: the
//! 12-slot seasonal multiplier table, categorical vocabularies, benchmark
//! values, anomaly and correlation thresholds, and training defaults.
//! Configuration is plain data; it can be built in code or loaded from JSON,
//! with any omitted field falling back to its default.

use crate::anomaly::DetectorKind;
use crate::error::{EngineError, Result};
use crate::models::AlgorithmKind;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::BTreeMap;
use std::path::Path;

/// Business-calendar multipliers, January first
pub const DEFAULT_SEASONAL_FACTORS: [f64; 12] = [
    1.1,  // budget approvals
    1.0,  // normal trading
    1.05, // Q1 closing
    0.85, // Ramadan
    0.8,  // Ramadan / Eid
    1.05, // post-Ramadan catch-up
    0.9,  // summer slowdown
    0.85, // summer vacation
    1.1,  // back to business
    1.15, // Q4 push
    1.2,  // year-end rush
    1.1,  // year-end closing
];

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seasonal multiplier per calendar month
    pub seasonal_factors: [f64; 12],
    /// Categorical vocabularies for opportunity encoding
    pub vocabulary: Vocabulary,
    /// Static benchmark value per metric name
    pub benchmarks: BTreeMap<String, f64>,
    /// Anomaly detection settings
    pub anomaly: AnomalyConfig,
    /// Minimum absolute correlation for a pair to be reported as strong
    pub correlation_threshold: f64,
    /// Forecasting settings
    pub forecast: ForecastConfig,
    /// Opportunity scoring settings
    pub scoring: ScoringConfig,
    /// Centroid clustering settings
    pub segmentation: SegmentationConfig,
    /// Model training settings shared by every task
    pub training: TrainingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let benchmarks = [
            ("Revenue", 1_000_000.0),
            ("GP_Margin", 25.0),
            ("Customer_Satisfaction", 85.0),
            ("Conversion_Rate", 3.5),
            ("Active_Users", 8000.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            seasonal_factors: DEFAULT_SEASONAL_FACTORS,
            vocabulary: Vocabulary::default(),
            benchmarks,
            anomaly: AnomalyConfig::default(),
            correlation_threshold: 0.6,
            forecast: ForecastConfig::default(),
            scoring: ScoringConfig::default(),
            segmentation: SegmentationConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Seasonal multiplier for a calendar month (1-12)
    pub fn seasonal_factor(&self, month: u32) -> f64 {
        match month {
            1..=12 => self.seasonal_factors[(month - 1) as usize],
            _ => 1.0,
        }
    }

    /// Check value ranges; every loader calls this
    pub fn validate(&self) -> Result<()> {
        if self
            .seasonal_factors
            .iter()
            .any(|f| !f.is_finite() || *f <= 0.0)
        {
            return Err(EngineError::Config(
                "Seasonal factors must be positive finite numbers".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.correlation_threshold) {
            return Err(EngineError::Config(format!(
                "Correlation threshold must be within [0, 1], got {}",
                self.correlation_threshold
            )));
        }
        self.anomaly.validate()?;
        self.forecast.validate()?;
        self.scoring.validate()?;
        if self.segmentation.max_iterations == 0 {
            return Err(EngineError::Config(
                "Segmentation needs at least one iteration".to_string(),
            ));
        }
        if self.training.cv_folds == 0 {
            return Err(EngineError::Config(
                "Cross-validation needs at least one fold".to_string(),
            ));
        }
        if self.training.baseline_min_samples == 0 {
            return Err(EngineError::Config(
                "The last-value baseline needs at least one sample".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fixed categorical vocabularies. Codes start at 1; 0 is reserved for unknown values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    pub sectors: Vec<String>,
    pub competition_levels: Vec<String>,
    pub categories: Vec<String>,
    /// Relationship score assumed for a sector when the opportunity has none
    pub sector_relationship: BTreeMap<String, f64>,
    /// Relationship score for sectors missing from `sector_relationship`
    pub default_relationship: f64,
}

impl Default for Vocabulary {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let sector_relationship = [
            ("Oil & Gas", 9.0),
            ("Government", 8.0),
            ("Banking", 7.0),
            ("Telecommunications", 7.0),
            ("Manufacturing", 6.0),
            ("Healthcare", 6.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            sectors: strings(&[
                "Oil & Gas",
                "Government",
                "Banking",
                "Telecommunications",
                "Manufacturing",
                "Healthcare",
            ]),
            competition_levels: strings(&["Low", "Medium", "High"]),
            categories: strings(&[
                "AI/Analytics",
                "Cloud",
                "Security",
                "Infrastructure",
                "Networking",
            ]),
            sector_relationship,
            default_relationship: 5.0,
        }
    }
}

impl Vocabulary {
    /// Reserved code for values outside a vocabulary
    pub const UNKNOWN: f64 = 0.0;

    fn code(list: &[String], value: &str) -> f64 {
        list.iter()
            .position(|v| v.eq_ignore_ascii_case(value.trim()))
            .map(|i| (i + 1) as f64)
            .unwrap_or(Self::UNKNOWN)
    }

    pub fn sector_code(&self, sector: &str) -> f64 {
        Self::code(&self.sectors, sector)
    }

    pub fn competition_code(&self, level: &str) -> f64 {
        Self::code(&self.competition_levels, level)
    }

    pub fn category_code(&self, category: &str) -> f64 {
        Self::code(&self.categories, category)
    }

    /// Default relationship score for a sector
    pub fn relationship_for(&self, sector: &str) -> f64 {
        self.sector_relationship
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(sector.trim()))
            .map(|(_, v)| *v)
            .unwrap_or(self.default_relationship)
    }
}

/// Anomaly detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Detectors to run, in order
    pub detectors: Vec<DetectorKind>,
    /// Absolute z-score above which a point is flagged
    pub z_threshold: f64,
    /// Length of one seasonal cycle
    pub seasonal_period: usize,
    /// Below this many observations the seasonal detector is skipped
    pub seasonal_min_observations: usize,
    /// Seasonal deviation threshold, in standard deviations of the series
    pub seasonal_deviation: f64,
    /// Expected share of outliers for the isolation detector
    pub contamination: f64,
    /// Number of isolation trees
    pub trees: usize,
    /// Subsample size per isolation tree
    pub sample_size: usize,
    /// RNG seed for the isolation detector
    pub seed: u64,
    /// Below this many observations detection is refused
    pub min_observations: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            detectors: vec![
                DetectorKind::Isolation,
                DetectorKind::Statistical,
                DetectorKind::Seasonal,
            ],
            z_threshold: 2.0,
            seasonal_period: 12,
            seasonal_min_observations: 24,
            seasonal_deviation: 2.0,
            contamination: 0.1,
            trees: 100,
            sample_size: 256,
            seed: 42,
            min_observations: 10,
        }
    }
}

impl AnomalyConfig {
    fn validate(&self) -> Result<()> {
        if self.z_threshold <= 0.0 || self.seasonal_deviation <= 0.0 {
            return Err(EngineError::Config(
                "Anomaly thresholds must be positive".to_string(),
            ));
        }
        if self.contamination <= 0.0 || self.contamination > 0.5 {
            return Err(EngineError::Config(format!(
                "Contamination must be within (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.seasonal_period < 2 || self.trees == 0 || self.sample_size < 2 {
            return Err(EngineError::Config(
                "Seasonal period, tree count and sample size are too small".to_string(),
            ));
        }
        Ok(())
    }
}

/// Forecasting settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Algorithms trained for a forecasting task unless the task names its own
    pub algorithms: Vec<AlgorithmKind>,
    /// Share of samples held out for validation
    pub validation_split: f64,
    /// Two-sided confidence level of the prediction band
    pub confidence_level: f64,
    /// Clamp lower bounds at zero for non-negative metrics
    pub non_negative: bool,
    /// Below this many observations no seasonal strength is estimated
    pub seasonal_min_observations: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            algorithms: vec![
                AlgorithmKind::LinearTrend,
                AlgorithmKind::ExponentialSmoothing { alpha: 0.3 },
                AlgorithmKind::Ridge { lambda: 1.0 },
                AlgorithmKind::GradientBoosting {
                    n_estimators: 100,
                    learning_rate: 0.1,
                },
            ],
            validation_split: 0.2,
            confidence_level: 0.95,
            non_negative: true,
            seasonal_min_observations: 12,
        }
    }
}

impl ForecastConfig {
    /// Standard-normal quantile for the configured confidence level (1.96 at 95%)
    pub fn z_score(&self) -> Result<f64> {
        let normal = Normal::new(0.0, 1.0).map_err(|e| EngineError::Config(e.to_string()))?;
        Ok(normal.inverse_cdf(0.5 + self.confidence_level / 2.0))
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..0.5).contains(&self.validation_split) {
            return Err(EngineError::Config(format!(
                "Validation split must be within [0, 0.5), got {}",
                self.validation_split
            )));
        }
        if self.confidence_level <= 0.0 || self.confidence_level >= 1.0 {
            return Err(EngineError::Config(
                "Confidence level must be between 0 and 1".to_string(),
            ));
        }
        if self.algorithms.is_empty() {
            return Err(EngineError::Config(
                "At least one forecasting algorithm is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Opportunity scoring settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Registry task id for the win-probability model
    pub task_id: String,
    /// Algorithm fitted by `ScoringEngine::train`
    pub algorithm: AlgorithmKind,
    /// Share of samples held out for validation
    pub validation_split: f64,
    /// Lowest probability ever reported
    pub min_probability: f64,
    /// Highest probability ever reported
    pub max_probability: f64,
    /// Probabilities below this are "low"
    pub low_band: f64,
    /// Probabilities at or above this are "high"
    pub high_band: f64,
    /// Deal value above which partnership advice is added
    pub large_deal_value: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            task_id: "win_probability".to_string(),
            algorithm: AlgorithmKind::GradientBoosting {
                n_estimators: 120,
                learning_rate: 0.08,
            },
            validation_split: 0.2,
            min_probability: 0.05,
            max_probability: 0.95,
            low_band: 0.3,
            high_band: 0.6,
            large_deal_value: 20_000_000.0,
        }
    }
}

impl ScoringConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0 <= self.min_probability
            && self.min_probability < self.max_probability
            && self.max_probability <= 1.0)
        {
            return Err(EngineError::Config(
                "Probability clamp must satisfy 0 <= min < max <= 1".to_string(),
            ));
        }
        if self.low_band >= self.high_band {
            return Err(EngineError::Config(
                "Low probability band must be below the high band".to_string(),
            ));
        }
        if !(0.0..0.5).contains(&self.validation_split) {
            return Err(EngineError::Config(format!(
                "Validation split must be within [0, 0.5), got {}",
                self.validation_split
            )));
        }
        Ok(())
    }
}

/// Centroid clustering settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub max_iterations: usize,
    /// Stop once no centre moves further than this (standardized units)
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 300,
            tolerance: 1e-6,
            seed: 42,
        }
    }
}

/// Model training settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Seed for random validation splits
    pub seed: u64,
    /// Rolling-origin folds used to estimate forecast residual spread
    pub cv_folds: usize,
    /// Minimum samples for the last-value baseline, whatever the task kind
    pub baseline_min_samples: usize,
    /// Minimum samples for a forecasting fit
    pub forecasting_min_samples: usize,
    /// Minimum samples for a scoring fit
    pub scoring_min_samples: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            cv_folds: 5,
            baseline_min_samples: 1,
            forecasting_min_samples: 10,
            scoring_min_samples: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_relative_eq!(config.seasonal_factor(5), 0.8);
        assert_relative_eq!(config.seasonal_factor(13), 1.0);
        assert_relative_eq!(config.forecast.z_score().unwrap(), 1.959964, epsilon = 1e-5);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "correlation_threshold": 0.75, "anomaly": { "z_threshold": 3.0 } }"#,
        )
        .unwrap();
        assert_relative_eq!(config.correlation_threshold, 0.75);
        assert_relative_eq!(config.anomaly.z_threshold, 3.0);
        assert_eq!(config.anomaly.seasonal_min_observations, 24);
        assert_eq!(config.seasonal_factors, DEFAULT_SEASONAL_FACTORS);
    }

    #[test]
    fn test_invalid_json_values_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "correlation_threshold": 1.5 }"#).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));

        let err = EngineConfig::from_json_str(r#"{ "scoring": { "low_band": 0.7 } }"#).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_vocabulary_unknown_code() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.sector_code("Government"), 2.0);
        assert_eq!(vocab.sector_code("government "), 2.0);
        assert_eq!(vocab.sector_code("Aerospace"), Vocabulary::UNKNOWN);
        assert_eq!(vocab.relationship_for("Oil & Gas"), 9.0);
        assert_eq!(vocab.relationship_for("Aerospace"), 5.0);
    }
}

//! Feature engineering
//!
//! Turns raw observation sequences and opportunity records into model-ready
//! feature vectors. Vectors are always derived from source data and tagged
//! with the schema that produced them, so a model can refuse input built
//! under a different layout.
//!
//! Time-series rows need trailing history for their rolling means and lags;
//! the first `max(window) - 1` observations produce no row and are dropped.

use crate::config::EngineConfig;
use crate::data::{Opportunity, TimeSeriesObservation};
use crate::error::{EngineError, Result};
use chrono::{DateTime, Datelike, Utc};
use foresight_math::rolling::{growth_rate, lag, rolling_mean};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rolling-mean windows, in periods
pub const ROLLING_WINDOWS: [usize; 2] = [3, 6];

/// Observations that yield no feature row (`max(window) - 1`)
pub const DROPPED_LEADING_ROWS: usize = 5;

const TIME_SERIES_FEATURES: [&str; 10] = [
    "month",
    "quarter",
    "day_of_year",
    "seasonal_factor",
    "value",
    "rolling_mean_3",
    "rolling_mean_6",
    "lag_1",
    "lag_2",
    "growth_rate",
];

const OPPORTUNITY_FEATURES: [&str; 8] = [
    "log_value",
    "relationship_score",
    "technical_complexity",
    "sector_code",
    "competition_code",
    "category_code",
    "value_tier",
    "timeline_pressure",
];

/// Named, versioned column layout of a feature vector
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub name: String,
    pub version: u32,
    pub features: Vec<String>,
}

impl FeatureSchema {
    fn from_names(name: &str, version: u32, features: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            version,
            features: features.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Calendar, seasonal, rolling, lag and growth columns for one metric
    pub fn time_series() -> Self {
        Self::from_names("time_series", 1, &TIME_SERIES_FEATURES)
    }

    /// Encoded opportunity attributes
    pub fn opportunity() -> Self {
        Self::from_names("opportunity", 1, &OPPORTUNITY_FEATURES)
    }

    /// Single column holding the position in a series; used by series models
    pub fn series_index() -> Self {
        Self::from_names("series_index", 1, &["position"])
    }

    /// `name@vN`, the tag carried by every vector built under this schema
    pub fn id(&self) -> String {
        format!("{}@v{}", self.name, self.version)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Column index of a feature name
    pub fn index_of(&self, feature: &str) -> Option<usize> {
        self.features.iter().position(|f| f == feature)
    }
}

/// What a feature vector describes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureKey {
    Observation {
        metric_name: String,
        timestamp: DateTime<Utc>,
    },
    Opportunity {
        opportunity_id: String,
    },
    Position(usize),
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureKey::Observation {
                metric_name,
                timestamp,
            } => write!(f, "{}@{}", metric_name, timestamp.format("%Y-%m-%d")),
            FeatureKey::Opportunity { opportunity_id } => write!(f, "opportunity {}", opportunity_id),
            FeatureKey::Position(p) => write!(f, "position {}", p),
        }
    }
}

/// Derived model input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub key: FeatureKey,
    /// Id of the schema that built this vector
    pub schema: String,
    pub values: Vec<f64>,
}

impl FeatureVector {
    /// Vector holding only a series position
    pub fn position(position: usize) -> Self {
        Self {
            key: FeatureKey::Position(position),
            schema: FeatureSchema::series_index().id(),
            values: vec![position as f64],
        }
    }

    /// Look up a column by name under the given schema
    pub fn get(&self, schema: &FeatureSchema, feature: &str) -> Option<f64> {
        schema.index_of(feature).and_then(|i| self.values.get(i).copied())
    }
}

/// Contract-value bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueTier {
    Small,
    Medium,
    Large,
    Mega,
}

impl ValueTier {
    pub fn from_value(value: f64) -> Self {
        match value {
            v if v <= 5_000_000.0 => ValueTier::Small,
            v if v <= 15_000_000.0 => ValueTier::Medium,
            v if v <= 50_000_000.0 => ValueTier::Large,
            _ => ValueTier::Mega,
        }
    }

    pub fn code(&self) -> f64 {
        match self {
            ValueTier::Small => 1.0,
            ValueTier::Medium => 2.0,
            ValueTier::Large => 3.0,
            ValueTier::Mega => 4.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ValueTier::Small => "Small",
            ValueTier::Medium => "Medium",
            ValueTier::Large => "Large",
            ValueTier::Mega => "Mega",
        }
    }
}

/// Deadline urgency code: 3 = under 30 days, 2 = under 60, 1 = later, 0 = unknown
fn timeline_pressure(days_to_deadline: Option<u32>) -> f64 {
    match days_to_deadline {
        Some(d) if d < 30 => 3.0,
        Some(d) if d < 60 => 2.0,
        Some(_) => 1.0,
        None => 0.0,
    }
}

/// Builds feature vectors using the configured seasonal table and vocabularies
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    config: EngineConfig,
}

impl FeatureBuilder {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Feature rows for an ordered observation sequence of one metric.
    ///
    /// Fewer than two observations is `InsufficientData`. The first
    /// [`DROPPED_LEADING_ROWS`] observations lack rolling/lag inputs and
    /// produce no row, so `n` observations yield `n - 5` vectors (none when
    /// `n <= 5`).
    pub fn build_time_series_features(
        &self,
        observations: &[TimeSeriesObservation],
    ) -> Result<Vec<FeatureVector>> {
        if observations.len() < 2 {
            return Err(EngineError::InsufficientData {
                required: 2,
                actual: observations.len(),
            });
        }

        let metric_name = &observations[0].metric_name;
        if observations.iter().any(|o| &o.metric_name != metric_name) {
            return Err(EngineError::InvalidParameter(
                "Feature rows must be built from a single metric".to_string(),
            ));
        }
        if observations
            .windows(2)
            .any(|w| w[1].timestamp < w[0].timestamp)
        {
            return Err(EngineError::InvalidParameter(format!(
                "Observations for {} are not ordered by timestamp",
                metric_name
            )));
        }

        let timestamps: Vec<DateTime<Utc>> = observations.iter().map(|o| o.timestamp).collect();
        let values: Vec<f64> = observations.iter().map(|o| o.value).collect();

        Ok(self
            .time_series_rows(&timestamps, &values)?
            .into_iter()
            .map(|(idx, row)| FeatureVector {
                key: FeatureKey::Observation {
                    metric_name: metric_name.clone(),
                    timestamp: timestamps[idx],
                },
                schema: FeatureSchema::time_series().id(),
                values: row,
            })
            .collect())
    }

    /// `(index, row)` pairs for every position with complete history.
    ///
    /// Shared by training (over observed history) and recursive forecasting
    /// (over history extended with predictions).
    pub(crate) fn time_series_rows(
        &self,
        timestamps: &[DateTime<Utc>],
        values: &[f64],
    ) -> Result<Vec<(usize, Vec<f64>)>> {
        if timestamps.len() != values.len() {
            return Err(EngineError::InvalidParameter(format!(
                "{} timestamps but {} values",
                timestamps.len(),
                values.len()
            )));
        }

        let ma_short = rolling_mean(values, ROLLING_WINDOWS[0])?;
        let ma_long = rolling_mean(values, ROLLING_WINDOWS[1])?;
        let lag_1 = lag(values, 1);
        let lag_2 = lag(values, 2);
        let growth = growth_rate(values);

        let mut rows = Vec::with_capacity(values.len().saturating_sub(DROPPED_LEADING_ROWS));
        for (idx, ts) in timestamps.iter().enumerate() {
            let (Some(ma3), Some(ma6), Some(l1), Some(l2), Some(g)) =
                (ma_short[idx], ma_long[idx], lag_1[idx], lag_2[idx], growth[idx])
            else {
                continue;
            };
            let month = ts.month();
            rows.push((
                idx,
                vec![
                    month as f64,
                    ((month - 1) / 3 + 1) as f64,
                    ts.ordinal() as f64,
                    self.config.seasonal_factor(month),
                    values[idx],
                    ma3,
                    ma6,
                    l1,
                    l2,
                    g,
                ],
            ));
        }
        Ok(rows)
    }

    /// Deterministic encoding of one opportunity.
    ///
    /// Categories outside the configured vocabularies map to the reserved
    /// unknown code instead of failing.
    pub fn build_opportunity_features(&self, opportunity: &Opportunity) -> FeatureVector {
        let vocab = &self.config.vocabulary;
        let value = if opportunity.value.is_finite() {
            opportunity.value.max(0.0)
        } else {
            0.0
        };
        let relationship = opportunity
            .relationship_score
            .filter(|r| r.is_finite())
            .unwrap_or_else(|| vocab.relationship_for(&opportunity.sector));

        FeatureVector {
            key: FeatureKey::Opportunity {
                opportunity_id: opportunity.id.clone(),
            },
            schema: FeatureSchema::opportunity().id(),
            values: vec![
                value.ln_1p(),
                relationship,
                opportunity.technical_complexity,
                vocab.sector_code(&opportunity.sector),
                vocab.competition_code(&opportunity.competitive_level),
                vocab.category_code(&opportunity.category),
                ValueTier::from_value(value).code(),
                timeline_pressure(opportunity.days_to_deadline),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;
    use rstest::rstest;

    fn monthly(values: &[f64]) -> Vec<TimeSeriesObservation> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let year = 2023 + (i / 12) as i32;
                let month = (i % 12) as u32 + 1;
                TimeSeriesObservation::new(
                    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap(),
                    "Revenue",
                    v,
                    "test",
                )
            })
            .collect()
    }

    fn builder() -> FeatureBuilder {
        FeatureBuilder::new(&EngineConfig::default())
    }

    #[rstest]
    #[case(6, 1)]
    #[case(12, 7)]
    #[case(24, 19)]
    fn test_leading_rows_dropped(#[case] n: usize, #[case] expected: usize) {
        let values: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        let rows = builder().build_time_series_features(&monthly(&values)).unwrap();
        assert_eq!(rows.len(), expected);
        assert_eq!(n - rows.len(), DROPPED_LEADING_ROWS);
    }

    #[test]
    fn test_short_series_yields_no_rows() {
        let rows = builder()
            .build_time_series_features(&monthly(&[1.0, 2.0, 3.0]))
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_insufficient_data() {
        let err = builder()
            .build_time_series_features(&monthly(&[1.0]))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientData {
                required: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_row_contents() {
        let values = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0];
        let rows = builder().build_time_series_features(&monthly(&values)).unwrap();
        let schema = FeatureSchema::time_series();
        let row = &rows[0];

        assert_eq!(row.schema, "time_series@v1");
        assert_relative_eq!(row.get(&schema, "month").unwrap(), 6.0);
        assert_relative_eq!(row.get(&schema, "quarter").unwrap(), 2.0);
        assert_relative_eq!(row.get(&schema, "day_of_year").unwrap(), 152.0);
        assert_relative_eq!(row.get(&schema, "seasonal_factor").unwrap(), 1.05);
        assert_relative_eq!(row.get(&schema, "rolling_mean_3").unwrap(), 50.0);
        assert_relative_eq!(row.get(&schema, "rolling_mean_6").unwrap(), 35.0);
        assert_relative_eq!(row.get(&schema, "lag_1").unwrap(), 50.0);
        assert_relative_eq!(row.get(&schema, "lag_2").unwrap(), 40.0);
        assert_relative_eq!(row.get(&schema, "growth_rate").unwrap(), 0.2);
    }

    #[test]
    fn test_opportunity_features_unknown_categories() {
        let opp = Opportunity {
            id: "RFQ-1".to_string(),
            value: 3_000_000.0,
            sector: "Aerospace".to_string(),
            category: "Quantum".to_string(),
            technical_complexity: 5.0,
            competitive_level: "Extreme".to_string(),
            relationship_score: None,
            days_to_deadline: Some(45),
        };
        let fv = builder().build_opportunity_features(&opp);
        let schema = FeatureSchema::opportunity();

        assert_eq!(fv.values.len(), schema.len());
        assert_eq!(fv.get(&schema, "sector_code"), Some(0.0));
        assert_eq!(fv.get(&schema, "competition_code"), Some(0.0));
        assert_eq!(fv.get(&schema, "category_code"), Some(0.0));
        assert_eq!(fv.get(&schema, "relationship_score"), Some(5.0));
        assert_eq!(fv.get(&schema, "value_tier"), Some(1.0));
        assert_eq!(fv.get(&schema, "timeline_pressure"), Some(2.0));

        // Deterministic
        assert_eq!(fv, builder().build_opportunity_features(&opp));
    }

    #[test]
    fn test_value_tiers() {
        assert_eq!(ValueTier::from_value(0.0), ValueTier::Small);
        assert_eq!(ValueTier::from_value(10_000_000.0), ValueTier::Medium);
        assert_eq!(ValueTier::from_value(20_000_000.0), ValueTier::Large);
        assert_eq!(ValueTier::from_value(1e12), ValueTier::Mega);
    }
}

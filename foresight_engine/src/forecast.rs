//! Forecasting engine
//!
//! Produces multi-period forecasts for a registered task from the task's
//! metric history. Each active model of the task walks forward on its own,
//! feeding its predictions back in as history; per period, the members that
//! produced a finite value are averaged.
//!
//! Models are trained on seasonally adjusted values and every forecast
//! period is scaled back by the business-calendar multiplier of its month.
//! How strongly the table applies is measured from the history itself (see
//! [`ForecastEngine::seasonal_strength`]), so a flat series stays flat.
//!
//! Confidence bands are `point ± z·σ·√h`, with σ the cross-validated
//! residual deviation of the contributing members. There is no decay term:
//! long horizons simply get wide bands.

use crate::config::{EngineConfig, ForecastConfig};
use crate::data::{ObservationStore, TimeSeriesObservation};
use crate::error::{EngineError, Result};
use crate::features::{FeatureBuilder, FeatureSchema};
use crate::models::{AlgorithmKind, ModelRef, TrainedModel, TrainingSet};
use crate::registry::{ModelRegistry, TaskKind, TaskLock, TaskSpec};
use crate::utils::{future_months, period_label};
use chrono::{DateTime, Datelike, Utc};
use foresight_math::regression::LinearTrend;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One forecast period, as serialized for consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub period_label: String,
    pub point_estimate: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Totals over the forecast horizon
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub total: f64,
    pub average: f64,
    pub first: f64,
    pub last: f64,
}

/// Immutable forecast snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub task_id: String,
    pub metric_name: String,
    pub generated_at: DateTime<Utc>,
    pub horizon_periods: usize,
    pub period_labels: Vec<String>,
    pub predictions: Vec<f64>,
    pub confidence_lower: Vec<f64>,
    pub confidence_upper: Vec<f64>,
    /// Active models that were asked for a path, in registration order
    pub model_versions: Vec<ModelRef>,
    /// Set when a member was unavailable, dropped, or the naive fallback ran
    pub degraded: bool,
}

impl ForecastResult {
    pub fn points(&self) -> Vec<ForecastPoint> {
        (0..self.horizon_periods)
            .map(|i| ForecastPoint {
                period_label: self.period_labels[i].clone(),
                point_estimate: self.predictions[i],
                lower: self.confidence_lower[i],
                upper: self.confidence_upper[i],
            })
            .collect()
    }

    /// `[{period_label, point_estimate, lower, upper}, ...]`
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.points())?)
    }

    pub fn summary(&self) -> ForecastSummary {
        let total: f64 = self.predictions.iter().sum();
        ForecastSummary {
            total,
            average: total / self.horizon_periods.max(1) as f64,
            first: self.predictions.first().copied().unwrap_or(0.0),
            last: self.predictions.last().copied().unwrap_or(0.0),
        }
    }

    /// Primary model of the ensemble; `None` for a pure naive fallback
    pub fn model_version(&self) -> Option<&ModelRef> {
        self.model_versions.first()
    }
}

/// Multiplier `1 + β(s - 1)` for a month
fn effective_multiplier(factor: f64, strength: f64) -> f64 {
    1.0 + strength * (factor - 1.0)
}

/// Forecasting front end over the registry
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    config: ForecastConfig,
    seasonal_factors: [f64; 12],
    features: FeatureBuilder,
}

impl ForecastEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.forecast.clone(),
            seasonal_factors: config.seasonal_factors,
            features: FeatureBuilder::new(config),
        }
    }

    fn seasonal_factor(&self, timestamp: &DateTime<Utc>) -> f64 {
        self.seasonal_factors[timestamp.month0() as usize]
    }

    /// Register a forecasting task for a metric with the configured algorithms
    pub fn register(&self, registry: &ModelRegistry, task_id: &str, metric_name: &str) -> Result<()> {
        registry.register_task(TaskSpec::forecasting(
            task_id,
            metric_name,
            self.config.algorithms.clone(),
        ))
    }

    /// How much of the seasonal table a history actually shows, in `[0, 1]`.
    ///
    /// Least-squares slope of the detrended ratio `y / trend - 1` on the
    /// table's `s - 1`. Histories shorter than the configured minimum get 0.
    pub fn seasonal_strength(&self, timestamps: &[DateTime<Utc>], values: &[f64]) -> f64 {
        if values.len() < self.config.seasonal_min_observations.max(2) {
            return 0.0;
        }
        let Ok(trend) = LinearTrend::fit(values) else {
            return 0.0;
        };

        let mut sxy = 0.0;
        let mut sxx = 0.0;
        for (i, (ts, &y)) in timestamps.iter().zip(values).enumerate() {
            let expected = trend.value_at(i as f64);
            if expected.abs() <= f64::EPSILON * y.abs().max(1.0) {
                continue;
            }
            let x = self.seasonal_factor(ts) - 1.0;
            sxy += x * (y / expected - 1.0);
            sxx += x * x;
        }
        if sxx <= 0.0 || !sxy.is_finite() {
            return 0.0;
        }
        (sxy / sxx).clamp(0.0, 1.0)
    }

    /// Training sets for every algorithm of a task, from one metric history
    pub fn training_sets(
        &self,
        spec: &TaskSpec,
        observations: &[TimeSeriesObservation],
    ) -> Result<Vec<(AlgorithmKind, TrainingSet)>> {
        let timestamps: Vec<DateTime<Utc>> = observations.iter().map(|o| o.timestamp).collect();
        let values: Vec<f64> = observations.iter().map(|o| o.value).collect();

        let strength = self.seasonal_strength(&timestamps, &values);
        let adjusted: Vec<f64> = timestamps
            .iter()
            .zip(&values)
            .map(|(ts, v)| v / effective_multiplier(self.seasonal_factor(ts), strength))
            .collect();
        debug!(
            "{}: seasonal strength {:.3} over {} observations",
            spec.task_id,
            strength,
            values.len()
        );

        // Feature rows predict the next adjusted value
        let feature_set = {
            let rows = self.features.time_series_rows(&timestamps, &values)?;
            let (rows, targets): (Vec<Vec<f64>>, Vec<f64>) = rows
                .into_iter()
                .filter(|(idx, _)| idx + 1 < adjusted.len())
                .map(|(idx, row)| (row, adjusted[idx + 1]))
                .unzip();
            TrainingSet::new(FeatureSchema::time_series(), rows, targets)?
                .with_seasonal_strength(strength)
        };
        let series_set = TrainingSet::series(&adjusted)?.with_seasonal_strength(strength);

        Ok(spec
            .algorithms
            .iter()
            .map(|kind| {
                let set = if kind.is_series_model() {
                    series_set.clone()
                } else {
                    feature_set.clone()
                };
                (kind.clone(), set)
            })
            .collect())
    }

    fn forecasting_spec(&self, registry: &ModelRegistry, task_id: &str) -> Result<(TaskSpec, String)> {
        let spec = registry
            .task(task_id)
            .ok_or_else(|| EngineError::UnknownTask(task_id.to_string()))?;
        if spec.kind != TaskKind::Forecasting {
            return Err(EngineError::InvalidParameter(format!(
                "Task {} is a {} task",
                task_id, spec.kind
            )));
        }
        let metric = spec.metric_name.clone().ok_or_else(|| {
            EngineError::InvalidParameter(format!("Task {} has no metric", task_id))
        })?;
        Ok((spec, metric))
    }

    /// Train every algorithm of a task while holding its lock
    pub fn train_locked(
        &self,
        registry: &ModelRegistry,
        lock: &TaskLock,
        store: &ObservationStore,
    ) -> Result<Vec<(AlgorithmKind, Result<Arc<TrainedModel>>)>> {
        let (spec, metric) = self.forecasting_spec(registry, lock.task_id())?;
        let observations = store.series(&metric);
        if observations.is_empty() {
            return Err(EngineError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }
        let jobs = self.training_sets(&spec, observations)?;
        registry.train_all(lock, &jobs, self.config.validation_split, None)
    }

    /// Retrain every algorithm of a task on the current history
    pub fn train(
        &self,
        registry: &ModelRegistry,
        store: &ObservationStore,
        task_id: &str,
    ) -> Result<Vec<(AlgorithmKind, Result<Arc<TrainedModel>>)>> {
        registry.with_task_lock(task_id, |lock| self.train_locked(registry, lock, store))
    }

    /// Forecast `horizon_periods` months past the last observation.
    ///
    /// Trains the task on first use. Needs at least one observation; with
    /// too little history for every model the result is a last-value
    /// baseline flagged `degraded`.
    ///
    /// The band at step `h` (1-based) is `point ± z·σ·m·√h`: `z` is the
    /// normal quantile of the configured confidence level (1.96 at 95%), `σ`
    /// the mean cross-validated residual deviation of the contributing
    /// models and `m` their mean seasonal multiplier for that month. Width
    /// therefore grows with the square root of the horizon and never decays.
    /// The last-value baseline uses the deviation of period-over-period
    /// changes for `σ` and `m = 1`.
    pub fn forecast(
        &self,
        registry: &ModelRegistry,
        store: &ObservationStore,
        task_id: &str,
        horizon_periods: usize,
    ) -> Result<ForecastResult> {
        if horizon_periods == 0 {
            return Err(EngineError::InvalidParameter(
                "Horizon must be at least one period".to_string(),
            ));
        }
        let (spec, metric) = self.forecasting_spec(registry, task_id)?;
        let observations = store.series(&metric);
        let Some(last) = observations.last() else {
            return Err(EngineError::InsufficientData {
                required: 1,
                actual: 0,
            });
        };
        if horizon_periods > 24 {
            debug!(
                "{}: horizon {} beyond two years, bands widen without decay",
                task_id, horizon_periods
            );
        }

        if registry.active_models(task_id).is_empty() {
            registry.with_task_lock(task_id, |lock| {
                // Another caller may have trained while we waited
                if registry.active_models(task_id).is_empty() {
                    info!("Lazy-training {} on {} observations", task_id, observations.len());
                    self.train_locked(registry, lock, store)?;
                }
                Ok(())
            })?;
        }

        let models = registry.active_models(task_id);
        let timestamps: Vec<DateTime<Utc>> = observations.iter().map(|o| o.timestamp).collect();
        let values: Vec<f64> = observations.iter().map(|o| o.value).collect();
        let future = future_months(last.timestamp, horizon_periods)?;
        let z = self.config.z_score()?;

        let paths: Vec<Vec<Option<f64>>> = models
            .iter()
            .map(|m| self.member_path(m, &timestamps, &values, &future))
            .collect();

        let mut degraded = models.len() < spec.algorithms.len();
        let naive_sigma = naive_residual_std(&values);
        let mut predictions = Vec::with_capacity(horizon_periods);
        let mut lower = Vec::with_capacity(horizon_periods);
        let mut upper = Vec::with_capacity(horizon_periods);

        for (p, ts) in future.iter().enumerate() {
            let mut sum = 0.0;
            let mut sigma = 0.0;
            let mut multiplier = 0.0;
            let mut count = 0usize;
            for (model, path) in models.iter().zip(&paths) {
                if let Some(value) = path[p] {
                    sum += value;
                    sigma += model.metrics.residual_std;
                    multiplier +=
                        effective_multiplier(self.seasonal_factor(ts), model.seasonal_strength);
                    count += 1;
                }
            }

            let (point, spread) = if count == 0 {
                degraded = true;
                (last.value, naive_sigma)
            } else {
                if count < models.len() {
                    degraded = true;
                }
                let n = count as f64;
                (sum / n, sigma / n * multiplier / n)
            };

            let mut half = z * spread * ((p + 1) as f64).sqrt();
            if !half.is_finite() || half < 0.0 {
                half = 0.0;
            }
            let mut low = point - half;
            if self.config.non_negative {
                low = low.max(0.0).min(point);
            }
            predictions.push(point);
            lower.push(low);
            upper.push(point + half);
        }

        if degraded {
            warn!(
                "{}: forecast degraded ({} of {} members active)",
                task_id,
                models.len(),
                spec.algorithms.len()
            );
        }

        Ok(ForecastResult {
            task_id: task_id.to_string(),
            metric_name: metric,
            generated_at: Utc::now(),
            horizon_periods,
            period_labels: future.iter().map(period_label).collect(),
            predictions,
            confidence_lower: lower,
            confidence_upper: upper,
            model_versions: models.iter().map(|m| m.model_ref()).collect(),
            degraded,
        })
    }

    /// One member's recursive forecast; `None` from the first failed period on
    fn member_path(
        &self,
        model: &TrainedModel,
        timestamps: &[DateTime<Utc>],
        values: &[f64],
        future: &[DateTime<Utc>],
    ) -> Vec<Option<f64>> {
        let strength = model.seasonal_strength;
        let mut ts = timestamps.to_vec();
        let mut raw = values.to_vec();
        let mut adjusted: Vec<f64> = ts
            .iter()
            .zip(&raw)
            .map(|(t, v)| v / effective_multiplier(self.seasonal_factor(t), strength))
            .collect();

        let mut path = Vec::with_capacity(future.len());
        for target in future {
            let step = if model.algorithm.is_series_model() {
                model.predict_row(&[adjusted.len() as f64], &adjusted)
            } else {
                self.features
                    .time_series_rows(&ts, &raw)
                    .and_then(|rows| {
                        rows.into_iter()
                            .last()
                            .filter(|(idx, _)| *idx + 1 == raw.len())
                            .ok_or(EngineError::InsufficientData {
                                required: crate::features::DROPPED_LEADING_ROWS + 1,
                                actual: raw.len(),
                            })
                    })
                    .and_then(|(_, row)| model.predict_row(&row, &adjusted))
            };

            match step {
                Ok(next) => {
                    let value = next * effective_multiplier(self.seasonal_factor(target), strength);
                    if !value.is_finite() {
                        warn!("{} produced a non-finite forecast, excluded", model.model_ref());
                        break;
                    }
                    path.push(Some(value));
                    ts.push(*target);
                    raw.push(value);
                    adjusted.push(next);
                }
                Err(e) => {
                    warn!("{} failed to forecast, excluded: {}", model.model_ref(), e);
                    break;
                }
            }
        }
        path.resize(future.len(), None);
        path
    }
}

/// Spread of period-over-period changes, the naive baseline's error
fn naive_residual_std(values: &[f64]) -> f64 {
    let diffs: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    crate::metrics::residual_std(&diffs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn monthly(values: &[f64]) -> Vec<TimeSeriesObservation> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let ts = Utc
                    .with_ymd_and_hms(2022 + (i / 12) as i32, (i % 12) as u32 + 1, 1, 0, 0, 0)
                    .unwrap();
                TimeSeriesObservation::new(ts, "Revenue", v, "test")
            })
            .collect()
    }

    fn engine() -> ForecastEngine {
        ForecastEngine::new(&EngineConfig::default())
    }

    #[test]
    fn test_flat_series_has_no_seasonal_strength() {
        let obs = monthly(&[500.0; 24]);
        let ts: Vec<_> = obs.iter().map(|o| o.timestamp).collect();
        assert_eq!(engine().seasonal_strength(&ts, &[500.0; 24]), 0.0);
    }

    #[test]
    fn test_seasonal_history_is_detected() {
        let config = EngineConfig::default();
        let values: Vec<f64> = (0..36)
            .map(|i| 1000.0 * config.seasonal_factors[i % 12])
            .collect();
        let obs = monthly(&values);
        let ts: Vec<_> = obs.iter().map(|o| o.timestamp).collect();
        let strength = engine().seasonal_strength(&ts, &values);
        assert!(strength > 0.9, "strength {}", strength);
    }

    #[test]
    fn test_training_sets_by_family() {
        let registry = ModelRegistry::default();
        let engine = engine();
        engine.register(&registry, "rev", "Revenue").unwrap();
        let spec = registry.task("rev").unwrap();

        let values: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let jobs = engine.training_sets(&spec, &monthly(&values)).unwrap();
        for (kind, set) in &jobs {
            if kind.is_series_model() {
                assert_eq!(set.len(), 20);
            } else {
                // 15 feature rows, the last has no next value
                assert_eq!(set.len(), 14);
                assert_eq!(set.schema, FeatureSchema::time_series());
            }
        }
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let registry = ModelRegistry::default();
        let store = ObservationStore::new();
        let err = engine().forecast(&registry, &store, "rev", 0).unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter(_)));
    }
}

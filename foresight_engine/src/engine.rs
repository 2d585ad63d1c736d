//! In-process entry points
//!
//! [`Foresight`] bundles the configured engines. The model registry stays
//! with the host application and is passed by handle into each call.

use crate::anomaly::{AnomalyDetector, AnomalyRecord, AnomalyReport};
use crate::config::EngineConfig;
use crate::correlation::{self, CorrelationMatrix, CorrelationPair, LagCorrelation};
use crate::data::{LabeledOpportunity, ObservationStore, Opportunity};
use crate::error::Result;
use crate::forecast::{ForecastEngine, ForecastResult};
use crate::insights::{Insight, InsightGenerator};
use crate::models::TrainedModel;
use crate::registry::ModelRegistry;
use crate::scoring::{ScoreResult, ScoringEngine};
use crate::segmentation::{Segmentation, Segmenter};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Matrix, strong pairs, lagged leaders and their statements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationReport {
    pub matrix: CorrelationMatrix,
    pub strong_pairs: Vec<CorrelationPair>,
    pub lag_correlations: Vec<LagCorrelation>,
    pub insights: Vec<String>,
}

/// Largest lag examined by [`Foresight::correlate`]
pub const DEFAULT_MAX_LAG: usize = 3;

#[derive(Debug, Clone)]
pub struct Foresight {
    config: EngineConfig,
    forecaster: ForecastEngine,
    scorer: ScoringEngine,
    detector: AnomalyDetector,
    insights: InsightGenerator,
    segmenter: Segmenter,
}

impl Foresight {
    /// Build every engine from a validated configuration
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            forecaster: ForecastEngine::new(&config),
            scorer: ScoringEngine::new(&config),
            detector: AnomalyDetector::new(&config.anomaly),
            insights: InsightGenerator::new(&config),
            segmenter: Segmenter::new(&config.segmentation),
            config,
        })
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(EngineConfig::from_json_file(path)?)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A registry sharing this configuration's training settings
    pub fn new_registry(&self) -> ModelRegistry {
        ModelRegistry::new(self.config.training.clone())
    }

    /// Register a forecasting task over `metric_name`
    pub fn register_forecast(&self, registry: &ModelRegistry, task_id: &str, metric_name: &str) -> Result<()> {
        self.forecaster.register(registry, task_id, metric_name)
    }

    /// Retrain a forecasting task; one entry per configured algorithm
    pub fn train_forecast(
        &self,
        registry: &ModelRegistry,
        store: &ObservationStore,
        task_id: &str,
    ) -> Result<Vec<Result<Arc<TrainedModel>>>> {
        let outcomes = self.forecaster.train(registry, store, task_id)?;
        Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
    }

    pub fn forecast(
        &self,
        registry: &ModelRegistry,
        store: &ObservationStore,
        task_id: &str,
        horizon_periods: usize,
    ) -> Result<ForecastResult> {
        self.forecaster.forecast(registry, store, task_id, horizon_periods)
    }

    pub fn train_scoring(&self, registry: &ModelRegistry, history: &[LabeledOpportunity]) -> Result<Arc<TrainedModel>> {
        self.scorer.train(registry, history)
    }

    pub fn score_opportunity(&self, registry: &ModelRegistry, opportunity: &Opportunity) -> Result<ScoreResult> {
        self.scorer.score_opportunity(registry, opportunity)
    }

    /// Score, falling back to the neutral 0.5 result on recoverable errors
    pub fn score_or_neutral(&self, registry: &ModelRegistry, opportunity: &Opportunity) -> Result<ScoreResult> {
        match self.scorer.score_opportunity(registry, opportunity) {
            Err(e) if e.is_recoverable() => {
                warn!("Neutral score for {}: {}", opportunity.id, e);
                Ok(ScoreResult::neutral(opportunity, &self.config.vocabulary))
            }
            other => other,
        }
    }

    /// Full detection report for one metric's history
    pub fn anomaly_report(&self, store: &ObservationStore, metric_name: &str) -> Result<AnomalyReport> {
        self.detector.detect(metric_name, &store.values(metric_name))
    }

    pub fn detect_anomalies(&self, store: &ObservationStore, metric_name: &str) -> Result<Vec<AnomalyRecord>> {
        Ok(self.anomaly_report(store, metric_name)?.records)
    }

    /// Trend, volatility, benchmark and anomaly insights.
    ///
    /// Anomaly detection is left out when the history is too short for it.
    pub fn summarize(&self, store: &ObservationStore, metric_name: &str) -> Vec<Insight> {
        let values = store.values(metric_name);
        let report = match self.detector.detect(metric_name, &values) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("No anomaly summary for {}: {}", metric_name, e);
                None
            }
        };
        self.insights.summarize(metric_name, &values, report.as_ref())
    }

    /// [`Foresight::summarize`] plus an outlook from a forecast of the task
    pub fn summarize_with_outlook(
        &self,
        registry: &ModelRegistry,
        store: &ObservationStore,
        task_id: &str,
        horizon_periods: usize,
    ) -> Result<Vec<Insight>> {
        let forecast = self.forecast(registry, store, task_id, horizon_periods)?;
        let mut insights = self.summarize(store, &forecast.metric_name);
        let last_actual = store.values(&forecast.metric_name).last().copied();
        if let Some(outlook) = last_actual.and_then(|v| self.insights.forecast_outlook(v, &forecast)) {
            insights.push(outlook);
        }
        Ok(insights)
    }

    /// Correlation matrix with strong pairs above the configured threshold
    pub fn correlate(&self, table: &DataFrame) -> Result<CorrelationReport> {
        let matrix = correlation::correlate(table)?;
        let threshold = self.config.correlation_threshold;
        let strong_pairs = matrix.strong_pairs(threshold);
        let lag_correlations = correlation::lag_correlations(table, DEFAULT_MAX_LAG)?;
        let insights = correlation::correlation_insights(&strong_pairs, &lag_correlations, threshold);
        Ok(CorrelationReport {
            matrix,
            strong_pairs,
            lag_correlations,
            insights,
        })
    }

    pub fn segment(&self, table: &DataFrame, feature_names: &[&str], k: usize) -> Result<Segmentation> {
        self.segmenter.segment(table, feature_names, k)
    }
}

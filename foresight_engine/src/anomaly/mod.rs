//! Anomaly detection
//!
//! Up to three independent detectors run over one metric's values:
//! - isolation: density-based outliers from an isolation forest
//! - statistical: `|z| > threshold` against the series mean
//! - seasonal: distance from the mean of same-phase observations
//!
//! Their flagged indexes are fused into one record per index whose severity
//! is the number of detectors that flagged it. Records are rebuilt on every
//! run.

use crate::config::AnomalyConfig;
use crate::error::{EngineError, Result};
use foresight_math::stats::{mean, population_std, quantile, z_scores};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

pub mod isolation;

pub use isolation::{IsolationForest, TrainedIsolationForest};

/// Detector identity, as listed on fused records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Isolation,
    Statistical,
    Seasonal,
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorKind::Isolation => write!(f, "isolation_forest"),
            DetectorKind::Statistical => write!(f, "statistical"),
            DetectorKind::Seasonal => write!(f, "seasonal"),
        }
    }
}

/// One anomalous observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub metric_name: String,
    pub index: usize,
    pub value: f64,
    pub detector_sources: Vec<DetectorKind>,
    /// Number of detectors that flagged this index
    pub severity: usize,
}

/// Overall classification of a detection run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyLevel {
    None,
    Low,
    Medium,
    High,
}

impl fmt::Display for AnomalyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnomalyLevel::None => "none",
            AnomalyLevel::Low => "low",
            AnomalyLevel::Medium => "medium",
            AnomalyLevel::High => "high",
        };
        f.write_str(s)
    }
}

/// Fused detection output for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub metric_name: String,
    /// Ranked by severity, then by index
    pub records: Vec<AnomalyRecord>,
    pub level: AnomalyLevel,
    pub high_severity_count: usize,
    pub explanations: Vec<String>,
    pub recommendations: Vec<String>,
}

impl AnomalyReport {
    /// Record for an index, if it was flagged
    pub fn record_at(&self, index: usize) -> Option<&AnomalyRecord> {
        self.records.iter().find(|r| r.index == index)
    }
}

/// Detector ensemble configured from [`AnomalyConfig`]
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
}

impl AnomalyDetector {
    pub fn new(config: &AnomalyConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Run the configured detectors over `values` and fuse their output.
    ///
    /// Fewer than the configured minimum observations is `InsufficientData`;
    /// the seasonal detector is skipped on short series.
    pub fn detect(&self, metric_name: &str, values: &[f64]) -> Result<AnomalyReport> {
        if values.len() < self.config.min_observations {
            return Err(EngineError::InsufficientData {
                required: self.config.min_observations,
                actual: values.len(),
            });
        }

        let mut flagged: Vec<(DetectorKind, Vec<usize>)> = Vec::new();
        for &kind in &self.config.detectors {
            let indexes = match kind {
                DetectorKind::Isolation => self.isolation_anomalies(values)?,
                DetectorKind::Statistical => self.statistical_anomalies(values),
                DetectorKind::Seasonal => {
                    if values.len() < self.config.seasonal_min_observations {
                        debug!(
                            "Seasonal detector skipped for {}: {} < {} observations",
                            metric_name,
                            values.len(),
                            self.config.seasonal_min_observations
                        );
                        continue;
                    }
                    self.seasonal_anomalies(values)
                }
            };
            debug!("{} flagged {} points in {}", kind, indexes.len(), metric_name);
            flagged.push((kind, indexes));
        }

        let records = fuse(metric_name, values, &flagged);
        let high_severity_count = records.iter().filter(|r| r.severity >= 2).count();
        let level = classify(&records, values.len());

        info!(
            "Anomaly scan of {}: {} records, level {}",
            metric_name,
            records.len(),
            level
        );

        Ok(AnomalyReport {
            metric_name: metric_name.to_string(),
            explanations: explain(&records, values),
            recommendations: recommend(&records),
            records,
            level,
            high_severity_count,
        })
    }

    /// Points scoring strictly above the `(1 - contamination)` score quantile
    pub fn isolation_anomalies(&self, values: &[f64]) -> Result<Vec<usize>> {
        let forest = IsolationForest::new(
            self.config.trees,
            self.config.sample_size,
            self.config.seed,
        )?
        .fit(values)?;
        let scores = forest.scores(values);
        let cutoff = quantile(&scores, 1.0 - self.config.contamination)?;
        Ok(scores
            .iter()
            .enumerate()
            .filter(|(_, &s)| s > cutoff)
            .map(|(i, _)| i)
            .collect())
    }

    pub fn statistical_anomalies(&self, values: &[f64]) -> Vec<usize> {
        z_scores(values)
            .iter()
            .enumerate()
            .filter(|(_, z)| z.abs() > self.config.z_threshold)
            .map(|(i, _)| i)
            .collect()
    }

    /// Points further than `seasonal_deviation` standard deviations from the
    /// mean of their phase
    pub fn seasonal_anomalies(&self, values: &[f64]) -> Vec<usize> {
        let period = self.config.seasonal_period.max(1);
        let phase_means: Vec<f64> = (0..period)
            .map(|phase| {
                let same_phase: Vec<f64> = values.iter().skip(phase).step_by(period).copied().collect();
                mean(&same_phase).unwrap_or(0.0)
            })
            .collect();
        let limit = self.config.seasonal_deviation * population_std(values).unwrap_or(0.0);

        values
            .iter()
            .enumerate()
            .filter(|(i, v)| (*v - phase_means[i % period]).abs() > limit)
            .map(|(i, _)| i)
            .collect()
    }
}

/// One record per flagged index; severity counts the detectors
fn fuse(metric_name: &str, values: &[f64], flagged: &[(DetectorKind, Vec<usize>)]) -> Vec<AnomalyRecord> {
    let mut by_index: BTreeMap<usize, Vec<DetectorKind>> = BTreeMap::new();
    for (kind, indexes) in flagged {
        for &idx in indexes {
            let sources = by_index.entry(idx).or_default();
            if !sources.contains(kind) {
                sources.push(*kind);
            }
        }
    }

    let mut records: Vec<AnomalyRecord> = by_index
        .into_iter()
        .map(|(index, detector_sources)| AnomalyRecord {
            metric_name: metric_name.to_string(),
            index,
            value: values[index],
            severity: detector_sources.len(),
            detector_sources,
        })
        .collect();
    records.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.index.cmp(&b.index)));
    records
}

fn classify(records: &[AnomalyRecord], series_len: usize) -> AnomalyLevel {
    if records.is_empty() {
        return AnomalyLevel::None;
    }
    let high = records.iter().filter(|r| r.severity >= 2).count();
    if high as f64 > records.len() as f64 * 0.5 {
        AnomalyLevel::High
    } else if records.len() as f64 > series_len as f64 * 0.1 {
        AnomalyLevel::Medium
    } else {
        AnomalyLevel::Low
    }
}

fn explain(records: &[AnomalyRecord], values: &[f64]) -> Vec<String> {
    let avg = mean(values).unwrap_or(0.0);
    records
        .iter()
        .map(|r| {
            let sources: Vec<String> = r.detector_sources.iter().map(|d| d.to_string()).collect();
            let mut text = format!(
                "Anomaly at position {}: value {:.2} detected by {}",
                r.index,
                r.value,
                sources.join(", ")
            );
            if r.value > avg * 1.5 {
                text.push_str(" (unusually high)");
            } else if r.value < avg * 0.5 {
                text.push_str(" (unusually low)");
            }
            text
        })
        .collect()
}

fn recommend(records: &[AnomalyRecord]) -> Vec<String> {
    if records.is_empty() {
        return vec!["No anomalies detected - data appears normal".to_string()];
    }
    let mut out = Vec::new();
    if records.iter().any(|r| r.severity >= 2) {
        out.push("High-severity anomalies detected - investigate root causes immediately".to_string());
    }
    if records.len() > 5 {
        out.push("Multiple anomalies detected - review data collection process".to_string());
    }
    out.push("Monitor these periods closely for recurring patterns".to_string());
    out.push("Consider implementing automated alerts for similar anomalies".to_string());
    out
}

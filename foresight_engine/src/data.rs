//! Observations, opportunities and the in-memory observation store

use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// One historical measurement of a business metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesObservation {
    pub timestamp: DateTime<Utc>,
    pub metric_name: String,
    pub value: f64,
    pub source_tag: String,
}

impl TimeSeriesObservation {
    pub fn new(
        timestamp: DateTime<Utc>,
        metric_name: impl Into<String>,
        value: f64,
        source_tag: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            metric_name: metric_name.into(),
            value,
            source_tag: source_tag.into(),
        }
    }
}

/// A bid opportunity as supplied by the opportunity provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    /// Contract value in the reporting currency
    pub value: f64,
    pub sector: String,
    #[serde(default)]
    pub category: String,
    /// 1 (trivial) to 10 (very complex)
    pub technical_complexity: f64,
    /// "Low", "Medium" or "High"; anything else encodes as unknown
    pub competitive_level: String,
    /// 1 to 10; when absent the sector default applies
    #[serde(default)]
    pub relationship_score: Option<f64>,
    #[serde(default)]
    pub days_to_deadline: Option<u32>,
}

/// A closed opportunity with its outcome, used to train the scoring model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledOpportunity {
    pub opportunity: Opportunity,
    /// 1.0 = won, 0.0 = lost; fractional values are treated as probabilities
    pub outcome: f64,
}

/// Append-only observation series, one per metric, ordered by timestamp
#[derive(Debug, Clone, Default)]
pub struct ObservationStore {
    series: BTreeMap<String, Vec<TimeSeriesObservation>>,
}

impl ObservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observation.
    ///
    /// A timestamp earlier than the metric's latest observation is rejected;
    /// ingested observations are never reordered or replaced.
    pub fn append(&mut self, observation: TimeSeriesObservation) -> Result<()> {
        if !observation.value.is_finite() {
            return Err(EngineError::InvalidParameter(format!(
                "Non-finite value for {} at {}",
                observation.metric_name, observation.timestamp
            )));
        }

        let series = self
            .series
            .entry(observation.metric_name.clone())
            .or_default();
        if let Some(last) = series.last() {
            if observation.timestamp < last.timestamp {
                return Err(EngineError::InvalidParameter(format!(
                    "Observation for {} at {} is older than the latest ({})",
                    observation.metric_name, observation.timestamp, last.timestamp
                )));
            }
        }
        series.push(observation);
        Ok(())
    }

    /// Append many observations, stopping at the first rejected one
    pub fn extend<I>(&mut self, observations: I) -> Result<()>
    where
        I: IntoIterator<Item = TimeSeriesObservation>,
    {
        for obs in observations {
            self.append(obs)?;
        }
        Ok(())
    }

    /// Ordered observations for a metric (empty if unknown)
    pub fn series(&self, metric_name: &str) -> &[TimeSeriesObservation] {
        self.series
            .get(metric_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Ordered values for a metric
    pub fn values(&self, metric_name: &str) -> Vec<f64> {
        self.series(metric_name).iter().map(|o| o.value).collect()
    }

    /// Known metric names, sorted
    pub fn metrics(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// Number of observations for a metric
    pub fn len(&self, metric_name: &str) -> usize {
        self.series(metric_name).len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(Vec::is_empty)
    }
}

#[derive(Debug, Deserialize)]
struct ObservationRow {
    timestamp: String,
    metric_name: String,
    value: f64,
    #[serde(default)]
    source_tag: String,
}

/// Loader for observation files exported by the metrics provider
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a CSV file with a `timestamp,metric_name,value,source_tag` header
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<ObservationStore> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Load CSV content from any reader.
    ///
    /// Timestamps may be RFC 3339 or a bare `YYYY-MM-DD` date (midnight UTC).
    /// Rows are sorted per metric before being appended.
    pub fn from_reader<R: Read>(reader: R) -> Result<ObservationStore> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows = Vec::new();
        for record in csv_reader.deserialize::<ObservationRow>() {
            let row = record?;
            rows.push(TimeSeriesObservation {
                timestamp: parse_timestamp(&row.timestamp)?,
                metric_name: row.metric_name,
                value: row.value,
                source_tag: row.source_tag,
            });
        }
        rows.sort_by(|a, b| {
            a.metric_name
                .cmp(&b.metric_name)
                .then(a.timestamp.cmp(&b.timestamp))
        });

        let mut store = ObservationStore::new();
        store.extend(rows)?;
        Ok(store)
    }
}

/// Parse an RFC 3339 timestamp or a `YYYY-MM-DD` date
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| EngineError::InvalidParameter(format!("Unparseable timestamp: {}", raw)))
}

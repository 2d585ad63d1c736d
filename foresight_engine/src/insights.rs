//! Templated business insights
//!
//! Pure functions over a metric's values and, when supplied, its anomaly
//! report and forecast. Benchmarks come from the static configuration table.

use crate::anomaly::{AnomalyLevel, AnomalyReport};
use crate::config::EngineConfig;
use crate::forecast::ForecastResult;
use foresight_math::regression::LinearTrend;
use foresight_math::stats::{coefficient_of_variation, sample_std};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum history for any insight
pub const MIN_INSIGHT_OBSERVATIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Trend,
    Volatility,
    Benchmark,
    Anomaly,
    Outlook,
}

/// One templated statement with a confidence and a suggested action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub title: String,
    pub statement: String,
    pub confidence: f64,
    pub action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Upward,
    Downward,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Low,
    Medium,
    High,
}

/// Slope-based trend reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub direction: TrendDirection,
    pub strength: Strength,
    pub slope: f64,
    /// R² of the trend line, clamped to `[0.1, 0.95]`
    pub confidence: f64,
}

/// Dispersion reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityAnalysis {
    pub level: Strength,
    pub std: f64,
    pub coefficient_of_variation: f64,
}

/// Trend of an ordered series; `None` below three values
pub fn analyze_trend(values: &[f64]) -> Option<TrendAnalysis> {
    if values.len() < MIN_INSIGHT_OBSERVATIONS {
        return None;
    }
    let trend = LinearTrend::fit(values).ok()?;
    let std = sample_std(values)?;
    let slope = trend.slope();

    let (direction, strength) = if slope.abs() < std * 0.1 || std == 0.0 {
        (TrendDirection::Stable, Strength::Low)
    } else {
        let strength = if slope.abs() > std * 0.5 {
            Strength::High
        } else {
            Strength::Medium
        };
        let direction = if slope > 0.0 {
            TrendDirection::Upward
        } else {
            TrendDirection::Downward
        };
        (direction, strength)
    };

    // A flat series has a perfect but uninformative fit
    let r2 = if std == 0.0 { 0.0 } else { trend.r_squared() };
    Some(TrendAnalysis {
        direction,
        strength,
        slope,
        confidence: r2.clamp(0.1, 0.95),
    })
}

/// Volatility from the coefficient of variation (`< 0.1` low, `< 0.3` medium)
pub fn analyze_volatility(values: &[f64]) -> Option<VolatilityAnalysis> {
    let std = sample_std(values)?;
    let cv = coefficient_of_variation(values)?;
    let level = if cv < 0.1 {
        Strength::Low
    } else if cv < 0.3 {
        Strength::Medium
    } else {
        Strength::High
    };
    Some(VolatilityAnalysis {
        level,
        std,
        coefficient_of_variation: cv,
    })
}

fn trend_action(trend: &TrendAnalysis, metric: &str) -> String {
    match (trend.direction, trend.strength) {
        (TrendDirection::Upward, Strength::High) => {
            format!("Excellent {} growth - maintain current strategies", metric)
        }
        (TrendDirection::Upward, _) => {
            format!("Positive {} trend - consider scaling successful initiatives", metric)
        }
        (TrendDirection::Downward, Strength::High) => {
            format!("Concerning {} decline - immediate intervention required", metric)
        }
        (TrendDirection::Downward, _) => format!(
            "Declining {} trend - investigate causes and implement corrective measures",
            metric
        ),
        (TrendDirection::Stable, _) => {
            format!("Stable {} - look for optimization opportunities", metric)
        }
    }
}

fn direction_word(direction: TrendDirection) -> &'static str {
    match direction {
        TrendDirection::Upward => "upward",
        TrendDirection::Downward => "downward",
        TrendDirection::Stable => "stable",
    }
}

fn strength_word(strength: Strength) -> &'static str {
    match strength {
        Strength::Low => "low",
        Strength::Medium => "medium",
        Strength::High => "high",
    }
}

/// Insight generator over the configured benchmark table
#[derive(Debug, Clone)]
pub struct InsightGenerator {
    benchmarks: BTreeMap<String, f64>,
}

impl InsightGenerator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            benchmarks: config.benchmarks.clone(),
        }
    }

    /// Trend, volatility, benchmark and anomaly insights for one metric.
    ///
    /// Fewer than three values yield no insights.
    pub fn summarize(
        &self,
        metric: &str,
        values: &[f64],
        anomalies: Option<&AnomalyReport>,
    ) -> Vec<Insight> {
        let mut insights = Vec::new();
        if values.len() < MIN_INSIGHT_OBSERVATIONS {
            return insights;
        }

        if let Some(trend) = analyze_trend(values) {
            insights.push(Insight {
                kind: InsightKind::Trend,
                title: format!("{} Trend Analysis", metric),
                statement: format!(
                    "{} shows {} trend with {} strength",
                    metric,
                    direction_word(trend.direction),
                    strength_word(trend.strength)
                ),
                confidence: trend.confidence,
                action: trend_action(&trend, metric),
            });
        }

        if let Some(vol) = analyze_volatility(values) {
            if vol.level == Strength::High {
                insights.push(Insight {
                    kind: InsightKind::Volatility,
                    title: format!("{} Volatility Alert", metric),
                    statement: format!("High volatility detected in {} (σ={:.2})", metric, vol.std),
                    confidence: 0.85,
                    action: format!("Consider stabilizing factors affecting {}", metric),
                });
            }
        }

        if let (Some(&benchmark), Some(&latest)) = (self.benchmarks.get(metric), values.last()) {
            if let Some(insight) = benchmark_insight(metric, latest, benchmark) {
                insights.push(insight);
            }
        }

        if let Some(report) = anomalies {
            insights.push(anomaly_insight(metric, report));
        }

        insights
    }

    /// Outlook from the first forecast period against the last actual value
    pub fn forecast_outlook(&self, last_actual: f64, forecast: &ForecastResult) -> Option<Insight> {
        let predicted = *forecast.predictions.first()?;
        if last_actual == 0.0 || !last_actual.is_finite() {
            return None;
        }
        let change = (predicted - last_actual) / last_actual.abs() * 100.0;
        let statement = if change > 10.0 {
            format!("Strong growth predicted ({:.1}%) - prepare for scaling", change)
        } else if change > 0.0 {
            format!("Moderate growth expected ({:.1}%) - maintain current strategy", change)
        } else if change > -10.0 {
            format!("Slight decline predicted ({:.1}%) - monitor closely", change)
        } else {
            format!("Significant decline predicted ({:.1}%) - immediate action needed", change)
        };
        // Fallback forecasts carry no model behind them
        let confidence = if forecast.degraded { 0.4 } else { 0.75 };

        Some(Insight {
            kind: InsightKind::Outlook,
            title: format!("{} Forecast Outlook", forecast.metric_name),
            action: format!(
                "Review the {}-period forecast before committing resources",
                forecast.horizon_periods
            ),
            statement,
            confidence,
        })
    }
}

fn benchmark_insight(metric: &str, value: f64, benchmark: f64) -> Option<Insight> {
    if benchmark == 0.0 || !value.is_finite() {
        return None;
    }
    let difference = (value - benchmark) / benchmark * 100.0;
    let (status, action) = if difference > 10.0 {
        ("significantly above", "Maintain current performance and identify success factors")
    } else if difference > 0.0 {
        ("above", "Good performance, look for optimization opportunities")
    } else if difference > -10.0 {
        ("slightly below", "Focus on improvement initiatives")
    } else {
        ("significantly below", "Immediate action required to improve performance")
    };
    Some(Insight {
        kind: InsightKind::Benchmark,
        title: format!("{} Benchmark Comparison", metric),
        statement: format!("{} is {} benchmark by {:.1}%", metric, status, difference),
        confidence: 0.90,
        action: action.to_string(),
    })
}

fn anomaly_insight(metric: &str, report: &AnomalyReport) -> Insight {
    let (statement, action) = match report.level {
        AnomalyLevel::None => (
            format!("No anomalies detected in {}", metric),
            "No action needed".to_string(),
        ),
        level => (
            format!(
                "{} anomalies detected in {} ({} high severity, level {})",
                report.records.len(),
                metric,
                report.high_severity_count,
                level
            ),
            report
                .recommendations
                .first()
                .cloned()
                .unwrap_or_else(|| "Monitor flagged periods".to_string()),
        ),
    };
    Insight {
        kind: InsightKind::Anomaly,
        title: format!("{} Anomaly Summary", metric),
        statement,
        confidence: 0.80,
        action,
    }
}

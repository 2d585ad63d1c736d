//! Correlation analysis over tabular features
//!
//! Every numeric column of a polars `DataFrame` takes part. Nulls are handled
//! pairwise: a row counts for a pair only when both cells are present.

use crate::error::{EngineError, Result};
use foresight_math::stats::pearson;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Symmetric Pearson matrix over the numeric columns of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    /// Column names in row/column order
    pub columns: Vec<String>,
    /// `NaN` where a pair has no variance or fewer than two shared rows
    pub matrix: Vec<Vec<f64>>,
}

/// One pair of columns and their coefficient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPair {
    pub first: String,
    pub second: String,
    pub coefficient: f64,
}

impl CorrelationPair {
    pub fn is_positive(&self) -> bool {
        self.coefficient > 0.0
    }

    pub fn describe(&self) -> String {
        let sign = if self.is_positive() { "positive" } else { "negative" };
        format!(
            "Strong {} correlation between {} and {} (r={:.2})",
            sign, self.first, self.second, self.coefficient
        )
    }
}

/// Best lagged relationship where `leader` precedes `follower` by `lag` rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LagCorrelation {
    pub leader: String,
    pub follower: String,
    pub lag: usize,
    pub coefficient: f64,
}

impl CorrelationMatrix {
    /// Coefficient for two named columns
    pub fn get(&self, first: &str, second: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == first)?;
        let j = self.columns.iter().position(|c| c == second)?;
        Some(self.matrix[i][j])
    }

    /// Pairs whose absolute coefficient exceeds `threshold`, strongest first
    pub fn strong_pairs(&self, threshold: f64) -> Vec<CorrelationPair> {
        let mut pairs = Vec::new();
        for i in 0..self.columns.len() {
            for j in (i + 1)..self.columns.len() {
                let r = self.matrix[i][j];
                if r.is_finite() && r.abs() > threshold {
                    pairs.push(CorrelationPair {
                        first: self.columns[i].clone(),
                        second: self.columns[j].clone(),
                        coefficient: r,
                    });
                }
            }
        }
        pairs.sort_by(|a, b| b.coefficient.abs().total_cmp(&a.coefficient.abs()));
        pairs
    }
}

/// Numeric columns as nullable `f64` vectors, in table order
fn numeric_columns(table: &DataFrame) -> Result<Vec<(String, Vec<Option<f64>>)>> {
    let mut out = Vec::new();
    for series in table.get_columns() {
        if !series.dtype().is_numeric() {
            debug!("Skipping non-numeric column {}", series.name());
            continue;
        }
        let cast = series.cast(&DataType::Float64)?;
        let values: Vec<Option<f64>> = cast.f64()?.into_iter().collect();
        out.push((series.name().to_string(), values));
    }
    Ok(out)
}

/// Pairwise-complete Pearson coefficient; `NaN` when undefined
fn pairwise(x: &[Option<f64>], y: &[Option<f64>]) -> f64 {
    let (a, b): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) if a.is_finite() && b.is_finite() => Some((*a, *b)),
            _ => None,
        })
        .unzip();
    pearson(&a, &b).unwrap_or(f64::NAN)
}

/// Correlation matrix of every numeric column in `table`.
///
/// Fewer than two numeric columns is `InsufficientData`.
pub fn correlate(table: &DataFrame) -> Result<CorrelationMatrix> {
    let columns = numeric_columns(table)?;
    if columns.len() < 2 {
        return Err(EngineError::InsufficientData {
            required: 2,
            actual: columns.len(),
        });
    }

    let n = columns.len();
    let mut matrix = vec![vec![1.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let r = pairwise(&columns[i].1, &columns[j].1);
            matrix[i][j] = r;
            matrix[j][i] = r;
        }
    }

    Ok(CorrelationMatrix {
        columns: columns.into_iter().map(|(name, _)| name).collect(),
        matrix,
    })
}

/// For each ordered pair of numeric columns, the lag in `1..=max_lag` with
/// the largest absolute coefficient. Rows are assumed to be in time order.
pub fn lag_correlations(table: &DataFrame, max_lag: usize) -> Result<Vec<LagCorrelation>> {
    if max_lag == 0 {
        return Err(EngineError::InvalidParameter(
            "Maximum lag must be at least 1".to_string(),
        ));
    }
    let columns = numeric_columns(table)?;
    let mut out = Vec::new();

    for (leader, x) in &columns {
        for (follower, y) in &columns {
            if leader == follower {
                continue;
            }
            let best = (1..=max_lag)
                .filter(|&lag| lag < x.len())
                .map(|lag| (lag, pairwise(&x[..x.len() - lag], &y[lag..])))
                .filter(|(_, r)| r.is_finite())
                .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()));
            if let Some((lag, coefficient)) = best {
                out.push(LagCorrelation {
                    leader: leader.clone(),
                    follower: follower.clone(),
                    lag,
                    coefficient,
                });
            }
        }
    }

    out.sort_by(|a, b| b.coefficient.abs().total_cmp(&a.coefficient.abs()));
    Ok(out)
}

/// Short statements for strong pairs and lagged leaders above `threshold`
pub fn correlation_insights(
    strong: &[CorrelationPair],
    lagged: &[LagCorrelation],
    threshold: f64,
) -> Vec<String> {
    let mut out: Vec<String> = strong.iter().map(CorrelationPair::describe).collect();
    out.extend(
        lagged
            .iter()
            .filter(|l| l.coefficient.abs() > threshold)
            .map(|l| {
                format!(
                    "{} leads {} by {} period(s) (r={:.2})",
                    l.leader, l.follower, l.lag, l.coefficient
                )
            }),
    );
    out
}

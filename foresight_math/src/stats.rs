//! Descriptive statistics over `f64` slices
//!
//! Contains:
//! - Mean, sample and population standard deviation
//! - Z-scores and coefficient of variation
//! - Pearson correlation
//! - Column standardization (`StandardScaler`)

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator), `None` below two values
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Population standard deviation (n denominator), `None` for an empty slice
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / values.len() as f64).sqrt())
}

/// Z-score of every value against the slice's own mean and sample deviation.
///
/// A constant series has no spread; every score is reported as `0.0`.
pub fn z_scores(values: &[f64]) -> Vec<f64> {
    let (m, sd) = match (mean(values), sample_std(values)) {
        (Some(m), Some(sd)) => (m, sd),
        _ => return vec![0.0; values.len()],
    };
    if sd <= f64::EPSILON * m.abs().max(1.0) {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - m) / sd).collect()
}

/// Sample standard deviation divided by the mean.
///
/// Returns `f64::INFINITY` when the mean is zero.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let sd = sample_std(values)?;
    if m == 0.0 {
        return Some(f64::INFINITY);
    }
    Some(sd / m.abs())
}

/// Pearson correlation coefficient.
///
/// `None` if the slices differ in length, hold fewer than two points, or
/// either side has no variance.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let mean_x = mean(x)?;
    let mean_y = mean(y)?;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

/// Linear-interpolated quantile of an unsorted slice, `q` in `[0, 1]`
pub fn quantile(values: &[f64], q: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot take a quantile of an empty slice".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&q) {
        return Err(MathError::InvalidInput(format!(
            "Quantile must be within [0, 1], got {}",
            q
        )));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Ok(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Per-column standardization learned from a training matrix.
///
/// Columns with zero spread are centred but not scaled, so constant inputs
/// map to `0.0` instead of `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    /// Learn column means and population deviations from row-major data
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let width = match rows.first() {
            Some(first) => first.len(),
            None => {
                return Err(MathError::InsufficientData(
                    "Cannot fit a scaler on zero rows".to_string(),
                ))
            }
        };
        if rows.iter().any(|r| r.len() != width) {
            return Err(MathError::InvalidInput(
                "All rows must have the same number of columns".to_string(),
            ));
        }

        let mut means = Vec::with_capacity(width);
        let mut scales = Vec::with_capacity(width);
        for col in 0..width {
            let column: Vec<f64> = rows.iter().map(|r| r[col]).collect();
            let m = mean(&column).unwrap_or(0.0);
            let sd = population_std(&column).unwrap_or(0.0);
            means.push(m);
            scales.push(if sd > 1e-12 { sd } else { 1.0 });
        }

        Ok(Self { means, scales })
    }

    /// Number of columns the scaler was fitted on
    pub fn width(&self) -> usize {
        self.means.len()
    }

    /// Column means
    pub fn means(&self) -> &[f64] {
        &self.means
    }

    /// Column scales (1.0 for constant columns)
    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    /// Standardize one row
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.width() {
            return Err(MathError::InvalidInput(format!(
                "Row has {} columns, scaler expects {}",
                row.len(),
                self.width()
            )));
        }
        Ok(row
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }

    /// Standardize every row
    pub fn transform_all(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter().map(|r| self.transform(r)).collect()
    }

    /// Map a standardized row back to the original scale
    pub fn inverse(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(v, (m, s))| v * s + m)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&values).unwrap(), 5.0);
        assert_relative_eq!(population_std(&values).unwrap(), 2.0);
        assert_relative_eq!(sample_std(&values).unwrap(), 2.138089935, epsilon = 1e-8);

        assert!(mean(&[]).is_none());
        assert!(sample_std(&[1.0]).is_none());
    }

    #[test]
    fn test_z_scores_constant_series() {
        let z = z_scores(&[3.0, 3.0, 3.0]);
        assert_eq!(z, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_pearson() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        let inv = [8.0, 6.0, 4.0, 2.0];
        assert_relative_eq!(pearson(&x, &y).unwrap(), 1.0);
        assert_relative_eq!(pearson(&x, &inv).unwrap(), -1.0);
        assert!(pearson(&x, &[1.0, 1.0, 1.0, 1.0]).is_none());
        assert!(pearson(&x, &y[..3]).is_none());
    }

    #[test]
    fn test_quantile() {
        let values = [5.0, 1.0, 3.0, 2.0, 4.0];
        assert_relative_eq!(quantile(&values, 0.5).unwrap(), 3.0);
        assert_relative_eq!(quantile(&values, 0.9).unwrap(), 4.6);
        assert!(quantile(&values, 1.5).is_err());
    }

    #[test]
    fn test_scaler_constant_column() {
        let rows = vec![vec![1.0, 10.0], vec![3.0, 10.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();
        let t = scaler.transform(&[3.0, 10.0]).unwrap();
        assert_relative_eq!(t[0], 1.0);
        assert_relative_eq!(t[1], 0.0);
        assert_eq!(scaler.inverse(&t), vec![3.0, 10.0]);
        assert!(scaler.transform(&[1.0]).is_err());
    }
}

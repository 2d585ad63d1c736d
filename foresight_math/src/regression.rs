//! Regression fits
//!
//! Contains:
//! - Ordinary least-squares trend over the observation index
//! - Ridge regression over a design matrix

use crate::linalg::solve;
use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Straight-line fit `y = slope * i + intercept` over positions `0..n`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearTrend {
    slope: f64,
    intercept: f64,
    r_squared: f64,
    n: usize,
}

impl LinearTrend {
    /// Fit the trend line. Needs at least two values.
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.len() < 2 {
            return Err(MathError::InsufficientData(
                "Not enough data for a trend line. Need at least 2 points.".to_string(),
            ));
        }

        let n = values.len() as f64;
        let x_mean = (n - 1.0) / 2.0;
        let y_mean = values.iter().sum::<f64>() / n;

        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for (i, &y) in values.iter().enumerate() {
            let x = i as f64;
            numerator += (x - x_mean) * (y - y_mean);
            denominator += (x - x_mean) * (x - x_mean);
        }

        let slope = numerator / denominator;
        let intercept = y_mean - slope * x_mean;

        let mut ss_total = 0.0;
        let mut ss_residual = 0.0;
        for (i, &y) in values.iter().enumerate() {
            let y_pred = slope * i as f64 + intercept;
            ss_total += (y - y_mean).powi(2);
            ss_residual += (y - y_pred).powi(2);
        }
        // A flat series is explained perfectly by a flat line
        let r_squared = if ss_total.abs() < 1e-12 {
            1.0
        } else {
            1.0 - ss_residual / ss_total
        };

        Ok(Self {
            slope,
            intercept,
            r_squared,
            n: values.len(),
        })
    }

    /// Change per period
    pub fn slope(&self) -> f64 {
        self.slope
    }

    /// Value at position 0
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Coefficient of determination of the fit
    pub fn r_squared(&self) -> f64 {
        self.r_squared
    }

    /// Number of points fitted
    pub fn len(&self) -> usize {
        self.n
    }

    /// Always false; a fitted trend covers at least two points
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Value at an arbitrary position
    pub fn value_at(&self, position: f64) -> f64 {
        self.slope * position + self.intercept
    }

    /// Predict `periods_ahead` steps past the last fitted point (1 = next)
    pub fn forecast(&self, periods_ahead: usize) -> f64 {
        self.value_at((self.n + periods_ahead - 1) as f64)
    }
}

/// Ridge regression coefficients with an unpenalized intercept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeFit {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl RidgeFit {
    /// Fit `y ≈ intercept + X·β` minimizing `‖y - Xβ‖² + λ‖β‖²`.
    ///
    /// Columns are centred internally so the intercept is not shrunk.
    pub fn fit(rows: &[Vec<f64>], targets: &[f64], lambda: f64) -> Result<Self> {
        if rows.len() != targets.len() {
            return Err(MathError::InvalidInput(format!(
                "{} rows but {} targets",
                rows.len(),
                targets.len()
            )));
        }
        if rows.is_empty() {
            return Err(MathError::InsufficientData(
                "Ridge regression needs at least one row".to_string(),
            ));
        }
        if lambda < 0.0 || !lambda.is_finite() {
            return Err(MathError::InvalidInput(format!(
                "Ridge penalty must be a non-negative number, got {}",
                lambda
            )));
        }

        let p = rows[0].len();
        if rows.iter().any(|r| r.len() != p) {
            return Err(MathError::InvalidInput(
                "All rows must have the same number of columns".to_string(),
            ));
        }

        let n = rows.len() as f64;
        let x_means: Vec<f64> = (0..p)
            .map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / n)
            .collect();
        let y_mean = targets.iter().sum::<f64>() / n;

        // Normal equations on centred data: (XᵀX + λI) β = Xᵀy
        let mut gram = vec![vec![0.0; p]; p];
        let mut rhs = vec![0.0; p];
        for (row, &y) in rows.iter().zip(targets) {
            for i in 0..p {
                let xi = row[i] - x_means[i];
                rhs[i] += xi * (y - y_mean);
                for j in i..p {
                    gram[i][j] += xi * (row[j] - x_means[j]);
                }
            }
        }
        for i in 0..p {
            for j in 0..i {
                gram[i][j] = gram[j][i];
            }
            gram[i][i] += lambda;
        }

        let coefficients = solve(&gram, &rhs)?;
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(&x_means)
                .map(|(b, m)| b * m)
                .sum::<f64>();

        Ok(Self {
            intercept,
            coefficients,
        })
    }

    /// Predict one row
    pub fn predict(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.coefficients.len() {
            return Err(MathError::InvalidInput(format!(
                "Row has {} columns, model expects {}",
                row.len(),
                self.coefficients.len()
            )));
        }
        Ok(self.intercept
            + row
                .iter()
                .zip(&self.coefficients)
                .map(|(x, b)| x * b)
                .sum::<f64>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_trend() {
        let trend = LinearTrend::fit(&[1.0, 3.0, 5.0, 7.0]).unwrap();
        assert_relative_eq!(trend.slope(), 2.0);
        assert_relative_eq!(trend.intercept(), 1.0);
        assert_relative_eq!(trend.r_squared(), 1.0);
        assert_relative_eq!(trend.forecast(1), 9.0);
        assert!(LinearTrend::fit(&[1.0]).is_err());
    }

    #[test]
    fn test_flat_trend() {
        let trend = LinearTrend::fit(&[5.0; 6]).unwrap();
        assert_relative_eq!(trend.slope(), 0.0);
        assert_relative_eq!(trend.forecast(3), 5.0);
    }

    #[test]
    fn test_ridge_recovers_plane() {
        let rows: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![i as f64, (i % 7) as f64])
            .collect();
        let targets: Vec<f64> = rows.iter().map(|r| 3.0 + 2.0 * r[0] - r[1]).collect();

        let fit = RidgeFit::fit(&rows, &targets, 0.0).unwrap();
        assert_relative_eq!(fit.intercept, 3.0, epsilon = 1e-8);
        assert_relative_eq!(fit.coefficients[0], 2.0, epsilon = 1e-8);
        assert_relative_eq!(fit.coefficients[1], -1.0, epsilon = 1e-8);
        assert_relative_eq!(fit.predict(&[10.0, 2.0]).unwrap(), 21.0, epsilon = 1e-8);
    }

    #[test]
    fn test_ridge_collinear_without_penalty_is_singular() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, 2.0 * i as f64]).collect();
        let targets: Vec<f64> = (0..10).map(|i| i as f64).collect();

        let err = RidgeFit::fit(&rows, &targets, 0.0).unwrap_err();
        assert!(matches!(err, MathError::SingularMatrix { .. }));

        // A penalty makes the system solvable again
        assert!(RidgeFit::fit(&rows, &targets, 1.0).is_ok());
    }
}

//! Simple exponential smoothing

use crate::{MathError, Result};

/// Exponential smoothing state, `level = alpha * value + (1 - alpha) * level`
#[derive(Debug, Clone)]
pub struct ExponentialSmoothing {
    alpha: f64,
    level: Option<f64>,
    values_seen: usize,
}

impl ExponentialSmoothing {
    /// Create a new smoother; alpha must be in (0, 1)
    pub fn new(alpha: f64) -> Result<Self> {
        if alpha <= 0.0 || alpha >= 1.0 {
            return Err(MathError::InvalidInput(
                "Alpha must be between 0 and 1 (exclusive)".to_string(),
            ));
        }

        Ok(Self {
            alpha,
            level: None,
            values_seen: 0,
        })
    }

    /// Feed the next observation
    pub fn update(&mut self, value: f64) {
        self.values_seen += 1;
        self.level = Some(match self.level {
            None => value,
            Some(current) => self.alpha * value + (1.0 - self.alpha) * current,
        });
    }

    /// Current smoothed level
    pub fn level(&self) -> Option<f64> {
        self.level
    }

    /// Number of observations consumed
    pub fn values_seen(&self) -> usize {
        self.values_seen
    }

    /// Smoothing factor
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Smooth a whole series and return the final level
    pub fn fit(alpha: f64, values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(MathError::InsufficientData(
                "Exponential smoothing needs at least one value".to_string(),
            ));
        }
        let mut es = Self::new(alpha)?;
        for &v in values {
            es.update(v);
        }
        Ok(es)
    }

    /// One-step-ahead predictions: entry `i` is the level after seeing `values[..i]`.
    ///
    /// The first entry has no history and repeats `values[0]`.
    pub fn one_step_predictions(alpha: f64, values: &[f64]) -> Result<Vec<f64>> {
        let mut es = Self::new(alpha)?;
        let mut out = Vec::with_capacity(values.len());
        for &v in values {
            out.push(es.level.unwrap_or(v));
            es.update(v);
        }
        Ok(out)
    }
}

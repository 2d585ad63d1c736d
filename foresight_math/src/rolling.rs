//! Rolling-window calculations
//!
//! Contains:
//! - Streaming Simple Moving Average
//! - Batch rolling means, lags and period-over-period growth

use crate::{MathError, Result};
use std::collections::VecDeque;

/// Simple Moving Average over a fixed trailing window
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    window: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl SimpleMovingAverage {
    /// Create a new Simple Moving Average with the specified window
    pub fn new(window: usize) -> Result<Self> {
        if window == 0 {
            return Err(MathError::InvalidInput(
                "Window must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            window,
            values: VecDeque::with_capacity(window),
            sum: 0.0,
        })
    }

    /// Push a new value, evicting the oldest once the window is full
    pub fn update(&mut self, value: f64) {
        self.values.push_back(value);
        self.sum += value;

        if self.values.len() > self.window {
            if let Some(old_value) = self.values.pop_front() {
                self.sum -= old_value;
            }
        }
    }

    /// Current average, `None` until the window is full
    pub fn value(&self) -> Option<f64> {
        if self.values.len() < self.window {
            return None;
        }
        Some(self.sum / self.window as f64)
    }

    /// Window length
    pub fn window(&self) -> usize {
        self.window
    }

    /// Clear all values
    pub fn reset(&mut self) {
        self.values.clear();
        self.sum = 0.0;
    }
}

/// Rolling mean aligned with the input; the first `window - 1` entries are `None`.
///
/// The window at index `i` includes `values[i]`.
pub fn rolling_mean(values: &[f64], window: usize) -> Result<Vec<Option<f64>>> {
    let mut sma = SimpleMovingAverage::new(window)?;
    Ok(values
        .iter()
        .map(|&v| {
            sma.update(v);
            sma.value()
        })
        .collect())
}

/// Value `lag` steps back, aligned with the input
pub fn lag(values: &[f64], lag: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| i.checked_sub(lag).map(|j| values[j]))
        .collect()
}

/// Period-over-period growth `(v[i] - v[i-1]) / v[i-1]`, aligned with the input.
///
/// A zero predecessor yields `Some(0.0)` rather than an infinite rate.
pub fn growth_rate(values: &[f64]) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if i == 0 {
                return None;
            }
            let prev = values[i - 1];
            if prev == 0.0 {
                Some(0.0)
            } else {
                Some((values[i] - prev) / prev.abs())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_calculation() {
        let mut sma = SimpleMovingAverage::new(3).unwrap();

        sma.update(2.0);
        sma.update(4.0);
        assert!(sma.value().is_none());

        sma.update(6.0);
        assert_eq!(sma.value().unwrap(), 4.0);

        // The window slides, dropping the oldest value
        sma.update(8.0);
        assert_eq!(sma.value().unwrap(), 6.0);
    }

    #[test]
    fn test_rolling_mean_alignment() {
        let out = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 3).unwrap();
        assert_eq!(out, vec![None, None, Some(2.0), Some(3.0)]);
        assert!(rolling_mean(&[1.0], 0).is_err());
    }

    #[test]
    fn test_lag_and_growth() {
        let values = [100.0, 110.0, 0.0, 50.0];
        assert_eq!(lag(&values, 2), vec![None, None, Some(100.0), Some(110.0)]);

        let growth = growth_rate(&values);
        assert_eq!(growth[0], None);
        assert!((growth[1].unwrap() - 0.1).abs() < 1e-12);
        assert_eq!(growth[3], Some(0.0));
    }
}

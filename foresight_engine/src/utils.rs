//! Utility functions for the foresight_engine crate

use crate::error::{EngineError, Result};
use chrono::{DateTime, Months, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Sizes of the training and validation parts for `n` samples.
///
/// A zero ratio keeps everything for training; otherwise at least one
/// sample lands on each side whenever `n >= 2`.
pub fn split_sizes(n: usize, validation_ratio: f64) -> Result<(usize, usize)> {
    if !(0.0..1.0).contains(&validation_ratio) {
        return Err(EngineError::InvalidParameter(format!(
            "Validation split must be within [0, 1), got {}",
            validation_ratio
        )));
    }
    if n < 2 || validation_ratio == 0.0 {
        return Ok((n, 0));
    }
    let validation = ((n as f64 * validation_ratio).round() as usize).clamp(1, n - 1);
    Ok((n - validation, validation))
}

/// Chronological split: the first part trains, the tail validates
pub fn chronological_split(n: usize, validation_ratio: f64) -> Result<(Vec<usize>, Vec<usize>)> {
    let (train, _) = split_sizes(n, validation_ratio)?;
    Ok(((0..train).collect(), (train..n).collect()))
}

/// Seeded random split; the same seed always yields the same partition
pub fn random_split(
    n: usize,
    validation_ratio: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let (train, _) = split_sizes(n, validation_ratio)?;
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let validation = indices.split_off(train);
    Ok((indices, validation))
}

/// Rolling-origin folds over `n` ordered samples.
///
/// Fold `k` trains on everything before its validation block; blocks tile
/// the tail of the series and each training prefix holds at least
/// `min_train` samples.
pub fn rolling_origin_folds(n: usize, folds: usize, min_train: usize) -> Vec<(usize, usize)> {
    if folds == 0 || n <= min_train {
        return Vec::new();
    }
    let available = n - min_train;
    let folds = folds.min(available);
    let block = available / folds;
    (0..folds)
        .map(|k| {
            let start = n - (folds - k) * block;
            let end = if k + 1 == folds { n } else { start + block };
            (start, end)
        })
        .collect()
}

/// The `count` monthly timestamps following `last`
pub fn future_months(last: DateTime<Utc>, count: usize) -> Result<Vec<DateTime<Utc>>> {
    (1..=count)
        .map(|step| {
            u32::try_from(step)
                .ok()
                .and_then(|m| last.checked_add_months(Months::new(m)))
                .ok_or_else(|| {
                    EngineError::InvalidParameter(format!(
                        "Cannot step {} months past {}",
                        step, last
                    ))
                })
        })
        .collect()
}

/// `YYYY-MM` label of a period
pub fn period_label(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m").to_string()
}

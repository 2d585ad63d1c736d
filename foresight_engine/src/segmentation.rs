//! Centroid-based segmentation
//!
//! k-means with k-means++ seeding on standardized features. Rows with a
//! missing or non-finite value in any selected feature are dropped first.

use crate::config::SegmentationConfig;
use crate::error::{EngineError, Result};
use foresight_math::stats::StandardScaler;
use polars::prelude::*;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Per-segment summary in original units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentProfile {
    pub segment: usize,
    pub size: usize,
    /// Fraction of the clustered rows
    pub share: f64,
    /// Feature means, in `Segmentation::feature_names` order
    pub feature_means: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segmentation {
    pub feature_names: Vec<String>,
    /// Table row index of each clustered row
    pub row_indexes: Vec<usize>,
    /// Segment of each clustered row, aligned with `row_indexes`
    pub assignments: Vec<usize>,
    /// Exactly `k` centres in standardized units
    pub centers: Vec<Vec<f64>>,
    pub original_centers: Vec<Vec<f64>>,
    pub sizes: Vec<usize>,
    /// Sum of squared standardized distances to the assigned centre
    pub inertia: f64,
    pub iterations: usize,
    pub profiles: Vec<SegmentProfile>,
    pub insights: Vec<String>,
}

impl Segmentation {
    pub fn k(&self) -> usize {
        self.centers.len()
    }
}

/// k-means over selected columns of a table
#[derive(Debug, Clone)]
pub struct Segmenter {
    config: SegmentationConfig,
}

impl Segmenter {
    pub fn new(config: &SegmentationConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Cluster the rows of `table` on `feature_names` into `k` segments.
    ///
    /// Needs at least `2 * k` complete rows, otherwise
    /// `InsufficientDataForSegmentation`.
    pub fn segment(&self, table: &DataFrame, feature_names: &[&str], k: usize) -> Result<Segmentation> {
        if k == 0 {
            return Err(EngineError::InvalidParameter(
                "Segment count must be at least 1".to_string(),
            ));
        }
        if feature_names.is_empty() {
            return Err(EngineError::InvalidParameter(
                "At least one feature is required for segmentation".to_string(),
            ));
        }

        let (row_indexes, rows) = complete_rows(table, feature_names)?;
        if rows.len() < 2 * k {
            return Err(EngineError::InsufficientDataForSegmentation {
                required: 2 * k,
                actual: rows.len(),
            });
        }

        let scaler = StandardScaler::fit(&rows)?;
        let points = scaler.transform_all(&rows)?;

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut centers = seed_centers(&points, k, &mut rng);
        let mut assignments = vec![0; points.len()];
        let mut iterations = 0;

        while iterations < self.config.max_iterations {
            iterations += 1;
            for (slot, point) in assignments.iter_mut().zip(&points) {
                *slot = nearest(point, &centers).0;
            }
            let updated = recompute_centers(&points, &assignments, &centers);
            let shift = centers
                .iter()
                .zip(&updated)
                .map(|(a, b)| squared_distance(a, b).sqrt())
                .fold(0.0, f64::max);
            centers = updated;
            if shift <= self.config.tolerance {
                debug!("k-means converged after {} iterations", iterations);
                break;
            }
        }
        for (slot, point) in assignments.iter_mut().zip(&points) {
            *slot = nearest(point, &centers).0;
        }

        let inertia: f64 = points
            .iter()
            .zip(&assignments)
            .map(|(p, &a)| squared_distance(p, &centers[a]))
            .sum();
        let mut sizes = vec![0; k];
        for &a in &assignments {
            sizes[a] += 1;
        }
        let original_centers: Vec<Vec<f64>> = centers.iter().map(|c| scaler.inverse(c)).collect();
        let profiles = profiles(&rows, &assignments, &sizes);
        let feature_names: Vec<String> = feature_names.iter().map(|s| s.to_string()).collect();
        let insights = segment_insights(&feature_names, &profiles, &original_centers);

        info!(
            "Segmented {} rows into {} groups ({} iterations, inertia {:.3})",
            rows.len(),
            k,
            iterations,
            inertia
        );

        Ok(Segmentation {
            feature_names,
            row_indexes,
            assignments,
            centers,
            original_centers,
            sizes,
            inertia,
            iterations,
            profiles,
            insights,
        })
    }
}

/// Rows where every selected feature is present and finite
fn complete_rows(table: &DataFrame, feature_names: &[&str]) -> Result<(Vec<usize>, Vec<Vec<f64>>)> {
    let mut columns = Vec::with_capacity(feature_names.len());
    for &name in feature_names {
        let series = table.column(name).map_err(|_| {
            EngineError::InvalidParameter(format!("Unknown segmentation feature: {}", name))
        })?;
        if !series.dtype().is_numeric() {
            return Err(EngineError::InvalidParameter(format!(
                "Segmentation feature {} is not numeric",
                name
            )));
        }
        let cast = series.cast(&DataType::Float64)?;
        let values: Vec<Option<f64>> = cast.f64()?.into_iter().collect();
        columns.push(values);
    }

    let mut indexes = Vec::new();
    let mut rows = Vec::new();
    for i in 0..table.height() {
        let row: Option<Vec<f64>> = columns
            .iter()
            .map(|c| c[i].filter(|v| v.is_finite()))
            .collect();
        if let Some(row) = row {
            indexes.push(i);
            rows.push(row);
        }
    }
    if rows.len() < table.height() {
        debug!("Dropped {} incomplete rows", table.height() - rows.len());
    }
    Ok((indexes, rows))
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest(point: &[f64], centers: &[Vec<f64>]) -> (usize, f64) {
    centers
        .iter()
        .enumerate()
        .map(|(i, c)| (i, squared_distance(point, c)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

/// k-means++: each further centre is drawn with probability proportional to
/// its squared distance from the nearest chosen centre
fn seed_centers(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centers = vec![points[rng.gen_range(0..points.len())].clone()];
    while centers.len() < k {
        let weights: Vec<f64> = points.iter().map(|p| nearest(p, &centers).1).collect();
        let next = match WeightedIndex::new(&weights) {
            Ok(dist) => dist.sample(rng),
            // Every point coincides with a centre
            Err(_) => rng.gen_range(0..points.len()),
        };
        centers.push(points[next].clone());
    }
    centers
}

/// Mean of each cluster; an empty cluster keeps its previous centre
fn recompute_centers(points: &[Vec<f64>], assignments: &[usize], previous: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let width = previous.first().map_or(0, Vec::len);
    let mut sums = vec![vec![0.0; width]; previous.len()];
    let mut counts = vec![0usize; previous.len()];
    for (p, &a) in points.iter().zip(assignments) {
        counts[a] += 1;
        for (s, v) in sums[a].iter_mut().zip(p) {
            *s += v;
        }
    }
    sums.into_iter()
        .zip(counts)
        .zip(previous)
        .map(|((sum, count), prev)| {
            if count == 0 {
                prev.clone()
            } else {
                sum.into_iter().map(|s| s / count as f64).collect()
            }
        })
        .collect()
}

fn profiles(rows: &[Vec<f64>], assignments: &[usize], sizes: &[usize]) -> Vec<SegmentProfile> {
    let width = rows.first().map_or(0, Vec::len);
    let total = rows.len().max(1) as f64;
    sizes
        .iter()
        .enumerate()
        .map(|(segment, &size)| {
            let mut sums = vec![0.0; width];
            for (row, _) in rows.iter().zip(assignments).filter(|&(_, &a)| a == segment) {
                for (s, v) in sums.iter_mut().zip(row) {
                    *s += v;
                }
            }
            let feature_means = if size == 0 {
                vec![f64::NAN; width]
            } else {
                sums.into_iter().map(|s| s / size as f64).collect()
            };
            SegmentProfile {
                segment,
                size,
                share: size as f64 / total,
                feature_means,
            }
        })
        .collect()
}

fn segment_insights(
    feature_names: &[String],
    profiles: &[SegmentProfile],
    original_centers: &[Vec<f64>],
) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(largest) = profiles.iter().max_by_key(|p| p.size) {
        out.push(format!(
            "Segment {} is the largest with {} records ({:.1}%)",
            largest.segment,
            largest.size,
            largest.share * 100.0
        ));
    }
    for (f, name) in feature_names.iter().enumerate() {
        let top = original_centers
            .iter()
            .enumerate()
            .max_by(|a, b| a.1[f].total_cmp(&b.1[f]));
        if let Some((segment, center)) = top {
            out.push(format!(
                "Segment {} has the highest average {} ({:.2})",
                segment, name, center[f]
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn blobs() -> DataFrame {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..10 {
            let jitter = (i % 3) as f64 * 0.1;
            x.push(1.0 + jitter);
            y.push(1.0 - jitter);
            x.push(10.0 + jitter);
            y.push(10.0 + jitter);
        }
        DataFrame::new(vec![Series::new("x", x), Series::new("y", y)]).unwrap()
    }

    fn segmenter() -> Segmenter {
        Segmenter::new(&SegmentationConfig::default())
    }

    #[test]
    fn test_two_blobs_split_cleanly() {
        let seg = segmenter().segment(&blobs(), &["x", "y"], 2).unwrap();
        assert_eq!(seg.k(), 2);
        assert_eq!(seg.sizes.iter().sum::<usize>(), 20);
        assert_eq!(seg.sizes, vec![10, 10]);
        // Rows alternate between blobs
        assert_ne!(seg.assignments[0], seg.assignments[1]);
        assert!(seg.assignments.iter().step_by(2).all(|&a| a == seg.assignments[0]));
    }

    #[rstest]
    #[case(10, true)]
    #[case(11, false)]
    fn test_two_k_rule(#[case] k: usize, #[case] ok: bool) {
        let result = segmenter().segment(&blobs(), &["x", "y"], k);
        assert_eq!(result.is_ok(), ok);
        if let Ok(seg) = result {
            assert_eq!(seg.centers.len(), k);
        }
    }

    #[test]
    fn test_unknown_feature() {
        let err = segmenter().segment(&blobs(), &["z"], 2).unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter(_)));
    }

    #[test]
    fn test_seeded_runs_match() {
        let a = segmenter().segment(&blobs(), &["x", "y"], 3).unwrap();
        let b = segmenter().segment(&blobs(), &["x", "y"], 3).unwrap();
        assert_eq!(a.assignments, b.assignments);
        assert_eq!(a.iterations, b.iterations);
        assert_eq!(a.inertia, b.inertia);
    }
}

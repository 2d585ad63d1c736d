//! Isolation forest over one-dimensional values
//!
//! Points that random axis splits separate in few steps are outliers. The
//! anomaly score is `2^(-E[h(x)] / c(ψ))`, where `h` is the path length in
//! one tree and `c(ψ)` the expected path length of an unsuccessful search in
//! a binary tree over `ψ` points. Scores near 1 are anomalous; scores well
//! below 0.5 are normal.

use crate::error::{EngineError, Result};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Expected path length of an unsuccessful binary-search-tree lookup
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Uniform split in `[min, max)`; a range too wide for `f64` is interpolated
/// so both ends stay finite
fn split_point(min: f64, max: f64, rng: &mut StdRng) -> f64 {
    if (max - min).is_finite() {
        return rng.gen_range(min..max);
    }
    let u: f64 = rng.gen();
    min * (1.0 - u) + max * u
}

#[derive(Debug, Clone)]
enum Node {
    Leaf { size: usize },
    Split { threshold: f64, left: Box<Node>, right: Box<Node> },
}

impl Node {
    fn build(values: &[f64], depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
        if values.len() <= 1 || depth >= max_depth {
            return Node::Leaf { size: values.len() };
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max - min <= f64::EPSILON * max.abs().max(1.0) {
            return Node::Leaf { size: values.len() };
        }

        let threshold = split_point(min, max, rng);
        let (left, right): (Vec<f64>, Vec<f64>) = values.iter().copied().partition(|&v| v < threshold);
        Node::Split {
            threshold,
            left: Box::new(Node::build(&left, depth + 1, max_depth, rng)),
            right: Box::new(Node::build(&right, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(&self, value: f64, depth: usize) -> f64 {
        match self {
            Node::Leaf { size } => depth as f64 + average_path_length(*size),
            Node::Split {
                threshold,
                left,
                right,
            } => {
                if value < *threshold {
                    left.path_length(value, depth + 1)
                } else {
                    right.path_length(value, depth + 1)
                }
            }
        }
    }
}

/// Forest hyper-parameters
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: usize,
    sample_size: usize,
    seed: u64,
}

/// Fitted forest
#[derive(Debug, Clone)]
pub struct TrainedIsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
}

impl IsolationForest {
    pub fn new(trees: usize, sample_size: usize, seed: u64) -> Result<Self> {
        if trees == 0 || sample_size < 2 {
            return Err(EngineError::InvalidParameter(format!(
                "Isolation forest needs trees > 0 and sample size >= 2, got {} and {}",
                trees, sample_size
            )));
        }
        Ok(Self {
            trees,
            sample_size,
            seed,
        })
    }

    /// Grow the forest; the same seed and data always give the same trees
    pub fn fit(&self, values: &[f64]) -> Result<TrainedIsolationForest> {
        if values.len() < 2 {
            return Err(EngineError::InsufficientData {
                required: 2,
                actual: values.len(),
            });
        }

        let psi = self.sample_size.min(values.len());
        let max_depth = (psi as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let trees = (0..self.trees)
            .map(|_| {
                let subsample: Vec<f64> = sample(&mut rng, values.len(), psi)
                    .into_iter()
                    .map(|i| values[i])
                    .collect();
                Node::build(&subsample, 0, max_depth, &mut rng)
            })
            .collect();

        Ok(TrainedIsolationForest {
            trees,
            sample_size: psi,
        })
    }
}

impl TrainedIsolationForest {
    /// Anomaly score in `(0, 1]`
    pub fn score(&self, value: f64) -> f64 {
        let mean_path = self
            .trees
            .iter()
            .map(|t| t.path_length(value, 0))
            .sum::<f64>()
            / self.trees.len() as f64;
        let c = average_path_length(self.sample_size);
        if c <= 0.0 {
            return 0.5;
        }
        2f64.powf(-mean_path / c)
    }

    pub fn scores(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.score(v)).collect()
    }
}

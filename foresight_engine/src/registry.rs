//! Model registry and trainer
//!
//! The registry is an explicit object owned by the host application and
//! passed by reference into every engine call. For each task it keeps:
//! - the task definition (kind, metric, algorithm set)
//! - every trained version, never mutated once stored
//! - the active version per algorithm
//!
//! Training for a task happens only while holding that task's advisory lock,
//! obtained through [`ModelRegistry::with_task_lock`]. Reading an already
//! trained model needs no task lock.

use crate::config::TrainingConfig;
use crate::error::{EngineError, Result};
use crate::metrics::{residual_std, ClassificationMetrics, PerformanceMetrics, RegressionMetrics};
use crate::models::{predict_at, AlgorithmKind, AlgorithmTag, ModelParameters, Predictor, TrainedModel, TrainingSet};
use crate::utils::{chronological_split, random_split, rolling_origin_folds};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// What a task predicts; decides sample minimums and split strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Ordered metric history; chronological splits only
    Forecasting,
    /// Independent opportunity outcomes; random splits allowed
    Scoring,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Forecasting => write!(f, "forecasting"),
            TaskKind::Scoring => write!(f, "scoring"),
        }
    }
}

/// Registered task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub task_id: String,
    pub kind: TaskKind,
    /// Metric a forecasting task reads its history from
    pub metric_name: Option<String>,
    pub algorithms: Vec<AlgorithmKind>,
}

impl TaskSpec {
    pub fn forecasting(
        task_id: impl Into<String>,
        metric_name: impl Into<String>,
        algorithms: Vec<AlgorithmKind>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            kind: TaskKind::Forecasting,
            metric_name: Some(metric_name.into()),
            algorithms,
        }
    }

    pub fn scoring(task_id: impl Into<String>, algorithm: AlgorithmKind) -> Self {
        Self {
            task_id: task_id.into(),
            kind: TaskKind::Scoring,
            metric_name: None,
            algorithms: vec![algorithm],
        }
    }
}

#[derive(Debug)]
struct TaskEntry {
    spec: TaskSpec,
    versions: Vec<Arc<TrainedModel>>,
    active: BTreeMap<AlgorithmTag, u32>,
}

impl TaskEntry {
    fn find(&self, tag: AlgorithmTag, version: u32) -> Option<&Arc<TrainedModel>> {
        self.versions
            .iter()
            .find(|m| m.version == version && m.algorithm.tag() == tag)
    }
}

/// Proof that the caller holds a task's training lock.
///
/// Only [`ModelRegistry::with_task_lock`] creates one, and it lives no longer
/// than the closure it is handed to.
#[derive(Debug)]
pub struct TaskLock {
    task_id: String,
}

impl TaskLock {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }
}

/// One row of the registry performance summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub task_id: String,
    pub algorithm: AlgorithmTag,
    pub version: u32,
    pub r2: f64,
    pub mae: f64,
    pub training_samples: usize,
}

/// Snapshot of what the registry holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySummary {
    /// Stored versions across all tasks
    pub models_trained: usize,
    /// Active models only
    pub active: Vec<ModelSummary>,
}

/// Versioned model store with per-task training locks
#[derive(Debug, Default)]
pub struct ModelRegistry {
    config: TrainingConfig,
    entries: RwLock<HashMap<String, TaskEntry>>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ModelRegistry {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Register a task, or replace the definition of an existing one while
    /// keeping its stored versions
    pub fn register_task(&self, spec: TaskSpec) -> Result<()> {
        if spec.task_id.trim().is_empty() {
            return Err(EngineError::InvalidParameter(
                "Task id must not be empty".to_string(),
            ));
        }
        if spec.algorithms.is_empty() {
            return Err(EngineError::InvalidParameter(format!(
                "Task {} has no algorithms",
                spec.task_id
            )));
        }
        if spec.kind == TaskKind::Forecasting && spec.metric_name.is_none() {
            return Err(EngineError::InvalidParameter(format!(
                "Forecasting task {} needs a metric name",
                spec.task_id
            )));
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get_mut(&spec.task_id) {
            Some(entry) => entry.spec = spec,
            None => {
                debug!("Registered {} task {}", spec.kind, spec.task_id);
                entries.insert(
                    spec.task_id.clone(),
                    TaskEntry {
                        spec,
                        versions: Vec::new(),
                        active: BTreeMap::new(),
                    },
                );
            }
        }
        Ok(())
    }

    pub fn task(&self, task_id: &str) -> Option<TaskSpec> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(task_id).map(|e| e.spec.clone())
    }

    /// Run `f` while holding the task's training lock.
    ///
    /// The lock is released when `f` returns, errors or panics. Calls for
    /// different tasks never wait on each other.
    pub fn with_task_lock<T, F>(&self, task_id: &str, f: F) -> Result<T>
    where
        F: FnOnce(&TaskLock) -> Result<T>,
    {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(task_id.to_string()).or_default())
        };
        let _guard = mutex.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = TaskLock {
            task_id: task_id.to_string(),
        };
        f(&lock)
    }

    /// Train one algorithm for the locked task and make the result active.
    ///
    /// Forecasting tasks split chronologically; scoring tasks shuffle with
    /// the configured seed (series models always split chronologically).
    /// The stored model is refitted on the full set after validation.
    pub fn train(
        &self,
        lock: &TaskLock,
        algorithm: &AlgorithmKind,
        set: &TrainingSet,
        validation_split: f64,
    ) -> Result<Arc<TrainedModel>> {
        let task_id = lock.task_id();
        let spec = self
            .task(task_id)
            .ok_or_else(|| EngineError::UnknownTask(task_id.to_string()))?;

        let required = self.min_samples(spec.kind, algorithm);
        if set.len() < required {
            return Err(EngineError::InsufficientSamples {
                required,
                actual: set.len(),
            });
        }

        let chronological = spec.kind == TaskKind::Forecasting || algorithm.is_series_model();
        let (train_idx, valid_idx) = if chronological {
            chronological_split(set.len(), validation_split)?
        } else {
            random_split(set.len(), validation_split, self.config.seed)?
        };

        let holdout = if chronological {
            set.head(train_idx.len())
        } else {
            set.select(&train_idx)
        };
        let params = algorithm.fit(&holdout)?;

        let mut actual = Vec::with_capacity(valid_idx.len());
        let mut predicted = Vec::with_capacity(valid_idx.len());
        for &i in &valid_idx {
            actual.push(set.targets[i]);
            predicted.push(predict_at(&params, set, i)?);
        }

        let regression = RegressionMetrics::evaluate(&actual, &predicted);
        let classification = algorithm
            .is_classifier()
            .then(|| ClassificationMetrics::evaluate(&actual, &predicted));

        let residual_std = if spec.kind == TaskKind::Forecasting {
            self.cross_validated_residual_std(algorithm, set, train_idx.len())
                .unwrap_or_else(|| holdout_residual_std(&actual, &predicted))
        } else {
            holdout_residual_std(&actual, &predicted)
        };

        let final_params = algorithm.fit(set)?;
        let feature_importance = final_params.feature_importance().map(|weights| {
            set.schema
                .features
                .iter()
                .cloned()
                .zip(weights)
                .collect::<BTreeMap<String, f64>>()
        });

        let metrics = PerformanceMetrics {
            regression,
            classification,
            residual_std,
            feature_importance,
            validation_samples: valid_idx.len(),
        };

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = entries
            .get_mut(task_id)
            .ok_or_else(|| EngineError::UnknownTask(task_id.to_string()))?;
        let version = entry.versions.iter().map(|m| m.version).max().unwrap_or(0) + 1;

        let model = Arc::new(TrainedModel {
            task_id: task_id.to_string(),
            version,
            algorithm: algorithm.clone(),
            schema: set.schema.clone(),
            parameters: final_params,
            metrics,
            trained_at: Utc::now(),
            training_samples: set.len(),
            seasonal_strength: set.seasonal_strength,
        });

        info!(
            "Trained {} v{} for {} on {} samples (R²={:.3}, MAE={:.3}, σ={:.3})",
            algorithm.name(),
            version,
            task_id,
            set.len(),
            model.metrics.regression.r2,
            model.metrics.regression.mae,
            model.metrics.residual_std
        );

        entry.versions.push(Arc::clone(&model));
        entry.active.insert(algorithm.tag(), version);
        Ok(model)
    }

    /// Train several algorithms one after another.
    ///
    /// A failing fit is reported in its slot and does not stop the others.
    /// `cancel` is checked before each fit; once set, the remaining fits are
    /// skipped and `Cancelled` is returned. Models already stored stay.
    pub fn train_all(
        &self,
        lock: &TaskLock,
        jobs: &[(AlgorithmKind, TrainingSet)],
        validation_split: f64,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<(AlgorithmKind, Result<Arc<TrainedModel>>)>> {
        let mut results = Vec::with_capacity(jobs.len());
        for (algorithm, set) in jobs {
            if cancel.map_or(false, |c| c.load(Ordering::SeqCst)) {
                warn!(
                    "Training for {} cancelled after {} of {} fits",
                    lock.task_id(),
                    results.len(),
                    jobs.len()
                );
                return Err(EngineError::Cancelled(lock.task_id().to_string()));
            }
            let outcome = self.train(lock, algorithm, set, validation_split);
            if let Err(e) = &outcome {
                warn!("{} failed for {}: {}", algorithm.name(), lock.task_id(), e);
            }
            results.push((algorithm.clone(), outcome));
        }
        Ok(results)
    }

    /// Active model of one algorithm
    pub fn active(&self, task_id: &str, tag: AlgorithmTag) -> Option<Arc<TrainedModel>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(task_id)?;
        let version = *entry.active.get(&tag)?;
        entry.find(tag, version).cloned()
    }

    /// Active models of the task's registered algorithms, in registration order
    pub fn active_models(&self, task_id: &str) -> Vec<Arc<TrainedModel>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = entries.get(task_id) else {
            return Vec::new();
        };
        entry
            .spec
            .algorithms
            .iter()
            .filter_map(|kind| {
                let tag = kind.tag();
                entry
                    .active
                    .get(&tag)
                    .and_then(|&v| entry.find(tag, v))
                    .cloned()
            })
            .collect()
    }

    /// Every stored version of a task, oldest first
    pub fn versions(&self, task_id: &str) -> Vec<Arc<TrainedModel>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(task_id)
            .map(|e| e.versions.clone())
            .unwrap_or_default()
    }

    /// Point an algorithm's active slot back to an earlier stored version
    pub fn rollback(&self, task_id: &str, tag: AlgorithmTag, version: u32) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = entries
            .get_mut(task_id)
            .ok_or_else(|| EngineError::UnknownTask(task_id.to_string()))?;
        if entry.find(tag, version).is_none() {
            return Err(EngineError::InvalidParameter(format!(
                "Task {} has no {} model at version {}",
                task_id, tag, version
            )));
        }
        info!("Rolled {} {} back to v{}", task_id, tag, version);
        entry.active.insert(tag, version);
        Ok(())
    }

    pub fn summary(&self) -> RegistrySummary {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut task_ids: Vec<&String> = entries.keys().collect();
        task_ids.sort();

        let mut active = Vec::new();
        for task_id in task_ids {
            let entry = &entries[task_id];
            for (&tag, &version) in &entry.active {
                if let Some(model) = entry.find(tag, version) {
                    active.push(ModelSummary {
                        task_id: task_id.clone(),
                        algorithm: tag,
                        version,
                        r2: model.metrics.regression.r2,
                        mae: model.metrics.regression.mae,
                        training_samples: model.training_samples,
                    });
                }
            }
        }

        RegistrySummary {
            models_trained: entries.values().map(|e| e.versions.len()).sum(),
            active,
        }
    }

    fn min_samples(&self, kind: TaskKind, algorithm: &AlgorithmKind) -> usize {
        if matches!(algorithm, AlgorithmKind::NaiveLastValue) {
            return self.config.baseline_min_samples;
        }
        match kind {
            TaskKind::Forecasting => self.config.forecasting_min_samples,
            TaskKind::Scoring => self.config.scoring_min_samples,
        }
    }

    /// Residual spread over rolling-origin folds; `None` when no fold fits
    fn cross_validated_residual_std(
        &self,
        algorithm: &AlgorithmKind,
        set: &TrainingSet,
        min_train: usize,
    ) -> Option<f64> {
        let mut residuals = Vec::new();
        for (start, end) in rolling_origin_folds(set.len(), self.config.cv_folds, min_train.max(2)) {
            let params: ModelParameters = match algorithm.fit(&set.head(start)) {
                Ok(p) => p,
                Err(e) => {
                    debug!("Skipping fold {}..{} of {}: {}", start, end, algorithm.name(), e);
                    continue;
                }
            };
            for i in start..end {
                if let Ok(p) = predict_at(&params, set, i) {
                    residuals.push(set.targets[i] - p);
                }
            }
        }
        (!residuals.is_empty()).then(|| residual_std(&residuals))
    }
}

fn holdout_residual_std(actual: &[f64], predicted: &[f64]) -> f64 {
    let residuals: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();
    residual_std(&residuals)
}

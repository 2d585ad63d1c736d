mod common;

use common::trending;
use foresight_engine::config::TrainingConfig;
use foresight_engine::models::ModelParameters;
use foresight_engine::registry::{TaskKind, TaskSpec};
use foresight_engine::{AlgorithmKind, AlgorithmTag, EngineError, ModelRegistry, TrainingSet};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

fn registry() -> ModelRegistry {
    let registry = ModelRegistry::default();
    registry
        .register_task(TaskSpec::forecasting(
            "revenue",
            "Revenue",
            vec![
                AlgorithmKind::LinearTrend,
                AlgorithmKind::ExponentialSmoothing { alpha: 0.3 },
            ],
        ))
        .unwrap();
    registry
}

fn train(registry: &ModelRegistry, kind: &AlgorithmKind, n: usize) -> foresight_engine::Result<u32> {
    let set = TrainingSet::series(&trending(n))?;
    registry
        .with_task_lock("revenue", |lock| registry.train(lock, kind, &set, 0.2))
        .map(|m| m.version)
}

#[test]
fn test_forecasting_minimum_samples() {
    let registry = registry();
    let err = train(&registry, &AlgorithmKind::LinearTrend, 9).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InsufficientSamples { required: 10, actual: 9 }
    ));
    assert!(train(&registry, &AlgorithmKind::LinearTrend, 10).is_ok());
    // The naive baseline has no minimum
    assert!(train(&registry, &AlgorithmKind::NaiveLastValue, 2).is_ok());
}

#[test]
fn test_minimums_follow_training_config() {
    let registry = ModelRegistry::new(TrainingConfig {
        baseline_min_samples: 3,
        forecasting_min_samples: 6,
        ..TrainingConfig::default()
    });
    registry
        .register_task(TaskSpec::forecasting(
            "revenue",
            "Revenue",
            vec![AlgorithmKind::LinearTrend, AlgorithmKind::NaiveLastValue],
        ))
        .unwrap();

    assert!(train(&registry, &AlgorithmKind::LinearTrend, 6).is_ok());
    assert!(matches!(
        train(&registry, &AlgorithmKind::LinearTrend, 5),
        Err(EngineError::InsufficientSamples { required: 6, actual: 5 })
    ));
    assert!(matches!(
        train(&registry, &AlgorithmKind::NaiveLastValue, 2),
        Err(EngineError::InsufficientSamples { required: 3, actual: 2 })
    ));
}

#[test]
fn test_scoring_minimum_samples() {
    let registry = ModelRegistry::default();
    registry
        .register_task(TaskSpec::scoring("win", AlgorithmKind::Ridge { lambda: 1.0 }))
        .unwrap();
    assert_eq!(registry.task("win").unwrap().kind, TaskKind::Scoring);

    let rows: Vec<Vec<f64>> = (0..19).map(|i| vec![i as f64, (i % 3) as f64]).collect();
    let targets: Vec<f64> = (0..19).map(|i| (i % 2) as f64).collect();
    let schema = foresight_engine::FeatureSchema {
        name: "pair".to_string(),
        version: 1,
        features: vec!["a".to_string(), "b".to_string()],
    };
    let set = TrainingSet::new(schema, rows, targets).unwrap();

    let err = registry
        .with_task_lock("win", |lock| {
            registry.train(lock, &AlgorithmKind::Ridge { lambda: 1.0 }, &set, 0.2)
        })
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InsufficientSamples { required: 20, actual: 19 }
    ));
}

#[test]
fn test_retraining_keeps_old_versions() {
    let registry = registry();
    assert_eq!(train(&registry, &AlgorithmKind::LinearTrend, 12).unwrap(), 1);
    assert_eq!(train(&registry, &AlgorithmKind::LinearTrend, 16).unwrap(), 2);

    let versions = registry.versions("revenue");
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].training_samples, 12);
    assert_eq!(versions[1].training_samples, 16);

    registry.rollback("revenue", AlgorithmTag::LinearTrend, 1).unwrap();
    let active = registry.active("revenue", AlgorithmTag::LinearTrend).unwrap();
    assert_eq!(active.version, 1);
    assert_eq!(active.training_samples, 12);

    assert!(registry.rollback("revenue", AlgorithmTag::LinearTrend, 9).is_err());
}

#[test]
fn test_trained_model_records_its_algorithm() {
    let registry = registry();
    train(&registry, &AlgorithmKind::ExponentialSmoothing { alpha: 0.3 }, 12).unwrap();
    let model = registry
        .active("revenue", AlgorithmTag::ExponentialSmoothing)
        .unwrap();
    assert_eq!(model.algorithm, AlgorithmKind::ExponentialSmoothing { alpha: 0.3 });
    assert!(matches!(model.parameters, ModelParameters::ExponentialSmoothing(_)));
    assert_eq!(model.metrics.validation_samples, 2);
    assert!(model.metrics.residual_std.is_finite());
}

#[test]
fn test_summary_lists_active_models() {
    let registry = registry();
    train(&registry, &AlgorithmKind::LinearTrend, 12).unwrap();
    train(&registry, &AlgorithmKind::LinearTrend, 12).unwrap();
    train(&registry, &AlgorithmKind::ExponentialSmoothing { alpha: 0.3 }, 12).unwrap();

    let summary = registry.summary();
    assert_eq!(summary.models_trained, 3);
    assert_eq!(summary.active.len(), 2);
    assert!(summary.active.iter().all(|m| m.task_id == "revenue"));
}

#[test]
fn test_train_all_reports_each_fit() {
    let registry = registry();
    let good = TrainingSet::series(&trending(12)).unwrap();
    let short = TrainingSet::series(&trending(5)).unwrap();
    let jobs = vec![
        (AlgorithmKind::LinearTrend, good),
        (AlgorithmKind::ExponentialSmoothing { alpha: 0.3 }, short),
    ];

    let results = registry
        .with_task_lock("revenue", |lock| registry.train_all(lock, &jobs, 0.2, None))
        .unwrap();
    assert!(results[0].1.is_ok());
    assert!(matches!(
        results[1].1,
        Err(EngineError::InsufficientSamples { .. })
    ));
    assert_eq!(registry.active_models("revenue").len(), 1);
}

#[test]
fn test_cancellation_between_fits() {
    let registry = registry();
    let jobs = vec![(AlgorithmKind::LinearTrend, TrainingSet::series(&trending(12)).unwrap())];
    let cancel = AtomicBool::new(true);

    let err = registry
        .with_task_lock("revenue", |lock| {
            registry.train_all(lock, &jobs, 0.2, Some(&cancel))
        })
        .unwrap_err();
    assert!(matches!(err, EngineError::Cancelled(_)));
    assert!(registry.versions("revenue").is_empty());
}

#[test]
fn test_concurrent_training_serializes_versions() {
    let registry = Arc::new(registry());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || train(&registry, &AlgorithmKind::LinearTrend, 12).unwrap())
        })
        .collect();

    let mut versions: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    versions.sort_unstable();
    assert_eq!(versions, vec![1, 2, 3, 4]);
}

use approx::assert_relative_eq;
use foresight_engine::{AlgorithmKind, EngineConfig, EngineError, Foresight};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_config_file_round_trip() {
    let mut config = EngineConfig::default();
    config.forecast.algorithms = vec![AlgorithmKind::LinearTrend, AlgorithmKind::NaiveLastValue];
    config.benchmarks.insert("Pipeline".to_string(), 12.5);

    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", serde_json::to_string_pretty(&config).unwrap()).unwrap();

    let loaded = EngineConfig::from_json_file(file.path()).unwrap();
    assert_eq!(loaded.forecast.algorithms, config.forecast.algorithms);
    assert_eq!(loaded.benchmarks.get("Pipeline"), Some(&12.5));
    assert_eq!(loaded.vocabulary.sectors, config.vocabulary.sectors);
    assert!(Foresight::from_json_file(file.path()).is_ok());
}

#[test]
fn test_algorithm_tags_in_json() {
    let config = EngineConfig::from_json_str(
        r#"{ "forecast": { "algorithms": [
                { "kind": "exponential_smoothing", "alpha": 0.5 },
                { "kind": "gradient_boosting", "n_estimators": 20, "learning_rate": 0.2 }
           ] } }"#,
    )
    .unwrap();
    assert_eq!(
        config.forecast.algorithms,
        vec![
            AlgorithmKind::ExponentialSmoothing { alpha: 0.5 },
            AlgorithmKind::GradientBoosting {
                n_estimators: 20,
                learning_rate: 0.2
            },
        ]
    );
}

#[test]
fn test_z_score_for_confidence_level() {
    let config = EngineConfig::default();
    assert_relative_eq!(config.forecast.z_score().unwrap(), 1.959964, epsilon = 1e-5);
}

#[test]
fn test_invalid_split_rejected() {
    let err = EngineConfig::from_json_str(r#"{ "forecast": { "validation_split": 0.7 } }"#).unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));

    let mut config = EngineConfig::default();
    config.segmentation.max_iterations = 0;
    assert!(matches!(Foresight::new(config), Err(EngineError::Config(_))));
}

#[test]
fn test_sample_minimums_from_json() {
    let config = EngineConfig::from_json_str(
        r#"{ "training": { "baseline_min_samples": 2, "scoring_min_samples": 30 } }"#,
    )
    .unwrap();
    assert_eq!(config.training.baseline_min_samples, 2);
    assert_eq!(config.training.scoring_min_samples, 30);
    assert_eq!(config.training.forecasting_min_samples, 10);

    let err = EngineConfig::from_json_str(r#"{ "training": { "baseline_min_samples": 0 } }"#).unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
}

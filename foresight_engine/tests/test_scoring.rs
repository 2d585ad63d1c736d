mod common;

use common::{labeled_history, opportunity};
use foresight_engine::scoring::{Direction, Factor};
use foresight_engine::{AlgorithmKind, EngineConfig, EngineError, Foresight, ModelRegistry};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn trained() -> (Foresight, ModelRegistry) {
    let engine = Foresight::new(EngineConfig::default()).unwrap();
    let registry = engine.new_registry();
    engine.train_scoring(&registry, &labeled_history(60)).unwrap();
    (engine, registry)
}

#[rstest]
#[case(0.0)]
#[case(1.0)]
#[case(3_000_000.0)]
#[case(1e12)]
fn test_probability_is_clamped(#[case] value: f64) {
    let (engine, registry) = trained();
    for complexity in [1.0, 5.0, 10.0] {
        let opp = opportunity("extreme", value, "Government", complexity);
        let score = engine.score_opportunity(&registry, &opp).unwrap();
        assert!(
            (0.05..=0.95).contains(&score.probability),
            "probability {} for value {}",
            score.probability,
            value
        );
        assert!((0.0..=1.0).contains(&score.confidence));
    }
}

#[test]
fn test_repeated_scoring_is_identical() {
    let (engine, registry) = trained();
    let opp = opportunity("gov-3m", 3_000_000.0, "Government", 5.0);

    let first = engine.score_opportunity(&registry, &opp).unwrap();
    let second = engine.score_opportunity(&registry, &opp).unwrap();
    assert_eq!(first.probability, second.probability);
    assert_eq!(first.factor_breakdown, second.factor_breakdown);
    assert_eq!(first.recommendations, second.recommendations);
    assert_eq!(first.model, second.model);
}

#[test]
fn test_factor_breakdown_for_government_deal() {
    let (engine, registry) = trained();
    let score = engine
        .score_opportunity(&registry, &opportunity("gov-3m", 3_000_000.0, "Government", 5.0))
        .unwrap();

    let factors: Vec<(Factor, &str, Direction)> = score
        .factor_breakdown
        .iter()
        .map(|f| (f.factor, f.rating.as_str(), f.direction))
        .collect();
    assert_eq!(
        factors,
        vec![
            (Factor::ValueTier, "Positive", Direction::Favourable),
            (Factor::RelationshipStrength, "Strong", Direction::Favourable),
            (Factor::TechnicalComplexity, "Low", Direction::Unfavourable),
        ]
    );
    assert!(score
        .recommendations
        .last()
        .unwrap()
        .contains("government regulations"));
}

#[test]
fn test_neutral_fallback_without_model() {
    let engine = Foresight::new(EngineConfig::default()).unwrap();
    let registry = engine.new_registry();
    let opp = opportunity("new", 2_000_000.0, "Banking", 4.0);

    assert!(matches!(
        engine.score_opportunity(&registry, &opp),
        Err(EngineError::ModelNotTrained(_))
    ));
    let neutral = engine.score_or_neutral(&registry, &opp).unwrap();
    assert_eq!(neutral.probability, 0.5);
    assert!(neutral.model.is_none());
}

#[test]
fn test_too_little_history() {
    let engine = Foresight::new(EngineConfig::default()).unwrap();
    let registry = engine.new_registry();
    let err = engine.train_scoring(&registry, &labeled_history(12)).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InsufficientSamples { required: 20, actual: 12 }
    ));
}

#[test]
fn test_logistic_scoring_reports_classification_metrics() {
    let mut config = EngineConfig::default();
    config.scoring.algorithm = AlgorithmKind::Logistic {
        lambda: 0.1,
        epochs: 500,
        learning_rate: 0.1,
    };
    let engine = Foresight::new(config).unwrap();
    let registry = engine.new_registry();
    let model = engine.train_scoring(&registry, &labeled_history(60)).unwrap();

    assert!(model.metrics.classification.is_some());
    let score = engine
        .score_opportunity(&registry, &opportunity("x", 4_000_000.0, "Oil & Gas", 3.0))
        .unwrap();
    assert!((0.05..=0.95).contains(&score.probability));
}

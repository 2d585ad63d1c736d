mod common;

use common::{monthly, opportunity};
use foresight_engine::features::{FeatureKey, DROPPED_LEADING_ROWS};
use foresight_engine::{EngineConfig, EngineError, FeatureBuilder, FeatureSchema};
use rstest::rstest;

fn builder() -> FeatureBuilder {
    FeatureBuilder::new(&EngineConfig::default())
}

#[rstest]
#[case(2, 0)]
#[case(6, 1)]
#[case(12, 7)]
#[case(24, 19)]
fn test_leading_rows_dropped(#[case] n: usize, #[case] expected: usize) {
    let values: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
    let rows = builder()
        .build_time_series_features(&monthly("Revenue", &values))
        .unwrap();
    assert_eq!(rows.len(), expected);
    assert_eq!(rows.len(), n.saturating_sub(DROPPED_LEADING_ROWS));
}

#[test]
fn test_single_observation_is_insufficient() {
    let err = builder()
        .build_time_series_features(&monthly("Revenue", &[1.0]))
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientData { required: 2, actual: 1 }));
}

#[test]
fn test_rows_are_keyed_by_observation() {
    let values: Vec<f64> = (0..8).map(|i| 10.0 * (i + 1) as f64).collect();
    let rows = builder()
        .build_time_series_features(&monthly("Revenue", &values))
        .unwrap();
    let schema = FeatureSchema::time_series();

    // First row is the sixth observation (June 2022)
    match &rows[0].key {
        FeatureKey::Observation { metric_name, timestamp } => {
            assert_eq!(metric_name, "Revenue");
            assert_eq!(timestamp.format("%Y-%m").to_string(), "2022-06");
        }
        other => panic!("unexpected key {:?}", other),
    }
    assert_eq!(rows[0].schema, schema.id());
    assert_eq!(rows[0].get(&schema, "lag_1"), Some(50.0));
    assert_eq!(rows[0].get(&schema, "lag_2"), Some(40.0));
    assert_eq!(rows[0].get(&schema, "quarter"), Some(2.0));
    assert!(rows.iter().all(|r| r.values.len() == schema.len()));
}

#[test]
fn test_opportunity_features_are_deterministic() {
    let opp = opportunity("opp-1", 3_000_000.0, "Government", 5.0);
    let a = builder().build_opportunity_features(&opp);
    let b = builder().build_opportunity_features(&opp);
    assert_eq!(a, b);

    let schema = FeatureSchema::opportunity();
    // Government default relationship applies when none is given
    assert_eq!(a.get(&schema, "relationship_score"), Some(8.0));
    assert_eq!(a.get(&schema, "technical_complexity"), Some(5.0));
}

#[test]
fn test_unseen_categories_use_unknown_code() {
    let mut opp = opportunity("opp-2", 1_000_000.0, "Space Mining", 3.0);
    opp.competitive_level = "Ferocious".to_string();
    opp.category = "Unlisted".to_string();

    let vector = builder().build_opportunity_features(&opp);
    let schema = FeatureSchema::opportunity();
    assert_eq!(vector.get(&schema, "sector_code"), Some(0.0));
    assert_eq!(vector.get(&schema, "competition_code"), Some(0.0));
    assert_eq!(vector.get(&schema, "category_code"), Some(0.0));
}

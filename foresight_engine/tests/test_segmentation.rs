use foresight_engine::{EngineConfig, EngineError, Foresight};
use polars::prelude::*;
use rstest::rstest;

fn customers(n: usize) -> DataFrame {
    let revenue: Vec<f64> = (0..n)
        .map(|i| if i % 3 == 0 { 50_000.0 } else { 5_000.0 } + (i * 37 % 11) as f64 * 100.0)
        .collect();
    let tenure: Vec<Option<f64>> = (0..n)
        .map(|i| if i == 1 { None } else { Some(if i % 3 == 0 { 60.0 } else { 6.0 } + (i % 4) as f64) })
        .collect();
    DataFrame::new(vec![
        Series::new("revenue", revenue),
        Series::new("tenure", tenure),
        Series::new("region", (0..n).map(|i| format!("r{}", i % 2)).collect::<Vec<_>>()),
    ])
    .unwrap()
}

fn engine() -> Foresight {
    Foresight::new(EngineConfig::default()).unwrap()
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(4)]
fn test_exactly_k_centers(#[case] k: usize) {
    let seg = engine().segment(&customers(30), &["revenue", "tenure"], k).unwrap();
    assert_eq!(seg.centers.len(), k);
    assert_eq!(seg.original_centers.len(), k);
    assert_eq!(seg.sizes.len(), k);
    assert_eq!(seg.profiles.len(), k);
    // The row with a missing tenure is dropped
    assert_eq!(seg.assignments.len(), 29);
    assert!(!seg.row_indexes.contains(&1));
    assert!(seg.assignments.iter().all(|&a| a < k));
}

#[test]
fn test_two_k_rule_counts_complete_rows() {
    // Nine rows, one incomplete: eight usable
    let err = engine()
        .segment(&customers(9), &["revenue", "tenure"], 5)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InsufficientDataForSegmentation { required: 10, actual: 8 }
    ));
    assert!(engine().segment(&customers(9), &["revenue", "tenure"], 4).is_ok());
}

#[test]
fn test_groups_follow_the_data() {
    let seg = engine().segment(&customers(30), &["revenue", "tenure"], 2).unwrap();
    let big_rows: Vec<usize> = seg
        .row_indexes
        .iter()
        .zip(&seg.assignments)
        .filter(|(row, _)| *row % 3 == 0)
        .map(|(_, &a)| a)
        .collect();
    assert!(big_rows.iter().all(|&a| a == big_rows[0]));
    assert_eq!(seg.sizes[big_rows[0]], 10);
    assert!(seg.original_centers[big_rows[0]][0] > 40_000.0);
    assert!(!seg.insights.is_empty());
}

#[test]
fn test_invalid_requests() {
    assert!(matches!(
        engine().segment(&customers(10), &["revenue"], 0),
        Err(EngineError::InvalidParameter(_))
    ));
    assert!(matches!(
        engine().segment(&customers(10), &["region"], 2),
        Err(EngineError::InvalidParameter(_))
    ));
}

use foresight_engine::data::{parse_timestamp, DataLoader, ObservationStore, TimeSeriesObservation};
use foresight_engine::EngineError;
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_data_loader_from_csv() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "timestamp,metric_name,value,source_tag").unwrap();
    writeln!(file, "2024-02-01,Revenue,1100000.0,erp").unwrap();
    writeln!(file, "2024-01-01,Revenue,1000000.0,erp").unwrap();
    writeln!(file, "2024-01-01T00:00:00Z,GP_Margin,24.5,finance").unwrap();
    writeln!(file, "2024-03-01, Revenue ,1200000.0,erp").unwrap();

    let store = DataLoader::from_csv(file.path()).unwrap();

    assert_eq!(store.len("Revenue"), 3);
    assert_eq!(store.len("GP_Margin"), 1);
    // Rows are ordered per metric regardless of file order
    assert_eq!(store.values("Revenue"), vec![1_000_000.0, 1_100_000.0, 1_200_000.0]);
    assert_eq!(store.metrics().collect::<Vec<_>>(), vec!["GP_Margin", "Revenue"]);
}

#[test]
fn test_loader_rejects_bad_rows() {
    let bad_value = "timestamp,metric_name,value,source_tag\n2024-01-01,Revenue,abc,erp\n";
    assert!(matches!(
        DataLoader::from_reader(bad_value.as_bytes()),
        Err(EngineError::Csv(_))
    ));

    let bad_date = "timestamp,metric_name,value,source_tag\nJanuary,Revenue,1.0,erp\n";
    assert!(matches!(
        DataLoader::from_reader(bad_date.as_bytes()),
        Err(EngineError::InvalidParameter(_))
    ));
}

#[test]
fn test_store_append_only() {
    let mut store = ObservationStore::new();
    let jan = parse_timestamp("2024-01-01").unwrap();
    let feb = parse_timestamp("2024-02-01").unwrap();

    store.append(TimeSeriesObservation::new(feb, "Revenue", 2.0, "erp")).unwrap();
    let err = store
        .append(TimeSeriesObservation::new(jan, "Revenue", 1.0, "erp"))
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidParameter(_)));

    // Other metrics keep their own order
    store.append(TimeSeriesObservation::new(jan, "GP_Margin", 25.0, "erp")).unwrap();
    assert_eq!(store.series("Revenue").len(), 1);
    assert!(!store.is_empty());
}

#[test]
fn test_parse_timestamp_formats() {
    let a = parse_timestamp("2024-05-01").unwrap();
    let b = parse_timestamp("2024-05-01T00:00:00+00:00").unwrap();
    assert_eq!(a, b);
    assert!(parse_timestamp("05/01/2024").is_err());
}

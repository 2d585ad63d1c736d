use foresight_engine::error::EngineError;
use foresight_engine::{DataLoader, EngineConfig};
use std::io;

#[test]
fn test_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    let engine_error = EngineError::from(io_error);
    assert!(matches!(engine_error, EngineError::Io(_)));

    let json_error = serde_json::from_str::<EngineConfig>("{ not json").unwrap_err();
    let engine_error = EngineError::from(json_error);
    assert!(matches!(engine_error, EngineError::Json(_)));
}

#[test]
fn test_error_display() {
    let error = EngineError::InvalidParameter("alpha must be between 0 and 1".to_string());
    assert!(error.to_string().contains("alpha must be between 0 and 1"));

    let error = EngineError::from(io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"));
    let error_string = error.to_string();
    assert!(error_string.contains("IO error"));
    assert!(error_string.contains("permission denied"));

    let error = EngineError::InsufficientDataForSegmentation {
        required: 10,
        actual: 7,
    };
    assert_eq!(
        error.to_string(),
        "Insufficient data for segmentation: need 10 records, got 7"
    );
}

#[test]
fn test_recoverable_outcomes() {
    let recoverable = [
        EngineError::InsufficientData { required: 2, actual: 1 },
        EngineError::InsufficientSamples { required: 20, actual: 5 },
        EngineError::TrainingError("singular".to_string()),
        EngineError::ModelNotTrained("win_probability".to_string()),
    ];
    assert!(recoverable.iter().all(EngineError::is_recoverable));

    let faults = [
        EngineError::UnknownTask("missing".to_string()),
        EngineError::Config("bad".to_string()),
        EngineError::Cancelled("rev".to_string()),
    ];
    assert!(faults.iter().all(|e| !e.is_recoverable()));
}

#[test]
fn test_missing_file_maps_to_io() {
    let result = DataLoader::from_csv("/nonexistent/path/metrics.csv");
    assert!(matches!(result, Err(EngineError::Io(_))));
}

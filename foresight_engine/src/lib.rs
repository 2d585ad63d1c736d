//! # Foresight Engine
//!
//! Predictive analytics over business metrics and sales opportunities.
//!
//! ## Features
//!
//! - Feature engineering for monthly metric series and opportunities
//! - Versioned model registry with per-task training locks and rollback
//! - Ensemble forecasting with seasonal scaling and confidence bands
//! - Opportunity win-probability scoring with factor breakdowns
//! - Anomaly detection (isolation forest, z-score, seasonal) with fusion
//! - Templated insights, correlation analysis and k-means segmentation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use foresight_engine::{DataLoader, EngineConfig, Foresight};
//!
//! let engine = Foresight::new(EngineConfig::default())?;
//! let registry = engine.new_registry();
//! let store = DataLoader::from_csv("metrics.csv")?;
//!
//! engine.register_forecast(&registry, "revenue-monthly", "Revenue")?;
//! let forecast = engine.forecast(&registry, &store, "revenue-monthly", 6)?;
//! println!("{}", forecast.to_json()?);
//!
//! for insight in engine.summarize(&store, "Revenue") {
//!     println!("{}: {}", insight.title, insight.statement);
//! }
//! # Ok::<(), foresight_engine::EngineError>(())
//! ```

pub mod anomaly;
pub mod config;
pub mod correlation;
pub mod data;
pub mod engine;
pub mod error;
pub mod features;
pub mod forecast;
pub mod insights;
pub mod metrics;
pub mod models;
pub mod registry;
pub mod scoring;
pub mod segmentation;
pub mod utils;

// Re-export commonly used types
pub use crate::anomaly::{AnomalyDetector, AnomalyLevel, AnomalyRecord, AnomalyReport, DetectorKind};
pub use crate::config::EngineConfig;
pub use crate::correlation::CorrelationMatrix;
pub use crate::data::{DataLoader, LabeledOpportunity, ObservationStore, Opportunity, TimeSeriesObservation};
pub use crate::engine::{CorrelationReport, Foresight};
pub use crate::error::{EngineError, Result};
pub use crate::features::{FeatureBuilder, FeatureSchema, FeatureVector};
pub use crate::forecast::{ForecastEngine, ForecastResult};
pub use crate::insights::{Insight, InsightGenerator, InsightKind};
pub use crate::models::{AlgorithmKind, AlgorithmTag, TrainedModel, TrainingSet};
pub use crate::registry::{ModelRegistry, TaskSpec};
pub use crate::scoring::{ScoreResult, ScoringEngine};
pub use crate::segmentation::{Segmentation, Segmenter};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

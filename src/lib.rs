//! # Foresight
//!
//! Workspace facade over the predictive-analytics crates:
//!
//! - [`math`]: statistics, rolling windows, regression and smoothing
//! - [`engine`]: forecasting, scoring, anomaly detection and insights
//!
//! ## Example
//!
//! ```
//! use foresight_workspace::engine::{EngineConfig, Foresight};
//!
//! let engine = Foresight::new(EngineConfig::default()).unwrap();
//! assert_eq!(engine.config().correlation_threshold, 0.6);
//! ```

pub use foresight_engine as engine;
pub use foresight_math as math;

pub use foresight_engine::{EngineConfig, EngineError, Foresight, ModelRegistry};

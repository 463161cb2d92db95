//! Baseline learning and anomaly detection.
//!
//! - [`baseline`]: Collects the startup samples and turns them into
//!   acceptance ranges
//! - [`evaluator`]: Checks each steady-state sample against those ranges
//! - [`alert_log`]: Append-only file recording learned ranges and alerts

pub mod alert_log;
pub mod baseline;
pub mod evaluator;

pub use alert_log::AlertLog;
pub use baseline::{compute_baseline, BaselineLearner, LearningConfig, MIN_SAMPLES};
pub use evaluator::{evaluate, AnomalyEvaluator};

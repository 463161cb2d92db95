//! # speedwatch
//!
//! A network throughput monitor that learns what "normal" looks like and
//! flags speed tests that fall outside it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           speedwatch                             │
//! │                                                                  │
//! │  ┌──────────────┐   measure()   ┌─────────────────────┐          │
//! │  │  SpeedProbe  │◀──────────────│ MeasurementExecutor │          │
//! │  │  (adapters)  │  retry/backoff└──────────┬──────────┘          │
//! │  └──────────────┘                          │                     │
//! │                                            ▼                     │
//! │  ┌─────────────────┐  learn()   ┌─────────────────────┐          │
//! │  │ BaselineLearner │───────────▶│      Scheduler      │          │
//! │  └─────────────────┘  arm()     │   (single-flight)   │          │
//! │                                 └──┬───────────────┬──┘          │
//! │                         publish()  │               │ process()   │
//! │                                    ▼               ▼             │
//! │                         ┌────────────────┐ ┌──────────────────┐  │
//! │  StatusServer ◀─read()──│ StatePublisher │ │ AnomalyEvaluator │  │
//! │                         └────────────────┘ └────────┬─────────┘  │
//! │                                                     ▼            │
//! │                                       AlertLog + Notifier(s)     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`engine`]**: Retry policy, measurement executor, single-flight guard,
//!   scheduler and stop signal
//! - **[`analysis`]**: Baseline learning, anomaly evaluation and the alert log
//! - **[`data`]**: The published monitor state and its sample history
//! - **[`server`]**: HTTP status interface
//! - **[`config`]**: Layered settings and validation
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Learn from 5 samples, then monitor with the settings in speedwatch.toml
//! speedwatch --learning-runs 5
//!
//! # Show the effective configuration
//! speedwatch --config /etc/speedwatch.toml --print-config
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use speedwatch::{
//!     AnomalyEvaluator, BaselineLearner, LearningConfig, MeasurementExecutor, Scheduler,
//!     Shutdown, StatePublisher,
//! };
//! use speedwatch_adapters::CommandProbe;
//!
//! # tokio_test::block_on(async {
//! let (_shutdown, stop) = Shutdown::new();
//! let publisher = StatePublisher::new(1440);
//! let executor = MeasurementExecutor::new(Arc::new(CommandProbe::speedtest_cli()), publisher.clone());
//! let scheduler = Scheduler::new(executor, publisher, Duration::from_secs(600), stop.clone());
//!
//! let learner = BaselineLearner::new(LearningConfig::default());
//! let baseline = learner.learn(|| scheduler.measure_exclusive(), &stop).await?;
//! scheduler.arm(AnomalyEvaluator::new(baseline));
//! scheduler.run().await;
//! # Ok::<(), speedwatch::LearnError>(())
//! # }).unwrap();
//! ```

pub mod analysis;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod server;

#[cfg(test)]
pub(crate) mod testing;

pub use analysis::{
    compute_baseline, evaluate, AlertLog, AnomalyEvaluator, BaselineLearner, LearningConfig,
};
pub use crate::config::Settings;
pub use data::{History, MonitorState, StatePublisher};
pub use engine::{
    Backoff, FlightGuard, MeasurementExecutor, RetryPolicy, Scheduler, SchedulerHandle, Shutdown,
    SingleFlight, StopSignal, TickOutcome, TriggerOutcome,
};
pub use error::{ConfigError, LearnError, MeasureError, ServerError};
pub use server::StatusServer;

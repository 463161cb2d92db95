//! Measurement execution and scheduling.
//!
//! ## Submodules
//!
//! - [`retry`]: Bounded retry with fixed or exponential backoff
//! - [`executor`]: Runs the blocking probe off the async runtime and turns
//!   its output into a [`Sample`](speedwatch_types::Sample)
//! - [`flight`]: Single-flight guard that owns the `Running` status
//! - [`scheduler`]: Periodic loop plus on-demand triggers
//! - [`shutdown`]: Cooperative stop signal

pub mod executor;
pub mod flight;
pub mod retry;
pub mod scheduler;
pub mod shutdown;

pub use executor::MeasurementExecutor;
pub use flight::{FlightGuard, SingleFlight};
pub use retry::{Backoff, RetryError, RetryPolicy};
pub use scheduler::{Scheduler, SchedulerHandle, TickOutcome, TriggerOutcome};
pub use shutdown::{Shutdown, StopSignal};

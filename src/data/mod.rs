//! Published monitor state.
//!
//! ## Submodules
//!
//! - [`history`]: Bounded ring buffer of past samples for dashboard plots
//! - [`publisher`]: The single owner of [`MonitorState`], read concurrently by
//!   the status server and written only by the measurement path
//!
//! ## Data Flow
//!
//! ```text
//! MeasurementExecutor ──record_history()──▶ History
//!        │
//!        ▼
//! FlightGuard ──publish()/set_status()──▶ StatePublisher ──watch──▶ subscribers
//!                                               │
//!                                               └──read()/snapshot()──▶ StatusServer
//! ```

pub mod history;
pub mod publisher;

pub use history::History;
pub use publisher::{MonitorState, StatePublisher};

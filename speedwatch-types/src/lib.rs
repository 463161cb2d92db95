//! # speedwatch-types
//!
//! Core types shared by the speedwatch monitor, its adapters, and any
//! dashboard that reads its published state.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Types work without any serialization framework
//! - **Optional serialization**: Enable the `serde` feature for JSON and friends
//! - **One unit**: Stored speeds are always megabits per second
//!
//! ## Example
//!
//! ```rust
//! use speedwatch_types::{AcceptableRange, Throughput};
//!
//! // A probe reports bits per second; samples store Mbps.
//! let sample = Throughput::new(95_500_000.0, 11_200_000.0).to_sample(1703160000000);
//! assert_eq!(sample.download, 95.5);
//!
//! let range = AcceptableRange::new(80.0, 110.0);
//! assert!(range.contains(sample.download));
//! ```

mod alert;
mod range;
mod sample;
mod status;

pub use alert::*;
pub use range::*;
pub use sample::*;
pub use status::*;

/// Get current timestamp in milliseconds since Unix epoch.
pub fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

//! Error types for the monitor core.

use std::net::AddrParseError;

use speedwatch_adapters::{NotifyError, ProbeError};
use thiserror::Error;

/// A measurement that could not produce a sample.
///
/// Never fatal to the scheduler: the cycle is skipped.
#[derive(Debug, Error)]
pub enum MeasureError {
    /// Every attempt in the retry budget failed.
    #[error("all {attempts} measurement attempts failed, last error: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: ProbeError,
    },

    /// The stop signal fired before a sample was obtained.
    #[error("measurement cancelled")]
    Cancelled,
}

/// Failures of the startup learning phase.
#[derive(Debug, Error)]
pub enum LearnError {
    /// Not enough successful samples to compute a standard deviation.
    #[error(
        "learning phase obtained {obtained} successful samples, at least {required} are required"
    )]
    InsufficientSamples { obtained: usize, required: usize },

    /// The stop signal fired during learning.
    #[error("learning phase cancelled")]
    Cancelled,
}

/// Configuration that could not be loaded or is not usable.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration sources could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// One or more values failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// A probe could not be constructed from its settings.
    #[error("invalid probe configuration: {0}")]
    Probe(#[from] ProbeError),

    /// A notifier could not be constructed from its settings.
    #[error("invalid notifier configuration: {0}")]
    Notifier(#[from] NotifyError),
}

/// Errors starting the status server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid listen address '{addr}': {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: AddrParseError,
    },

    #[error("status server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

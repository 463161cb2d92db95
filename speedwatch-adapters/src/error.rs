//! Error types for adapters.

use thiserror::Error;

/// Errors from a single speed probe attempt.
///
/// Every variant is treated as transient by the monitor: the attempt is
/// retried and, if retries run out, the cycle is skipped.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probe command could not be started.
    #[error("Failed to run probe command: {0}")]
    Spawn(#[from] std::io::Error),

    /// The probe command exited unsuccessfully.
    #[error("Probe command failed: {0}")]
    Command(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Failed to parse probe output.
    #[error("Failed to parse probe output: {0}")]
    Parse(String),

    /// Timeout waiting for the measurement.
    #[error("Probe timed out")]
    Timeout,

    /// The probe returned a value that cannot be a throughput.
    #[error("Invalid measurement: {0}")]
    Invalid(String),

    /// The probe panicked or its worker thread was lost.
    #[error("Probe panicked: {0}")]
    Panicked(String),
}

/// Errors from delivering a notification.
///
/// Never fatal: the evaluator logs these and moves on.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Local I/O failed (spawning sendmail, writing its stdin).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport accepted the connection but refused the message.
    #[error("Notification rejected: {0}")]
    Rejected(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for the transport.
    #[error("Notification timed out")]
    Timeout,
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProbeError::Timeout
        } else if err.is_connect() {
            ProbeError::Connection(err.to_string())
        } else {
            ProbeError::Http(err.to_string())
        }
    }
}

#[cfg(feature = "webhook")]
impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NotifyError::Timeout
        } else if err.is_connect() {
            NotifyError::Connection(err.to_string())
        } else {
            NotifyError::Http(err.to_string())
        }
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::transport::smtp::Error> for NotifyError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        if err.is_timeout() {
            NotifyError::Timeout
        } else if err.is_permanent() || err.is_transient() {
            NotifyError::Rejected(err.to_string())
        } else {
            NotifyError::Connection(err.to_string())
        }
    }
}

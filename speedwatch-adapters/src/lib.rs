//! # speedwatch-adapters
//!
//! The external collaborators of the speedwatch monitor: things that measure
//! throughput and things that deliver alert messages.
//!
//! Both seams are deliberately blocking. The monitor runs them on a blocking
//! thread pool so a slow speed test never stalls status reads.
//!
//! ## Speed probes
//!
//! - [`CommandProbe`] - runs a speed test CLI (`speedtest-cli --json` or the
//!   Ookla `speedtest --format=json`) and parses its JSON output
//! - [`HttpProbe`] (`http` feature) - times a download and an upload against
//!   HTTP endpoints you control
//!
//! ## Notifiers
//!
//! - [`SmtpNotifier`] (`smtp` feature) - emails alerts through an
//!   authenticated SMTP relay with STARTTLS
//! - [`SendmailNotifier`] - emails alerts through a local sendmail-compatible
//!   binary
//! - [`WebhookNotifier`] (`webhook` feature) - POSTs alerts as JSON
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use speedwatch_adapters::{CommandProbe, SpeedProbe};
//!
//! let probe = CommandProbe::speedtest_cli();
//! let throughput = probe.probe()?;
//! println!("{} bit/s down", throughput.download_bps);
//! # Ok::<(), speedwatch_adapters::ProbeError>(())
//! ```

pub mod error;
pub mod notify;
pub mod probe;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "smtp")]
pub mod smtp;

#[cfg(feature = "webhook")]
pub mod webhook;

pub use error::{NotifyError, ProbeError};
pub use notify::{Notifier, SendmailNotifier, SendmailNotifierBuilder};
pub use probe::{CommandProbe, CommandProbeBuilder, SpeedProbe};

#[cfg(feature = "http")]
pub use http::{HttpProbe, HttpProbeBuilder};

#[cfg(feature = "smtp")]
pub use smtp::{SmtpNotifier, SmtpNotifierBuilder};

#[cfg(feature = "webhook")]
pub use webhook::{WebhookNotifier, WebhookNotifierBuilder};

// Re-export types for convenience
pub use speedwatch_types::{Sample, Throughput};

//! Anomaly alerts.

use crate::AcceptableRange;

/// The two monitored directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Metric {
    Download,
    Upload,
}

impl Metric {
    /// Both metrics, in evaluation order.
    pub const ALL: [Metric; 2] = [Metric::Download, Metric::Upload];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Download => "Download",
            Metric::Upload => "Upload",
        }
    }
}

/// A single metric found outside its learned range.
///
/// Alerts are ephemeral: built by the evaluator, logged and forwarded,
/// then dropped.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlertEvent {
    pub metric: Metric,
    /// Observed value in Mbps.
    pub value: f64,
    pub range: AcceptableRange,
    pub timestamp_ms: u64,
}

impl AlertEvent {
    /// Human readable alert line, e.g. `Abnormal Download Speed: 12.34 Mbps`.
    pub fn message(&self) -> String {
        format!("Abnormal {} Speed: {:.2} Mbps", self.metric.label(), self.value)
    }

    /// True if the value fell below the range rather than above it.
    pub fn is_low(&self) -> bool {
        self.value < self.range.lower
    }
}

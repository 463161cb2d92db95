//! Published monitor status.

use crate::Sample;

/// Whether a measurement is currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Status {
    #[default]
    Idle,
    Running,
}

/// Status as shown to dashboard consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DisplayStatus {
    /// No measurement has completed yet.
    Initializing,
    Idle,
    Running,
}

impl DisplayStatus {
    /// Derive the dashboard status from the run state and whether a sample exists.
    pub fn from_state(status: Status, has_sample: bool) -> Self {
        match (status, has_sample) {
            (Status::Running, _) => DisplayStatus::Running,
            (Status::Idle, false) => DisplayStatus::Initializing,
            (Status::Idle, true) => DisplayStatus::Idle,
        }
    }
}

/// Read-only view handed to the dashboard.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusSnapshot {
    pub download_speed: Option<f64>,
    pub upload_speed: Option<f64>,
    pub status: DisplayStatus,
    pub timestamp_ms: Option<u64>,
}

impl StatusSnapshot {
    pub fn new(latest: Option<&Sample>, status: Status) -> Self {
        Self {
            download_speed: latest.map(|s| s.download),
            upload_speed: latest.map(|s| s.upload),
            status: DisplayStatus::from_state(status, latest.is_some()),
            timestamp_ms: latest.map(|s| s.timestamp_ms),
        }
    }
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self::new(None, Status::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_status_precedence() {
        assert_eq!(
            DisplayStatus::from_state(Status::Idle, false),
            DisplayStatus::Initializing
        );
        assert_eq!(DisplayStatus::from_state(Status::Idle, true), DisplayStatus::Idle);
        assert_eq!(
            DisplayStatus::from_state(Status::Running, false),
            DisplayStatus::Running
        );
        assert_eq!(
            DisplayStatus::from_state(Status::Running, true),
            DisplayStatus::Running
        );
    }

    #[test]
    fn snapshot_copies_latest_sample() {
        let sample = Sample::new(80.0, 20.0, 99);
        let snapshot = StatusSnapshot::new(Some(&sample), Status::Idle);
        assert_eq!(snapshot.download_speed, Some(80.0));
        assert_eq!(snapshot.upload_speed, Some(20.0));
        assert_eq!(snapshot.timestamp_ms, Some(99));
        assert_eq!(snapshot.status, DisplayStatus::Idle);
    }

    #[test]
    fn default_snapshot_is_initializing() {
        let snapshot = StatusSnapshot::default();
        assert_eq!(snapshot.status, DisplayStatus::Initializing);
        assert!(snapshot.download_speed.is_none());
    }
}

//! The single owner of the monitor's mutable state.

use std::sync::Arc;

use parking_lot::RwLock;
use speedwatch_types::{Baseline, Metric, Sample, Status, StatusSnapshot};
use tokio::sync::watch;

use super::history::History;

/// A consistent copy of the monitor state.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorState {
    pub latest_sample: Option<Sample>,
    pub status: Status,
    /// Successful samples, oldest first.
    pub history: Vec<Sample>,
    /// Set once the learning phase completes.
    pub baseline: Option<Baseline>,
    /// Number of `Idle -> Running` transitions so far.
    pub runs_started: u64,
}

#[derive(Debug)]
struct Inner {
    latest_sample: Option<Sample>,
    status: Status,
    history: History,
    baseline: Option<Baseline>,
    runs_started: u64,
}

impl Inner {
    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot::new(self.latest_sample.as_ref(), self.status)
    }
}

#[derive(Debug)]
struct Shared {
    state: RwLock<Inner>,
    updates: watch::Sender<StatusSnapshot>,
}

/// Cheap-clone handle to the published monitor state.
///
/// Readers take a short read lock that is independent of the measurement
/// lock, so a running speed test never blocks a status query. Every write
/// also pushes a fresh [`StatusSnapshot`] to subscribers; subscribers only
/// ever see the latest value.
///
/// # Example
///
/// ```
/// use speedwatch::StatePublisher;
/// use speedwatch_types::{DisplayStatus, Sample, Status};
///
/// let publisher = StatePublisher::new(100);
/// assert_eq!(publisher.snapshot().status, DisplayStatus::Initializing);
///
/// publisher.publish(Sample::new(95.0, 12.0, 0), Status::Idle);
/// assert_eq!(publisher.snapshot().download_speed, Some(95.0));
/// ```
#[derive(Debug, Clone)]
pub struct StatePublisher {
    shared: Arc<Shared>,
}

impl StatePublisher {
    /// Create a publisher whose history keeps at most `history_capacity` samples.
    pub fn new(history_capacity: usize) -> Self {
        let (updates, _) = watch::channel(StatusSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(Inner {
                    latest_sample: None,
                    status: Status::Idle,
                    history: History::with_capacity(history_capacity),
                    baseline: None,
                    runs_started: 0,
                }),
                updates,
            }),
        }
    }

    /// Atomically replace the latest sample and status.
    pub fn publish(&self, sample: Sample, status: Status) {
        let mut state = self.shared.state.write();
        state.latest_sample = Some(sample);
        Self::apply_status(&mut state, status);
        self.shared.updates.send_replace(state.snapshot());
    }

    /// Change only the status.
    pub fn set_status(&self, status: Status) {
        let mut state = self.shared.state.write();
        if state.status == status {
            return;
        }
        Self::apply_status(&mut state, status);
        self.shared.updates.send_replace(state.snapshot());
    }

    fn apply_status(state: &mut Inner, status: Status) {
        if state.status == Status::Idle && status == Status::Running {
            state.runs_started += 1;
        }
        state.status = status;
    }

    /// Append a successful sample to the history.
    pub fn record_history(&self, sample: Sample) {
        self.shared.state.write().history.record(sample);
    }

    /// Store the learned baseline.
    pub fn set_baseline(&self, baseline: Baseline) {
        self.shared.state.write().baseline = Some(baseline);
    }

    /// Full consistent copy of the state, including history.
    pub fn read(&self) -> MonitorState {
        let state = self.shared.state.read();
        MonitorState {
            latest_sample: state.latest_sample,
            status: state.status,
            history: state.history.to_vec(),
            baseline: state.baseline,
            runs_started: state.runs_started,
        }
    }

    /// The dashboard view of the current state.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.shared.state.read().snapshot()
    }

    pub fn status(&self) -> Status {
        self.shared.state.read().status
    }

    pub fn latest(&self) -> Option<Sample> {
        self.shared.state.read().latest_sample
    }

    pub fn history(&self) -> Vec<Sample> {
        self.shared.state.read().history.to_vec()
    }

    /// `(timestamp_ms, Mbps)` points for one metric, oldest first.
    pub fn series(&self, metric: Metric) -> Vec<(u64, f64)> {
        self.shared.state.read().history.series(metric)
    }

    pub fn baseline(&self) -> Option<Baseline> {
        self.shared.state.read().baseline
    }

    pub fn runs_started(&self) -> u64 {
        self.shared.state.read().runs_started
    }

    /// Receive the latest [`StatusSnapshot`] whenever it changes.
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.shared.updates.subscribe()
    }
}

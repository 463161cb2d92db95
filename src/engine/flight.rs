//! Single-flight guard around the probe.
//!
//! At most one measurement runs at a time, whether it comes from the periodic
//! loop, a manual trigger or the learning phase. Holding a [`FlightGuard`] is
//! the only way to mark the monitor `Running`, and dropping it is the only
//! way back to `Idle`, so the status cannot be left stuck on an error path.

use std::sync::Arc;

use speedwatch_types::{Sample, Status};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::data::StatePublisher;

/// Admission gate for measurements.
#[derive(Debug, Clone)]
pub struct SingleFlight {
    lock: Arc<Mutex<()>>,
    publisher: StatePublisher,
}

impl SingleFlight {
    pub fn new(publisher: StatePublisher) -> Self {
        Self {
            lock: Arc::new(Mutex::new(())),
            publisher,
        }
    }

    /// Claim the flight if nobody holds it.
    ///
    /// The check and the claim are one atomic step: two concurrent callers
    /// can never both get `Some`.
    pub fn try_begin(&self) -> Option<FlightGuard> {
        let permit = self.lock.clone().try_lock_owned().ok()?;
        Some(FlightGuard::enter(permit, self.publisher.clone()))
    }

    /// Wait for the flight to be free, then claim it.
    pub async fn begin(&self) -> FlightGuard {
        let permit = self.lock.clone().lock_owned().await;
        FlightGuard::enter(permit, self.publisher.clone())
    }

    /// True while a guard is alive.
    pub fn is_running(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}

/// Proof that the caller owns the current measurement.
///
/// Sets the status to `Running` on creation and back to `Idle` on drop.
#[derive(Debug)]
#[must_use = "the measurement ends when the guard is dropped"]
pub struct FlightGuard {
    publisher: StatePublisher,
    // Released after Drop::drop has reset the status.
    _permit: OwnedMutexGuard<()>,
}

impl FlightGuard {
    fn enter(permit: OwnedMutexGuard<()>, publisher: StatePublisher) -> Self {
        publisher.set_status(Status::Running);
        Self {
            publisher,
            _permit: permit,
        }
    }

    /// Publish a sample while keeping the status `Running`.
    pub fn publish(&self, sample: Sample) {
        self.publisher.publish(sample, Status::Running);
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.publisher.set_status(Status::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speedwatch_types::DisplayStatus;

    #[test]
    fn guard_marks_running_then_idle() {
        let publisher = StatePublisher::new(10);
        let flight = SingleFlight::new(publisher.clone());

        let guard = flight.try_begin().unwrap();
        assert_eq!(publisher.status(), Status::Running);
        assert!(flight.is_running());

        drop(guard);
        assert_eq!(publisher.status(), Status::Idle);
        assert!(!flight.is_running());
    }

    #[test]
    fn second_claim_is_refused() {
        let publisher = StatePublisher::new(10);
        let flight = SingleFlight::new(publisher.clone());

        let _guard = flight.try_begin().unwrap();
        assert!(flight.try_begin().is_none());
        assert!(flight.clone().try_begin().is_none());
        assert_eq!(publisher.runs_started(), 1);
    }

    #[test]
    fn published_sample_keeps_running_status() {
        let publisher = StatePublisher::new(10);
        let flight = SingleFlight::new(publisher.clone());

        let guard = flight.try_begin().unwrap();
        guard.publish(Sample::new(40.0, 4.0, 1));
        assert_eq!(publisher.snapshot().status, DisplayStatus::Running);
        drop(guard);

        let snapshot = publisher.snapshot();
        assert_eq!(snapshot.status, DisplayStatus::Idle);
        assert_eq!(snapshot.download_speed, Some(40.0));
    }

    #[tokio::test]
    async fn begin_waits_for_release() {
        let publisher = StatePublisher::new(10);
        let flight = SingleFlight::new(publisher.clone());

        let guard = flight.begin().await;
        let waiter = {
            let flight = flight.clone();
            tokio::spawn(async move {
                let _guard = flight.begin().await;
            })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();

        assert_eq!(publisher.runs_started(), 2);
        assert_eq!(publisher.status(), Status::Idle);
    }

    #[test]
    fn guard_released_on_panic() {
        let publisher = StatePublisher::new(10);
        let flight = SingleFlight::new(publisher.clone());

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = flight.try_begin().unwrap();
            panic!("probe blew up");
        }));

        assert!(result.is_err());
        assert_eq!(publisher.status(), Status::Idle);
        assert!(flight.try_begin().is_some());
    }
}

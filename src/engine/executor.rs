//! Runs the probe with retries and converts its output to a [`Sample`].

use std::sync::Arc;
use std::time::Duration;

use speedwatch_adapters::{ProbeError, SpeedProbe};
use speedwatch_types::{current_timestamp_ms, Sample};
use tracing::{debug, warn};

use super::retry::{RetryError, RetryPolicy};
use super::shutdown::StopSignal;
use crate::data::StatePublisher;
use crate::error::MeasureError;

/// Wraps a [`SpeedProbe`] with retry, timeout and history recording.
///
/// The probe is blocking, so every attempt runs on the blocking pool and the
/// async runtime stays free to answer status queries while it works.
#[derive(Debug, Clone)]
pub struct MeasurementExecutor {
    probe: Arc<dyn SpeedProbe>,
    retry: RetryPolicy,
    timeout: Option<Duration>,
    publisher: StatePublisher,
}

impl MeasurementExecutor {
    pub fn new(probe: Arc<dyn SpeedProbe>, publisher: StatePublisher) -> Self {
        Self {
            probe,
            retry: RetryPolicy::default(),
            timeout: None,
            publisher,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fail an attempt that takes longer than `timeout`.
    ///
    /// The blocking call itself cannot be interrupted. The attempt still
    /// waits for it to return and then discards the result, so the next
    /// attempt and the end of the flight never overlap a running probe.
    /// Probes that can enforce a deadline themselves (the command and HTTP
    /// probes) should be given the same limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Obtain one sample, retrying per the policy.
    ///
    /// On success the sample is appended to history. Publishing it as the
    /// latest sample is left to the caller, who owns the flight guard.
    pub async fn measure(&self, stop: &StopSignal) -> Result<Sample, MeasureError> {
        let result = self
            .retry
            .run(stop, |attempt| {
                debug!(attempt, probe = self.probe.description(), "Running speed test");
                self.attempt()
            })
            .await;

        match result {
            Ok(sample) => {
                self.publisher.record_history(sample);
                Ok(sample)
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                Err(MeasureError::Exhausted { attempts, last })
            }
            Err(RetryError::Cancelled) => Err(MeasureError::Cancelled),
        }
    }

    async fn attempt(&self) -> Result<Sample, ProbeError> {
        let probe = Arc::clone(&self.probe);
        let mut task = tokio::task::spawn_blocking(move || probe.probe());

        let joined = match self.timeout {
            Some(limit) => {
                let finished = tokio::time::timeout(limit, &mut task).await.ok();
                match finished {
                    Some(joined) => joined,
                    None => {
                        warn!(
                            ?limit,
                            probe = self.probe.description(),
                            "Speed test exceeded its time limit, waiting for it to return"
                        );
                        if let Err(e) = task.await {
                            warn!(error = %e, "Abandoned speed test panicked");
                        }
                        return Err(ProbeError::Timeout);
                    }
                }
            }
            None => task.await,
        };

        let throughput = joined.map_err(|e| ProbeError::Panicked(e.to_string()))??;
        if !throughput.is_valid() {
            return Err(ProbeError::Invalid(format!(
                "download {} bps, upload {} bps",
                throughput.download_bps, throughput.upload_bps
            )));
        }
        Ok(throughput.to_sample(current_timestamp_ms()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::shutdown::Shutdown;
    use crate::testing::ScriptedProbe;
    use speedwatch_types::Throughput;

    fn fast_retry(attempts: u32) -> RetryPolicy {
        RetryPolicy::fixed(attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn converts_bits_to_megabits_and_records_history() {
        let publisher = StatePublisher::new(10);
        let probe = Arc::new(ScriptedProbe::new(vec![Ok(Throughput::new(
            123_450_000.0,
            9_870_000.0,
        ))]));
        let executor = MeasurementExecutor::new(probe, publisher.clone());

        let sample = executor.measure(&StopSignal::never()).await.unwrap();
        assert!((sample.download - 123.45).abs() < 1e-9);
        assert!((sample.upload - 9.87).abs() < 1e-9);
        assert_eq!(publisher.history(), vec![sample]);
        assert!(publisher.latest().is_none());
    }

    #[tokio::test]
    async fn retries_until_success() {
        let publisher = StatePublisher::new(10);
        let probe = Arc::new(ScriptedProbe::new(vec![
            Err(ProbeError::Command("no route".into())),
            Err(ProbeError::Command("no route".into())),
            Ok(Throughput::new(50e6, 5e6)),
        ]));
        let executor =
            MeasurementExecutor::new(probe.clone(), publisher).with_retry(fast_retry(3));

        let sample = executor.measure(&StopSignal::never()).await.unwrap();
        assert_eq!(sample.download, 50.0);
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test]
    async fn exhausted_after_budget() {
        let publisher = StatePublisher::new(10);
        let probe = Arc::new(ScriptedProbe::failing(|| {
            ProbeError::Command("speedtest-cli: exit status 1".into())
        }));
        let executor =
            MeasurementExecutor::new(probe.clone(), publisher.clone()).with_retry(fast_retry(3));

        let err = executor.measure(&StopSignal::never()).await.unwrap_err();
        assert!(matches!(err, MeasureError::Exhausted { attempts: 3, .. }));
        assert_eq!(probe.calls(), 3);
        assert!(publisher.history().is_empty());
    }

    #[tokio::test]
    async fn invalid_throughput_counts_as_failure() {
        let publisher = StatePublisher::new(10);
        let probe = Arc::new(ScriptedProbe::new(vec![
            Ok(Throughput::new(f64::NAN, 1.0)),
            Ok(Throughput::new(10e6, 1e6)),
        ]));
        let executor = MeasurementExecutor::new(probe, publisher).with_retry(fast_retry(2));

        let sample = executor.measure(&StopSignal::never()).await.unwrap();
        assert_eq!(sample.download, 10.0);
    }

    #[tokio::test]
    async fn slow_attempt_times_out() {
        let publisher = StatePublisher::new(10);
        let probe = Arc::new(
            ScriptedProbe::new(vec![Ok(Throughput::new(1e6, 1e6))])
                .with_delay(Duration::from_millis(500)),
        );
        let executor = MeasurementExecutor::new(probe, publisher)
            .with_retry(fast_retry(1))
            .with_timeout(Duration::from_millis(20));

        let err = executor.measure(&StopSignal::never()).await.unwrap_err();
        match err {
            MeasureError::Exhausted { last, .. } => assert!(matches!(last, ProbeError::Timeout)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn timed_out_attempts_never_overlap() {
        let publisher = StatePublisher::new(10);
        let probe = Arc::new(
            ScriptedProbe::repeating(Throughput::new(1e6, 1e6))
                .with_delay(Duration::from_millis(150)),
        );
        let executor = MeasurementExecutor::new(probe.clone(), publisher)
            .with_retry(fast_retry(3))
            .with_timeout(Duration::from_millis(20));

        let err = executor.measure(&StopSignal::never()).await.unwrap_err();
        assert!(matches!(err, MeasureError::Exhausted { attempts: 3, .. }));
        assert_eq!(probe.calls(), 3);
        assert_eq!(probe.peak_active(), 1);
        assert_eq!(probe.active(), 0);
    }

    #[tokio::test]
    async fn stop_cancels_backoff() {
        let publisher = StatePublisher::new(10);
        let probe = Arc::new(ScriptedProbe::failing(|| ProbeError::Command("down".into())));
        let executor = MeasurementExecutor::new(probe.clone(), publisher)
            .with_retry(RetryPolicy::fixed(3, Duration::from_secs(30)));

        let (shutdown, stop) = Shutdown::new();
        let task = tokio::spawn(async move { executor.measure(&stop).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();

        let err = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, MeasureError::Cancelled));
        assert_eq!(probe.calls(), 1);
    }
}

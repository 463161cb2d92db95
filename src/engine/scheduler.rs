//! Steady-state monitoring loop with single-flight admission.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use speedwatch_types::{AlertEvent, Baseline, Sample};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::executor::MeasurementExecutor;
use super::flight::{FlightGuard, SingleFlight};
use super::shutdown::StopSignal;
use crate::analysis::AnomalyEvaluator;
use crate::data::StatePublisher;
use crate::error::MeasureError;

/// Result of one scheduled [`Scheduler::tick`].
#[derive(Debug)]
pub enum TickOutcome {
    /// A sample was taken and published, with any alerts it raised.
    Measured(Sample, Vec<AlertEvent>),
    /// Every attempt failed; the cycle was skipped.
    Skipped(MeasureError),
    /// Another measurement was already running; nothing was started.
    Busy,
    /// The stop signal fired.
    Cancelled,
}

/// Result of an on-demand [`Scheduler::trigger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug)]
struct Inner {
    executor: MeasurementExecutor,
    flight: SingleFlight,
    publisher: StatePublisher,
    evaluator: OnceLock<AnomalyEvaluator>,
    interval: Duration,
    stop: StopSignal,
}

/// Runs measurements on a fixed interval and on demand, never two at once.
///
/// Each cycle follows `Idle -> Running -> measure -> publish -> evaluate ->
/// Idle`. The `Running` span is exactly the lifetime of a [`FlightGuard`].
/// Until [`arm`](Self::arm) is called with a learned baseline, cycles
/// measure and publish but do not evaluate.
#[derive(Debug, Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(
        executor: MeasurementExecutor,
        publisher: StatePublisher,
        interval: Duration,
        stop: StopSignal,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                executor,
                flight: SingleFlight::new(publisher.clone()),
                publisher,
                evaluator: OnceLock::new(),
                interval,
                stop,
            }),
        }
    }

    /// Install the evaluator. Only the first call takes effect.
    pub fn arm(&self, evaluator: AnomalyEvaluator) -> bool {
        let baseline = *evaluator.baseline();
        if self.inner.evaluator.set(evaluator).is_err() {
            return false;
        }
        self.inner.publisher.set_baseline(baseline);
        true
    }

    pub fn baseline(&self) -> Option<&Baseline> {
        self.inner.evaluator.get().map(AnomalyEvaluator::baseline)
    }

    pub fn publisher(&self) -> &StatePublisher {
        &self.inner.publisher
    }

    pub fn is_running(&self) -> bool {
        self.inner.flight.is_running()
    }

    /// Run one cycle unless a measurement is already in flight.
    pub async fn tick(&self) -> TickOutcome {
        if self.inner.stop.is_stopped() {
            return TickOutcome::Cancelled;
        }
        match self.inner.flight.try_begin() {
            Some(guard) => self.run_cycle(guard).await,
            None => TickOutcome::Busy,
        }
    }

    /// Start a cycle in the background and return immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn trigger(&self) -> TriggerOutcome {
        let Some(guard) = self.inner.flight.try_begin() else {
            return TriggerOutcome::AlreadyRunning;
        };
        let this = self.clone();
        tokio::spawn(async move {
            let outcome = this.run_cycle(guard).await;
            debug!(?outcome, "Manual speed test finished");
        });
        TriggerOutcome::Started
    }

    /// Wait for exclusive rights, then measure and publish without
    /// evaluating. Used by the learning phase.
    pub async fn measure_exclusive(&self) -> Result<Sample, MeasureError> {
        let guard = self.inner.flight.begin().await;
        let sample = self.inner.executor.measure(&self.inner.stop).await?;
        guard.publish(sample);
        log_sample(&sample);
        Ok(sample)
    }

    async fn run_cycle(&self, guard: FlightGuard) -> TickOutcome {
        let sample = match self.inner.executor.measure(&self.inner.stop).await {
            Ok(sample) => sample,
            Err(MeasureError::Cancelled) => return TickOutcome::Cancelled,
            Err(e) => {
                warn!(error = %e, "Error in measuring speed, skipping this run");
                return TickOutcome::Skipped(e);
            }
        };

        guard.publish(sample);
        log_sample(&sample);

        let alerts = match self.inner.evaluator.get() {
            Some(evaluator) => evaluator.process(&sample).await,
            None => Vec::new(),
        };
        drop(guard);
        TickOutcome::Measured(sample, alerts)
    }

    /// Tick immediately, then every interval, until the stop signal fires.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.inner.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval = ?self.inner.interval, "Monitoring loop started");
        loop {
            tokio::select! {
                _ = self.inner.stop.stopped() => break,
                _ = ticker.tick() => {}
            }
            match self.tick().await {
                TickOutcome::Busy => debug!("Measurement already running, skipping tick"),
                TickOutcome::Cancelled => break,
                TickOutcome::Measured(..) | TickOutcome::Skipped(_) => {}
            }
        }
        info!("Monitoring loop stopped");
    }

    /// Spawn [`run`](Self::run) onto the current runtime.
    pub fn start(&self) -> SchedulerHandle {
        let this = self.clone();
        SchedulerHandle {
            task: tokio::spawn(async move { this.run().await }),
        }
    }
}

fn log_sample(sample: &Sample) {
    info!(
        download = sample.download,
        upload = sample.upload,
        "Download Speed: {:.2} Mbps, Upload Speed: {:.2} Mbps",
        sample.download,
        sample.upload
    );
}

/// Handle to a spawned monitoring loop.
#[derive(Debug)]
pub struct SchedulerHandle {
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Wait for the loop to exit on its own (after the stop signal fires).
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            if e.is_panic() {
                warn!(error = %e, "Monitoring loop panicked");
            }
        }
    }

    /// Abort the loop, dropping any in-flight cycle, and wait for it.
    pub async fn stop(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

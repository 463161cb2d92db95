//! Startup learning phase and the statistics behind it.
//!
//! Each metric gets a symmetric band `mean ± max(tolerance * stdev, min_spread)`
//! using the Bessel-corrected sample standard deviation. The band is a
//! z-score style heuristic rather than a percentile; with high variance the
//! lower bound can go negative, which is kept as-is and simply means the
//! metric has no effective floor.

use std::future::Future;
use std::time::Duration;

use speedwatch_types::{AcceptableRange, Baseline, Metric, MetricBaseline, Sample};
use tracing::{info, warn};

use crate::engine::StopSignal;
use crate::error::{LearnError, MeasureError};

/// Fewest samples that give a defined sample standard deviation.
pub const MIN_SAMPLES: usize = 2;

/// Parameters of the learning phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearningConfig {
    /// Successful samples to collect.
    pub samples: usize,
    /// Pause between consecutive measurements.
    pub interval: Duration,
    pub tolerance_factor: f64,
    /// Smallest half-width of a range, in Mbps.
    pub min_spread: f64,
    /// Cap on total attempts, successful or not. Defaults to `2 * samples`.
    pub max_attempts: Option<usize>,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            samples: 10,
            interval: Duration::from_secs(60),
            tolerance_factor: 3.0,
            min_spread: 1.0,
            max_attempts: None,
        }
    }
}

impl LearningConfig {
    pub fn attempt_cap(&self) -> usize {
        self.max_attempts
            .unwrap_or(self.samples.saturating_mul(2))
            .max(self.samples)
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Bessel-corrected standard deviation. Zero for fewer than two values.
pub fn sample_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

/// Derive both acceptance ranges from `samples`.
pub fn compute_baseline(
    samples: &[Sample],
    tolerance_factor: f64,
    min_spread: f64,
) -> Result<Baseline, LearnError> {
    if samples.len() < MIN_SAMPLES {
        return Err(LearnError::InsufficientSamples {
            obtained: samples.len(),
            required: MIN_SAMPLES,
        });
    }

    let metric_baseline = |metric: Metric| {
        let values: Vec<f64> = samples.iter().map(|s| s.value(metric)).collect();
        let mean = mean(&values);
        let stdev = sample_stdev(&values);
        let half_width = (tolerance_factor * stdev).max(min_spread);
        MetricBaseline {
            mean,
            stdev,
            range: AcceptableRange::around(mean, half_width),
        }
    };

    Ok(Baseline {
        download: metric_baseline(Metric::Download),
        upload: metric_baseline(Metric::Upload),
        sample_count: samples.len(),
        tolerance_factor,
    })
}

/// Drives the sequential learning phase.
#[derive(Debug, Clone)]
pub struct BaselineLearner {
    config: LearningConfig,
}

impl BaselineLearner {
    pub fn new(config: LearningConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Collect samples with `measure` and compute the baseline.
    ///
    /// Failed measurements are discarded and not counted toward the target.
    /// Attempts stop at [`LearningConfig::attempt_cap`]; if that leaves fewer
    /// than [`MIN_SAMPLES`] the phase fails.
    pub async fn learn<F, Fut>(&self, mut measure: F, stop: &StopSignal) -> Result<Baseline, LearnError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Sample, MeasureError>>,
    {
        let target = self.config.samples;
        let cap = self.config.attempt_cap();
        let mut samples = Vec::with_capacity(target);
        let mut attempts = 0;

        info!(target, "Learning normal speeds...");

        while samples.len() < target && attempts < cap {
            if stop.is_stopped() {
                return Err(LearnError::Cancelled);
            }
            if attempts > 0 && !stop.sleep(self.config.interval).await {
                return Err(LearnError::Cancelled);
            }
            attempts += 1;

            match measure().await {
                Ok(sample) => {
                    samples.push(sample);
                    info!(
                        collected = samples.len(),
                        target,
                        "Learning sample {}/{}: Download {:.2} Mbps, Upload {:.2} Mbps",
                        samples.len(),
                        target,
                        sample.download,
                        sample.upload
                    );
                }
                Err(MeasureError::Cancelled) => return Err(LearnError::Cancelled),
                Err(e) => {
                    warn!(attempt = attempts, error = %e, "Learning measurement failed, not counted");
                }
            }
        }

        if samples.len() < target {
            warn!(
                obtained = samples.len(),
                target,
                attempts,
                "Learning phase hit its attempt limit before collecting every sample"
            );
        }

        compute_baseline(&samples, self.config.tolerance_factor, self.config.min_spread)
    }
}

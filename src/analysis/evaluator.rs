//! Compares samples against the learned baseline and raises alerts.

use std::sync::Arc;

use speedwatch_adapters::Notifier;
use speedwatch_types::{AlertEvent, Baseline, Metric, Sample};
use tracing::{debug, error, warn};

use super::alert_log::AlertLog;

/// One event per metric whose value lies outside its inclusive range.
pub fn evaluate(sample: &Sample, baseline: &Baseline) -> Vec<AlertEvent> {
    Metric::ALL
        .iter()
        .filter_map(|&metric| {
            let value = sample.value(metric);
            let range = baseline.range(metric);
            (!range.contains(value)).then_some(AlertEvent {
                metric,
                value,
                range,
                timestamp_ms: sample.timestamp_ms,
            })
        })
        .collect()
}

/// Evaluates samples and dispatches the resulting alerts.
///
/// Every alert is written to the alert log before any notifier runs, and a
/// notifier failure never undoes the log write or fails the cycle.
#[derive(Debug, Clone)]
pub struct AnomalyEvaluator {
    baseline: Baseline,
    log: Option<AlertLog>,
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl AnomalyEvaluator {
    pub fn new(baseline: Baseline) -> Self {
        Self {
            baseline,
            log: None,
            notifiers: Vec::new(),
        }
    }

    pub fn with_log(mut self, log: AlertLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn with_notifiers(mut self, notifiers: impl IntoIterator<Item = Arc<dyn Notifier>>) -> Self {
        self.notifiers.extend(notifiers);
        self
    }

    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    pub fn evaluate(&self, sample: &Sample) -> Vec<AlertEvent> {
        evaluate(sample, &self.baseline)
    }

    /// Evaluate `sample`, then log and notify for each alert.
    pub async fn process(&self, sample: &Sample) -> Vec<AlertEvent> {
        let alerts = self.evaluate(sample);
        for alert in &alerts {
            let message = alert.message();
            warn!(
                metric = alert.metric.label(),
                direction = if alert.is_low() { "below" } else { "above" },
                value = alert.value,
                lower = alert.range.lower,
                upper = alert.range.upper,
                "{}",
                message
            );

            if let Some(log) = &self.log {
                if let Err(e) = log.record(alert) {
                    error!(path = %log.path().display(), error = %e, "Failed to write alert log");
                }
            }

            self.notify_all(&message).await;
        }
        alerts
    }

    async fn notify_all(&self, message: &str) {
        for notifier in &self.notifiers {
            let task = {
                let notifier = Arc::clone(notifier);
                let message = message.to_owned();
                tokio::task::spawn_blocking(move || notifier.notify(&message))
            };
            match task.await {
                Ok(Ok(())) => debug!(notifier = notifier.name(), "Notification sent successfully"),
                Ok(Err(e)) => {
                    error!(notifier = notifier.name(), error = %e, "Failed to send notification")
                }
                Err(e) => error!(notifier = notifier.name(), error = %e, "Notifier task failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::compute_baseline;
    use crate::testing::RecordingNotifier;
    use speedwatch_types::AcceptableRange;

    /// Download range (10, 20), upload range (1, 5).
    fn baseline() -> Baseline {
        let mut baseline = compute_baseline(
            &[Sample::new(15.0, 3.0, 0), Sample::new(15.0, 3.0, 1)],
            2.0,
            0.0,
        )
        .unwrap();
        baseline.download.range = AcceptableRange::new(10.0, 20.0);
        baseline.upload.range = AcceptableRange::new(1.0, 5.0);
        baseline
    }

    #[test]
    fn low_download_only() {
        let alerts = evaluate(&Sample::new(5.0, 3.0, 7), &baseline());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].metric, Metric::Download);
        assert_eq!(alerts[0].value, 5.0);
        assert_eq!(alerts[0].range, AcceptableRange::new(10.0, 20.0));
        assert_eq!(alerts[0].timestamp_ms, 7);
    }

    #[test]
    fn both_metrics_fire_independently() {
        let alerts = evaluate(&Sample::new(25.0, 0.5, 0), &baseline());
        let metrics: Vec<_> = alerts.iter().map(|a| a.metric).collect();
        assert_eq!(metrics, vec![Metric::Download, Metric::Upload]);
    }

    #[test]
    fn bounds_are_inclusive() {
        assert!(evaluate(&Sample::new(10.0, 5.0, 0), &baseline()).is_empty());
        assert!(evaluate(&Sample::new(20.0, 1.0, 0), &baseline()).is_empty());
        assert_eq!(evaluate(&Sample::new(20.01, 1.0, 0), &baseline()).len(), 1);
    }

    #[tokio::test]
    async fn process_logs_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let log = AlertLog::open(dir.path().join("network_speed.log")).unwrap();
        let notifier = Arc::new(RecordingNotifier::new());

        let evaluator = AnomalyEvaluator::new(baseline())
            .with_log(log.clone())
            .with_notifier(notifier.clone());

        let alerts = evaluator.process(&Sample::new(12.344, 9.0, 0)).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(notifier.messages(), vec!["Abnormal Upload Speed: 9.00 Mbps"]);

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert!(contents.trim_end().ends_with(": Abnormal Upload Speed: 9.00 Mbps"));
    }

    #[tokio::test]
    async fn notifier_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let log = AlertLog::open(dir.path().join("network_speed.log")).unwrap();
        let broken = Arc::new(RecordingNotifier::failing());
        let working = Arc::new(RecordingNotifier::new());

        let evaluator = AnomalyEvaluator::new(baseline())
            .with_log(log.clone())
            .with_notifiers([broken.clone() as Arc<dyn Notifier>, working.clone()]);

        let alerts = evaluator.process(&Sample::new(1.0, 0.1, 0)).await;
        assert_eq!(alerts.len(), 2);
        assert_eq!(broken.attempts(), 2);
        assert_eq!(working.messages().len(), 2);

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[tokio::test]
    async fn in_range_sample_is_silent() {
        let notifier = Arc::new(RecordingNotifier::new());
        let evaluator = AnomalyEvaluator::new(baseline()).with_notifier(notifier.clone());

        assert!(evaluator.process(&Sample::new(15.0, 3.0, 0)).await.is_empty());
        assert!(notifier.messages().is_empty());
    }
}

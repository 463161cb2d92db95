//! Throughput measurements.

/// Bits per megabit, the divisor applied when normalizing probe output.
pub const BITS_PER_MEGABIT: f64 = 1e6;

/// Raw result of a single speed probe, in bits per second.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Throughput {
    pub download_bps: f64,
    pub upload_bps: f64,
}

impl Throughput {
    pub const fn new(download_bps: f64, upload_bps: f64) -> Self {
        Self {
            download_bps,
            upload_bps,
        }
    }

    /// True if both directions are finite and non-negative.
    pub fn is_valid(&self) -> bool {
        self.download_bps.is_finite()
            && self.upload_bps.is_finite()
            && self.download_bps >= 0.0
            && self.upload_bps >= 0.0
    }

    /// Convert to a [`Sample`] in Mbps.
    ///
    /// This is the only place the bits-to-megabits conversion happens.
    pub fn to_sample(&self, timestamp_ms: u64) -> Sample {
        Sample {
            download: self.download_bps / BITS_PER_MEGABIT,
            upload: self.upload_bps / BITS_PER_MEGABIT,
            timestamp_ms,
        }
    }
}

/// One successful measurement, normalized to megabits per second.
///
/// Samples are only produced by the measurement executor and never
/// change once created.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample {
    /// Download speed in Mbps.
    pub download: f64,
    /// Upload speed in Mbps.
    pub upload: f64,
    /// Unix timestamp in milliseconds when the measurement finished.
    pub timestamp_ms: u64,
}

impl Sample {
    pub const fn new(download: f64, upload: f64, timestamp_ms: u64) -> Self {
        Self {
            download,
            upload,
            timestamp_ms,
        }
    }

    /// Value for one metric.
    pub fn value(&self, metric: crate::Metric) -> f64 {
        match metric {
            crate::Metric::Download => self.download,
            crate::Metric::Upload => self.upload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Metric;

    #[test]
    fn to_sample_divides_by_one_million() {
        let sample = Throughput::new(123_450_000.0, 9_870_000.0).to_sample(42);
        assert!((sample.download - 123.45).abs() < 1e-9);
        assert!((sample.upload - 9.87).abs() < 1e-9);
        assert_eq!(sample.timestamp_ms, 42);
    }

    #[test]
    fn negative_and_nan_throughput_is_invalid() {
        assert!(Throughput::new(1.0, 1.0).is_valid());
        assert!(Throughput::new(0.0, 0.0).is_valid());
        assert!(!Throughput::new(-1.0, 1.0).is_valid());
        assert!(!Throughput::new(1.0, f64::NAN).is_valid());
        assert!(!Throughput::new(f64::INFINITY, 1.0).is_valid());
    }

    #[test]
    fn value_selects_metric() {
        let sample = Sample::new(50.0, 10.0, 0);
        assert_eq!(sample.value(Metric::Download), 50.0);
        assert_eq!(sample.value(Metric::Upload), 10.0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn sample_serializes_with_field_names() {
        let json = serde_json::to_value(Sample::new(12.5, 3.25, 1703160000000)).unwrap();
        assert_eq!(json["download"], 12.5);
        assert_eq!(json["upload"], 3.25);
        assert_eq!(json["timestamp_ms"], 1703160000000u64);
    }
}

//! Learned acceptance ranges.

use crate::Metric;

/// Inclusive `[lower, upper]` band of normal values for one metric.
///
/// `lower` may be negative when variance is high relative to the mean;
/// a negative lower bound simply means there is no effective lower limit.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AcceptableRange {
    pub lower: f64,
    pub upper: f64,
}

impl AcceptableRange {
    /// Create a range. Bounds are swapped if given in the wrong order so that
    /// `lower <= upper` always holds.
    pub fn new(lower: f64, upper: f64) -> Self {
        if lower <= upper {
            Self { lower, upper }
        } else {
            Self {
                lower: upper,
                upper: lower,
            }
        }
    }

    /// Symmetric band `center ± half_width`.
    pub fn around(center: f64, half_width: f64) -> Self {
        let half_width = half_width.abs();
        Self::new(center - half_width, center + half_width)
    }

    /// True if `value` lies within the inclusive bounds.
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

impl core::fmt::Display for AcceptableRange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.lower, self.upper)
    }
}

/// Summary statistics behind one metric's range.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricBaseline {
    pub mean: f64,
    /// Sample (Bessel-corrected) standard deviation.
    pub stdev: f64,
    pub range: AcceptableRange,
}

/// The learned baseline for both metrics.
///
/// Computed once at startup and read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Baseline {
    pub download: MetricBaseline,
    pub upload: MetricBaseline,
    /// Number of successful samples the statistics were computed from.
    pub sample_count: usize,
    pub tolerance_factor: f64,
}

impl Baseline {
    /// Range for one metric.
    pub fn range(&self, metric: Metric) -> AcceptableRange {
        match metric {
            Metric::Download => self.download.range,
            Metric::Upload => self.upload.range,
        }
    }

    /// The `(download, upload)` range pair.
    pub fn ranges(&self) -> (AcceptableRange, AcceptableRange) {
        (self.download.range, self.upload.range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        let range = AcceptableRange::new(10.0, 20.0);
        assert!(range.contains(10.0));
        assert!(range.contains(20.0));
        assert!(range.contains(15.0));
        assert!(!range.contains(9.999));
        assert!(!range.contains(20.001));
    }

    #[test]
    fn reversed_bounds_are_normalized() {
        let range = AcceptableRange::new(20.0, 10.0);
        assert_eq!(range.lower, 10.0);
        assert_eq!(range.upper, 20.0);
    }

    #[test]
    fn around_allows_negative_lower_bound() {
        let range = AcceptableRange::around(5.0, 12.0);
        assert_eq!(range.lower, -7.0);
        assert_eq!(range.upper, 17.0);
        assert!(range.contains(0.0));
    }

    #[test]
    fn zero_width_range_only_contains_its_point() {
        let range = AcceptableRange::around(10.0, 0.0);
        assert_eq!(range.width(), 0.0);
        assert!(range.contains(10.0));
        assert!(!range.contains(10.01));
    }

    #[test]
    fn display_matches_log_format() {
        let range = AcceptableRange::new(81.234, 110.0);
        assert_eq!(range.to_string(), "(81.23, 110.00)");
    }
}

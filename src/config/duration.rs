use std::time::Duration;

use anyhow::{bail, Result};

/// Suffix to nanoseconds multiplier (order matters: longer suffixes first)
const UNITS: &[(&str, f64)] = &[
    ("ns", 1.0),
    ("µs", 1_000.0),
    ("us", 1_000.0),
    ("ms", 1_000_000.0),
    ("s", 1_000_000_000.0),
    ("m", 60_000_000_000.0),
    ("h", 3_600_000_000_000.0),
];

/// Parse duration strings like "500ms", "10s", "1.5m", "1h"
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    for (suffix, multiplier) in UNITS {
        if let Some(val_str) = s.strip_suffix(suffix) {
            let val: f64 = val_str.trim().parse()?;
            if !val.is_finite() || val < 0.0 {
                bail!("Duration must be a non-negative number: {}", s);
            }
            return Ok(Duration::from_nanos((val * multiplier) as u64));
        }
    }

    bail!("Unknown duration format: {}", s)
}

/// Format a duration so that [`parse_duration`] reads it back.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        "0s".to_string()
    } else if nanos < 1_000 {
        format!("{}ns", nanos)
    } else if nanos < 1_000_000 {
        format!("{}µs", nanos as f64 / 1_000.0)
    } else if nanos < 1_000_000_000 {
        format!("{}ms", nanos as f64 / 1_000_000.0)
    } else if d.subsec_nanos() == 0 && d.as_secs() % 3600 == 0 {
        format!("{}h", d.as_secs() / 3600)
    } else if d.subsec_nanos() == 0 && d.as_secs() % 60 == 0 {
        format!("{}m", d.as_secs() / 60)
    } else {
        format!("{}s", d.as_secs_f64())
    }
}

/// `#[serde(with = "...")]` adapter for `Duration` fields.
pub mod human {
    use std::time::Duration;

    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_duration(&raw).map_err(D::Error::custom)
    }
}

/// Same as [`human`] for `Option<Duration>`.
pub mod human_opt {
    use std::time::Duration;

    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&super::format_duration(*d)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|raw| super::parse_duration(&raw).map_err(D::Error::custom))
            .transpose()
    }
}

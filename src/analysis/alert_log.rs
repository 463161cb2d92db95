//! Durable, append-only record of learned ranges and anomalies.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use speedwatch_types::AlertEvent;

/// Line-oriented log file, one `<timestamp>: <message>` record per line.
///
/// Kept apart from diagnostic `tracing` output so that filter levels never
/// hide an alert.
#[derive(Debug, Clone)]
pub struct AlertLog {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl AlertLog {
    /// Open `path` for appending, creating it if missing.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped line and flush it.
    pub fn append(&self, message: &str) -> io::Result<()> {
        let line = format!(
            "{}: {}\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            message
        );
        let mut file = self.file.lock();
        file.write_all(line.as_bytes())?;
        file.flush()
    }

    pub fn record(&self, alert: &AlertEvent) -> io::Result<()> {
        self.append(&alert.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speedwatch_types::{AcceptableRange, Metric};

    #[test]
    fn appends_timestamped_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network_speed.log");

        let log = AlertLog::open(&path).unwrap();
        log.append("Learned normal download speed range: (9.00, 11.00)")
            .unwrap();
        log.record(&AlertEvent {
            metric: Metric::Download,
            value: 5.0,
            range: AcceptableRange::new(9.0, 11.0),
            timestamp_ms: 0,
        })
        .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(": Learned normal download speed range: (9.00, 11.00)"));
        assert!(lines[1].ends_with(": Abnormal Download Speed: 5.00 Mbps"));

        let (stamp, _) = lines[1].split_once(": ").unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
    }

    #[test]
    fn reopening_keeps_existing_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.log");

        AlertLog::open(&path).unwrap().append("first").unwrap();
        AlertLog::open(&path).unwrap().append("second").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AlertLog::open(dir.path().join("nope").join("alerts.log")).is_err());
    }
}

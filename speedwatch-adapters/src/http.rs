//! HTTP throughput probe.
//!
//! Times a GET of a large object and a POST of a generated payload against
//! endpoints you control. Useful when a public speed test service is not
//! wanted or not reachable.
//!
//! ## Example
//!
//! ```rust,no_run
//! use speedwatch_adapters::{HttpProbe, SpeedProbe};
//! use std::time::Duration;
//!
//! let probe = HttpProbe::builder()
//!     .download_url("http://mirror.local/100MB.bin")
//!     .upload_url("http://mirror.local/upload")
//!     .upload_bytes(25 * 1024 * 1024)
//!     .timeout(Duration::from_secs(120))
//!     .build()?;
//!
//! let throughput = probe.probe()?;
//! # Ok::<(), speedwatch_adapters::ProbeError>(())
//! ```

use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use speedwatch_types::Throughput;

use crate::{ProbeError, SpeedProbe};

const DEFAULT_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Measures throughput with timed HTTP transfers.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    download_url: String,
    upload_url: String,
    upload_bytes: usize,
    description: String,
}

impl HttpProbe {
    /// Create a new builder for configuring the probe.
    pub fn builder() -> HttpProbeBuilder {
        HttpProbeBuilder::default()
    }

    fn measure_download(&self) -> Result<f64, ProbeError> {
        let start = Instant::now();
        let response = self.client.get(&self.download_url).send()?;

        if !response.status().is_success() {
            return Err(ProbeError::Http(format!(
                "download returned status {}",
                response.status()
            )));
        }

        let bytes = response.bytes()?;
        bits_per_second(bytes.len(), start.elapsed())
    }

    fn measure_upload(&self) -> Result<f64, ProbeError> {
        let payload = vec![0u8; self.upload_bytes];
        let start = Instant::now();
        let response = self.client.post(&self.upload_url).body(payload).send()?;

        if !response.status().is_success() {
            return Err(ProbeError::Http(format!(
                "upload returned status {}",
                response.status()
            )));
        }

        bits_per_second(self.upload_bytes, start.elapsed())
    }
}

impl SpeedProbe for HttpProbe {
    fn probe(&self) -> Result<Throughput, ProbeError> {
        let download = self.measure_download()?;
        let upload = self.measure_upload()?;
        Ok(Throughput::new(download, upload))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

fn bits_per_second(bytes: usize, elapsed: Duration) -> Result<f64, ProbeError> {
    let secs = elapsed.as_secs_f64();
    if bytes == 0 {
        return Err(ProbeError::Invalid("transferred zero bytes".to_string()));
    }
    if secs <= 0.0 {
        return Err(ProbeError::Invalid("transfer took no measurable time".to_string()));
    }
    Ok(bytes as f64 * 8.0 / secs)
}

/// Builder for HttpProbe.
#[derive(Debug, Default)]
pub struct HttpProbeBuilder {
    download_url: Option<String>,
    upload_url: Option<String>,
    upload_bytes: Option<usize>,
    timeout: Option<Duration>,
}

impl HttpProbeBuilder {
    /// URL of the object to download.
    pub fn download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }

    /// URL that accepts the upload payload.
    pub fn upload_url(mut self, url: impl Into<String>) -> Self {
        self.upload_url = Some(url.into());
        self
    }

    /// Upload payload size. Defaults to 10 MiB.
    pub fn upload_bytes(mut self, bytes: usize) -> Self {
        self.upload_bytes = Some(bytes);
        self
    }

    /// Per-request timeout. Defaults to 60 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the HttpProbe.
    pub fn build(self) -> Result<HttpProbe, ProbeError> {
        let download_url = self
            .download_url
            .ok_or_else(|| ProbeError::Invalid("download_url is required".to_string()))?;
        let upload_url = self
            .upload_url
            .ok_or_else(|| ProbeError::Invalid("upload_url is required".to_string()))?;

        let client = Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        let description = format!("http: {} / {}", download_url, upload_url);
        Ok(HttpProbe {
            client,
            download_url,
            upload_url,
            upload_bytes: self.upload_bytes.unwrap_or(DEFAULT_UPLOAD_BYTES),
            description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_per_second_math() {
        let bps = bits_per_second(1_000_000, Duration::from_secs(1)).unwrap();
        assert_eq!(bps, 8_000_000.0);

        let bps = bits_per_second(1_000_000, Duration::from_millis(500)).unwrap();
        assert_eq!(bps, 16_000_000.0);
    }

    #[test]
    fn zero_bytes_or_time_is_invalid() {
        assert!(bits_per_second(0, Duration::from_secs(1)).is_err());
        assert!(bits_per_second(10, Duration::ZERO).is_err());
    }

    #[test]
    fn builder_requires_urls() {
        let err = HttpProbe::builder().build().unwrap_err();
        assert!(err.to_string().contains("download_url"));

        let err = HttpProbe::builder()
            .download_url("http://localhost/file")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("upload_url"));
    }

    #[test]
    fn builder_sets_description() {
        let probe = HttpProbe::builder()
            .download_url("http://localhost/file")
            .upload_url("http://localhost/upload")
            .build()
            .unwrap();
        assert_eq!(
            probe.description(),
            "http: http://localhost/file / http://localhost/upload"
        );
        assert_eq!(probe.upload_bytes, DEFAULT_UPLOAD_BYTES);
    }
}

//! Layered configuration.
//!
//! Sources, lowest precedence first:
//!
//! 1. Built-in defaults (every field has one)
//! 2. A TOML file, `speedwatch.toml` unless `--config` names another
//! 3. Environment variables prefixed `SPEEDWATCH_`, with `__` between
//!    nested keys, e.g. `SPEEDWATCH_LEARNING__SAMPLES=5`
//!
//! ```toml
//! [learning]
//! samples = 10
//! interval = "60s"
//! tolerance_factor = 3.0
//!
//! [monitoring]
//! interval = "10m"
//!
//! [notify.email]
//! enabled = true
//! sender = "monitor@example.com"
//! receiver = "oncall@example.com"
//! smtp_server = "smtp.example.com"
//! smtp_port = 587
//! password = "app-password"
//! ```
//!
//! Durations are written as strings with a unit suffix (see [`duration`]).

pub mod duration;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use speedwatch_adapters::{CommandProbe, Notifier, SendmailNotifier, SpeedProbe};

use crate::analysis::LearningConfig;
use crate::data::history::DEFAULT_HISTORY_CAPACITY;
use crate::engine::RetryPolicy;
use crate::error::{ConfigError, ServerError};

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "speedwatch.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "SPEEDWATCH";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub learning: LearningSettings,
    pub monitoring: MonitoringSettings,
    pub retry: RetrySettings,
    pub probe: ProbeSettings,
    pub history: HistorySettings,
    pub alerts: AlertSettings,
    pub notify: NotifySettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningSettings {
    /// Successful samples to collect before monitoring starts.
    pub samples: usize,
    #[serde(with = "duration::human")]
    pub interval: Duration,
    pub tolerance_factor: f64,
    /// Smallest half-width of a learned range, in Mbps. 0 disables the floor.
    pub min_spread_mbps: f64,
    /// Total attempts allowed, failures included. Defaults to twice `samples`.
    pub max_attempts: Option<usize>,
}

impl Default for LearningSettings {
    fn default() -> Self {
        let defaults = LearningConfig::default();
        Self {
            samples: defaults.samples,
            interval: defaults.interval,
            tolerance_factor: defaults.tolerance_factor,
            min_spread_mbps: defaults.min_spread,
            max_attempts: defaults.max_attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringSettings {
    #[serde(with = "duration::human")]
    pub interval: Duration,
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    #[default]
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub attempts: u32,
    pub strategy: BackoffStrategy,
    /// Fixed delay, or the first delay when exponential.
    #[serde(with = "duration::human")]
    pub backoff: Duration,
    /// Ceiling for exponential backoff.
    #[serde(with = "duration::human")]
    pub max_backoff: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            strategy: BackoffStrategy::Fixed,
            backoff: Duration::from_secs(10),
            max_backoff: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// Run a speedtest CLI and parse its JSON output.
    #[default]
    Command,
    /// Time transfers against HTTP endpoints.
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    pub kind: ProbeKind,
    pub command: String,
    pub args: Vec<String>,
    pub download_url: Option<String>,
    pub upload_url: Option<String>,
    pub upload_bytes: usize,
    /// Per-attempt limit. Unset means wait as long as the probe takes.
    #[serde(with = "duration::human_opt")]
    pub timeout: Option<Duration>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            kind: ProbeKind::Command,
            command: "speedtest-cli".to_string(),
            args: vec!["--json".to_string(), "--secure".to_string()],
            download_url: None,
            upload_url: None,
            upload_bytes: 10 * 1024 * 1024,
            timeout: None,
        }
    }
}

impl ProbeSettings {
    /// Construct the configured probe.
    pub fn build(&self) -> Result<Arc<dyn SpeedProbe>, ConfigError> {
        match self.kind {
            ProbeKind::Command => {
                let mut builder = CommandProbe::builder().program(&self.command).args(&self.args);
                if let Some(timeout) = self.timeout {
                    builder = builder.timeout(timeout);
                }
                Ok(Arc::new(builder.build()))
            }
            ProbeKind::Http => self.build_http(),
        }
    }

    #[cfg(feature = "http")]
    fn build_http(&self) -> Result<Arc<dyn SpeedProbe>, ConfigError> {
        let mut builder = speedwatch_adapters::HttpProbe::builder().upload_bytes(self.upload_bytes);
        if let Some(url) = &self.download_url {
            builder = builder.download_url(url);
        }
        if let Some(url) = &self.upload_url {
            builder = builder.upload_url(url);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Arc::new(builder.build()?))
    }

    #[cfg(not(feature = "http"))]
    fn build_http(&self) -> Result<Arc<dyn SpeedProbe>, ConfigError> {
        Err(ConfigError::Invalid(
            "probe.kind = \"http\" requires the `http` feature".to_string(),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub capacity: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    pub log_file: PathBuf,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("network_speed.log"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    pub email: EmailSettings,
    pub webhook: WebhookSettings,
}

impl NotifySettings {
    /// Construct every enabled notifier.
    pub fn build(&self) -> Result<Vec<Arc<dyn Notifier>>, ConfigError> {
        let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();

        if self.email.enabled {
            notifiers.push(self.email.build()?);
        }

        if self.webhook.enabled {
            notifiers.push(self.webhook.build()?);
        }

        Ok(notifiers)
    }
}

/// How email alerts leave the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailTransport {
    /// Authenticated SMTP relay with STARTTLS.
    #[default]
    Smtp,
    /// A local sendmail-compatible binary.
    Sendmail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    pub enabled: bool,
    pub transport: EmailTransport,
    pub sender: Option<String>,
    pub receiver: Option<String>,
    pub subject: String,
    pub smtp_server: Option<String>,
    pub smtp_port: u16,
    /// Login name; the sender address when unset.
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(with = "duration::human")]
    pub timeout: Duration,
    pub sendmail_path: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            transport: EmailTransport::Smtp,
            sender: None,
            receiver: None,
            subject: "Network Speed Alert".to_string(),
            smtp_server: None,
            smtp_port: 587,
            username: None,
            password: None,
            timeout: Duration::from_secs(30),
            sendmail_path: "/usr/sbin/sendmail".to_string(),
        }
    }
}

impl EmailSettings {
    fn build(&self) -> Result<Arc<dyn Notifier>, ConfigError> {
        match self.transport {
            EmailTransport::Smtp => self.build_smtp(),
            EmailTransport::Sendmail => Ok(Arc::new(
                SendmailNotifier::builder()
                    .sendmail_path(&self.sendmail_path)
                    .sender(self.sender.clone().unwrap_or_default())
                    .receiver(self.receiver.clone().unwrap_or_default())
                    .subject(&self.subject)
                    .build()?,
            )),
        }
    }

    #[cfg(feature = "smtp")]
    fn build_smtp(&self) -> Result<Arc<dyn Notifier>, ConfigError> {
        let mut builder = speedwatch_adapters::SmtpNotifier::builder()
            .server(self.smtp_server.clone().unwrap_or_default())
            .port(self.smtp_port)
            .sender(self.sender.clone().unwrap_or_default())
            .receiver(self.receiver.clone().unwrap_or_default())
            .password(self.password.clone().unwrap_or_default())
            .subject(&self.subject)
            .timeout(self.timeout);
        if let Some(username) = &self.username {
            builder = builder.username(username);
        }
        Ok(Arc::new(builder.build()?))
    }

    #[cfg(not(feature = "smtp"))]
    fn build_smtp(&self) -> Result<Arc<dyn Notifier>, ConfigError> {
        Err(ConfigError::Invalid(
            "notify.email.transport = \"smtp\" requires the `smtp` feature".to_string(),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookSettings {
    pub enabled: bool,
    pub url: Option<String>,
    pub bearer_token: Option<String>,
    #[serde(with = "duration::human")]
    pub timeout: Duration,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            bearer_token: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl WebhookSettings {
    #[cfg(feature = "webhook")]
    fn build(&self) -> Result<Arc<dyn Notifier>, ConfigError> {
        let mut builder = speedwatch_adapters::WebhookNotifier::builder()
            .url(self.url.clone().unwrap_or_default())
            .timeout(self.timeout);
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_token(token);
        }
        Ok(Arc::new(builder.build()?))
    }

    #[cfg(not(feature = "webhook"))]
    fn build(&self) -> Result<Arc<dyn Notifier>, ConfigError> {
        Err(ConfigError::Invalid(
            "notify.webhook requires the `webhook` feature".to_string(),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub enabled: bool,
    pub listen_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "0.0.0.0:5000".to_string(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listen_addr
            .parse()
            .map_err(|source| ServerError::InvalidAddress {
                addr: self.listen_addr.clone(),
                source,
            })
    }
}

impl Settings {
    /// Load from `path` and the process environment.
    ///
    /// A missing file is only an error when `required` is set.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        Self::load_with_env(path, required, Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("probe.args")
    }

    fn load_with_env(path: &Path, required: bool, env: Environment) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(required))
            .add_source(env)
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Check every rule and report all violations at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        let learning = &self.learning;
        if learning.samples < 2 {
            problems.push(format!(
                "learning.samples must be at least 2, got {}",
                learning.samples
            ));
        }
        if !learning.tolerance_factor.is_finite() || learning.tolerance_factor <= 0.0 {
            problems.push(format!(
                "learning.tolerance_factor must be a positive number, got {}",
                learning.tolerance_factor
            ));
        }
        if !learning.min_spread_mbps.is_finite() || learning.min_spread_mbps < 0.0 {
            problems.push(format!(
                "learning.min_spread_mbps must be zero or positive, got {}",
                learning.min_spread_mbps
            ));
        }
        if let Some(max) = learning.max_attempts {
            if max < learning.samples {
                problems.push(format!(
                    "learning.max_attempts ({}) must be at least learning.samples ({})",
                    max, learning.samples
                ));
            }
        }
        if learning.interval.is_zero() {
            problems.push("learning.interval must be greater than zero".to_string());
        }
        if self.monitoring.interval.is_zero() {
            problems.push("monitoring.interval must be greater than zero".to_string());
        }

        if self.retry.attempts < 1 {
            problems.push("retry.attempts must be at least 1".to_string());
        }
        if self.retry.strategy == BackoffStrategy::Exponential
            && self.retry.max_backoff < self.retry.backoff
        {
            problems.push("retry.max_backoff must not be less than retry.backoff".to_string());
        }

        if self.probe.kind == ProbeKind::Command && self.probe.command.trim().is_empty() {
            problems.push("probe.command must not be empty".to_string());
        }
        if self.probe.kind == ProbeKind::Http {
            if self.probe.download_url.is_none() {
                problems.push("probe.download_url is required for the http probe".to_string());
            }
            if self.probe.upload_url.is_none() {
                problems.push("probe.upload_url is required for the http probe".to_string());
            }
        }
        if self.probe.timeout.is_some_and(|t| t.is_zero()) {
            problems.push("probe.timeout must be greater than zero when set".to_string());
        }

        if self.history.capacity < 1 {
            problems.push("history.capacity must be at least 1".to_string());
        }
        if self.alerts.log_file.as_os_str().is_empty() {
            problems.push("alerts.log_file must not be empty".to_string());
        }

        let email = &self.notify.email;
        if email.enabled {
            if email.sender.as_deref().map_or(true, |s| s.trim().is_empty()) {
                problems.push("notify.email.sender is required when email is enabled".to_string());
            }
            if email.receiver.as_deref().map_or(true, |s| s.trim().is_empty()) {
                problems
                    .push("notify.email.receiver is required when email is enabled".to_string());
            }
            if email.transport == EmailTransport::Smtp {
                if email.smtp_server.as_deref().map_or(true, |s| s.trim().is_empty()) {
                    problems.push(
                        "notify.email.smtp_server is required for the smtp transport".to_string(),
                    );
                }
                if email.smtp_port == 0 {
                    problems.push("notify.email.smtp_port must not be 0".to_string());
                }
                if email.password.as_deref().map_or(true, |s| s.is_empty()) {
                    problems.push(
                        "notify.email.password is required for the smtp transport".to_string(),
                    );
                }
                if email.timeout.is_zero() {
                    problems.push("notify.email.timeout must be greater than zero".to_string());
                }
            }
        }
        let webhook = &self.notify.webhook;
        if webhook.enabled && webhook.url.as_deref().map_or(true, |s| s.trim().is_empty()) {
            problems.push("notify.webhook.url is required when the webhook is enabled".to_string());
        }

        if self.server.enabled {
            if let Err(e) = self.server.socket_addr() {
                problems.push(e.to_string());
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems.join("; ")))
        }
    }

    /// A copy with secrets masked, for printing.
    pub fn redacted(&self) -> Settings {
        let mut settings = self.clone();
        let mask = |secret: &mut Option<String>| {
            if secret.is_some() {
                *secret = Some("********".to_string());
            }
        };
        mask(&mut settings.notify.email.password);
        mask(&mut settings.notify.webhook.bearer_token);
        settings
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        match self.retry.strategy {
            BackoffStrategy::Fixed => RetryPolicy::fixed(self.retry.attempts, self.retry.backoff),
            BackoffStrategy::Exponential => RetryPolicy::exponential(
                self.retry.attempts,
                self.retry.backoff,
                self.retry.max_backoff,
            ),
        }
    }

    pub fn learning_config(&self) -> LearningConfig {
        LearningConfig {
            samples: self.learning.samples,
            interval: self.learning.interval,
            tolerance_factor: self.learning.tolerance_factor,
            min_spread: self.learning.min_spread_mbps,
            max_attempts: self.learning.max_attempts,
        }
    }
}

//! Webhook notifier.
//!
//! POSTs `{"subject": ..., "text": ...}` to a URL. The `text` field makes the
//! payload directly usable by Slack and Mattermost incoming webhooks.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;

use crate::{Notifier, NotifyError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers alerts as JSON over HTTP.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
    bearer_token: Option<String>,
    subject: String,
}

#[derive(Debug, Serialize)]
struct Payload<'a> {
    subject: &'a str,
    text: &'a str,
}

impl WebhookNotifier {
    /// Create a new builder for configuring the notifier.
    pub fn builder() -> WebhookNotifierBuilder {
        WebhookNotifierBuilder::default()
    }

    /// The target URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        let payload = Payload {
            subject: &self.subject,
            text: message,
        };

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send()?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(NotifyError::Rejected("Invalid credentials".to_string()));
        }

        if !response.status().is_success() {
            return Err(NotifyError::Http(format!(
                "Webhook returned status {}",
                response.status()
            )));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

/// Builder for WebhookNotifier.
#[derive(Debug, Default)]
pub struct WebhookNotifierBuilder {
    url: Option<String>,
    bearer_token: Option<String>,
    subject: Option<String>,
    timeout: Option<Duration>,
}

impl WebhookNotifierBuilder {
    /// Set the webhook URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Send `Authorization: Bearer <token>` with each request.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Subject field. Defaults to `Network Speed Alert`.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Request timeout. Defaults to 10 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the WebhookNotifier.
    pub fn build(self) -> Result<WebhookNotifier, NotifyError> {
        let url = self
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| NotifyError::Rejected("url is required".to_string()))?;

        let client = Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        Ok(WebhookNotifier {
            client,
            url,
            bearer_token: self.bearer_token,
            subject: self
                .subject
                .unwrap_or_else(|| "Network Speed Alert".to_string()),
        })
    }
}

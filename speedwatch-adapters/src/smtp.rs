//! SMTP notifier.
//!
//! Connects to a relay, upgrades with STARTTLS and authenticates before
//! sending. One connection per message; alerts are rare.
//!
//! ## Example
//!
//! ```rust,no_run
//! use speedwatch_adapters::{Notifier, SmtpNotifier};
//!
//! let notifier = SmtpNotifier::builder()
//!     .server("smtp.example.com")
//!     .port(587)
//!     .sender("monitor@example.com")
//!     .receiver("ops@example.com")
//!     .password("app-password")
//!     .build()?;
//!
//! notifier.notify("Abnormal Download Speed: 3.20 Mbps")?;
//! # Ok::<(), speedwatch_adapters::NotifyError>(())
//! ```

use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{SmtpTransport, Transport};

use crate::{Notifier, NotifyError};

const DEFAULT_PORT: u16 = 587;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Emails alerts through an authenticated SMTP relay.
#[derive(Clone)]
pub struct SmtpNotifier {
    transport: SmtpTransport,
    server: String,
    port: u16,
    sender: Mailbox,
    receiver: Mailbox,
    subject: String,
}

impl std::fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("relay", &self.relay())
            .field("sender", &self.sender.to_string())
            .field("receiver", &self.receiver.to_string())
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

impl SmtpNotifier {
    /// Create a new builder for configuring the notifier.
    pub fn builder() -> SmtpNotifierBuilder {
        SmtpNotifierBuilder::default()
    }

    /// `host:port` of the relay.
    pub fn relay(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }

    /// Build the message for `body` without sending it.
    pub fn message(&self, body: &str) -> Result<Message, NotifyError> {
        Message::builder()
            .from(self.sender.clone())
            .to(self.receiver.clone())
            .subject(self.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| NotifyError::Rejected(e.to_string()))
    }
}

impl Notifier for SmtpNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        let email = self.message(message)?;
        self.transport.send(&email)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}

/// Builder for SmtpNotifier.
#[derive(Debug, Default)]
pub struct SmtpNotifierBuilder {
    server: Option<String>,
    port: Option<u16>,
    sender: Option<String>,
    receiver: Option<String>,
    username: Option<String>,
    password: Option<String>,
    subject: Option<String>,
    timeout: Option<Duration>,
}

impl SmtpNotifierBuilder {
    /// Relay host name.
    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    /// Relay port. Defaults to 587 (submission with STARTTLS).
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = Some(receiver.into());
        self
    }

    /// Login name. Defaults to the sender address.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Subject line. Defaults to `Network Speed Alert`.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Connection and command timeout. Defaults to 30 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the SmtpNotifier. No connection is made until the first send.
    pub fn build(self) -> Result<SmtpNotifier, NotifyError> {
        let server = required(self.server, "server")?;
        let sender_addr = required(self.sender, "sender")?;
        let receiver_addr = required(self.receiver, "receiver")?;
        let password = required(self.password, "password")?;

        let sender: Mailbox = sender_addr
            .parse()
            .map_err(|e| NotifyError::Rejected(format!("invalid sender '{}': {}", sender_addr, e)))?;
        let receiver: Mailbox = receiver_addr.parse().map_err(|e| {
            NotifyError::Rejected(format!("invalid receiver '{}': {}", receiver_addr, e))
        })?;

        let port = self.port.unwrap_or(DEFAULT_PORT);
        let username = self.username.unwrap_or(sender_addr);
        let transport = SmtpTransport::starttls_relay(&server)?
            .port(port)
            .credentials(Credentials::new(username, password))
            .timeout(Some(self.timeout.unwrap_or(DEFAULT_TIMEOUT)))
            .build();

        Ok(SmtpNotifier {
            transport,
            server,
            port,
            sender,
            receiver,
            subject: self
                .subject
                .unwrap_or_else(|| "Network Speed Alert".to_string()),
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, NotifyError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| NotifyError::Rejected(format!("{} is required", field)))
}

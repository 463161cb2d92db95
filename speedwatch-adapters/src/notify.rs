//! Notification sinks and the sendmail notifier.

use std::fmt::Debug;
use std::io::Write;
use std::process::{Command, Stdio};

use crate::NotifyError;

/// Something that can deliver an alert message.
///
/// Delivery is best effort. Callers log failures and never retry.
pub trait Notifier: Send + Sync + Debug {
    /// Deliver one message.
    fn notify(&self, message: &str) -> Result<(), NotifyError>;

    /// Short name used in log lines.
    fn name(&self) -> &str;
}

/// Emails alerts by piping an RFC 5322 message into a sendmail-compatible
/// binary (`sendmail`, `msmtp`, `ssmtp`, ...).
///
/// Sender, receiver and subject are fixed at construction; SMTP relay and
/// credentials live in the sendmail program's own configuration.
#[derive(Debug, Clone)]
pub struct SendmailNotifier {
    sendmail_path: String,
    sender: String,
    receiver: String,
    subject: String,
}

impl SendmailNotifier {
    /// Create a new builder for configuring the notifier.
    pub fn builder() -> SendmailNotifierBuilder {
        SendmailNotifierBuilder::default()
    }

    /// Render the full message that is written to sendmail's stdin.
    pub fn format_message(&self, body: &str) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}\r\n",
            self.sender, self.receiver, self.subject, body
        )
    }
}

impl Notifier for SendmailNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        let mut child = Command::new(&self.sendmail_path)
            .arg("-i")
            .arg("-f")
            .arg(&self.sender)
            .arg(&self.receiver)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(self.format_message(message).as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(NotifyError::Rejected(format!(
                "{} exited with {}: {}",
                self.sendmail_path,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    fn name(&self) -> &str {
        "email"
    }
}

/// Builder for SendmailNotifier.
#[derive(Debug, Default)]
pub struct SendmailNotifierBuilder {
    sendmail_path: Option<String>,
    sender: Option<String>,
    receiver: Option<String>,
    subject: Option<String>,
}

impl SendmailNotifierBuilder {
    /// Path to the sendmail binary. Defaults to `/usr/sbin/sendmail`.
    pub fn sendmail_path(mut self, path: impl Into<String>) -> Self {
        self.sendmail_path = Some(path.into());
        self
    }

    /// Envelope and header sender.
    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Recipient address.
    pub fn receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = Some(receiver.into());
        self
    }

    /// Subject line. Defaults to `Network Speed Alert`.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Build the SendmailNotifier.
    pub fn build(self) -> Result<SendmailNotifier, NotifyError> {
        let sender = self
            .sender
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| NotifyError::Rejected("sender is required".to_string()))?;
        let receiver = self
            .receiver
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| NotifyError::Rejected("receiver is required".to_string()))?;

        Ok(SendmailNotifier {
            sendmail_path: self
                .sendmail_path
                .unwrap_or_else(|| "/usr/sbin/sendmail".to_string()),
            sender,
            receiver,
            subject: self
                .subject
                .unwrap_or_else(|| "Network Speed Alert".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier(path: &str) -> SendmailNotifier {
        SendmailNotifier::builder()
            .sendmail_path(path)
            .sender("monitor@example.com")
            .receiver("ops@example.com")
            .build()
            .unwrap()
    }

    #[test]
    fn message_has_fixed_headers() {
        let msg = notifier("/usr/sbin/sendmail").format_message("Abnormal Upload Speed: 1.00 Mbps");
        assert!(msg.starts_with("From: monitor@example.com\r\nTo: ops@example.com\r\n"));
        assert!(msg.contains("Subject: Network Speed Alert\r\n"));
        assert!(msg.ends_with("\r\n\r\nAbnormal Upload Speed: 1.00 Mbps\r\n"));
    }

    #[test]
    fn builder_requires_addresses() {
        let err = SendmailNotifier::builder()
            .receiver("ops@example.com")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("sender"));

        let err = SendmailNotifier::builder()
            .sender("monitor@example.com")
            .receiver("  ")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("receiver"));
    }

    #[cfg(unix)]
    fn fake_sendmail(dir: &std::path::Path, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-sendmail");
        std::fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[test]
    fn pipes_message_into_program() {
        use std::io::Read;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("mail.txt");
        let script = fake_sendmail(dir.path(), &format!("cat > '{}'", out.display()));

        notifier(script.to_str().unwrap()).notify("hello").unwrap();

        let mut written = String::new();
        std::fs::File::open(&out)
            .unwrap()
            .read_to_string(&mut written)
            .unwrap();
        assert!(written.contains("Subject: Network Speed Alert"));
        assert!(written.contains("hello"));
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_sendmail(dir.path(), "cat > /dev/null; echo 'relay denied' >&2; exit 1");

        let err = notifier(script.to_str().unwrap()).notify("hello").unwrap_err();
        assert!(matches!(err, NotifyError::Rejected(_)));
    }

    #[test]
    fn missing_binary_is_io_error() {
        let err = notifier("/nonexistent/sendmail").notify("hello").unwrap_err();
        assert!(matches!(err, NotifyError::Io(_)));
    }
}

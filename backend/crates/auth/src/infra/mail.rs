//! Email delivery
//!
//! - [`ResendEmailSender`]: HTTP API delivery
//! - [`LogEmailSender`]: writes the message to the log (local runs)
//! - [`RecordingEmailSender`]: keeps messages in memory (tests)

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;

use crate::domain::collaborator::{CollaboratorError, EmailMessage, EmailSender};

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

impl From<reqwest::Error> for CollaboratorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CollaboratorError::Timeout
        } else if e.is_decode() {
            CollaboratorError::Malformed(e.to_string())
        } else {
            CollaboratorError::Transport(e.to_string())
        }
    }
}

#[derive(Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

/// Sends through the Resend HTTP API
pub struct ResendEmailSender {
    client: reqwest::Client,
    api_key: String,
    from: String,
    endpoint: String,
}

impl ResendEmailSender {
    pub fn new(
        api_key: impl Into<String>,
        from: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            from: from.into(),
            endpoint: RESEND_ENDPOINT.to_string(),
        })
    }
}

impl EmailSender for ResendEmailSender {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), CollaboratorError> {
        let payload = ResendPayload {
            from: &self.from,
            to: [message.to.as_str()],
            subject: &message.subject,
            text: &message.body,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CollaboratorError::Status(response.status().as_u16()));
        }

        tracing::debug!(subject = %message.subject, "Email accepted by provider");
        Ok(())
    }
}

/// Logs the subject and recipient instead of sending
///
/// The body is logged at debug level only; it may carry a reset link.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), CollaboratorError> {
        tracing::info!(to = %message.to, subject = %message.subject, "Email (not sent, log only)");
        tracing::debug!(body = %message.body, "Email body");
        Ok(())
    }
}

/// Keeps every message; optionally fails every send
#[derive(Debug, Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<EmailMessage>>,
    fail: bool,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EmailSender for RecordingEmailSender {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), CollaboratorError> {
        if self.fail {
            return Err(CollaboratorError::Transport("connection refused".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }
}

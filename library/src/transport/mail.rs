use super::TransportError;
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

/// Address with an optional display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mailbox {
    /// E-Mail address
    pub email: String,
    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Mailbox {
    /// Creates a mailbox with a display name
    pub fn named(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: Some(name.into()),
        }
    }
}

/// Fully rendered message for a single recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    /// Recipient
    pub to: Mailbox,
    /// Subject line
    pub subject: String,
    /// Plain text body
    pub text: String,
}

/// Capability to deliver a rendered message
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Sends a single message
    async fn send(&self, message: &MailMessage) -> Result<(), TransportError>;
}

/// [`MailSender`] which only logs messages, used when sending is disabled
#[derive(Default)]
pub struct LoggingMailSender;

#[async_trait]
impl MailSender for LoggingMailSender {
    async fn send(&self, message: &MailMessage) -> Result<(), TransportError> {
        info!(
            to = %message.to.email,
            subject = %message.subject,
            body = %message.text,
            "Mail sending disabled, dropping message"
        );
        Ok(())
    }
}

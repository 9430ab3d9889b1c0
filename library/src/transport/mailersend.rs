use super::{MailMessage, MailSender, Mailbox, TransportError};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Serialize)]
struct EmailRequest<'a> {
    from: &'a Mailbox,
    to: [&'a Mailbox; 1],
    subject: &'a str,
    text: &'a str,
}

/// [`MailSender`] using the MailerSend email API
pub struct MailerSendSender {
    client: Client,
    endpoint: Url,
    api_key: String,
    from: Mailbox,
}

impl MailerSendSender {
    /// Creates a sender posting to the given endpoint whose requests are aborted after `timeout`
    pub fn new(
        endpoint: Url,
        api_key: String,
        from: Mailbox,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl MailSender for MailerSendSender {
    #[instrument(skip(self, message), fields(to = %message.to.email))]
    async fn send(&self, message: &MailMessage) -> Result<(), TransportError> {
        let request = EmailRequest {
            from: &self.from,
            to: [&message.to],
            subject: &message.subject,
            text: &message.text,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Mail accepted by provider");
        Ok(())
    }
}

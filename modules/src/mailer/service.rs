use super::messages;
use async_trait::async_trait;
use domain::event::{Event, EventPayload, TransferParties};
use domain::upstream::{UpstreamApi, User};
use harness::Service;
use library::communication::event::{Consumer, NotificationFrame};
use library::communication::CommunicationFactory;
use library::transport::{MailMessage, MailSender};
use library::{BoxedError, EmptyResult};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

const ACCOUNT_EMAILS: &str = "myAccount";

#[derive(Debug, Error)]
enum MailerError {
    #[error("{failed} of {total} messages could not be delivered")]
    Undelivered { failed: usize, total: usize },
}

/// Collaborators of the [`MailerService`]
#[derive(Clone)]
pub struct MailerConfig {
    /// Mail transport
    pub sender: Arc<dyn MailSender>,
    /// Upstream API used to enrich events
    pub upstream: Arc<dyn UpstreamApi>,
    /// Base URL of the web application linked from messages
    pub app_url: String,
}

/// Consumer sending emails about events
pub struct MailerService {
    config: MailerConfig,
}

impl MailerService {
    /// Creates a new instance
    pub fn new(config: MailerConfig) -> Self {
        Self { config }
    }

    async fn transfer_messages(
        &self,
        code: &str,
        parties: &TransferParties,
    ) -> Result<Vec<MailMessage>, BoxedError> {
        let upstream = &self.config.upstream;
        let app_url = &self.config.app_url;

        let transfer = upstream.transfer(code, &parties.transfer).await?;
        let payer = upstream.member(code, &parties.payer).await?;
        let payee = upstream.member(code, &parties.payee).await?;
        let payer_users = upstream.member_users(&payer.id).await?;
        let payee_users = upstream.member_users(&payee.id).await?;

        let wanted = |user: &&User| user.wants_email(ACCOUNT_EMAILS);

        let sent = payer_users
            .iter()
            .filter(wanted)
            .map(|user| messages::payment_sent(user, &payer, &payee, &transfer, app_url));
        let received = payee_users
            .iter()
            .filter(wanted)
            .map(|user| messages::payment_received(user, &payer, &payee, &transfer, app_url));

        Ok(sent.chain(received).collect())
    }

    async fn member_messages(&self, code: &str, member: &str) -> Result<Vec<MailMessage>, BoxedError> {
        let group = self.config.upstream.group(code).await?;
        let member = self.config.upstream.member(code, member).await?;

        Ok(group
            .admins
            .iter()
            .map(|admin| messages::member_requested(admin, &group, &member, &self.config.app_url))
            .collect())
    }

    async fn group_messages(&self, code: &str) -> Result<Vec<MailMessage>, BoxedError> {
        let group = self.config.upstream.group(code).await?;

        Ok(group
            .admins
            .iter()
            .map(|admin| messages::group_activated(admin, &group, &self.config.app_url))
            .collect())
    }

    /// Attempts every message and fails if at least one could not be delivered
    async fn send_all(&self, messages: Vec<MailMessage>) -> EmptyResult {
        let total = messages.len();
        let mut failed = 0;

        for message in messages.iter() {
            match self.config.sender.send(message).await {
                Ok(_) => info!(to = %message.to.email, subject = %message.subject, "Sent mail"),
                Err(error) => {
                    warn!(to = %message.to.email, ?error, "Failed to send mail");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            Err(MailerError::Undelivered { failed, total }.into())
        } else {
            Ok(())
        }
    }
}

impl<F> Service<F> for MailerService
where
    F: CommunicationFactory + Send + Sync,
{
    const NAME: &'static str = "MailerService";

    type Instance = MailerService;
    type Config = MailerConfig;

    fn instantiate(_factory: F, config: &Self::Config) -> Self::Instance {
        MailerService::new(config.clone())
    }
}

#[async_trait]
impl Consumer for MailerService {
    type Notification = Event;

    #[instrument(skip(self, notification), fields(id = notification.id(), name = %notification.name))]
    async fn consume(&self, notification: NotificationFrame<Self::Notification>) -> EmptyResult {
        let messages = match notification.payload()? {
            Some(EventPayload::TransferCommitted(parties)) => {
                self.transfer_messages(&notification.code, &parties).await?
            }
            Some(EventPayload::MemberRequested { member }) => {
                self.member_messages(&notification.code, &member).await?
            }
            Some(EventPayload::GroupActivated) => self.group_messages(&notification.code).await?,
            _ => {
                debug!("Event does not result in mails");
                return Ok(());
            }
        };

        self.send_all(messages).await
    }
}

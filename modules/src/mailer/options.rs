use crate::options::{QueueingOptions, RedeliveryOptions, RedisOptions, UpstreamOptions};
use library::helpers::parse_seconds;
use library::transport::{LoggingMailSender, MailSender, Mailbox, MailerSendSender};
use library::BoxedError;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use structopt::StructOpt;

/// Options for the mail transport
#[derive(Debug, StructOpt)]
pub struct MailOptions {
    /// API key of the mail provider
    #[structopt(long, env = "MAILERSEND_API_KEY", hide_env_values = true, default_value = "")]
    pub mailersend_api_key: String,

    /// Send endpoint of the mail provider
    #[structopt(
        long,
        env = "MAILERSEND_ENDPOINT",
        default_value = "https://api.mailersend.com/v1/email",
        value_name = "url"
    )]
    pub mailersend_endpoint: Url,

    /// Deliver mails instead of only logging them
    #[structopt(long, env = "NOTIFICATIONS_SEND_MAILS")]
    pub send_mails: bool,

    /// Sender address
    #[structopt(long, env = "MAIL_FROM_ADDRESS", default_value = "noreply@komunitin.org")]
    pub from_address: String,

    /// Sender display name
    #[structopt(long, env = "MAIL_FROM_NAME", default_value = "Komunitin")]
    pub from_name: String,

    /// Base URL of the web application linked from mails
    #[structopt(long, env = "KOMUNITIN_APP_URL", value_name = "url")]
    pub app_url: String,

    /// Seconds after which a send request is aborted
    #[structopt(long = "mail-timeout", env = "MAIL_TIMEOUT", default_value = "30", parse(try_from_str = parse_seconds))]
    pub timeout: Duration,
}

impl MailOptions {
    /// Instantiates the transport described by these options
    pub fn sender(&self) -> Result<Arc<dyn MailSender>, BoxedError> {
        if !self.send_mails {
            return Ok(Arc::new(LoggingMailSender::default()));
        }

        if self.mailersend_api_key.is_empty() {
            return Err("sending mails requires an API key".into());
        }

        let sender = MailerSendSender::new(
            self.mailersend_endpoint.clone(),
            self.mailersend_api_key.clone(),
            Mailbox::named(&self.from_address, &self.from_name),
            self.timeout,
        )?;

        Ok(Arc::new(sender))
    }
}

/// Options for the mailer module
#[derive(Debug, StructOpt)]
pub struct Options {
    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub queueing: QueueingOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub redis: RedisOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub redelivery: RedeliveryOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub upstream: UpstreamOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub mail: MailOptions,
}

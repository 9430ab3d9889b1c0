//! Email delivery for account and group events

mod messages;
mod options;
mod service;

use async_trait::async_trait;
use harness::{Heart, Module, ServiceReclaimer, ServiceRunner};
use jatsl::{schedule, JobScheduler};
use library::communication::event::{ConsumerGroupDescriptor, ConsumerGroupIdentifier};
use library::BoxedError;
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub use options::{MailOptions, Options};
pub use service::{MailerConfig, MailerService};

/// Module implementation
pub struct Mailer {
    options: Options,
}

impl Mailer {
    /// Creates a new instance from raw parts
    pub fn new(options: Options) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Module for Mailer {
    #[instrument(skip(self, scheduler))]
    async fn run(&mut self, scheduler: &JobScheduler) -> Result<Option<Heart>, BoxedError> {
        let redis_url = self.options.redis.url.clone();
        let group = ConsumerGroupDescriptor::from(ConsumerGroupIdentifier::Mailer);
        let consumer = self.options.queueing.id.to_string();

        let config = MailerConfig {
            sender: self.options.mail.sender()?,
            upstream: Arc::new(self.options.upstream.client()?),
            app_url: self.options.mail.app_url.clone(),
        };

        if self.options.redelivery.reclaim {
            let reclaimer = ServiceReclaimer::<MailerService>::new(
                redis_url,
                group,
                consumer,
                self.options.redelivery.policy(),
                config,
            );

            let report = reclaimer.reclaim().await?;
            info!(?report, "Finished reclaiming");

            return Ok(None);
        }

        let mailer = ServiceRunner::<MailerService>::new(redis_url, group, consumer, config);

        debug!("Scheduling jobs");
        schedule!(scheduler, { mailer });

        Ok(Some(Heart::without_heart_stone()))
    }
}

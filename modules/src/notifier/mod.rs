//! Push notification fan-out
//!
//! Every event is mapped to the members it concerns. Their subscriptions are filtered by the
//! recipients' preferences and the resulting device tokens are addressed in multicast batches.
//! Tokens the provider reports as permanently invalid are removed from the store.

mod dispatch;
mod options;
mod policy;
mod resolver;
mod service;

use async_trait::async_trait;
use harness::{Heart, Module, ServiceReclaimer, ServiceRunner};
use jatsl::{schedule, JobScheduler};
use library::communication::event::{ConsumerGroupDescriptor, ConsumerGroupIdentifier};
use library::BoxedError;
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub use dispatch::{DispatchError, DispatchReport, Dispatcher};
pub use options::{Options, PushOptions};
pub use policy::{Audience, NotificationPolicy};
pub use resolver::{Recipient, SubscriptionResolver};
pub use service::{NotifierConfig, NotifierService};

/// Module implementation
pub struct Notifier {
    options: Options,
}

impl Notifier {
    /// Creates a new instance from raw parts
    pub fn new(options: Options) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Module for Notifier {
    #[instrument(skip(self, scheduler))]
    async fn run(&mut self, scheduler: &JobScheduler) -> Result<Option<Heart>, BoxedError> {
        let redis_url = self.options.redis.url.clone();
        let group = ConsumerGroupDescriptor::from(ConsumerGroupIdentifier::Notifier);
        let consumer = self.options.queueing.id.to_string();

        let config = NotifierConfig {
            sender: Arc::new(self.options.push.sender()?),
            upstream: Arc::new(self.options.upstream.client()?),
        };

        if self.options.redelivery.reclaim {
            let reclaimer = ServiceReclaimer::<NotifierService>::new(
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

        let notifier = ServiceRunner::<NotifierService>::new(redis_url, group, consumer, config);

        debug!("Scheduling jobs");
        schedule!(scheduler, { notifier });

        Ok(Some(Heart::without_heart_stone()))
    }
}

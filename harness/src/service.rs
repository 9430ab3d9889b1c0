use super::{DummyResourceHandleProvider, RedisCommunicationFactory};
use async_trait::async_trait;
use jatsl::{Job, JobManager};
use library::communication::event::{
    ConsumerExt, ConsumerGroupDescriptor, ReclaimReport, RedeliveryPolicy,
};
use library::communication::CommunicationFactory;
use library::{BoxedError, EmptyResult};
use std::sync::Arc;
use tracing::{info, instrument};

/// Structure which can be instantiated with a [`CommunicationFactory`]
pub trait Service<F: CommunicationFactory + Send + Sync> {
    /// Name of the service displayed in log messages
    const NAME: &'static str;
    /// Instance type which will be instantiated
    type Instance: Send + Sync;
    /// Configuration type passed to the service
    type Config: Send + Sync;

    /// Creates a new instance which could be of a different type
    fn instantiate(factory: F, config: &Self::Config) -> Self::Instance;
}

/// Runner for [`Service`] implementations where [`Service::Instance`] is conforming to the [`ConsumerExt`] trait
pub struct ServiceRunner<S: Service<RedisCommunicationFactory>> {
    redis_url: String,
    group: ConsumerGroupDescriptor,
    consumer: String,
    config: <S as Service<RedisCommunicationFactory>>::Config,
}

impl<S> ServiceRunner<S>
where
    S: Service<RedisCommunicationFactory>,
    S::Instance: ConsumerExt + Send + Sync,
{
    /// Creates a new runner job which will connect to the given redis server and use the provided consumer group and name.
    pub fn new(
        redis_url: String,
        group: ConsumerGroupDescriptor,
        consumer: String,
        config: <S as Service<RedisCommunicationFactory>>::Config,
    ) -> Self {
        Self {
            redis_url,
            group,
            consumer,
            config,
        }
    }
}

#[async_trait]
impl<S> Job for ServiceRunner<S>
where
    S: Service<RedisCommunicationFactory> + Send + Sync,
    S::Instance: ConsumerExt,
{
    const NAME: &'static str = "ServiceRunner";

    fn name(&self) -> String {
        format!("{}({})", Self::NAME, S::NAME)
    }

    async fn execute(&self, manager: JobManager) -> EmptyResult {
        let handle_provider = Arc::new(manager.clone());
        let factory = RedisCommunicationFactory::new(self.redis_url.clone(), handle_provider);
        let provider = factory.queue_provider();
        let service = S::instantiate(factory, &self.config);

        manager.ready().await;

        service
            .consume_queue(provider, &self.group, &self.consumer, None)
            .await?;

        Ok(())
    }
}

/// One-shot counterpart to [`ServiceRunner`] which takes over abandoned entries of a consumer group
pub struct ServiceReclaimer<S: Service<RedisCommunicationFactory>> {
    redis_url: String,
    group: ConsumerGroupDescriptor,
    consumer: String,
    policy: RedeliveryPolicy,
    config: <S as Service<RedisCommunicationFactory>>::Config,
}

impl<S> ServiceReclaimer<S>
where
    S: Service<RedisCommunicationFactory>,
    S::Instance: ConsumerExt + Send + Sync,
{
    /// Creates a new reclaimer which claims entries for the given consumer
    pub fn new(
        redis_url: String,
        group: ConsumerGroupDescriptor,
        consumer: String,
        policy: RedeliveryPolicy,
        config: <S as Service<RedisCommunicationFactory>>::Config,
    ) -> Self {
        Self {
            redis_url,
            group,
            consumer,
            policy,
            config,
        }
    }

    /// Runs a single reclaim pass
    #[instrument(skip(self), fields(service = S::NAME, group = %self.group.identifier()))]
    pub async fn reclaim(&self) -> Result<ReclaimReport, BoxedError> {
        let factory =
            RedisCommunicationFactory::new(self.redis_url.clone(), DummyResourceHandleProvider::new());
        let provider = factory.queue_provider();
        let service = S::instantiate(factory, &self.config);

        info!(policy = ?self.policy, "Reclaiming abandoned entries");
        service
            .reclaim_queue(provider, &self.group, &self.consumer, &self.policy)
            .await
    }
}

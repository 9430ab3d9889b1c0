use super::MonitoredConnection;
use async_trait::async_trait;
use jatsl::{TaskManager, TaskResourceHandle};
use library::communication::implementation::redis::{
    BoxedConnection, RedisConnectionVariant, RedisFactory, RedisPublisher, RedisQueueProvider,
};
use library::communication::CommunicationFactory;
use library::storage::{IndexedStore, RedisStoreBackend};
use library::BoxedError;
use std::sync::Arc;

/// Source of [`TaskResourceHandle`]s attached to every connection a factory opens
pub trait ResourceHandleProvider {
    /// Handle for a single connection
    fn create_handle(&self) -> TaskResourceHandle;
}

/// Hands out stub handles, used by one-shot tasks that run outside of a job
pub struct DummyResourceHandleProvider;

impl DummyResourceHandleProvider {
    /// Shareable instance
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl ResourceHandleProvider for DummyResourceHandleProvider {
    fn create_handle(&self) -> TaskResourceHandle {
        TaskResourceHandle::stub()
    }
}

impl<C> ResourceHandleProvider for TaskManager<C> {
    fn create_handle(&self) -> TaskResourceHandle {
        self.create_resource_handle()
    }
}

/// Shared [`ResourceHandleProvider`] trait object
pub type BoxedResourceHandleProvider = Arc<dyn ResourceHandleProvider + Send + Sync>;

/// Entry point to every redis backed component: event stream, publisher and subscription store
///
/// Connections are monitored so that a lost server takes down the job that depends on it.
#[derive(Clone)]
pub struct RedisCommunicationFactory {
    url: String,
    handle_provider: BoxedResourceHandleProvider,
}

impl RedisCommunicationFactory {
    /// Factory for the server at `url` which reports connection loss through `handle_provider`
    pub fn new(url: String, handle_provider: BoxedResourceHandleProvider) -> Self {
        Self {
            url,
            handle_provider,
        }
    }

    /// Subscription store living on the same server as the event stream
    pub fn indexed_store(&self) -> IndexedStore {
        IndexedStore::new(Arc::new(RedisStoreBackend::new(self.clone())))
    }
}

#[async_trait]
impl RedisFactory for RedisCommunicationFactory {
    async fn connection(
        &self,
        variant: RedisConnectionVariant,
    ) -> Result<BoxedConnection, BoxedError> {
        let handle = self.handle_provider.create_handle();

        let connection = match variant {
            RedisConnectionVariant::Owned => {
                BoxedConnection::new(MonitoredConnection::owned(handle, &self.url).await?)
            }
            RedisConnectionVariant::Multiplexed => {
                BoxedConnection::new(MonitoredConnection::shared(handle, &self.url).await?)
            }
        };

        Ok(connection)
    }
}

impl CommunicationFactory for RedisCommunicationFactory {
    type QueueProvider = RedisQueueProvider<Self>;
    type NotificationPublisher = RedisPublisher<Self>;

    fn queue_provider(&self) -> Self::QueueProvider {
        RedisQueueProvider::new(self.clone())
    }

    fn notification_publisher(&self) -> Self::NotificationPublisher {
        RedisPublisher::new(self.clone())
    }
}

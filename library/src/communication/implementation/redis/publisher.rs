use super::{RedisConnectionVariant, RedisFactory, STREAM_ID_NEW};
use crate::communication::event::{QueueDescriptor, RawNotificationPublisher};
use crate::communication::implementation::fields::FieldsNotificationPublisher;
use crate::BoxedError;
use async_trait::async_trait;
use redis::streams::StreamMaxlen;
use redis::AsyncCommands;

/// [`NotificationPublisher`](crate::communication::event::NotificationPublisher) implementation using [`XADD`](https://redis.io/commands/xadd)
pub struct RedisPublisher<F: RedisFactory> {
    factory: F,
}

impl<F> RedisPublisher<F>
where
    F: RedisFactory,
{
    /// Creates a new instance which obtains connections from the given factory
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

impl<F> FieldsNotificationPublisher for RedisPublisher<F> where F: RedisFactory + Send + Sync {}

#[async_trait]
impl<F> RawNotificationPublisher for RedisPublisher<F>
where
    F: RedisFactory + Send + Sync,
{
    async fn publish_raw(
        &self,
        fields: &[(String, String)],
        descriptor: QueueDescriptor,
    ) -> Result<String, BoxedError> {
        let mut con = self
            .factory
            .connection(RedisConnectionVariant::Multiplexed)
            .await?;

        let id: String = match descriptor.limit() {
            Some(limit) => {
                con.xadd_maxlen(
                    descriptor.key(),
                    StreamMaxlen::Approx(limit),
                    STREAM_ID_NEW,
                    fields,
                )
                .await?
            }
            None => con.xadd(descriptor.key(), STREAM_ID_NEW, fields).await?,
        };

        Ok(id)
    }
}

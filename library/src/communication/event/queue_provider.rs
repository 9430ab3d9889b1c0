use super::{ConsumerGroupDescriptor, QueueDescriptor, QueueEntry};
use crate::BoxedError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::time::Duration;

/// Rules by which abandoned entries are handed out again
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeliveryPolicy {
    /// Minimum time an entry has to be pending before it is considered abandoned
    pub min_idle: Duration,
    /// Number of deliveries after which an entry is moved to the dead-letter queue
    pub max_deliveries: usize,
    /// Number of pending entries inspected per round-trip
    pub batch_size: usize,
}

impl Default for RedeliveryPolicy {
    fn default() -> Self {
        Self {
            min_idle: Duration::from_secs(300),
            max_deliveries: 5,
            batch_size: 100,
        }
    }
}

/// Result of a [`reclaim`](QueueProvider::reclaim) pass
pub struct Reclaimed<E> {
    /// Entries now owned by the reclaiming consumer, to be processed and acknowledged by it
    pub claimed: Vec<E>,
    /// Ids of entries which exceeded the delivery budget and have been moved to the dead-letter queue
    pub dead_lettered: Vec<String>,
}

/// Allows consumption of notification queues using [consumer groups](ConsumerGroupDescriptor)
#[async_trait]
pub trait QueueProvider {
    /// Type of [`QueueEntry`] returned by the provider
    type Entry: QueueEntry + Send + Sync;

    /// Subscribes to notifications on a given queue joining the specified [`ConsumerGroup`](ConsumerGroupDescriptor)
    /// with the given [`ConsumerIdentifier`](super::ConsumerIdentifier) or creates the group if it does not exist.
    ///
    /// Entries which have previously been delivered to the same consumer but were never acknowledged
    /// are yielded first, followed by new entries in append order. The stream ends when no entry
    /// arrived within `idle_timeout` or never if it is `None`.
    async fn consume(
        &self,
        queue: QueueDescriptor,
        group: &ConsumerGroupDescriptor,
        consumer: &str, // &ConsumerIdentifier
        batch_size: usize,
        idle_timeout: Option<Duration>,
    ) -> Result<BoxStream<Result<Self::Entry, BoxedError>>, BoxedError>;

    /// Takes over entries of the group that have been pending for at least [`RedeliveryPolicy::min_idle`].
    ///
    /// Entries which have already been delivered [`RedeliveryPolicy::max_deliveries`] times are copied
    /// to the [dead-letter queue](QueueDescriptor::dead_letter) and acknowledged instead of being claimed.
    async fn reclaim(
        &self,
        queue: QueueDescriptor,
        group: &ConsumerGroupDescriptor,
        consumer: &str, // &ConsumerIdentifier
        policy: &RedeliveryPolicy,
    ) -> Result<Reclaimed<Self::Entry>, BoxedError>;
}

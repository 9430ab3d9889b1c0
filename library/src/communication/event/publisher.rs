use super::{Notification, QueueDescriptor};
use crate::BoxedError;
use async_trait::async_trait;

/// Structure which allows appending flat field maps to a queue
#[async_trait]
pub trait RawNotificationPublisher {
    /// Appends the fields to a [`Queue`](QueueDescriptor) and returns the id assigned to the new entry
    async fn publish_raw(
        &self,
        fields: &[(String, String)],
        descriptor: QueueDescriptor,
    ) -> Result<String, BoxedError>;
}

/// Publisher for [`Notifications`](Notification)
#[async_trait]
pub trait NotificationPublisher {
    /// Publishes a [`Notification`] to its designated queue and returns the id assigned to it
    async fn publish<N: Notification + Send + Sync>(
        &self,
        notification: &N,
    ) -> Result<String, BoxedError>;
}

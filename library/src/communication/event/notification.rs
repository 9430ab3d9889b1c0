use super::QueueDescriptor;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::ops::Deref;

/// Entity to notify other services about an event that took place
pub trait Notification: Serialize + DeserializeOwned + PartialEq + Debug {
    /// Queue on which this implementation can be sent and received
    fn queue() -> QueueDescriptor;
}

/// Frame around a received notification carrying the id assigned by the queue
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationFrame<T> {
    id: String,
    notification: T,
}

impl<T> NotificationFrame<T> {
    /// Creates a new instance from raw parts
    pub fn new(id: impl Into<String>, notification: T) -> Self {
        Self {
            id: id.into(),
            notification,
        }
    }

    /// Identifier assigned by the queue when the notification was appended
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Consumes the `NotificationFrame`, returning the wrapped [`Notification`]
    pub fn into_inner(self) -> T {
        self.notification
    }
}

impl<T> Deref for NotificationFrame<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.notification
    }
}

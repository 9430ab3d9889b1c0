use crate::{BoxedError, EmptyResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

const DEAD_LETTER_EXTENSION: &str = "dead-letter";

/// Describes a notification queue and its parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDescriptor {
    key: String,
    limit: Option<usize>,
}

impl QueueDescriptor {
    /// Creates a new instance from raw parts
    pub fn new(key: String, limit: Option<usize>) -> Self {
        Self { key, limit }
    }

    /// Value which may be used by queue implementations to identify a queue
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Maximum number of notifications to be retained in the queue.
    /// `None` leaves trimming to an external process.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Queue which receives entries that exceeded their delivery budget
    pub fn dead_letter(&self) -> QueueDescriptor {
        Self {
            key: format!("{}.{}", self.key, DEAD_LETTER_EXTENSION),
            limit: self.limit,
        }
    }
}

/// Location within the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueLocation {
    /// Start of the queue (not necessarily the first notification ever appended as a queue may be trimmed)
    Head,
    /// End of the queue (exclusive of the last message)
    Tail,
}

/// Entry retrieved from a [`Queue`](QueueDescriptor) providing the raw field map
#[async_trait]
pub trait RawQueueEntry {
    /// Identifier assigned by the queue
    fn id(&self) -> &str;

    /// Flat field map of the entry
    fn fields(&self) -> &HashMap<String, String>;

    /// Acknowledge the item as processed
    async fn acknowledge(&mut self) -> EmptyResult;
}

/// Useful functions for [`QueueEntry`] implementations with default implementations
pub trait QueueEntry: RawQueueEntry {
    /// Attempts to parse the wire-format fields into a given data structure
    fn parse_payload<T>(&self) -> Result<T, BoxedError>
    where
        T: DeserializeOwned;
}

/// Field added to dead-lettered entries naming the consumer group that gave up on them
pub const DEAD_LETTER_GROUP_FIELD: &str = "deadLetterGroup";
/// Field added to dead-lettered entries holding the id of the original entry
pub const DEAD_LETTER_ID_FIELD: &str = "deadLetterId";
/// Field added to dead-lettered entries holding the number of deliveries
pub const DEAD_LETTER_DELIVERIES_FIELD: &str = "deadLetterDeliveries";

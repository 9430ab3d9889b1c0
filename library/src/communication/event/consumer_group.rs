use super::QueueLocation;
use std::fmt;

/// Unique identifier for a group of consumers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerGroupIdentifier {
    /// Push notification fan-out
    Notifier,
    /// Email delivery
    Mailer,
    /// Unknown consumer group
    Other(String),
}

impl fmt::Display for ConsumerGroupIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notifier => write!(f, "notifier"),
            Self::Mailer => write!(f, "mailer"),
            Self::Other(identifier) => write!(f, "{}", identifier),
        }
    }
}

/// Definition of a consumer group
///
/// In a message queue, a group of consumers collaborates to consume messages.
/// Each message is only delivered to one consumer within the same group, identified
/// by a [`ConsumerGroupIdentifier`]. When it is created, the group starts processing messages
/// from the provided [`QueueLocation`].
#[derive(Debug, Clone)]
pub struct ConsumerGroupDescriptor {
    identifier: ConsumerGroupIdentifier,
    start: QueueLocation,
}

impl ConsumerGroupDescriptor {
    /// Creates a new instance from raw parts
    pub fn new(identifier: ConsumerGroupIdentifier, start: QueueLocation) -> Self {
        Self { identifier, start }
    }

    /// Unique identifier of the group
    pub fn identifier(&self) -> &ConsumerGroupIdentifier {
        &self.identifier
    }

    /// Location from where a consumer group begins to consume messages
    ///
    /// Note that it is not guaranteed that this will be honored (e.g. when the group already exists)!
    pub fn start(&self) -> QueueLocation {
        self.start
    }
}

impl From<ConsumerGroupIdentifier> for ConsumerGroupDescriptor {
    /// Starts at [`QueueLocation::Head`] so that entries appended before the group existed are not missed
    fn from(identifier: ConsumerGroupIdentifier) -> Self {
        Self::new(identifier, QueueLocation::Head)
    }
}

/// Unique identifier of a consumer within a [`ConsumerGroup`](ConsumerGroupDescriptor)
pub type ConsumerIdentifier = String;

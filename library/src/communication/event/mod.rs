//! Structures to realise an event-driven service architecture
//!
//! Producers append [`Notifications`](Notification) to a [`Queue`](QueueDescriptor), an
//! append-only log with strictly increasing entry ids. Consumers never read the log directly;
//! instead they join a [`ConsumerGroup`](ConsumerGroupDescriptor). Each group keeps its own cursor
//! and its own set of pending entries, so every group observes every entry independently of all
//! other groups, while consumers within one group share the load.
//!
//! Every delivered entry has to be acknowledged once processing concludes. Entries that are
//! never acknowledged stay pending for their group. A consumer restarting with the same
//! [`ConsumerIdentifier`] first replays its own pending entries before reading new ones, and
//! operators may [`reclaim`](QueueProvider::reclaim) entries left behind by consumers that
//! are gone for good. Entries that keep failing are moved to a dead-letter queue instead of
//! being retried forever.

mod consumer;
mod consumer_group;
mod notification;
mod publisher;
mod queue;
mod queue_provider;

pub use consumer::*;
pub use consumer_group::*;
pub use notification::*;
pub use publisher::*;
pub use queue::*;
pub use queue_provider::*;

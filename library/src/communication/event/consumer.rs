use super::{ConsumerGroupDescriptor, Notification, NotificationFrame, RedeliveryPolicy};
use super::{QueueEntry, QueueProvider, RawQueueEntry};
use crate::communication::BlackboxError;
use crate::{BoxedError, EmptyResult};
use async_trait::async_trait;
use futures::StreamExt;
use std::any::type_name;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const DEFAULT_BATCH_SIZE: usize = 10;

#[derive(Debug, Error)]
enum ConsumerError {
    #[error("notification stream ended unexpectedly")]
    StreamEnded,
}

/// Entity which may consume and process [`Notifications`](Notification)
#[async_trait]
pub trait Consumer {
    /// Notification to consume
    type Notification: Notification;

    /// Processes an event notification and returns whether it succeeded or failed
    async fn consume(&self, notification: NotificationFrame<Self::Notification>) -> EmptyResult;
}

/// Outcome of a [`reclaim_queue`](ConsumerExt::reclaim_queue) pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReclaimReport {
    /// Claimed entries which have been processed and acknowledged
    pub processed: usize,
    /// Claimed entries which failed again and remain pending
    pub failed: usize,
    /// Entries moved to the dead-letter queue
    pub dead_lettered: usize,
}

/// Helper functions to aid the consumption of messages
#[async_trait]
pub trait ConsumerExt {
    /// Consumes notifications from a queue using the given provider and acknowledges
    /// those that have been successfully processed.
    ///
    /// Entries are handled one after another in queue order. A failing entry is logged and
    /// left pending while the loop advances to the next one.
    async fn consume_queue<Q>(
        &self,
        provider: Q,
        group: &ConsumerGroupDescriptor,
        consumer: &str, // &ConsumerIdentifier
        idle_timeout: Option<Duration>,
    ) -> EmptyResult
    where
        Q: QueueProvider + Send + Sync;

    /// Parses, processes and acknowledges a single entry
    async fn consume_entry<E>(&self, entry: E) -> EmptyResult
    where
        E: QueueEntry + Send + Sync;

    /// Takes over abandoned entries of the group and processes them, moving those
    /// that exhausted their delivery budget to the dead-letter queue.
    async fn reclaim_queue<Q>(
        &self,
        provider: Q,
        group: &ConsumerGroupDescriptor,
        consumer: &str, // &ConsumerIdentifier
        policy: &RedeliveryPolicy,
    ) -> Result<ReclaimReport, BoxedError>
    where
        Q: QueueProvider + Send + Sync;
}

#[async_trait]
impl<C> ConsumerExt for C
where
    C: Consumer + Send + Sync,
    C::Notification: Send + Sync,
{
    async fn consume_queue<Q>(
        &self,
        provider: Q,
        group: &ConsumerGroupDescriptor,
        consumer: &str, // &ConsumerIdentifier
        idle_timeout: Option<Duration>,
    ) -> EmptyResult
    where
        Q: QueueProvider + Send + Sync,
    {
        let mut stream = provider
            .consume(
                C::Notification::queue(),
                group,
                consumer,
                DEFAULT_BATCH_SIZE,
                idle_timeout,
            )
            .await?;

        while let Some(item) = stream.next().await {
            match item {
                Ok(entry) => {
                    let id = entry.id().to_owned();

                    if let Err(error) = self.consume_entry(entry).await {
                        warn!(
                            %id,
                            error = %BlackboxError::from_boxed(error),
                            notification = type_name::<C::Notification>(),
                            "Failed to consume notification, leaving it pending"
                        );
                    }
                }
                Err(error) => warn!(
                    ?error,
                    notification = type_name::<C::Notification>(),
                    "Failed to receive notification"
                ),
            }
        }

        match idle_timeout {
            Some(_) => Ok(()),
            None => Err(ConsumerError::StreamEnded.into()),
        }
    }

    async fn consume_entry<E>(&self, mut entry: E) -> EmptyResult
    where
        E: QueueEntry + Send + Sync,
    {
        let notification = entry.parse_payload::<C::Notification>()?;
        let frame = NotificationFrame::new(entry.id(), notification);

        self.consume(frame).await?;
        entry.acknowledge().await?;

        debug!(id = entry.id(), "Acknowledged notification");
        Ok(())
    }

    async fn reclaim_queue<Q>(
        &self,
        provider: Q,
        group: &ConsumerGroupDescriptor,
        consumer: &str, // &ConsumerIdentifier
        policy: &RedeliveryPolicy,
    ) -> Result<ReclaimReport, BoxedError>
    where
        Q: QueueProvider + Send + Sync,
    {
        let reclaimed = provider
            .reclaim(C::Notification::queue(), group, consumer, policy)
            .await?;

        let mut report = ReclaimReport {
            dead_lettered: reclaimed.dead_lettered.len(),
            ..Default::default()
        };

        for id in reclaimed.dead_lettered.iter() {
            warn!(%id, group = %group.identifier(), "Moved entry to dead-letter queue");
        }

        for entry in reclaimed.claimed {
            let id = entry.id().to_owned();

            match self.consume_entry(entry).await {
                Ok(_) => report.processed += 1,
                Err(error) => {
                    warn!(
                        %id,
                        error = %BlackboxError::from_boxed(error),
                        "Reclaimed notification failed again"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(?report, "Reclaimed pending notifications");
        Ok(report)
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::communication::event::{
        ConsumerGroupIdentifier, NotificationPublisher, QueueDescriptor, RawNotificationPublisher,
        DEAD_LETTER_DELIVERIES_FIELD, DEAD_LETTER_GROUP_FIELD,
    };
    use crate::communication::implementation::mock::MockQueue;
    use pretty_assertions::assert_eq;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const IDLE: Option<Duration> = Some(Duration::from_millis(50));

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Greeting {
        text: String,
    }

    impl Notification for Greeting {
        fn queue() -> QueueDescriptor {
            QueueDescriptor::new("greetings".into(), None)
        }
    }

    #[derive(Default)]
    struct RecordingConsumer {
        failures_remaining: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl RecordingConsumer {
        fn failing(times: usize) -> Self {
            Self {
                failures_remaining: AtomicUsize::new(times),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Consumer for RecordingConsumer {
        type Notification = Greeting;

        async fn consume(&self, notification: NotificationFrame<Greeting>) -> EmptyResult {
            self.seen.lock().unwrap().push(notification.text.clone());

            let remaining = self.failures_remaining.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
                return Err("handler failed".into());
            }

            Ok(())
        }
    }

    fn group(identifier: ConsumerGroupIdentifier) -> ConsumerGroupDescriptor {
        ConsumerGroupDescriptor::from(identifier)
    }

    async fn publish_greetings(queue: &MockQueue, count: usize) {
        for i in 0..count {
            let greeting = Greeting {
                text: format!("hello {}", i),
            };
            queue.publish(&greeting).await.unwrap();
        }
    }

    #[tokio::test]
    async fn redeliver_unacknowledged_entries_after_restart() {
        let queue = MockQueue::default();
        let notifier = group(ConsumerGroupIdentifier::Notifier);
        publish_greetings(&queue, 1).await;

        // First run crashes while handling the entry
        let consumer = RecordingConsumer::failing(1);
        consumer
            .consume_queue(queue.clone(), &notifier, "instance-1", IDLE)
            .await
            .unwrap();
        assert_eq!(queue.pending("greetings", "notifier"), 1);

        // Restarting with the same identity replays the pending entry
        consumer
            .consume_queue(queue.clone(), &notifier, "instance-1", IDLE)
            .await
            .unwrap();

        assert_eq!(queue.pending("greetings", "notifier"), 0);
        assert_eq!(consumer.seen(), vec!["hello 0", "hello 0"]);
    }

    #[tokio::test]
    async fn deliver_every_entry_to_every_group() {
        let queue = MockQueue::default();
        let notifier = group(ConsumerGroupIdentifier::Notifier);
        let mailer = group(ConsumerGroupIdentifier::Mailer);
        publish_greetings(&queue, 10).await;

        let stalled_mailer = RecordingConsumer::failing(10);
        stalled_mailer
            .consume_queue(queue.clone(), &mailer, "mailer-1", IDLE)
            .await
            .unwrap();

        let healthy_notifier = RecordingConsumer::default();
        healthy_notifier
            .consume_queue(queue.clone(), &notifier, "notifier-1", IDLE)
            .await
            .unwrap();

        assert_eq!(healthy_notifier.seen().len(), 10);
        assert_eq!(stalled_mailer.seen().len(), 10);
        assert_eq!(queue.pending("greetings", "notifier"), 0);
        assert_eq!(queue.pending("greetings", "mailer"), 10);

        let recovered_mailer = RecordingConsumer::default();
        recovered_mailer
            .consume_queue(queue.clone(), &mailer, "mailer-1", IDLE)
            .await
            .unwrap();

        assert_eq!(recovered_mailer.seen(), healthy_notifier.seen());
        assert_eq!(queue.pending("greetings", "mailer"), 0);
    }

    #[tokio::test]
    async fn keep_reading_after_a_failed_entry() {
        let queue = MockQueue::default();
        let notifier = group(ConsumerGroupIdentifier::Notifier);
        publish_greetings(&queue, 3).await;

        let consumer = RecordingConsumer::failing(1);
        consumer
            .consume_queue(queue.clone(), &notifier, "instance-1", IDLE)
            .await
            .unwrap();

        assert_eq!(consumer.seen(), vec!["hello 0", "hello 1", "hello 2"]);
        assert_eq!(queue.pending("greetings", "notifier"), 1);
    }

    #[tokio::test]
    async fn leave_malformed_entries_pending() {
        let queue = MockQueue::default();
        let notifier = group(ConsumerGroupIdentifier::Notifier);
        queue
            .publish_raw(&[("unrelated".into(), "value".into())], Greeting::queue())
            .await
            .unwrap();

        let consumer = RecordingConsumer::default();
        consumer
            .consume_queue(queue.clone(), &notifier, "instance-1", IDLE)
            .await
            .unwrap();

        assert!(consumer.seen().is_empty());
        assert_eq!(queue.pending("greetings", "notifier"), 1);
    }

    #[tokio::test]
    async fn reclaim_entries_of_dead_consumers() {
        let queue = MockQueue::default();
        let notifier = group(ConsumerGroupIdentifier::Notifier);
        let policy = RedeliveryPolicy {
            min_idle: Duration::ZERO,
            ..Default::default()
        };
        publish_greetings(&queue, 2).await;

        RecordingConsumer::failing(2)
            .consume_queue(queue.clone(), &notifier, "gone-for-good", IDLE)
            .await
            .unwrap();

        let report = RecordingConsumer::default()
            .reclaim_queue(queue.clone(), &notifier, "operator", &policy)
            .await
            .unwrap();

        assert_eq!(
            report,
            ReclaimReport {
                processed: 2,
                failed: 0,
                dead_lettered: 0
            }
        );
        assert_eq!(queue.pending("greetings", "notifier"), 0);
    }

    #[tokio::test]
    async fn dead_letter_entries_exceeding_delivery_budget() {
        let queue = MockQueue::default();
        let notifier = group(ConsumerGroupIdentifier::Notifier);
        let policy = RedeliveryPolicy {
            min_idle: Duration::ZERO,
            max_deliveries: 2,
            ..Default::default()
        };
        publish_greetings(&queue, 1).await;

        let consumer = RecordingConsumer::failing(usize::MAX);
        consumer
            .consume_queue(queue.clone(), &notifier, "instance-1", IDLE)
            .await
            .unwrap();

        // Second delivery still fails
        let report = consumer
            .reclaim_queue(queue.clone(), &notifier, "operator", &policy)
            .await
            .unwrap();
        assert_eq!(report.failed, 1);

        // Budget exhausted
        let report = consumer
            .reclaim_queue(queue.clone(), &notifier, "operator", &policy)
            .await
            .unwrap();
        assert_eq!(report.dead_lettered, 1);
        assert_eq!(queue.pending("greetings", "notifier"), 0);

        let dead_letters = queue.entries("greetings.dead-letter");
        assert_eq!(dead_letters.len(), 1);
        assert_eq!(dead_letters[0]["text"], "hello 0");
        assert_eq!(dead_letters[0][DEAD_LETTER_GROUP_FIELD], "notifier");
        assert_eq!(dead_letters[0][DEAD_LETTER_DELIVERIES_FIELD], "2");
    }
}

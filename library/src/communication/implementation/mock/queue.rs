use crate::communication::event::{
    ConsumerGroupDescriptor, QueueDescriptor, QueueLocation, QueueProvider,
    RawNotificationPublisher, RawQueueEntry, Reclaimed, RedeliveryPolicy,
    DEAD_LETTER_DELIVERIES_FIELD, DEAD_LETTER_GROUP_FIELD, DEAD_LETTER_ID_FIELD,
};
use crate::communication::implementation::fields::{FieldsNotificationPublisher, FieldsQueueEntry};
use crate::{BoxedError, EmptyResult};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::time::timeout;

type Fields = HashMap<String, String>;

struct PendingEntry {
    consumer: String,
    deliveries: usize,
    delivered_at: Instant,
}

struct GroupState {
    next: usize,
    pending: BTreeMap<usize, PendingEntry>,
}

#[derive(Default)]
struct StreamState {
    entries: Vec<Fields>,
    groups: HashMap<String, GroupState>,
}

#[derive(Default)]
struct Shared {
    streams: Mutex<HashMap<String, StreamState>>,
    appended: Notify,
}

fn entry_id(index: usize) -> String {
    format!("{}-0", index + 1)
}

/// In-memory stream with consumer group semantics
///
/// Mirrors the delivery rules of the redis implementation: every group has its own cursor and
/// pending entries, consumers replay their own pending entries before reading new ones and
/// abandoned entries can be reclaimed or dead-lettered. Cloned handles share the same state.
#[derive(Clone, Default)]
pub struct MockQueue {
    shared: Arc<Shared>,
}

impl MockQueue {
    fn lock(&self) -> MutexGuard<HashMap<String, StreamState>> {
        match self.shared.streams.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Number of entries delivered to but not yet acknowledged by a group
    pub fn pending(&self, key: &str, group: &str) -> usize {
        self.lock()
            .get(key)
            .and_then(|stream| stream.groups.get(group))
            .map(|group| group.pending.len())
            .unwrap_or_default()
    }

    /// All entries ever appended to a queue in append order
    pub fn entries(&self, key: &str) -> Vec<Fields> {
        self.lock()
            .get(key)
            .map(|stream| stream.entries.clone())
            .unwrap_or_default()
    }

    fn append(&self, key: &str, fields: Fields) -> String {
        let id = {
            let mut streams = self.lock();
            let stream = streams.entry(key.to_owned()).or_default();
            stream.entries.push(fields);
            entry_id(stream.entries.len() - 1)
        };

        self.shared.appended.notify_waiters();
        id
    }

    fn create_group(&self, key: &str, group: &str, start: QueueLocation) {
        let mut streams = self.lock();
        let stream = streams.entry(key.to_owned()).or_default();
        let next = match start {
            QueueLocation::Head => 0,
            QueueLocation::Tail => stream.entries.len(),
        };

        stream
            .groups
            .entry(group.to_owned())
            .or_insert_with(|| GroupState {
                next,
                pending: BTreeMap::new(),
            });
    }

    fn replay_pending(
        &self,
        key: &str,
        group: &str,
        consumer: &str,
        from: usize,
    ) -> Option<MockQueueEntry> {
        let mut streams = self.lock();
        let stream = streams.get_mut(key)?;
        let state = stream.groups.get_mut(group)?;

        let (index, pending) = state
            .pending
            .range_mut(from..)
            .find(|(_, pending)| pending.consumer == consumer)?;

        pending.deliveries += 1;
        pending.delivered_at = Instant::now();

        Some(self.build_entry(key, group, *index, stream.entries[*index].clone()))
    }

    fn deliver_next(&self, key: &str, group: &str, consumer: &str) -> Option<MockQueueEntry> {
        let mut streams = self.lock();
        let stream = streams.get_mut(key)?;
        let state = stream.groups.get_mut(group)?;

        if state.next >= stream.entries.len() {
            return None;
        }

        let index = state.next;
        state.next += 1;
        state.pending.insert(
            index,
            PendingEntry {
                consumer: consumer.to_owned(),
                deliveries: 1,
                delivered_at: Instant::now(),
            },
        );

        Some(self.build_entry(key, group, index, stream.entries[index].clone()))
    }

    fn build_entry(&self, key: &str, group: &str, index: usize, fields: Fields) -> MockQueueEntry {
        MockQueueEntry {
            queue: self.clone(),
            key: key.to_owned(),
            group: group.to_owned(),
            index,
            id: entry_id(index),
            fields,
        }
    }

    fn acknowledge(&self, key: &str, group: &str, index: usize) {
        if let Some(state) = self
            .lock()
            .get_mut(key)
            .and_then(|stream| stream.groups.get_mut(group))
        {
            state.pending.remove(&index);
        }
    }
}

impl FieldsNotificationPublisher for MockQueue {}

#[async_trait]
impl RawNotificationPublisher for MockQueue {
    async fn publish_raw(
        &self,
        fields: &[(String, String)],
        descriptor: QueueDescriptor,
    ) -> Result<String, BoxedError> {
        Ok(self.append(descriptor.key(), fields.iter().cloned().collect()))
    }
}

struct ConsumeState {
    queue: MockQueue,
    key: String,
    group: String,
    consumer: String,
    replay_from: Option<usize>,
}

impl ConsumeState {
    async fn next(&mut self, idle_timeout: Option<Duration>) -> Option<MockQueueEntry> {
        if let Some(from) = self.replay_from {
            match self
                .queue
                .replay_pending(&self.key, &self.group, &self.consumer, from)
            {
                Some(entry) => {
                    self.replay_from = Some(entry.index + 1);
                    return Some(entry);
                }
                None => self.replay_from = None,
            }
        }

        loop {
            let appended = self.queue.shared.appended.notified();

            if let Some(entry) = self
                .queue
                .deliver_next(&self.key, &self.group, &self.consumer)
            {
                return Some(entry);
            }

            match idle_timeout {
                Some(duration) => timeout(duration, appended).await.ok()?,
                None => appended.await,
            }
        }
    }
}

#[async_trait]
impl QueueProvider for MockQueue {
    type Entry = MockQueueEntry;

    async fn consume(
        &self,
        queue: QueueDescriptor,
        group: &ConsumerGroupDescriptor,
        consumer: &str, // &ConsumerIdentifier
        _batch_size: usize,
        idle_timeout: Option<Duration>,
    ) -> Result<BoxStream<Result<Self::Entry, BoxedError>>, BoxedError> {
        let group_name = group.identifier().to_string();
        self.create_group(queue.key(), &group_name, group.start());

        let state = ConsumeState {
            queue: self.clone(),
            key: queue.key().to_owned(),
            group: group_name,
            consumer: consumer.to_owned(),
            replay_from: Some(0),
        };

        let stream = stream::unfold(state, move |mut state| async move {
            let entry = state.next(idle_timeout).await?;
            Some((Ok(entry), state))
        })
        .boxed();

        Ok(stream)
    }

    async fn reclaim(
        &self,
        queue: QueueDescriptor,
        group: &ConsumerGroupDescriptor,
        consumer: &str, // &ConsumerIdentifier
        policy: &RedeliveryPolicy,
    ) -> Result<Reclaimed<Self::Entry>, BoxedError> {
        let key = queue.key();
        let group_name = group.identifier().to_string();
        let now = Instant::now();

        let mut claimed = Vec::new();
        let mut expired = Vec::new();

        {
            let mut streams = self.lock();

            if let Some(stream) = streams.get_mut(key) {
                if let Some(state) = stream.groups.get_mut(&group_name) {
                    for (index, pending) in state.pending.iter_mut() {
                        if now.duration_since(pending.delivered_at) < policy.min_idle {
                            continue;
                        }

                        let fields = stream.entries[*index].clone();

                        if pending.deliveries >= policy.max_deliveries {
                            expired.push((*index, pending.deliveries, fields));
                        } else {
                            pending.consumer = consumer.to_owned();
                            pending.deliveries += 1;
                            pending.delivered_at = now;
                            claimed.push(self.build_entry(key, &group_name, *index, fields));
                        }
                    }

                    for (index, _, _) in expired.iter() {
                        state.pending.remove(index);
                    }
                }
            }
        }

        let dead_letter = queue.dead_letter();
        let mut dead_lettered = Vec::with_capacity(expired.len());

        for (index, deliveries, mut fields) in expired {
            let id = entry_id(index);
            fields.insert(DEAD_LETTER_GROUP_FIELD.into(), group_name.clone());
            fields.insert(DEAD_LETTER_ID_FIELD.into(), id.clone());
            fields.insert(DEAD_LETTER_DELIVERIES_FIELD.into(), deliveries.to_string());

            self.append(dead_letter.key(), fields);
            dead_lettered.push(id);
        }

        Ok(Reclaimed {
            claimed,
            dead_lettered,
        })
    }
}

/// Entry handed out by a [`MockQueue`]
pub struct MockQueueEntry {
    queue: MockQueue,
    key: String,
    group: String,
    index: usize,
    id: String,
    fields: Fields,
}

#[async_trait]
impl RawQueueEntry for MockQueueEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    async fn acknowledge(&mut self) -> EmptyResult {
        self.queue.acknowledge(&self.key, &self.group, self.index);
        Ok(())
    }
}

impl FieldsQueueEntry for MockQueueEntry {}

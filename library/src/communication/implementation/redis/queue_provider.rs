use super::queue_entry::string_fields;
use super::{
    BoxedConnection, RedisConnectionVariant, RedisFactory, RedisQueueEntry, STREAM_ID_ADDITIONS,
    STREAM_ID_HEAD, STREAM_ID_NEW, STREAM_ID_TAIL,
};
use crate::communication::event::{
    ConsumerGroupDescriptor, QueueDescriptor, QueueLocation, QueueProvider, Reclaimed,
    RedeliveryPolicy, DEAD_LETTER_DELIVERIES_FIELD, DEAD_LETTER_GROUP_FIELD, DEAD_LETTER_ID_FIELD,
};
use crate::BoxedError;
use async_trait::async_trait;
use futures::{
    stream::{self, BoxStream},
    StreamExt,
};
use redis::aio::ConnectionLike;
use redis::streams::{
    StreamClaimReply, StreamId, StreamPendingCountReply, StreamReadOptions, StreamReadReply,
};
use redis::{AsyncCommands, RedisResult};
use std::convert::TryInto;
use std::time::Duration;
use tracing::{debug, error, trace};

/// Queue provider implementation using [Redis Streams](https://redis.io/topics/streams-intro)
pub struct RedisQueueProvider<F: RedisFactory + Send + Sync> {
    factory: F,
}

impl<F: RedisFactory + Send + Sync> RedisQueueProvider<F> {
    /// Creates a new instance with a given [`RedisFactory`]
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl<F> QueueProvider for RedisQueueProvider<F>
where
    F: RedisFactory + Send + Sync,
{
    type Entry = RedisQueueEntry;

    /// Consumes a redis stream data structure using the following steps:
    ///
    /// 1. Create the stream and/or consumer group if it does not exist
    /// 2. Stream entries from this consumer's PEL until it is drained
    /// 3. Wait for and stream new entries in a blocking manner
    /// 4. Bail if no message has been received within `idle_timeout` or block indefinitely
    async fn consume(
        &self,
        queue: QueueDescriptor,
        group: &ConsumerGroupDescriptor,
        consumer: &str, // &ConsumerIdentifier
        batch_size: usize,
        idle_timeout: Option<Duration>,
    ) -> Result<BoxStream<Result<Self::Entry, BoxedError>>, BoxedError> {
        let key = queue.key().to_owned();

        // Dedicated connection for the blocking XREADGROUP command
        let mut con = self
            .factory
            .connection(RedisConnectionVariant::Owned)
            .await?;

        create_consumer_group(&mut con, &key, group).await;

        let block_duration = idle_timeout
            .map(|d| d.as_millis().try_into().unwrap_or(usize::MAX).max(1))
            .unwrap_or_default();

        let read_options = StreamReadOptions::default()
            .group(group.identifier().to_string(), consumer)
            .count(batch_size)
            .block(block_duration);

        let entry_stream = xread_stream(con, read_options, key.clone());

        // Auxiliary stream that infinitely creates handles to a shared redis connection
        // so that every entry can acknowledge itself
        let ack_con_stream = shared_redis_stream(&self.factory);

        let stream = entry_stream
            .zip(ack_con_stream)
            .map(build_redis_queue_entry(key, group))
            .boxed();

        Ok(stream)
    }

    /// Reclaims idle entries using [`XPENDING`](https://redis.io/commands/xpending) with an `IDLE` filter
    /// and [`XCLAIM`](https://redis.io/commands/xclaim). Requires redis 6.2 or newer.
    async fn reclaim(
        &self,
        queue: QueueDescriptor,
        group: &ConsumerGroupDescriptor,
        consumer: &str, // &ConsumerIdentifier
        policy: &RedeliveryPolicy,
    ) -> Result<Reclaimed<Self::Entry>, BoxedError> {
        let key = queue.key().to_owned();
        let group_name = group.identifier().to_string();
        let min_idle: usize = policy.min_idle.as_millis().try_into().unwrap_or(usize::MAX);

        let mut con = self
            .factory
            .connection(RedisConnectionVariant::Multiplexed)
            .await?;

        let mut claimed = Vec::new();
        let mut dead_lettered = Vec::new();
        let mut start = "-".to_string();

        loop {
            let pending: StreamPendingCountReply = redis::cmd("XPENDING")
                .arg(&key)
                .arg(&group_name)
                .arg("IDLE")
                .arg(min_idle)
                .arg(&start)
                .arg("+")
                .arg(policy.batch_size)
                .query_async(&mut con)
                .await?;

            let last_id = match pending.ids.last() {
                Some(last) => last.id.clone(),
                None => break,
            };
            trace!(count = pending.ids.len(), "Inspecting idle pending entries");

            let (expired, reclaimable): (Vec<_>, Vec<_>) = pending
                .ids
                .into_iter()
                .partition(|entry| entry.times_delivered >= policy.max_deliveries);

            for entry in expired {
                let moved = dead_letter(
                    &mut con,
                    &queue,
                    &group_name,
                    consumer,
                    min_idle,
                    &entry.id,
                    entry.times_delivered,
                )
                .await?;

                if moved {
                    dead_lettered.push(entry.id);
                }
            }

            if !reclaimable.is_empty() {
                let ids: Vec<String> = reclaimable.into_iter().map(|entry| entry.id).collect();
                let reply: StreamClaimReply = con
                    .xclaim(&key, &group_name, consumer, min_idle, &ids[..])
                    .await?;

                for entry in reply.ids {
                    let ack_con = self
                        .factory
                        .connection(RedisConnectionVariant::Multiplexed)
                        .await?;
                    claimed.push(RedisQueueEntry::new(
                        ack_con,
                        entry,
                        key.clone(),
                        group_name.clone(),
                    )?);
                }
            }

            start = format!("({}", last_id);
        }

        debug!(
            claimed = claimed.len(),
            dead_lettered = dead_lettered.len(),
            "Reclaimed idle pending entries"
        );

        Ok(Reclaimed {
            claimed,
            dead_lettered,
        })
    }
}

/// Claims an entry to read its fields, copies it into the dead-letter stream and acknowledges it.
/// Returns `false` if the entry vanished from the stream in the meantime.
async fn dead_letter(
    con: &mut BoxedConnection,
    queue: &QueueDescriptor,
    group: &str,
    consumer: &str,
    min_idle: usize,
    id: &str,
    deliveries: usize,
) -> Result<bool, BoxedError> {
    let reply: StreamClaimReply = con
        .xclaim(queue.key(), group, consumer, min_idle, &[id])
        .await?;

    let entry = reply.ids.into_iter().next();

    if let Some(entry) = &entry {
        let mut fields: Vec<(String, String)> = string_fields(entry)?.into_iter().collect();
        fields.push((DEAD_LETTER_GROUP_FIELD.into(), group.into()));
        fields.push((DEAD_LETTER_ID_FIELD.into(), id.into()));
        fields.push((DEAD_LETTER_DELIVERIES_FIELD.into(), deliveries.to_string()));

        con.xadd::<_, _, _, _, ()>(queue.dead_letter().key(), STREAM_ID_NEW, &fields)
            .await?;
    }

    con.xack::<_, _, _, ()>(queue.key(), group, &[id]).await?;

    Ok(entry.is_some())
}

fn build_redis_queue_entry(
    key: String,
    group: &ConsumerGroupDescriptor,
) -> impl Fn((RedisResult<StreamId>, Result<BoxedConnection, BoxedError>)) -> Result<RedisQueueEntry, BoxedError>
{
    let group = group.identifier().to_string();

    move |(entry, con)| {
        let entry = entry?;
        let ack_con = con?;
        let entry = RedisQueueEntry::new(ack_con, entry, key.clone(), group.clone())?;

        Ok(entry)
    }
}

async fn create_consumer_group<C: ConnectionLike + Send>(
    con: &mut C,
    key: &str,
    group: &ConsumerGroupDescriptor,
) {
    let start_id = match group.start() {
        QueueLocation::Head => STREAM_ID_HEAD,
        QueueLocation::Tail => STREAM_ID_TAIL,
    };

    // Fails with BUSYGROUP if the group already exists
    con.xgroup_create_mkstream::<_, _, _, ()>(key, group.identifier().to_string(), start_id)
        .await
        .ok();
}

fn shared_redis_stream<F: RedisFactory + Send + Sync>(
    factory: &F,
) -> BoxStream<Result<BoxedConnection, BoxedError>> {
    stream::repeat_with(move || async move {
        factory
            .connection(RedisConnectionVariant::Multiplexed)
            .await
    })
    .then(|f| f)
    .boxed()
}

fn xread_stream<'a>(
    con: BoxedConnection,
    options: StreamReadOptions,
    key: String,
) -> BoxStream<'a, RedisResult<StreamId>> {
    let initial_id: String = STREAM_ID_HEAD.to_string();

    let stream = stream::unfold((con, options, initial_id), move |(mut con, options, id)| {
        let key = key.to_owned();

        async move {
            let result = con
                .xread_options::<_, _, StreamReadReply>(&[&key], &[&id], &options)
                .await;

            match result {
                Ok(mut reply) => match reply.keys.pop() {
                    Some(stream) => {
                        if id == STREAM_ID_ADDITIONS {
                            // Already operating on new entries, keep doing so
                            Some((Ok(stream.ids), (con, options, id)))
                        } else if let Some(next_id) =
                            stream.ids.last().map(|entry| entry.id.to_owned())
                        {
                            // Replaying pending entries after a restart, continue after the last one
                            Some((Ok(stream.ids), (con, options, next_id)))
                        } else {
                            // Pending entries drained, move on to new entries
                            Some((
                                Ok(stream.ids),
                                (con, options, STREAM_ID_ADDITIONS.to_string()),
                            ))
                        }
                    }
                    // A blocking read timed out without receiving anything
                    None => None,
                },
                Err(e) => {
                    error!(error = ?e, "Encountered error reading from redis stream");
                    None
                }
            }
        }
    });

    // Entries may be fetched in batches but are yielded one at a time
    stream
        .flat_map(|result| match result {
            Ok(batch) => stream::iter(batch).map(Ok).boxed(),
            Err(e) => stream::once(async { Err(e) }).boxed(),
        })
        .boxed()
}

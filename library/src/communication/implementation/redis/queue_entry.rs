use super::{BoxedConnection, RedisQueueError};
use crate::communication::event::RawQueueEntry;
use crate::communication::implementation::fields::FieldsQueueEntry;
use crate::EmptyResult;
use async_trait::async_trait;
use redis::streams::StreamId;
use redis::{AsyncCommands, FromRedisValue};
use std::collections::HashMap;

/// Converts the raw values of a stream entry into string fields
pub(super) fn string_fields(entry: &StreamId) -> Result<HashMap<String, String>, RedisQueueError> {
    entry
        .map
        .iter()
        .map(|(key, value)| {
            String::from_redis_value(value)
                .map(|value| (key.clone(), value))
                .map_err(|_| RedisQueueError::MalformedField(key.clone()))
        })
        .collect()
}

/// Redis based implementation of the [`QueueEntry`](crate::communication::event::QueueEntry) trait
pub struct RedisQueueEntry {
    con: BoxedConnection,
    id: String,
    key: String,
    group: String,
    fields: HashMap<String, String>,
}

impl RedisQueueEntry {
    pub(super) fn new(
        con: BoxedConnection,
        entry: StreamId,
        key: String,
        group: String,
    ) -> Result<Self, RedisQueueError> {
        let fields = string_fields(&entry)?;

        Ok(Self {
            con,
            id: entry.id,
            key,
            group,
            fields,
        })
    }
}

#[async_trait]
impl RawQueueEntry for RedisQueueEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    async fn acknowledge(&mut self) -> EmptyResult {
        self.con
            .xack::<_, _, _, ()>(&self.key, &self.group, &[&self.id])
            .await?;

        Ok(())
    }
}

impl FieldsQueueEntry for RedisQueueEntry {}

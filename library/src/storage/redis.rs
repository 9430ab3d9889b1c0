use super::keys::{index_key, object_key};
use super::{StorageError, StoreBackend};
use crate::communication::implementation::redis::{RedisConnectionVariant, RedisFactory};
use crate::communication::implementation::redis::BoxedConnection;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;

/// [`StoreBackend`] implementation using plain redis keys and sets
pub struct RedisStoreBackend<F: RedisFactory> {
    factory: F,
}

impl<F: RedisFactory + Send + Sync> RedisStoreBackend<F> {
    /// Creates a new instance which obtains connections from the given factory
    pub fn new(factory: F) -> Self {
        Self { factory }
    }

    async fn connection(&self) -> Result<BoxedConnection, StorageError> {
        self.factory
            .connection(RedisConnectionVariant::Multiplexed)
            .await
            .map_err(StorageError::Unavailable)
    }
}

#[async_trait]
impl<F: RedisFactory + Send + Sync> StoreBackend for RedisStoreBackend<F> {
    async fn set(
        &self,
        class: &str,
        id: &str,
        value: String,
        indexes: &[(&str, String)],
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let mut con = self.connection().await?;
        let key = object_key(class, id);

        let mut pipe = redis::pipe();
        pipe.atomic();

        match ttl {
            Some(ttl) => pipe.set_ex(&key, value, ttl.as_secs().max(1) as usize).ignore(),
            None => pipe.set(&key, value).ignore(),
        };

        for (field, indexed) in indexes {
            pipe.sadd(index_key(class, field, indexed), id).ignore();
        }

        pipe.query_async::<_, ()>(&mut con).await?;
        Ok(())
    }

    async fn get(&self, class: &str, id: &str) -> Result<Option<String>, StorageError> {
        let mut con = self.connection().await?;
        Ok(con.get(object_key(class, id)).await?)
    }

    async fn get_by_index(
        &self,
        class: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<String>, StorageError> {
        let mut con = self.connection().await?;
        let ids: Vec<String> = con.smembers(index_key(class, field, value)).await?;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| object_key(class, id)).collect();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut con)
            .await?;

        Ok(values.into_iter().flatten().collect())
    }

    async fn delete(&self, class: &str, id: &str) -> Result<(), StorageError> {
        let mut con = self.connection().await?;
        con.del::<_, ()>(object_key(class, id)).await?;
        Ok(())
    }
}

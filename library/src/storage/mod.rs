//! Key/value persistence with secondary index lookups
//!
//! Objects are stored as JSON under `object:<class>:<id>` and every secondary index is a set of ids
//! under `index:<class>:<field>:<value>`. Index buckets are never cleaned up when an object is
//! deleted or expires, so lookups by index skip ids whose object is gone instead of failing.

mod error;
mod keys;
mod redis;

#[cfg(any(test, feature = "test"))]
mod mock;

pub use self::redis::RedisStoreBackend;
pub use error::StorageError;
pub use keys::{index_key, object_key};
#[cfg(any(test, feature = "test"))]
pub use mock::MockStoreBackend;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Object which can be persisted in an [`IndexedStore`]
pub trait StoredObject: Serialize + DeserializeOwned + Send + Sync {
    /// Class of objects, used as the key namespace
    const CLASS: &'static str;

    /// Identifier unique within the class
    fn id(&self) -> &str;

    /// Secondary indexes as pairs of index name and indexed value
    fn indexes(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

/// Untyped storage primitives an [`IndexedStore`] is built upon
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Writes the value and adds the id to every index bucket in one atomic operation
    async fn set(
        &self,
        class: &str,
        id: &str,
        value: String,
        indexes: &[(&str, String)],
        ttl: Option<Duration>,
    ) -> Result<(), StorageError>;

    /// Reads a single value
    async fn get(&self, class: &str, id: &str) -> Result<Option<String>, StorageError>;

    /// Reads all values whose id is contained in the index bucket, skipping ids without a value
    async fn get_by_index(
        &self,
        class: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<String>, StorageError>;

    /// Removes a value while leaving index buckets untouched
    async fn delete(&self, class: &str, id: &str) -> Result<(), StorageError>;
}

/// Typed store for [`StoredObject`] implementations
#[derive(Clone)]
pub struct IndexedStore {
    backend: Arc<dyn StoreBackend>,
}

impl IndexedStore {
    /// Creates a new store on top of the given backend
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    /// Persists the object and registers it in all of its indexes
    pub async fn set<T: StoredObject>(
        &self,
        object: &T,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let value = serde_json::to_string(object)?;
        let indexes = object.indexes();

        trace!(class = T::CLASS, id = object.id(), "Storing object");
        self.backend
            .set(T::CLASS, object.id(), value, &indexes, ttl)
            .await
    }

    /// Retrieves an object by id
    pub async fn get<T: StoredObject>(&self, id: &str) -> Result<T, StorageError> {
        match self.backend.get(T::CLASS, id).await? {
            Some(value) => Ok(serde_json::from_str(&value)?),
            None => Err(StorageError::NotFound {
                class: T::CLASS,
                id: id.to_owned(),
            }),
        }
    }

    /// Retrieves all objects registered under the given index value
    pub async fn get_by_index<T: StoredObject>(
        &self,
        field: &str,
        value: &str,
    ) -> Result<Vec<T>, StorageError> {
        self.backend
            .get_by_index(T::CLASS, field, value)
            .await?
            .iter()
            .map(|value| serde_json::from_str(value).map_err(StorageError::from))
            .collect()
    }

    /// Deletes an object by id. Index buckets keep referencing it.
    pub async fn delete<T: StoredObject>(&self, id: &str) -> Result<(), StorageError> {
        trace!(class = T::CLASS, id, "Deleting object");
        self.backend.delete(T::CLASS, id).await
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
    struct Device {
        id: String,
        owner: String,
    }

    impl StoredObject for Device {
        const CLASS: &'static str = "devices";

        fn id(&self) -> &str {
            &self.id
        }

        fn indexes(&self) -> Vec<(&'static str, String)> {
            vec![("owner", self.owner.clone())]
        }
    }

    fn device(id: &str, owner: &str) -> Device {
        Device {
            id: id.into(),
            owner: owner.into(),
        }
    }

    fn store() -> (IndexedStore, Arc<MockStoreBackend>) {
        let backend = Arc::new(MockStoreBackend::default());
        (IndexedStore::new(backend.clone()), backend)
    }

    #[tokio::test]
    async fn retrieve_objects_by_id_and_index() {
        let (store, _) = store();
        store.set(&device("d1", "alice"), None).await.unwrap();
        store.set(&device("d2", "alice"), None).await.unwrap();
        store.set(&device("d3", "bob"), None).await.unwrap();

        assert_eq!(store.get::<Device>("d3").await.unwrap(), device("d3", "bob"));

        let mut owned: Vec<Device> = store.get_by_index("owner", "alice").await.unwrap();
        owned.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(owned, vec![device("d1", "alice"), device("d2", "alice")]);
    }

    #[tokio::test]
    async fn report_missing_objects() {
        let (store, _) = store();

        let error = store.get::<Device>("nope").await.unwrap_err();
        assert!(matches!(error, StorageError::NotFound { class: "devices", .. }));
    }

    #[tokio::test]
    async fn tolerate_stale_index_entries() {
        let (store, backend) = store();
        store.set(&device("d1", "alice"), None).await.unwrap();
        store.set(&device("d2", "alice"), None).await.unwrap();

        store.delete::<Device>("d1").await.unwrap();

        // The index bucket still references the deleted object
        assert_eq!(backend.index_members("devices", "owner", "alice").len(), 2);

        let owned: Vec<Device> = store.get_by_index("owner", "alice").await.unwrap();
        assert_eq!(owned, vec![device("d2", "alice")]);
    }

    #[tokio::test]
    async fn surface_backend_failures() {
        let (store, backend) = store();
        store.set(&device("d1", "alice"), None).await.unwrap();
        backend.set_available(false);

        let result = store.get_by_index::<Device>("owner", "alice").await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
    }

    #[tokio::test]
    async fn overwrite_objects_with_the_same_id() {
        let (store, backend) = store();
        store.set(&device("d1", "alice"), None).await.unwrap();
        store.set(&device("d1", "alice"), None).await.unwrap();

        assert_eq!(backend.index_members("devices", "owner", "alice"), vec!["d1"]);
        assert_eq!(store.get_by_index::<Device>("owner", "alice").await.unwrap().len(), 1);
    }
}

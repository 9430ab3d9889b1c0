use super::keys::{index_key, object_key};
use super::{StorageError, StoreBackend};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("mock store has been switched off")]
struct Unreachable;

#[derive(Default)]
struct Contents {
    values: HashMap<String, (String, Option<Instant>)>,
    indexes: HashMap<String, BTreeSet<String>>,
}

/// In-memory [`StoreBackend`] using the same key layout as the redis implementation
pub struct MockStoreBackend {
    contents: Mutex<Contents>,
    available: AtomicBool,
}

impl Default for MockStoreBackend {
    fn default() -> Self {
        Self {
            contents: Mutex::new(Contents::default()),
            available: AtomicBool::new(true),
        }
    }
}

impl MockStoreBackend {
    /// Simulates an outage, failing every operation while `false`
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Ids currently registered in an index bucket, including stale ones
    pub fn index_members(&self, class: &str, field: &str, value: &str) -> Vec<String> {
        self.lock()
            .indexes
            .get(&index_key(class, field, value))
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of objects with a live value
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .values
            .values()
            .filter(|(_, expiry)| expiry.map(|e| e > now).unwrap_or(true))
            .count()
    }

    /// Whether no object with a live value exists
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<Contents> {
        match self.contents.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn check(&self) -> Result<MutexGuard<Contents>, StorageError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(self.lock())
        } else {
            Err(StorageError::Unavailable(Box::new(Unreachable)))
        }
    }
}

fn live(entry: Option<&(String, Option<Instant>)>) -> Option<String> {
    match entry {
        Some((value, Some(expiry))) if *expiry > Instant::now() => Some(value.clone()),
        Some((value, None)) => Some(value.clone()),
        _ => None,
    }
}

#[async_trait]
impl StoreBackend for MockStoreBackend {
    async fn set(
        &self,
        class: &str,
        id: &str,
        value: String,
        indexes: &[(&str, String)],
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let mut contents = self.check()?;
        let expiry = ttl.map(|ttl| Instant::now() + ttl);

        contents
            .values
            .insert(object_key(class, id), (value, expiry));

        for (field, indexed) in indexes {
            contents
                .indexes
                .entry(index_key(class, field, indexed))
                .or_default()
                .insert(id.to_owned());
        }

        Ok(())
    }

    async fn get(&self, class: &str, id: &str) -> Result<Option<String>, StorageError> {
        let contents = self.check()?;
        Ok(live(contents.values.get(&object_key(class, id))))
    }

    async fn get_by_index(
        &self,
        class: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<String>, StorageError> {
        let contents = self.check()?;

        let values = contents
            .indexes
            .get(&index_key(class, field, value))
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| live(contents.values.get(&object_key(class, id))))
                    .collect()
            })
            .unwrap_or_default();

        Ok(values)
    }

    async fn delete(&self, class: &str, id: &str) -> Result<(), StorageError> {
        let mut contents = self.check()?;
        contents.values.remove(&object_key(class, id));
        Ok(())
    }
}

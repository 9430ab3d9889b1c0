//! Registration and lookup of push subscriptions

use crate::constants::SUBSCRIPTION_TTL;
use domain::subscription::MEMBER_INDEX;
use domain::Subscription;
use library::storage::{IndexedStore, StorageError};
use tracing::{debug, instrument};
use uuid::Uuid;

/// Subscription persistence on top of an [`IndexedStore`]
#[derive(Clone)]
pub struct SubscriptionStore {
    store: IndexedStore,
}

impl SubscriptionStore {
    /// Creates a new instance operating on the given store
    pub fn new(store: IndexedStore) -> Self {
        Self { store }
    }

    /// Stores a subscription and returns it with its assigned id.
    ///
    /// Registering an endpoint again for the same member and user overwrites the existing
    /// subscription instead of creating a second one. Any id carried by the input is ignored.
    #[instrument(skip(self, subscription), fields(member = %subscription.member, user = %subscription.user))]
    pub async fn upsert(&self, mut subscription: Subscription) -> Result<Subscription, StorageError> {
        let existing = self.find_by_member(&subscription.member).await?;

        subscription.id = match existing
            .iter()
            .find(|current| current.same_registration(&subscription))
        {
            Some(current) => {
                debug!(id = %current.id, "Overwriting existing subscription");
                current.id.clone()
            }
            None => Uuid::new_v4().to_string(),
        };

        self.store.set(&subscription, SUBSCRIPTION_TTL).await?;
        debug!(id = %subscription.id, "Stored subscription");

        Ok(subscription)
    }

    /// Retrieves a subscription by id
    pub async fn get(&self, id: &str) -> Result<Subscription, StorageError> {
        self.store.get(id).await
    }

    /// Removes a subscription
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.store.delete::<Subscription>(id).await
    }

    /// All subscriptions concerning the given member
    pub async fn find_by_member(&self, member: &str) -> Result<Vec<Subscription>, StorageError> {
        self.store.get_by_index(MEMBER_INDEX, member).await
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use domain::SubscriptionSettings;
    use library::storage::MockStoreBackend;
    use std::sync::Arc;

    pub fn store() -> (SubscriptionStore, Arc<MockStoreBackend>) {
        let backend = Arc::new(MockStoreBackend::default());
        let store = SubscriptionStore::new(IndexedStore::new(backend.clone()));
        (store, backend)
    }

    pub fn subscription(token: &str, member: &str, user: &str, categories: &[&str]) -> Subscription {
        let mut settings = SubscriptionSettings::default();
        for category in categories {
            settings
                .categories
                .insert((*category).to_owned(), serde_json::Value::Bool(true));
        }

        Subscription {
            id: String::new(),
            token: token.into(),
            settings,
            user: user.into(),
            member: member.into(),
        }
    }
}

#[cfg(test)]
mod does {
    use super::fixtures::{store, subscription};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn keep_one_subscription_per_registration() {
        let (store, _) = store();

        let first = store
            .upsert(subscription("tok", "m1", "u1", &["myAccount"]))
            .await
            .unwrap();
        let second = store
            .upsert(subscription("tok", "m1", "u1", &["newOffers"]))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);

        let stored = store.find_by_member("m1").await.unwrap();
        assert_eq!(stored, vec![second]);
    }

    #[tokio::test]
    async fn separate_different_registrations() {
        let (store, _) = store();

        let a = store.upsert(subscription("tok", "m1", "u1", &[])).await.unwrap();
        let b = store.upsert(subscription("tok", "m1", "u2", &[])).await.unwrap();
        let c = store.upsert(subscription("other", "m1", "u1", &[])).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(store.find_by_member("m1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn ignore_client_provided_ids() {
        let (store, _) = store();

        let mut requested = subscription("tok", "m1", "u1", &[]);
        requested.id = "chosen-by-client".into();

        let stored = store.upsert(requested).await.unwrap();
        assert_ne!(stored.id, "chosen-by-client");
    }

    #[tokio::test]
    async fn forget_deleted_subscriptions() {
        let (store, _) = store();

        let stored = store.upsert(subscription("tok", "m1", "u1", &[])).await.unwrap();
        store.delete(&stored.id).await.unwrap();

        assert!(store.get(&stored.id).await.is_err());
        assert!(store.find_by_member("m1").await.unwrap().is_empty());
    }
}

use crate::subscriptions::SubscriptionStore;
use domain::event::NotificationCategory;
use library::storage::StorageError;
use tracing::trace;

/// Delivery endpoint selected for a notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    /// Endpoint token
    pub token: String,
    /// Subscription the token belongs to
    pub subscription: String,
    /// Member the subscription concerns
    pub member: String,
}

/// Determines the endpoints to notify about an event
#[derive(Clone)]
pub struct SubscriptionResolver {
    subscriptions: SubscriptionStore,
}

impl SubscriptionResolver {
    /// Creates a new instance reading from the given store
    pub fn new(subscriptions: SubscriptionStore) -> Self {
        Self { subscriptions }
    }

    /// Collects the endpoints of all subscriptions concerning the given members which opted into
    /// the category, skipping those owned by the excluded user. Store errors abort the lookup.
    pub async fn resolve(
        &self,
        members: &[String],
        excluded_user: Option<&str>,
        category: NotificationCategory,
    ) -> Result<Vec<Recipient>, StorageError> {
        let mut recipients = Vec::new();

        for member in members {
            for subscription in self.subscriptions.find_by_member(member).await? {
                if Some(subscription.user.as_str()) == excluded_user {
                    trace!(id = %subscription.id, "Skipping subscription of acting user");
                    continue;
                }

                if !subscription.settings.opted_in(category) {
                    continue;
                }

                recipients.push(Recipient {
                    token: subscription.token,
                    subscription: subscription.id,
                    member: subscription.member,
                });
            }
        }

        Ok(recipients)
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::subscriptions::fixtures::{store, subscription};
    use pretty_assertions::assert_eq;

    fn members(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn exclude_the_acting_user() {
        let (store, _) = store();
        store
            .upsert(subscription("tok-u", "m1", "U", &["myAccount"]))
            .await
            .unwrap();
        let resolver = SubscriptionResolver::new(store);

        let own_action = resolver
            .resolve(&members(&["m1"]), Some("U"), NotificationCategory::MyAccount)
            .await
            .unwrap();
        assert!(own_action.is_empty());

        let foreign_action = resolver
            .resolve(&members(&["m1"]), Some("V"), NotificationCategory::MyAccount)
            .await
            .unwrap();
        assert_eq!(foreign_action.len(), 1);
        assert_eq!(foreign_action[0].token, "tok-u");
        assert_eq!(foreign_action[0].member, "m1");
    }

    #[tokio::test]
    async fn require_opt_in_for_the_category() {
        let (store, _) = store();
        store
            .upsert(subscription("tok-a", "m1", "u1", &["newNeeds"]))
            .await
            .unwrap();
        store
            .upsert(subscription("tok-b", "m1", "u2", &["newOffers", "newNeeds"]))
            .await
            .unwrap();
        let resolver = SubscriptionResolver::new(store);

        let recipients = resolver
            .resolve(&members(&["m1"]), None, NotificationCategory::NewOffers)
            .await
            .unwrap();

        let tokens: Vec<_> = recipients.into_iter().map(|r| r.token).collect();
        assert_eq!(tokens, vec!["tok-b".to_owned()]);
    }

    #[tokio::test]
    async fn collect_recipients_of_all_members() {
        let (store, _) = store();
        store.upsert(subscription("a", "m1", "u1", &["myAccount"])).await.unwrap();
        store.upsert(subscription("b", "m2", "u2", &["myAccount"])).await.unwrap();
        store.upsert(subscription("c", "m3", "u3", &["myAccount"])).await.unwrap();
        let resolver = SubscriptionResolver::new(store);

        let recipients = resolver
            .resolve(&members(&["m1", "m2"]), None, NotificationCategory::MyAccount)
            .await
            .unwrap();

        let tokens: Vec<_> = recipients.into_iter().map(|r| r.token).collect();
        assert_eq!(tokens, vec!["a".to_owned(), "b".to_owned()]);
    }

    #[tokio::test]
    async fn propagate_store_failures() {
        let (store, backend) = store();
        store.upsert(subscription("a", "m1", "u1", &["myAccount"])).await.unwrap();
        backend.set_available(false);

        let result = SubscriptionResolver::new(store)
            .resolve(&members(&["m1"]), None, NotificationCategory::MyAccount)
            .await;

        assert!(matches!(result, Err(StorageError::Unavailable(_))));
    }
}

//! Push delivery endpoints registered for members

use crate::event::NotificationCategory;
use library::storage::StoredObject;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the index subscriptions are looked up by
pub const MEMBER_INDEX: &str = "member";

/// Per-category opt-ins of a [`Subscription`]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionSettings {
    /// Preferred language of the recipient
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Remaining keys, usually booleans keyed by [`NotificationCategory`]
    #[serde(flatten)]
    pub categories: Map<String, Value>,
}

impl SubscriptionSettings {
    /// Whether the recipient explicitly opted into the given category
    pub fn opted_in(&self, category: NotificationCategory) -> bool {
        matches!(self.categories.get(category.key()), Some(Value::Bool(true)))
    }
}

/// Interest of one delivery endpoint in notifications concerning one member
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    /// Identifier, stable across re-registrations of the same endpoint
    pub id: String,
    /// Delivery endpoint address
    pub token: String,
    /// Notification preferences
    #[serde(default)]
    pub settings: SubscriptionSettings,
    /// User owning the endpoint
    pub user: String,
    /// Member the subscription concerns
    pub member: String,
}

impl Subscription {
    /// Whether both subscriptions describe the same endpoint, member and user
    pub fn same_registration(&self, other: &Subscription) -> bool {
        self.token == other.token && self.member == other.member && self.user == other.user
    }
}

impl StoredObject for Subscription {
    const CLASS: &'static str = "subscriptions";

    fn id(&self) -> &str {
        &self.id
    }

    fn indexes(&self) -> Vec<(&'static str, String)> {
        vec![(MEMBER_INDEX, self.member.clone())]
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn require_explicit_opt_in() {
        let settings: SubscriptionSettings = serde_json::from_value(json!({
            "locale": "ca",
            "myAccount": true,
            "newOffers": "true",
            "newNeeds": false,
        }))
        .unwrap();

        assert_eq!(settings.locale.as_deref(), Some("ca"));
        assert!(settings.opted_in(NotificationCategory::MyAccount));
        assert!(!settings.opted_in(NotificationCategory::NewOffers));
        assert!(!settings.opted_in(NotificationCategory::NewNeeds));
        assert!(!settings.opted_in(NotificationCategory::NewMembers));
    }

    #[test]
    fn keep_unknown_settings() {
        let value = json!({ "myAccount": true, "digest": "weekly" });
        let settings: SubscriptionSettings = serde_json::from_value(value.clone()).unwrap();

        assert_eq!(serde_json::to_value(&settings).unwrap(), value);
    }
}

//! Request and response documents of the HTTP boundary

use super::ApiError;
use chrono::{DateTime, Utc};
use domain::event::Event;
use domain::upstream::{Document, Relationship, Resource, ResourceIdentifier};
use domain::{Subscription, SubscriptionSettings};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Media type of every document exchanged
pub const MEDIA_TYPE: &str = "application/vnd.api+json";

const EVENTS: &str = "events";
const SUBSCRIPTIONS: &str = "subscriptions";

#[derive(Deserialize)]
struct EventAttributes {
    name: String,
    #[serde(default)]
    source: String,
    code: String,
    time: DateTime<Utc>,
    #[serde(default)]
    data: Map<String, Value>,
}

#[derive(Serialize, Deserialize)]
struct SubscriptionAttributes {
    token: String,
    #[serde(default)]
    settings: SubscriptionSettings,
}

fn parse(body: &[u8], kind: &str) -> Result<Resource, ApiError> {
    let document: Document<Resource> = serde_json::from_slice(body)?;

    if document.data.kind != kind {
        return Err(ApiError::BadRequest(format!(
            "expected resource of type '{}'",
            kind
        )));
    }

    Ok(document.data)
}

fn related_id(resource: &Resource, name: &str) -> Result<String, ApiError> {
    resource
        .related(name)
        .map(|identifier| identifier.id.clone())
        .ok_or_else(|| ApiError::BadRequest(format!("missing '{}' relationship", name)))
}

/// Decodes an event creation request
pub fn parse_event(body: &[u8]) -> Result<(Event, Resource), ApiError> {
    let resource = parse(body, EVENTS)?;
    let attributes: EventAttributes = resource.attributes()?;
    let user = related_id(&resource, "user")?;

    let data = attributes
        .data
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(value) => Ok((key, value)),
            _ => Err(ApiError::BadRequest(
                "data field must be a map of strings".into(),
            )),
        })
        .collect::<Result<HashMap<_, _>, _>>()?;

    let event = Event {
        name: attributes.name,
        source: attributes.source,
        code: attributes.code,
        time: attributes.time,
        user,
        data,
    };

    Ok((event, resource))
}

/// Decodes a subscription creation request, the returned subscription carries no id
pub fn parse_subscription(body: &[u8]) -> Result<Subscription, ApiError> {
    let resource = parse(body, SUBSCRIPTIONS)?;
    let attributes: SubscriptionAttributes = resource.attributes()?;

    Ok(Subscription {
        id: String::new(),
        token: attributes.token,
        settings: attributes.settings,
        user: related_id(&resource, "user")?,
        member: related_id(&resource, "member")?,
    })
}

/// Renders a stored subscription
pub fn subscription_document(subscription: &Subscription) -> Result<Document<Resource>, ApiError> {
    let attributes = match serde_json::to_value(SubscriptionAttributes {
        token: subscription.token.clone(),
        settings: subscription.settings.clone(),
    })? {
        Value::Object(attributes) => attributes,
        _ => Map::new(),
    };

    let relationships = vec![
        (
            "user".to_owned(),
            Relationship::one(ResourceIdentifier::new("users", &subscription.user)),
        ),
        (
            "member".to_owned(),
            Relationship::one(ResourceIdentifier::new("members", &subscription.member)),
        ),
    ]
    .into_iter()
    .collect();

    Ok(Document::new(Resource {
        kind: SUBSCRIPTIONS.to_owned(),
        id: Some(subscription.id.clone()),
        attributes,
        relationships,
    }))
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn event_body(data: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "data": {
                "type": "events",
                "attributes": {
                    "name": "TransferCommitted",
                    "source": "https://accounting.example.com",
                    "code": "GRP1",
                    "time": "2024-03-01T12:00:00Z",
                    "data": data
                },
                "relationships": {
                    "user": { "data": { "type": "users", "id": "u1" } }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn decode_events() {
        let (event, _) = parse_event(&event_body(json!({ "payer": "m1" }))).unwrap();

        assert_eq!(event.user, "u1");
        assert_eq!(event.code, "GRP1");
        assert_eq!(event.data["payer"], "m1");
    }

    #[test]
    fn reject_non_string_event_data() {
        let result = parse_event(&event_body(json!({ "amount": 12 })));

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn reject_subscriptions_without_member() {
        let body = serde_json::to_vec(&json!({
            "data": {
                "type": "subscriptions",
                "attributes": { "token": "abc" },
                "relationships": {
                    "user": { "data": { "type": "users", "id": "u1" } }
                }
            }
        }))
        .unwrap();

        assert!(matches!(
            parse_subscription(&body),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn render_subscriptions() {
        let subscription = Subscription {
            id: "s1".into(),
            token: "abc".into(),
            settings: SubscriptionSettings::default(),
            user: "u1".into(),
            member: "m1".into(),
        };

        let document = serde_json::to_value(subscription_document(&subscription).unwrap()).unwrap();

        assert_eq!(document["data"]["id"], "s1");
        assert_eq!(document["data"]["attributes"]["token"], "abc");
        assert_eq!(
            document["data"]["relationships"]["member"]["data"]["id"],
            "m1"
        );
    }
}

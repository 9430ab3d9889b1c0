use super::{EventError, EventPayload, EVENTS_QUEUE};
use chrono::{DateTime, Utc};
use library::communication::event::{Notification, QueueDescriptor};
use library::communication::implementation::fields::json_string;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Immutable fact appended to the event log
///
/// Every field is stored as a string field of the stream entry. The `data` map is embedded as a
/// JSON-encoded string since its keys depend on the event name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    /// Name of the event, see [`EventName`](super::EventName)
    pub name: String,
    /// Base URL of the system the event originates from
    pub source: String,
    /// Code of the group the event belongs to
    pub code: String,
    /// Point in time the event occurred
    pub time: DateTime<Utc>,
    /// User who triggered the event
    pub user: String,
    /// Event specific references
    #[serde(with = "json_string")]
    pub data: HashMap<String, String>,
}

impl Notification for Event {
    fn queue() -> QueueDescriptor {
        QueueDescriptor::new(EVENTS_QUEUE.into(), None)
    }
}

impl Event {
    /// Decodes the name specific payload, returning `None` for names without a known shape
    pub fn payload(&self) -> Result<Option<EventPayload>, EventError> {
        EventPayload::decode(&self.name, &self.data)
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use library::communication::implementation::fields::{decode_fields, encode_fields};
    use pretty_assertions::assert_eq;

    fn event() -> Event {
        Event {
            name: "TransferCommitted".into(),
            source: "https://accounting.example.com".into(),
            code: "GRP1".into(),
            time: "2024-03-01T12:00:00Z".parse().unwrap(),
            user: "u1".into(),
            data: vec![
                ("payer".to_owned(), "m1".to_owned()),
                ("payee".to_owned(), "m2".to_owned()),
                ("transfer".to_owned(), "t1".to_owned()),
            ]
            .into_iter()
            .collect(),
        }
    }

    #[test]
    fn flatten_into_string_fields() {
        let fields: HashMap<String, String> = encode_fields(&event()).unwrap().into_iter().collect();

        assert_eq!(fields["name"], "TransferCommitted");
        assert_eq!(fields["time"], "2024-03-01T12:00:00Z");

        let data: HashMap<String, String> = serde_json::from_str(&fields["data"]).unwrap();
        assert_eq!(data["payee"], "m2");

        assert_eq!(decode_fields::<Event>(&fields).unwrap(), event());
    }

    #[test]
    fn reject_records_without_data() {
        let mut fields: HashMap<String, String> =
            encode_fields(&event()).unwrap().into_iter().collect();
        fields.remove("data");

        assert!(decode_fields::<Event>(&fields).is_err());
    }
}

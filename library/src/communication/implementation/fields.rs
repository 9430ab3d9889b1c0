//! Flat field-map serialization provided by [`serde_json`] using marker traits
//!
//! Queue entries are stored as flat maps of string fields. This module translates strongly typed
//! notifications into such maps and back. Every top-level field of a notification has to serialize
//! into a JSON string; nested structures can opt in to being embedded as a JSON-encoded string
//! field by using the [`json_string`] helper with `#[serde(with = "...")]`.
//!
//! Implementors of the raw traits get the typed traits for free by implementing the marker traits.

use super::super::event::{
    Notification, NotificationPublisher, QueueEntry, RawNotificationPublisher, RawQueueEntry,
};
use crate::BoxedError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that may occur while converting between notifications and field maps
#[derive(Debug, Error)]
pub enum FieldsError {
    /// Notification did not serialize into a structure with named fields
    #[error("notification does not serialize into a map of fields")]
    NotAMap,
    /// Top-level field did not serialize into a string
    #[error("field {0} does not serialize into a string")]
    NonStringField(String),
    /// Conversion between typed data and JSON failed
    #[error("json conversion failed")]
    Json(#[from] serde_json::Error),
}

/// Converts a value into a flat list of string fields
pub fn encode_fields<T: Serialize>(value: &T) -> Result<Vec<(String, String)>, FieldsError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(value) => Ok((key, value)),
                _ => Err(FieldsError::NonStringField(key)),
            })
            .collect(),
        _ => Err(FieldsError::NotAMap),
    }
}

/// Parses a flat map of string fields into a typed value
pub fn decode_fields<T: DeserializeOwned>(
    fields: &HashMap<String, String>,
) -> Result<T, FieldsError> {
    let map: Map<String, Value> = fields
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect();

    Ok(serde_json::from_value(Value::Object(map))?)
}

/// Serde helper embedding a nested value as a JSON-encoded string field
pub mod json_string {
    use serde::de::{DeserializeOwned, Error as _};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serializes the value into a JSON string
    pub fn serialize<T: Serialize, S: Serializer>(
        value: &T,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let encoded = serde_json::to_string(value).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&encoded)
    }

    /// Deserializes the value from a JSON string
    pub fn deserialize<'de, T: DeserializeOwned, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<T, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        serde_json::from_str(&encoded).map_err(D::Error::custom)
    }
}

/// Marker trait providing a default [`NotificationPublisher`] implementation based on flat fields
pub trait FieldsNotificationPublisher: RawNotificationPublisher + Send + Sync {}

#[async_trait]
impl<P> NotificationPublisher for P
where
    P: FieldsNotificationPublisher,
{
    async fn publish<N: Notification + Send + Sync>(
        &self,
        notification: &N,
    ) -> Result<String, BoxedError> {
        let fields = encode_fields(notification)?;
        self.publish_raw(&fields, N::queue()).await
    }
}

/// Marker trait providing a default [`QueueEntry`] implementation based on flat fields
pub trait FieldsQueueEntry: RawQueueEntry {}

impl<E> QueueEntry for E
where
    E: FieldsQueueEntry,
{
    fn parse_payload<T>(&self) -> Result<T, BoxedError>
    where
        T: DeserializeOwned,
    {
        decode_fields(self.fields()).map_err(Into::into)
    }
}

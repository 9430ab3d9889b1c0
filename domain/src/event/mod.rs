//! Domain events flowing through the event log
//!
//! Events are appended once by the ingestion boundary as flat string records and interpreted by
//! each consumer through the typed [`EventPayload`].

mod category;
mod name;
mod payload;
mod record;

pub use category::NotificationCategory;
pub use name::{EventName, UnknownEventName};
pub use payload::{EventError, EventPayload, TransferParties};
pub use record::Event;

/// Key of the stream all events are appended to
pub const EVENTS_QUEUE: &str = "events";

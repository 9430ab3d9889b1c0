//! Trait implementations using [`redis`](::redis)

const STREAM_ID_NEW: &str = "*";
const STREAM_ID_HEAD: &str = "0";
const STREAM_ID_TAIL: &str = "$";
const STREAM_ID_ADDITIONS: &str = ">";

use thiserror::Error;

mod connection;
mod factory;
mod publisher;
mod queue_entry;
mod queue_provider;

pub use connection::*;
pub use factory::*;
pub use publisher::*;
pub use queue_entry::*;
pub use queue_provider::*;

#[derive(Debug, Error)]
enum RedisQueueError {
    #[error("field {0} of stream entry is not a string")]
    MalformedField(String),
}

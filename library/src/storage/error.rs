use crate::BoxedError;
use thiserror::Error;

/// Errors returned by an [`IndexedStore`](super::IndexedStore)
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend could not be reached or rejected the operation
    #[error("store unavailable")]
    Unavailable(#[source] BoxedError),
    /// Stored value could not be encoded or decoded
    #[error("stored value could not be converted")]
    Encoding(#[from] serde_json::Error),
    /// No value exists for the requested id
    #[error("no {class} object with id {id}")]
    NotFound {
        /// Class of the requested object
        class: &'static str,
        /// Requested id
        id: String,
    },
}

impl From<redis::RedisError> for StorageError {
    fn from(error: redis::RedisError) -> Self {
        Self::Unavailable(error.into())
    }
}

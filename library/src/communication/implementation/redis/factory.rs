use super::BoxedConnection;
use crate::BoxedError;
use async_trait::async_trait;

/// Variant for redis connections
pub enum RedisConnectionVariant {
    /// Individual connection that may allow for blocking commands without disturbing other users.
    /// Used for long-running blocking reads like `XREADGROUP` with `BLOCK 0`.
    Owned,
    /// Connection that can be shared between multiple users and generally does not permit blocking commands
    Multiplexed,
}

/// Factory for redis connections of different [types](RedisConnectionVariant)
#[async_trait]
pub trait RedisFactory {
    /// Establishes a new connection or clones a shared one
    async fn connection(&self, variant: RedisConnectionVariant)
        -> Result<BoxedConnection, BoxedError>;
}

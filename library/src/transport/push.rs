use super::TransportError;
use async_trait::async_trait;
use std::collections::HashMap;

/// Maximum number of tokens a single multicast call may carry. Imposed by push providers.
pub const MULTICAST_LIMIT: usize = 500;

/// Payload delivered to every token of a multicast call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushMessage {
    /// Arbitrary string data handed to the receiving application
    pub data: HashMap<String, String>,
}

impl PushMessage {
    /// Creates a message carrying the given data
    pub fn new(data: HashMap<String, String>) -> Self {
        Self { data }
    }
}

/// Provider independent classification of a per-token failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Endpoint no longer exists and will never accept messages again
    PermanentInvalid,
    /// Temporary condition like throttling or provider hiccups
    Transient,
    /// Anything the adapter does not recognize
    Unknown,
}

/// Result of delivering to a single token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Provider accepted the message for this token
    Success,
    /// Provider refused the message for this token
    Failure {
        /// Classified reason
        kind: FailureKind,
        /// Reason as reported by the provider
        reason: String,
    },
}

impl SendOutcome {
    /// Whether the token has been reported as permanently invalid
    pub fn is_permanently_invalid(&self) -> bool {
        matches!(
            self,
            SendOutcome::Failure {
                kind: FailureKind::PermanentInvalid,
                ..
            }
        )
    }
}

/// Capability to deliver one message to many endpoint tokens at once
#[async_trait]
pub trait MulticastSender: Send + Sync {
    /// Sends the message to at most [`MULTICAST_LIMIT`] tokens.
    ///
    /// On success the returned outcomes have the same length and order as `tokens`.
    /// Any error returned applies to the call as a whole.
    async fn send_multicast(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<Vec<SendOutcome>, TransportError>;
}

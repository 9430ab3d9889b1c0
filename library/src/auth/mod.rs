//! Access token acquisition and caching
//!
//! A [`TokenCache`] wraps a [`TokenSource`] and hands out the cached token for as long as it has
//! enough remaining lifetime. Concurrent callers wait for a single refresh instead of each issuing
//! their own request.

mod cache;
mod client_credentials;

pub use cache::TokenCache;
pub use client_credentials::{ClientCredentials, ClientCredentialsSource};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Bearer token with its absolute expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// Opaque token value
    pub token: String,
    /// Point in time after which the token is no longer accepted
    pub expires_at: DateTime<Utc>,
}

/// Errors while obtaining a token
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token endpoint could not be reached
    #[error("token request failed")]
    Request(#[from] reqwest::Error),
    /// Token endpoint refused to issue a token
    #[error("token endpoint answered with status {0}")]
    Rejected(u16),
    /// Token response could not be interpreted
    #[error("malformed token response: {0}")]
    MalformedResponse(String),
}

/// Origin of fresh access tokens
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Requests a new token
    async fn fetch(&self) -> Result<AccessToken, AuthError>;
}

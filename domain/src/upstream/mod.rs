//! Read-only access to the community API used to enrich events
//!
//! Social resources (groups, members, users) and accounting resources (transfers, accounts,
//! currencies) are served as JSON:API documents. [`KomunitinClient`] authenticates with client
//! credentials and follows pagination links; [`UpstreamApi`] is the seam consumers depend upon.

mod client;
mod jsonapi;
mod models;

#[cfg(any(test, feature = "test"))]
mod mock;

pub use client::{KomunitinClient, UPSTREAM_SCOPE};
pub use jsonapi::{Document, Links, Relationship, RelationshipData, Resource, ResourceIdentifier};
pub use models::{Account, Currency, Group, Member, Transfer, User, UserSettings};

#[cfg(any(test, feature = "test"))]
pub use mock::StaticUpstream;

use async_trait::async_trait;
use library::auth::AuthError;
use thiserror::Error;

/// Failures while talking to the upstream API
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Service credentials could not be exchanged for a token
    #[error("unable to authenticate against upstream")]
    Auth(#[from] AuthError),
    /// Request could not be delivered
    #[error("upstream request failed")]
    Request(#[from] reqwest::Error),
    /// Presented user token was not accepted
    #[error("upstream rejected the presented credentials")]
    Unauthorized,
    /// Requested resource does not exist
    #[error("upstream resource {0} not found")]
    NotFound(String),
    /// Upstream answered with an unexpected status
    #[error("upstream answered {url} with status {status}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },
    /// Document did not have the expected shape
    #[error("malformed upstream document: {0}")]
    Malformed(String),
}

/// Lookups against the upstream API
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    /// Group with its administrators
    async fn group(&self, code: &str) -> Result<Group, UpstreamError>;

    /// Every member of a group
    async fn group_members(&self, code: &str) -> Result<Vec<Member>, UpstreamError>;

    /// Single member of a group
    async fn member(&self, code: &str, id: &str) -> Result<Member, UpstreamError>;

    /// Users associated with a member, including their settings
    async fn member_users(&self, member: &str) -> Result<Vec<User>, UpstreamError>;

    /// Transfer including payer and payee accounts and the currency
    async fn transfer(&self, code: &str, id: &str) -> Result<Transfer, UpstreamError>;

    /// User the given bearer token has been issued to
    async fn user_by_token(&self, token: &str) -> Result<User, UpstreamError>;
}

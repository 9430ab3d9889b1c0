//! HTTP boundary accepting events and managing subscriptions
//!
//! Event producers append events with basic auth credentials shared with this service. Apps
//! register and remove push subscriptions on behalf of their users, authorized by the user's
//! bearer token which is verified against the upstream API.

mod documents;
mod error;
mod handlers;
mod options;
mod server;

use crate::subscriptions::SubscriptionStore;
use async_trait::async_trait;
use domain::upstream::UpstreamApi;
use harness::{Heart, Module};
use jatsl::{schedule, JobScheduler};
use library::BoxedError;
use std::sync::Arc;
use tracing::instrument;

pub use documents::MEDIA_TYPE;
pub use error::ApiError;
pub use options::Options;
pub use server::{routes, EventCredentials, ServerJob};

/// Collaborators shared by all request handlers
pub struct ApiState<P> {
    publisher: Arc<P>,
    subscriptions: SubscriptionStore,
    upstream: Arc<dyn UpstreamApi>,
    credentials: Arc<EventCredentials>,
}

impl<P> ApiState<P> {
    /// Creates a new instance from raw parts
    pub fn new(
        publisher: P,
        subscriptions: SubscriptionStore,
        upstream: Arc<dyn UpstreamApi>,
        credentials: Arc<EventCredentials>,
    ) -> Self {
        Self {
            publisher: Arc::new(publisher),
            subscriptions,
            upstream,
            credentials,
        }
    }
}

impl<P> Clone for ApiState<P> {
    fn clone(&self) -> Self {
        Self {
            publisher: self.publisher.clone(),
            subscriptions: self.subscriptions.clone(),
            upstream: self.upstream.clone(),
            credentials: self.credentials.clone(),
        }
    }
}

/// Module implementation
pub struct Api {
    options: Options,
}

impl Api {
    /// Creates a new instance from raw parts
    pub fn new(options: Options) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Module for Api {
    #[instrument(skip(self, scheduler))]
    async fn run(&mut self, scheduler: &JobScheduler) -> Result<Option<Heart>, BoxedError> {
        let credentials = EventCredentials::new(
            self.options.events_username.clone(),
            self.options.events_password.clone(),
        );

        let server_job = ServerJob::new(
            self.options.port,
            self.options.redis.url.clone(),
            credentials,
            Arc::new(self.options.upstream.client()?),
        );

        schedule!(scheduler, { server_job });

        Ok(Some(Heart::without_heart_stone()))
    }
}

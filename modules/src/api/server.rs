use super::{handlers, ApiError, ApiState};
use crate::subscriptions::SubscriptionStore;
use async_trait::async_trait;
use domain::upstream::UpstreamApi;
use harness::RedisCommunicationFactory;
use jatsl::{Job, JobManager};
use library::communication::event::NotificationPublisher;
use library::communication::CommunicationFactory;
use library::helpers::{constant_time_eq, split_authorization};
use library::EmptyResult;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use warp::hyper::body::Bytes;
use warp::reply::{Reply, Response};
use warp::{Filter, Rejection};

const BODY_LIMIT: u64 = 64 * 1024;

/// Basic auth credentials event producers have to present
pub struct EventCredentials {
    username: String,
    password: String,
}

impl EventCredentials {
    /// Creates a new instance from raw parts
    pub fn new(username: String, password: String) -> Self {
        Self { username, password }
    }

    /// Whether the `Authorization` header carries matching credentials
    pub fn verify(&self, authorization: Option<&str>) -> bool {
        let decoded = authorization
            .and_then(|header| split_authorization(header, "Basic"))
            .and_then(|encoded| base64::decode(encoded).ok())
            .and_then(|bytes| String::from_utf8(bytes).ok());

        let (username, password) = match decoded.as_deref().and_then(|d| d.split_once(':')) {
            Some(pair) => pair,
            None => return false,
        };

        let username_matches = constant_time_eq(username.as_bytes(), self.username.as_bytes());
        let password_matches = constant_time_eq(password.as_bytes(), self.password.as_bytes());

        !self.username.is_empty() && username_matches & password_matches
    }
}

fn respond(result: Result<Response, ApiError>) -> Result<Response, Infallible> {
    Ok(result.unwrap_or_else(Reply::into_response))
}

/// Routes of the HTTP boundary operating on the given state
pub fn routes<P>(state: ApiState<P>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone
where
    P: NotificationPublisher + Send + Sync + 'static,
{
    let with_state = warp::any().map(move || state.clone());
    let authorization = warp::header::optional::<String>("authorization");
    let body = warp::body::content_length_limit(BODY_LIMIT).and(warp::body::bytes());

    let create_event = warp::post()
        .and(warp::path("events"))
        .and(warp::path::end())
        .and(with_state.clone())
        .and(authorization.clone())
        .and(body.clone())
        .and_then(
            |state: ApiState<P>, authorization: Option<String>, body: Bytes| async move {
                respond(handlers::create_event(state, authorization, body).await)
            },
        )
        .with(warp::trace::named("create_event"));

    let create_subscription = warp::post()
        .and(warp::path("subscriptions"))
        .and(warp::path::end())
        .and(with_state.clone())
        .and(authorization.clone())
        .and(body)
        .and_then(
            |state: ApiState<P>, authorization: Option<String>, body: Bytes| async move {
                respond(handlers::create_subscription(state, authorization, body).await)
            },
        )
        .with(warp::trace::named("create_subscription"));

    let delete_subscription = warp::delete()
        .and(warp::path!("subscriptions" / String))
        .and(with_state)
        .and(authorization)
        .and_then(
            |id: String, state: ApiState<P>, authorization: Option<String>| async move {
                respond(handlers::delete_subscription(id, state, authorization).await)
            },
        )
        .with(warp::trace::named("delete_subscription"));

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization"])
        .allow_methods(vec!["POST", "DELETE"]);

    create_event
        .or(create_subscription)
        .or(delete_subscription)
        .with(cors)
        .with(warp::trace::request())
}

/// Job serving the HTTP boundary
pub struct ServerJob {
    port: u16,
    redis_url: String,
    credentials: Arc<EventCredentials>,
    upstream: Arc<dyn UpstreamApi>,
}

impl ServerJob {
    /// Creates a new instance from raw parts
    pub fn new(
        port: u16,
        redis_url: String,
        credentials: EventCredentials,
        upstream: Arc<dyn UpstreamApi>,
    ) -> Self {
        Self {
            port,
            redis_url,
            credentials: Arc::new(credentials),
            upstream,
        }
    }
}

#[async_trait]
impl Job for ServerJob {
    const NAME: &'static str = module_path!();
    const SUPPORTS_GRACEFUL_TERMINATION: bool = true;

    async fn execute(&self, manager: JobManager) -> EmptyResult {
        let handle_provider = Arc::new(manager.clone());
        let factory = RedisCommunicationFactory::new(self.redis_url.clone(), handle_provider);

        let state = ApiState::new(
            factory.notification_publisher(),
            SubscriptionStore::new(factory.indexed_store()),
            self.upstream.clone(),
            self.credentials.clone(),
        );

        let source_addr: SocketAddr = ([0, 0, 0, 0], self.port).into();
        let (addr, server) = warp::serve(routes(state))
            .bind_with_graceful_shutdown(source_addr, manager.termination_signal());

        info!(?addr, "Serving events and subscriptions");
        manager.ready().await;
        server.await;

        Ok(())
    }
}

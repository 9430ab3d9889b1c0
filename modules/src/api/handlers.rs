use super::documents::{self, MEDIA_TYPE};
use super::{ApiError, ApiState};
use domain::upstream::Document;
use library::communication::event::NotificationPublisher;
use library::helpers::split_authorization;
use serde::Serialize;
use tracing::{info, instrument};
use warp::http::header::CONTENT_TYPE;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::{self, Reply, Response};

fn created<T: Serialize>(document: &T) -> Response {
    let reply = reply::with_status(reply::json(document), StatusCode::CREATED);
    reply::with_header(reply, CONTENT_TYPE, MEDIA_TYPE).into_response()
}

/// Verifies that the bearer token belongs to `user` and that the user acts as `member`
async fn authorize<P>(
    state: &ApiState<P>,
    authorization: Option<&str>,
    user: &str,
    member: &str,
) -> Result<(), ApiError> {
    let token = authorization
        .and_then(|header| split_authorization(header, "Bearer"))
        .ok_or(ApiError::Unauthenticated)?;

    let owner = state.upstream.user_by_token(token).await?;

    if owner.id != user {
        return Err(ApiError::Forbidden(
            "the token provided authorizes another user",
        ));
    }

    if !owner.members.iter().any(|m| m == member) {
        return Err(ApiError::Forbidden("the user does not act as the member"));
    }

    Ok(())
}

/// `POST /events`
#[instrument(skip_all)]
pub async fn create_event<P>(
    state: ApiState<P>,
    authorization: Option<String>,
    body: Bytes,
) -> Result<Response, ApiError>
where
    P: NotificationPublisher + Send + Sync,
{
    if !state.credentials.verify(authorization.as_deref()) {
        return Err(ApiError::Unauthenticated);
    }

    let (event, mut resource) = documents::parse_event(&body)?;

    let id = state
        .publisher
        .publish(&event)
        .await
        .map_err(ApiError::Internal)?;

    info!(%id, name = %event.name, code = %event.code, "Appended event");

    resource.id = Some(id);
    Ok(created(&Document::new(resource)))
}

/// `POST /subscriptions`
#[instrument(skip_all)]
pub async fn create_subscription<P>(
    state: ApiState<P>,
    authorization: Option<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let subscription = documents::parse_subscription(&body)?;

    authorize(
        &state,
        authorization.as_deref(),
        &subscription.user,
        &subscription.member,
    )
    .await?;

    let stored = state.subscriptions.upsert(subscription).await?;
    info!(id = %stored.id, member = %stored.member, "Stored subscription");

    Ok(created(&documents::subscription_document(&stored)?))
}

/// `DELETE /subscriptions/{id}`
#[instrument(skip(state, authorization))]
pub async fn delete_subscription<P>(
    id: String,
    state: ApiState<P>,
    authorization: Option<String>,
) -> Result<Response, ApiError> {
    let subscription = state.subscriptions.get(&id).await?;

    authorize(
        &state,
        authorization.as_deref(),
        &subscription.user,
        &subscription.member,
    )
    .await?;

    state.subscriptions.delete(&id).await?;
    info!(%id, "Deleted subscription");

    Ok(StatusCode::NO_CONTENT.into_response())
}

use domain::upstream::UpstreamError;
use library::storage::StorageError;
use library::communication::BlackboxError;
use library::BoxedError;
use serde_json::json;
use thiserror::Error;
use tracing::error;
use warp::http::StatusCode;
use warp::reply::{self, Reply, Response};

/// Failures surfaced to API clients
#[derive(Debug, Error)]
pub enum ApiError {
    /// Credentials are missing or were not accepted
    #[error("missing or invalid credentials")]
    Unauthenticated,
    /// Credentials do not grant access to the resource
    #[error("{0}")]
    Forbidden(&'static str),
    /// Request document is malformed
    #[error("{0}")]
    BadRequest(String),
    /// Addressed resource does not exist
    #[error("resource not found")]
    NotFound,
    /// Request could not be served due to a failing dependency
    #[error("internal server error")]
    Internal(#[source] BoxedError),
}

impl ApiError {
    /// Status code the error is reported with
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound { .. } => Self::NotFound,
            other => Self::Internal(other.into()),
        }
    }
}

impl From<UpstreamError> for ApiError {
    fn from(error: UpstreamError) -> Self {
        match error {
            UpstreamError::Unauthorized | UpstreamError::NotFound(_) => Self::Unauthenticated,
            other => Self::Internal(other.into()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        Self::BadRequest(error.to_string())
    }
}

impl Reply for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let title = self.to_string();

        let detail = match self {
            Self::Internal(source) => {
                let causes = BlackboxError::from_boxed(source);
                error!(%causes, "Failed to serve request");
                causes.to_string()
            }
            _ => title.clone(),
        };

        let body = json!({
            "errors": [{
                "status": status.as_u16().to_string(),
                "title": title,
                "detail": detail,
            }]
        });

        reply::with_status(reply::json(&body), status).into_response()
    }
}

use super::{AccessToken, AuthError, TokenSource};
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

/// Caches the token of a [`TokenSource`] until it is about to expire
pub struct TokenCache<S> {
    source: S,
    margin: Duration,
    current: Mutex<Option<AccessToken>>,
}

impl<S: TokenSource> TokenCache<S> {
    /// Creates a cache which refreshes tokens with less than one minute of remaining lifetime
    pub fn new(source: S) -> Self {
        Self::with_margin(source, Duration::minutes(1))
    }

    /// Creates a cache refreshing tokens whose remaining lifetime drops below `margin`
    pub fn with_margin(source: S, margin: Duration) -> Self {
        Self {
            source,
            margin,
            current: Mutex::new(None),
        }
    }

    /// Returns a token valid for at least the configured margin, refreshing it if required
    pub async fn get_token(&self) -> Result<(String, DateTime<Utc>), AuthError> {
        // The lock is held across the refresh so concurrent callers reuse its result
        let mut current = self.current.lock().await;

        if let Some(token) = current.as_ref() {
            if token.expires_at - Utc::now() > self.margin {
                return Ok((token.token.clone(), token.expires_at));
            }
        }

        let token = self.source.fetch().await?;
        debug!(expires_at = %token.expires_at, "Refreshed access token");

        let result = (token.token.clone(), token.expires_at);
        *current = Some(token);

        Ok(result)
    }

    /// Drops the cached token, forcing a refresh on the next call
    pub async fn invalidate(&self) {
        self.current.lock().await.take();
    }
}

use super::{AccessToken, AuthError, TokenSource};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::instrument;

/// Credentials of an OAuth2 client
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    /// Client identifier
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
    /// Space separated scopes to request
    pub scope: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExpiresIn {
    Number(i64),
    Text(String),
}

impl ExpiresIn {
    fn seconds(&self) -> Result<i64, AuthError> {
        match self {
            ExpiresIn::Number(n) => Ok(*n),
            ExpiresIn::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| AuthError::MalformedResponse(format!("expires_in '{}'", s))),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: ExpiresIn,
}

/// [`TokenSource`] using the OAuth2 client credentials grant
pub struct ClientCredentialsSource {
    client: Client,
    token_url: Url,
    credentials: ClientCredentials,
}

impl ClientCredentialsSource {
    /// Creates a new source requesting tokens from the given endpoint
    pub fn new(client: Client, token_url: Url, credentials: ClientCredentials) -> Self {
        Self {
            client,
            token_url,
            credentials,
        }
    }
}

#[async_trait]
impl TokenSource for ClientCredentialsSource {
    #[instrument(skip(self), fields(url = %self.token_url))]
    async fn fetch(&self) -> Result<AccessToken, AuthError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("scope", self.credentials.scope.as_str()),
        ];

        let response = self
            .client
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::Rejected(response.status().as_u16()));
        }

        let body: TokenResponse = response.json().await?;
        let expires_in = body.expires_in.seconds()?;

        Ok(AccessToken {
            token: body.access_token,
            expires_at: Utc::now() + Duration::seconds(expires_in),
        })
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn accept_numeric_and_textual_lifetimes() {
        let numeric: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","expires_in":3600}"#).unwrap();
        let textual: TokenResponse =
            serde_json::from_str(r#"{"access_token":"b","expires_in":"3600"}"#).unwrap();

        assert_eq!(numeric.expires_in.seconds().unwrap(), 3600);
        assert_eq!(textual.expires_in.seconds().unwrap(), 3600);
    }

    #[test]
    fn reject_garbage_lifetimes() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"c","expires_in":"soon"}"#).unwrap();

        assert!(response.expires_in.seconds().is_err());
    }
}

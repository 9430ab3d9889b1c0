use super::{Document, Group, Member, Resource, Transfer, UpstreamApi, UpstreamError, User};
use async_trait::async_trait;
use library::auth::{TokenCache, TokenSource};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Scopes requested for the service token
pub const UPSTREAM_SCOPE: &str = "komunitin_social_read_all komunitin_accounting_read_all";

/// Response which may have been refused because of the presented token
enum Rejectable<T> {
    Accepted(T),
    Rejected(u16),
}

/// [`UpstreamApi`] implementation talking to the social and accounting services
pub struct KomunitinClient<S> {
    http: Client,
    tokens: Arc<TokenCache<S>>,
    social_url: String,
    accounting_url: String,
}

impl<S: TokenSource> KomunitinClient<S> {
    /// Creates a client authenticating through the given token cache
    pub fn new(
        http: Client,
        tokens: Arc<TokenCache<S>>,
        social_url: &str,
        accounting_url: &str,
    ) -> Self {
        Self {
            http,
            tokens,
            social_url: social_url.trim_end_matches('/').to_owned(),
            accounting_url: accounting_url.trim_end_matches('/').to_owned(),
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        bearer: Option<&str>,
    ) -> Result<Document<T>, UpstreamError> {
        if let Some(token) = bearer {
            return match self.request(url, query, token).await? {
                Rejectable::Accepted(document) => Ok(document),
                Rejectable::Rejected(_) => Err(UpstreamError::Unauthorized),
            };
        }

        let (token, _) = self.tokens.get_token().await?;
        match self.request(url, query, &token).await? {
            Rejectable::Accepted(document) => return Ok(document),
            Rejectable::Rejected(status) => {
                // Revoked before its expiry, one attempt with a fresh token
                warn!(url, status, "Service token rejected, refreshing it");
                self.tokens.invalidate().await;
            }
        }

        let (token, _) = self.tokens.get_token().await?;
        match self.request(url, query, &token).await? {
            Rejectable::Accepted(document) => Ok(document),
            Rejectable::Rejected(status) => Err(UpstreamError::Status {
                url: url.to_owned(),
                status,
            }),
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        token: &str,
    ) -> Result<Rejectable<Document<T>>, UpstreamError> {
        debug!(url, "Fetching upstream resource");
        let response = self
            .http
            .get(url)
            .query(query)
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(Rejectable::Accepted(response.json().await?)),
            StatusCode::NOT_FOUND => Err(UpstreamError::NotFound(url.to_owned())),
            status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                Ok(Rejectable::Rejected(status.as_u16()))
            }
            status => Err(UpstreamError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            }),
        }
    }

    /// Fetches every page of a collection, returning the pages in order
    async fn fetch_all(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<Document<Vec<Resource>>>, UpstreamError> {
        let mut pages = vec![self.fetch::<Vec<Resource>>(url, query, None).await?];

        // Pagination links already carry the query
        while let Some(next) = pages.last().and_then(|p| p.next_page()).map(str::to_owned) {
            pages.push(self.fetch(&next, &[], None).await?);
        }

        Ok(pages)
    }
}

#[async_trait]
impl<S: TokenSource> UpstreamApi for KomunitinClient<S> {
    #[instrument(skip(self))]
    async fn group(&self, code: &str) -> Result<Group, UpstreamError> {
        let url = format!("{}/{}", self.social_url, code);
        let document = self.fetch(&url, &[("include", "admins")], None).await?;

        Group::from_document(&document)
    }

    #[instrument(skip(self))]
    async fn group_members(&self, code: &str) -> Result<Vec<Member>, UpstreamError> {
        let url = format!("{}/{}/members", self.social_url, code);

        self.fetch_all(&url, &[])
            .await?
            .iter()
            .flat_map(|page| page.data.iter())
            .map(Member::from_resource)
            .collect()
    }

    #[instrument(skip(self))]
    async fn member(&self, code: &str, id: &str) -> Result<Member, UpstreamError> {
        let url = format!("{}/{}/members/{}", self.social_url, code, id);
        let document: Document<Resource> = self.fetch(&url, &[], None).await?;

        Member::from_resource(&document.data)
    }

    #[instrument(skip(self))]
    async fn member_users(&self, member: &str) -> Result<Vec<User>, UpstreamError> {
        let url = format!("{}/users", self.social_url);
        let query = [("filter[members]", member), ("include", "settings")];

        let mut users = Vec::new();
        for page in self.fetch_all(&url, &query).await? {
            for resource in page.data.iter() {
                users.push(User::from_resource(&page, resource)?);
            }
        }

        Ok(users)
    }

    #[instrument(skip(self))]
    async fn transfer(&self, code: &str, id: &str) -> Result<Transfer, UpstreamError> {
        let url = format!("{}/{}/transfers/{}", self.accounting_url, code, id);
        let document = self
            .fetch(&url, &[("include", "payer,payee,currency")], None)
            .await?;

        Transfer::from_document(&document)
    }

    #[instrument(skip(self, token))]
    async fn user_by_token(&self, token: &str) -> Result<User, UpstreamError> {
        let url = format!("{}/users/me", self.social_url);
        let document: Document<Resource> = self
            .fetch(&url, &[("include", "members")], Some(token))
            .await?;

        User::from_resource(&document, &document.data)
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use library::auth::{AccessToken, AuthError};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use warp::http::StatusCode as WarpStatus;
    use warp::Filter;

    struct SequentialSource {
        issued: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TokenSource for SequentialSource {
        async fn fetch(&self) -> Result<AccessToken, AuthError> {
            let n = self.issued.fetch_add(1, Ordering::SeqCst);

            Ok(AccessToken {
                token: format!("token-{}", n),
                expires_at: Utc::now() + Duration::hours(1),
            })
        }
    }

    /// Answers every path with the same member, provided `accepted` is presented as bearer token
    fn serve(accepted: &'static str) -> String {
        let route = warp::any()
            .and(warp::header::<String>("authorization"))
            .map(move |authorization: String| {
                if authorization == format!("Bearer {}", accepted) {
                    let body = json!({
                        "data": {"type": "members", "id": "m1", "attributes": {"code": "GRP0001", "name": "Ann"}}
                    });
                    warp::reply::with_status(warp::reply::json(&body), WarpStatus::OK)
                } else {
                    warp::reply::with_status(warp::reply::json(&json!({})), WarpStatus::UNAUTHORIZED)
                }
            });

        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        format!("http://{}", addr)
    }

    fn client(url: &str) -> (KomunitinClient<SequentialSource>, Arc<AtomicUsize>) {
        let issued = Arc::new(AtomicUsize::new(0));
        let source = SequentialSource {
            issued: issued.clone(),
        };
        let tokens = Arc::new(TokenCache::new(source));

        (KomunitinClient::new(Client::new(), tokens, url, url), issued)
    }

    #[tokio::test]
    async fn refresh_revoked_service_tokens() {
        let url = serve("token-1");
        let (client, issued) = client(&url);

        let member = client.member("GRP", "m1").await.unwrap();

        assert_eq!(member.name, "Ann");
        assert_eq!(issued.load(Ordering::SeqCst), 2);

        // The refreshed token stays cached
        client.member("GRP", "m1").await.unwrap();
        assert_eq!(issued.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn give_up_after_one_refresh() {
        let url = serve("never-issued");
        let (client, issued) = client(&url);

        let error = client.member("GRP", "m1").await.unwrap_err();

        assert!(matches!(error, UpstreamError::Status { status: 401, .. }));
        assert_eq!(issued.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reject_user_tokens_without_refreshing() {
        let url = serve("token-0");
        let (client, issued) = client(&url);

        let error = client.user_by_token("stolen").await.unwrap_err();

        assert!(matches!(error, UpstreamError::Unauthorized));
        assert_eq!(issued.load(Ordering::SeqCst), 0);
    }
}

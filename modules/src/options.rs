//! Various options usable by modules
//!
//! The structs in this module allow other modules to flatten them into
//! their own options struct. This allows for a unified yet non-cluttered
//! option set.

use domain::upstream::{KomunitinClient, UPSTREAM_SCOPE};
use library::auth::{ClientCredentials, ClientCredentialsSource, TokenCache};
use library::communication::event::RedeliveryPolicy;
use library::helpers::parse_seconds;
use library::BoxedError;
use reqwest::{Client, Url};
use std::sync::Arc;
use std::time::Duration;
use structopt::StructOpt;

/// Options for connecting to the Redis server
#[derive(Debug, StructOpt)]
pub struct RedisOptions {
    /// Redis database server URL
    #[structopt(
        short = "r",
        long = "redis",
        env = "REDIS",
        global = true,
        default_value = "redis://redis:6379/",
        value_name = "url"
    )]
    pub url: String,
}

/// Options relevant for message queueing
#[derive(Debug, StructOpt)]
pub struct QueueingOptions {
    /// Unique and stable identifier for this instance.
    /// It is used to identify and resume work after a crash
    /// or deliberate restart, thus it may not change across
    /// executions!
    #[structopt(env)]
    pub id: String,
}

/// Options controlling how abandoned queue entries are handled
#[derive(Debug, StructOpt)]
pub struct RedeliveryOptions {
    /// Take over abandoned entries of the consumer group once and exit
    /// instead of consuming new entries
    #[structopt(long)]
    pub reclaim: bool,

    /// Number of deliveries after which an entry is moved to the dead-letter queue
    #[structopt(long, env, default_value = "5")]
    pub max_deliveries: usize,

    /// Seconds an entry has to be pending before it is considered abandoned
    #[structopt(long, env, default_value = "300", parse(try_from_str = parse_seconds))]
    pub min_idle: Duration,
}

impl RedeliveryOptions {
    /// Policy described by these options
    pub fn policy(&self) -> RedeliveryPolicy {
        RedeliveryPolicy {
            min_idle: self.min_idle,
            max_deliveries: self.max_deliveries,
            ..Default::default()
        }
    }
}

/// Options for the upstream community API
#[derive(Debug, StructOpt)]
pub struct UpstreamOptions {
    /// Base URL of the authorization server
    #[structopt(long, env = "KOMUNITIN_AUTH_URL", value_name = "url")]
    pub auth_url: String,

    /// Base URL of the social API
    #[structopt(long, env = "KOMUNITIN_SOCIAL_URL", value_name = "url")]
    pub social_url: String,

    /// Base URL of the accounting API
    #[structopt(long, env = "KOMUNITIN_ACCOUNTING_URL", value_name = "url")]
    pub accounting_url: String,

    /// OAuth2 client identifier of this service
    #[structopt(long, env = "NOTIFICATIONS_CLIENT_ID")]
    pub client_id: String,

    /// OAuth2 client secret of this service
    #[structopt(long, env = "NOTIFICATIONS_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    /// Seconds after which upstream requests are aborted
    #[structopt(long = "upstream-timeout", env = "UPSTREAM_TIMEOUT", default_value = "30", parse(try_from_str = parse_seconds))]
    pub timeout: Duration,
}

impl UpstreamOptions {
    /// Instantiates an authenticated client
    pub fn client(&self) -> Result<KomunitinClient<ClientCredentialsSource>, BoxedError> {
        let http = Client::builder().timeout(self.timeout).build()?;
        let token_url = Url::parse(&format!("{}/token", self.auth_url.trim_end_matches('/')))?;

        let credentials = ClientCredentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            scope: UPSTREAM_SCOPE.to_owned(),
        };

        let source = ClientCredentialsSource::new(http.clone(), token_url, credentials);
        let tokens = Arc::new(TokenCache::new(source));

        Ok(KomunitinClient::new(
            http,
            tokens,
            &self.social_url,
            &self.accounting_url,
        ))
    }
}

use crate::options::{QueueingOptions, RedeliveryOptions, RedisOptions, UpstreamOptions};
use library::helpers::parse_seconds;
use library::transport::FcmSender;
use library::BoxedError;
use reqwest::Url;
use std::time::Duration;
use structopt::StructOpt;

/// Options for the push transport
#[derive(Debug, StructOpt)]
pub struct PushOptions {
    /// Server key used to authenticate against the push provider
    #[structopt(long, env = "FCM_SERVER_KEY", hide_env_values = true)]
    pub fcm_server_key: String,

    /// Multicast send endpoint of the push provider
    #[structopt(
        long,
        env = "FCM_ENDPOINT",
        default_value = "https://fcm.googleapis.com/fcm/send",
        value_name = "url"
    )]
    pub fcm_endpoint: Url,

    /// Seconds after which a multicast request is aborted
    #[structopt(long = "push-timeout", env = "PUSH_TIMEOUT", default_value = "30", parse(try_from_str = parse_seconds))]
    pub timeout: Duration,
}

impl PushOptions {
    /// Instantiates the transport described by these options
    pub fn sender(&self) -> Result<FcmSender, BoxedError> {
        Ok(FcmSender::new(
            self.fcm_endpoint.clone(),
            self.fcm_server_key.clone(),
            self.timeout,
        )?)
    }
}

/// Options for the notifier module
#[derive(Debug, StructOpt)]
pub struct Options {
    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub queueing: QueueingOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub redis: RedisOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub redelivery: RedeliveryOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub upstream: UpstreamOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub push: PushOptions,
}

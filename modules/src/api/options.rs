use crate::constants::PORT_API;
use crate::options::{RedisOptions, UpstreamOptions};
use structopt::StructOpt;

/// Options for the api module
#[derive(Debug, StructOpt)]
pub struct Options {
    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub redis: RedisOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub upstream: UpstreamOptions,

    /// Port on which the HTTP server will listen
    #[structopt(short, long, env = "API_PORT", default_value = PORT_API)]
    pub port: u16,

    /// Username event producers authenticate with
    #[structopt(long, env = "NOTIFICATIONS_EVENTS_USERNAME")]
    pub events_username: String,

    /// Password event producers authenticate with
    #[structopt(long, env = "NOTIFICATIONS_EVENTS_PASSWORD", hide_env_values = true)]
    pub events_password: String,
}

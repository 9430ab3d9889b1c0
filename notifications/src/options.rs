use std::fmt;
use std::str::FromStr;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    about = "Event driven push notification and email delivery.",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct MainOptions {
    /// Log level, scopable to different modules
    ///
    /// Levels: trace, debug, info, warn, error
    #[structopt(
        short,
        long,
        global = true,
        default_value = "warn,notifications=info,modules=info,library=info,harness=info,domain=info",
        env = "RUST_LOG",
        value_name = "level"
    )]
    pub log: String,

    /// Format of log output
    ///
    /// Formats: text, compact, json
    #[structopt(long, global = true, env, default_value = "text", value_name = "format")]
    pub log_format: LogFormat,

    /// Enable status reporting server which can be used as a readiness probe
    #[structopt(long, global = true, env, value_name = "port")]
    pub status_server: Option<u16>,

    #[structopt(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Text,
    Compact,
    Json,
}

#[derive(Debug)]
pub struct UnknownLogFormat(String);

impl fmt::Display for UnknownLogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown log format '{}'", self.0)
    }
}

impl FromStr for LogFormat {
    type Err = UnknownLogFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(UnknownLogFormat(other.to_owned())),
        }
    }
}

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Sends push notifications about events
    Notifier(modules::notifier::Options),
    /// Sends emails about events
    Mailer(modules::mailer::Options),
    /// Accepts events and manages subscriptions over HTTP
    Api(modules::api::Options),
}

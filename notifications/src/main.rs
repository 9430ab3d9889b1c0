use anyhow::{bail, Result};
use harness::ModuleRunner;
use modules::api::Api;
use modules::mailer::Mailer;
use modules::notifier::Notifier;
use options::{Command, LogFormat};
use structopt::StructOpt;
use tracing::info;

mod options;

#[tokio::main]
async fn main() -> Result<()> {
    let (command, runner) = init();

    let termination_reason = match command {
        Command::Notifier(options) => runner.run(Notifier::new(options)).await,
        Command::Mailer(options) => runner.run(Mailer::new(options)).await,
        Command::Api(options) => runner.run(Api::new(options)).await,
    };

    if !termination_reason.is_clean() {
        bail!("module terminated: {}", termination_reason);
    }

    Ok(())
}

fn init() -> (Command, ModuleRunner) {
    let options = options::MainOptions::from_args();

    let formatter = tracing_subscriber::fmt().with_env_filter(options.log);

    match options.log_format {
        LogFormat::Text => formatter.init(),
        LogFormat::Compact => formatter.compact().init(),
        LogFormat::Json => formatter.json().init(),
    };

    let runner = match options.status_server {
        Some(port) => ModuleRunner::new_with_status_server(port),
        None => ModuleRunner::default(),
    };

    info!("Notifications {}", env!("CARGO_PKG_VERSION"));

    (options.command, runner)
}

use super::{DeathReason, Heart};
use async_trait::async_trait;
use futures::lock::Mutex;
use jatsl::{JobScheduler, State, StatusServer};
use library::{BoxedError, EmptyResult};
use std::any::type_name;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument};

/// Outcome of a [`ModuleRunner::run`] invocation
#[derive(Error, Debug)]
pub enum ModuleTerminationReason {
    /// `pre_startup` returned an error
    #[error("module failed to start")]
    StartupFailed(#[source] BoxedError),
    /// `run` returned an error
    #[error("module failed while running")]
    OperationalError(#[source] BoxedError),
    /// The [`Heart`] returned from `run` stopped
    #[error("module stopped: {0}")]
    HeartDied(DeathReason),
    /// `run` finished without handing out a [`Heart`]
    #[error("module finished its work")]
    ExitedNormally,
    /// A lifecycle hook exceeded its deadline
    #[error("lifecycle hook timed out")]
    Timeout,
}

impl ModuleTerminationReason {
    /// Whether the process should exit successfully
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::HeartDied(_) | Self::ExitedNormally)
    }
}

/// Deployable unit of the pipeline, e.g. a consumer or the http api
#[async_trait]
pub trait Module {
    /// Preconditions checked before any job is scheduled
    async fn pre_startup(&mut self) -> EmptyResult {
        Ok(())
    }

    /// Schedules the module's jobs
    ///
    /// Returning a [`Heart`] keeps the module alive until it stops. Returning `None` means the work is
    /// already done and the runner proceeds straight to shutdown.
    async fn run(&mut self, scheduler: &JobScheduler) -> Result<Option<Heart>, BoxedError>;

    /// Called while jobs are still running, right before they are terminated
    async fn pre_shutdown(&mut self, _scheduler: &JobScheduler) {}

    /// Called once every job has terminated
    async fn post_shutdown(&mut self, termination_reason: &ModuleTerminationReason) {
        if termination_reason.is_clean() {
            info!(reason = %termination_reason, "Module shut down");
        } else {
            error!(reason = %termination_reason, "Module shut down abnormally");
        }
    }
}

/// Drives a [`Module`] through its lifecycle hooks
pub struct ModuleRunner {
    startup_timeout: Duration,
    shutdown_timeout: Duration,
    job_grace_period: Duration,
    status_server_port: Option<u16>,
}

impl Default for ModuleRunner {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(60),
            job_grace_period: Duration::from_secs(5),
            status_server_port: None,
        }
    }
}

/// Mirrors the lifecycle phase into the optional status server
struct StatusReporter(Option<Arc<Mutex<State>>>);

impl StatusReporter {
    async fn report(&self, state: State) {
        if let Some(shared) = &self.0 {
            *shared.lock().await = state;
        }
    }
}

impl ModuleRunner {
    /// Runner with default timeouts that exposes its lifecycle state on the given port
    pub fn new_with_status_server(status_server_port: u16) -> Self {
        Self {
            status_server_port: Some(status_server_port),
            ..Default::default()
        }
    }

    /// Runs the module to completion and reports why it stopped
    #[instrument(skip(self, module), fields(module_name = type_name::<M>()))]
    pub async fn run<M: Module + Send + Sync>(&self, mut module: M) -> ModuleTerminationReason {
        let scheduler = JobScheduler::default();
        let status = self.status_reporter(&scheduler).await;

        let reason = match self.start(&mut module).await {
            Ok(()) => Self::operate(&mut module, &scheduler, &status).await,
            Err(reason) => reason,
        };

        status.report(State::Shutdown).await;
        module.pre_shutdown(&scheduler).await;

        debug!("Stopping remaining jobs");
        scheduler.terminate_jobs(self.job_grace_period).await;

        if timeout(self.shutdown_timeout, module.post_shutdown(&reason))
            .await
            .is_err()
        {
            error!("Shutdown hook exceeded its deadline");
        }

        reason
    }

    async fn status_reporter(&self, scheduler: &JobScheduler) -> StatusReporter {
        match self.status_server_port {
            Some(port) => {
                info!(port, "Serving lifecycle status");
                let (state, server) = StatusServer::new(scheduler, port);
                scheduler.spawn_job(server).await;
                StatusReporter(Some(state))
            }
            None => StatusReporter(None),
        }
    }

    async fn start<M: Module + Send + Sync>(
        &self,
        module: &mut M,
    ) -> Result<(), ModuleTerminationReason> {
        match timeout(self.startup_timeout, module.pre_startup()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => {
                error!(?error, "Startup hook failed");
                Err(ModuleTerminationReason::StartupFailed(error))
            }
            Err(_) => {
                error!("Startup hook exceeded its deadline");
                Err(ModuleTerminationReason::Timeout)
            }
        }
    }

    async fn operate<M: Module + Send + Sync>(
        module: &mut M,
        scheduler: &JobScheduler,
        status: &StatusReporter,
    ) -> ModuleTerminationReason {
        let heart = match module.run(scheduler).await {
            Ok(heart) => heart,
            Err(error) => {
                error!(?error, "Module failed while running");
                return ModuleTerminationReason::OperationalError(error);
            }
        };

        status.report(State::Running).await;

        match heart {
            Some(mut heart) => {
                let reason = heart.death().await;
                info!(%reason, "Module heart stopped");
                ModuleTerminationReason::HeartDied(reason)
            }
            None => ModuleTerminationReason::ExitedNormally,
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;

    struct OneShot {
        fail: bool,
    }

    #[async_trait]
    impl Module for OneShot {
        async fn run(&mut self, _scheduler: &JobScheduler) -> Result<Option<Heart>, BoxedError> {
            if self.fail {
                Err("broken".into())
            } else {
                Ok(None)
            }
        }
    }

    #[tokio::test]
    async fn report_clean_exits() {
        let reason = ModuleRunner::default().run(OneShot { fail: false }).await;
        assert!(reason.is_clean());
    }

    #[tokio::test]
    async fn report_operational_errors() {
        let reason = ModuleRunner::default().run(OneShot { fail: true }).await;
        assert!(matches!(reason, ModuleTerminationReason::OperationalError(_)));
    }
}

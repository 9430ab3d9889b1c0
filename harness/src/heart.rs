//! Lifecycle anchor that keeps a module alive until it is asked to stop

use std::fmt;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tracing::{debug, warn};

/// Why a [`Heart`] stopped beating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeathReason {
    /// Stopped from within the process through a [`HeartStone`]
    Killed(String),
    /// Received SIGINT
    Interrupted,
    /// Received SIGTERM
    Terminated,
}

impl fmt::Display for DeathReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Killed(reason) => write!(f, "killed: {}", reason),
            Self::Interrupted => f.write_str("interrupted (SIGINT)"),
            Self::Terminated => f.write_str("terminated (SIGTERM)"),
        }
    }
}

/// Handle a module returns to hand its lifetime over to the runner
pub struct Heart {
    kill_switch: Receiver<String>,
    // Kept while no stone has been handed out so the channel never reports closure.
    _own_stone: Option<HeartStone>,
}

impl Heart {
    /// Creates a heart together with a stone that can stop it
    pub fn new() -> (Self, HeartStone) {
        let (sender, kill_switch) = channel(1);
        let heart = Self {
            kill_switch,
            _own_stone: None,
        };

        (heart, HeartStone { sender })
    }

    /// Creates a heart that only dies from process signals
    pub fn without_heart_stone() -> Self {
        let (mut heart, stone) = Self::new();
        heart._own_stone = Some(stone);
        heart
    }

    /// Resolves once the process receives a termination signal or a stone is used
    pub async fn death(&mut self) -> DeathReason {
        debug!("Waiting for termination");

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(stream) => Some(stream),
            Err(error) => {
                warn!(?error, "SIGTERM is unavailable, only SIGINT stops the process");
                None
            }
        };

        let sigterm = async {
            match sigterm.as_mut() {
                Some(stream) => {
                    stream.recv().await;
                }
                None => futures::future::pending::<()>().await,
            }
        };

        tokio::select! {
            Some(reason) = self.kill_switch.recv() => DeathReason::Killed(reason),
            _ = tokio::signal::ctrl_c() => DeathReason::Interrupted,
            _ = sigterm => DeathReason::Terminated,
        }
    }
}

/// Remote control that stops the associated [`Heart`]
#[derive(Clone)]
pub struct HeartStone {
    sender: Sender<String>,
}

impl HeartStone {
    /// Stops the heart with the given reason, a heart that is already gone is ignored
    pub async fn kill(&self, reason: impl Into<String>) {
        if self.sender.send(reason.into()).await.is_err() {
            debug!("Heart already stopped");
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn keep_beating_without_signals() {
        let mut heart = Heart::without_heart_stone();
        let outcome = timeout(Duration::from_millis(100), heart.death()).await;
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn stop_when_a_stone_is_used() {
        let (mut heart, stone) = Heart::new();
        stone.kill("stream closed").await;

        assert_eq!(
            heart.death().await,
            DeathReason::Killed("stream closed".to_owned())
        );
    }

    #[tokio::test]
    async fn tolerate_kills_after_death() {
        let (heart, stone) = Heart::new();
        drop(heart);
        stone.kill("late").await;
    }
}

//! One-shot teardown driven by an explicit call, SIGINT/SIGTERM, or the end
//! of a session.
//!
//! Signal handlers never tear anything down themselves. They only fire the
//! shutdown-request token; the main control flow observes it and calls
//! [`ShutdownCoordinator::teardown`], which runs to completion.

use std::sync::{Arc, Mutex as StdMutex};

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::cleanup::TeardownReport;
use super::Orchestrator;
use crate::error::Result;

/// What asked for the shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownTrigger {
    Manual,
    Interrupt,
    Terminate,
    Exit,
}

impl std::fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ShutdownTrigger::Manual => "manual request",
            ShutdownTrigger::Interrupt => "SIGINT",
            ShutdownTrigger::Terminate => "SIGTERM",
            ShutdownTrigger::Exit => "session end",
        })
    }
}

pub struct ShutdownCoordinator {
    orchestrator: Arc<Orchestrator>,
    token: CancellationToken,
    trigger: StdMutex<Option<ShutdownTrigger>>,
    /// `true` once a teardown has completed.
    done: Mutex<bool>,
}

impl ShutdownCoordinator {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            token: CancellationToken::new(),
            trigger: StdMutex::new(None),
            done: Mutex::new(false),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Ask the main flow to shut down. The first trigger wins.
    pub fn request(&self, trigger: ShutdownTrigger) {
        let mut slot = self.trigger.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            info!(%trigger, "shutdown requested");
            *slot = Some(trigger);
        }
        self.token.cancel();
    }

    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until a shutdown has been requested; returns what requested it.
    pub async fn requested(&self) -> ShutdownTrigger {
        self.token.cancelled().await;
        let trigger = *self.trigger.lock().unwrap_or_else(|e| e.into_inner());
        trigger.unwrap_or(ShutdownTrigger::Manual)
    }

    /// Turn SIGINT and SIGTERM (Ctrl-C elsewhere) into shutdown requests.
    ///
    /// Installing the handlers replaces the default terminate-immediately
    /// behaviour, so a second signal during teardown cannot cut it short.
    pub fn install_signal_handlers(self: &Arc<Self>) -> std::io::Result<JoinHandle<()>> {
        let coordinator = Arc::clone(self);
        let mut signals = Signals::new()?;
        Ok(tokio::spawn(async move {
            while let Some(trigger) = signals.next().await {
                if coordinator.is_requested() {
                    warn!(%trigger, "shutdown already in progress, waiting for teardown");
                }
                coordinator.request(trigger);
            }
        }))
    }

    /// Tear down everything this registry owns, once.
    ///
    /// Concurrent callers wait for the running teardown; every call after
    /// the first completed one returns an empty report. A teardown that
    /// failed outright (registry could not be written) may be retried.
    pub async fn teardown(&self, trigger: ShutdownTrigger) -> Result<TeardownReport> {
        self.request(trigger);

        let mut done = self.done.lock().await;
        if *done {
            return Ok(TeardownReport::default());
        }

        info!(%trigger, "tearing down services");
        let report = self.orchestrator.force_cleanup_all().await?;
        *done = true;
        Ok(report)
    }
}

#[cfg(unix)]
struct Signals {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    async fn next(&mut self) -> Option<ShutdownTrigger> {
        tokio::select! {
            Some(()) = self.sigint.recv() => Some(ShutdownTrigger::Interrupt),
            Some(()) = self.sigterm.recv() => Some(ShutdownTrigger::Terminate),
            else => None,
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn new() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn next(&mut self) -> Option<ShutdownTrigger> {
        tokio::signal::ctrl_c()
            .await
            .ok()
            .map(|()| ShutdownTrigger::Interrupt)
    }
}

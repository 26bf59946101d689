pub mod cleanup;
pub mod doctor;
pub mod inspect;
pub mod lifecycle;
pub mod templates;
pub mod up;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::catalog::TemplateCatalog;
use crate::config::LoadedConfig;
use crate::docker::DockerRuntime;
use crate::error::{ErrorKind, ErrorPayload, RigError};
use crate::orchestrator::ports::TcpProbe;
use crate::orchestrator::registry::Registry;
use crate::orchestrator::{Orchestrator, OrchestratorSettings};

/// How results are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Human,
    Json,
}

impl Output {
    pub fn from_flag(json: bool) -> Self {
        if json {
            Output::Json
        } else {
            Output::Human
        }
    }

    pub fn is_json(self) -> bool {
        self == Output::Json
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Error shape for `--json` output. Errors that did not come from the
/// orchestrator are reported as configuration errors.
pub fn error_payload(err: &anyhow::Error) -> ErrorPayload {
    match err.downcast_ref::<RigError>() {
        Some(rig) => rig.payload(),
        None => ErrorPayload {
            kind: ErrorKind::Config,
            message: format!("{:#}", err),
        },
    }
}

/// Configuration and registry for one invocation. The container runtime is
/// only contacted once [`Session::connect`] is called, so read-only
/// commands keep working without a daemon.
pub struct Session {
    pub loaded: LoadedConfig,
    pub registry: Arc<Registry>,
    pub output: Output,
}

impl Session {
    pub fn open(config_file: Option<&Path>, output: Output) -> Result<Self> {
        let loaded = LoadedConfig::load(config_file)?;
        let registry = Registry::open(&loaded.state_dir())?;
        tracing::debug!(
            registry = %registry.path().display(),
            id = registry.id(),
            "registry opened"
        );
        Ok(Self {
            loaded,
            registry: Arc::new(registry),
            output,
        })
    }

    pub fn catalog(&self) -> TemplateCatalog {
        TemplateCatalog::builtin().with_overrides(&self.loaded.config)
    }

    pub fn settings(&self) -> OrchestratorSettings {
        OrchestratorSettings::from_config(&self.loaded)
    }

    /// Connect to Docker and build the orchestrator.
    pub async fn connect(&self) -> Result<Orchestrator> {
        let settings = &self.loaded.config.settings;
        let runtime = DockerRuntime::connect(settings.runtime_timeout, settings.launch_timeout)
            .await
            .map_err(|e| RigError::runtime("connect", "docker", e))?;

        Ok(Orchestrator::new(
            Arc::new(self.catalog()),
            Arc::clone(&self.registry),
            Arc::new(runtime),
            Arc::new(TcpProbe),
            self.settings(),
        ))
    }
}

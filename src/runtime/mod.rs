//! The container backend as seen by the orchestrator.
//!
//! Everything the lifecycle code needs from a container engine goes through
//! [`ContainerRuntime`]. The Docker implementation lives in [`crate::docker`];
//! `memory::MemoryRuntime` is an in-process double for tests.

#[cfg(any(test, feature = "testing"))]
pub mod memory;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::catalog::BuildSource;

/// Failure reported by a container backend.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("no such container: {0}")]
    NotFound(String),

    #[error("{operation} timed out after {}s", .timeout.as_secs())]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("container runtime unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Api(String),
}

impl RuntimeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::NotFound(_))
    }
}

/// Everything needed to create and start one service container.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub container_name: String,
    pub source: BuildSource,
    pub host_port: u16,
    pub project_dir: PathBuf,
    pub labels: BTreeMap<String, String>,
}

/// Live state of a container as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerState {
    pub id: String,
    pub running: bool,
    pub status: String,
}

/// A container carrying this system's ownership labels.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ManagedContainer {
    pub id: String,
    pub name: String,
    pub running: bool,
}

/// Operations the orchestrator consumes from a container engine.
///
/// `target` arguments accept either a container id or a container name.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), RuntimeError>;

    /// Create and start a container; returns the runtime's container id.
    async fn create_and_start(&self, spec: &LaunchSpec) -> Result<String, RuntimeError>;

    /// Stop a container, waiting up to `timeout` before it is killed.
    async fn stop(&self, target: &str, timeout: Duration) -> Result<(), RuntimeError>;

    /// Start an existing container; returns its (possibly refreshed) id.
    async fn start(&self, target: &str) -> Result<String, RuntimeError>;

    async fn remove(&self, target: &str, force: bool) -> Result<(), RuntimeError>;

    /// Host ports published by every running container on the host.
    async fn list_active_port_bindings(&self) -> Result<BTreeSet<u16>, RuntimeError>;

    /// `Ok(None)` when the container does not exist.
    async fn inspect(&self, target: &str) -> Result<Option<ContainerState>, RuntimeError>;

    /// The last `tail` lines of a container's stdout and stderr.
    async fn logs(&self, target: &str, tail: usize) -> Result<String, RuntimeError>;

    /// Containers labelled as belonging to the registry `registry_id`.
    async fn list_managed(&self, registry_id: &str)
        -> Result<Vec<ManagedContainer>, RuntimeError>;
}

pub const LABEL_MANAGED_BY: &str = "svcrig.managed-by";
pub const LABEL_REGISTRY: &str = "svcrig.registry";
pub const LABEL_SERVICE: &str = "svcrig.service";
pub const LABEL_TEMPLATE: &str = "svcrig.template";

/// Build the standard set of ownership labels for a service container.
pub fn resource_labels(
    registry_id: &str,
    service_id: &str,
    template: &str,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_MANAGED_BY.to_string(), "svcrig".to_string()),
        (LABEL_REGISTRY.to_string(), registry_id.to_string()),
        (LABEL_SERVICE.to_string(), service_id.to_string()),
        (LABEL_TEMPLATE.to_string(), template.to_string()),
    ])
}

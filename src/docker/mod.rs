//! [`ContainerRuntime`] backed by the local Docker daemon.

pub mod container;
pub mod image;

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use bollard::Docker;

use crate::runtime::{ContainerRuntime, ContainerState, LaunchSpec, ManagedContainer, RuntimeError};

/// Time allowed on top of the stop grace period for the daemon to answer.
const STOP_SLACK: Duration = Duration::from_secs(5);

pub struct DockerRuntime {
    docker: Docker,
    call_timeout: Duration,
    launch_timeout: Duration,
}

impl DockerRuntime {
    /// Connect to the local daemon and wait (briefly) for it to answer.
    pub async fn connect(
        call_timeout: Duration,
        launch_timeout: Duration,
    ) -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::Unavailable(format!("connecting to Docker daemon: {e}")))?;
        let runtime = Self {
            docker,
            call_timeout,
            launch_timeout,
        };
        runtime.ping().await?;
        Ok(runtime)
    }

    pub fn docker(&self) -> &Docker {
        &self.docker
    }

    async fn bounded<T, F>(
        &self,
        operation: &'static str,
        timeout: Duration,
        fut: F,
    ) -> Result<T, RuntimeError>
    where
        F: Future<Output = Result<T, RuntimeError>>,
    {
        tokio::time::timeout(timeout, fut)
            .await
            .unwrap_or(Err(RuntimeError::Timeout { operation, timeout }))
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<(), RuntimeError> {
        let attempt = || async {
            self.docker
                .ping()
                .await
                .map(|_| ())
                .map_err(|e| RuntimeError::Unavailable(format!("Cannot connect to Docker daemon. Is Docker running? ({e})")))
        };
        self.bounded(
            "ping",
            self.call_timeout,
            attempt
                .retry(
                    ExponentialBuilder::default()
                        .with_min_delay(Duration::from_millis(100))
                        .with_max_delay(Duration::from_secs(1))
                        .with_max_times(3),
                )
                .notify(|err: &RuntimeError, dur: Duration| {
                    tracing::debug!("docker ping failed: {}, retrying in {:?}", err, dur);
                }),
        )
        .await
    }

    async fn create_and_start(&self, spec: &LaunchSpec) -> Result<String, RuntimeError> {
        self.bounded("launch", self.launch_timeout, async {
            image::ensure_image(&self.docker, &spec.source.image).await?;
            let id = container::create_container(&self.docker, spec).await?;
            container::start_container(&self.docker, &id).await?;
            Ok(id)
        })
        .await
    }

    async fn stop(&self, target: &str, timeout: Duration) -> Result<(), RuntimeError> {
        let secs = i32::try_from(timeout.as_secs()).unwrap_or(i32::MAX);
        self.bounded(
            "stop",
            timeout + STOP_SLACK,
            container::stop_container(&self.docker, target, secs),
        )
        .await
    }

    async fn start(&self, target: &str) -> Result<String, RuntimeError> {
        self.bounded("start", self.call_timeout, async {
            container::start_container(&self.docker, target).await?;
            let state = container::inspect_container(&self.docker, target)
                .await?
                .ok_or_else(|| RuntimeError::NotFound(target.to_string()))?;
            Ok(state.id)
        })
        .await
    }

    async fn remove(&self, target: &str, force: bool) -> Result<(), RuntimeError> {
        self.bounded(
            "remove",
            self.call_timeout,
            container::remove_container(&self.docker, target, force),
        )
        .await
    }

    async fn list_active_port_bindings(&self) -> Result<BTreeSet<u16>, RuntimeError> {
        self.bounded(
            "list containers",
            self.call_timeout,
            container::published_ports(&self.docker),
        )
        .await
    }

    async fn inspect(&self, target: &str) -> Result<Option<ContainerState>, RuntimeError> {
        self.bounded(
            "inspect",
            self.call_timeout,
            container::inspect_container(&self.docker, target),
        )
        .await
    }

    async fn logs(&self, target: &str, tail: usize) -> Result<String, RuntimeError> {
        self.bounded(
            "logs",
            self.call_timeout,
            container::container_logs(&self.docker, target, tail),
        )
        .await
    }

    async fn list_managed(
        &self,
        registry_id: &str,
    ) -> Result<Vec<ManagedContainer>, RuntimeError> {
        self.bounded(
            "list containers",
            self.call_timeout,
            container::list_registry_containers(&self.docker, registry_id),
        )
        .await
    }
}

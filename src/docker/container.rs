use bollard::container::LogOutput;
use bollard::errors::Error as BollardError;
use bollard::models::{ContainerCreateBody, HostConfig, PortBinding};
use bollard::query_parameters::{
    CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::Docker;
use futures_util::StreamExt;
use std::collections::{BTreeSet, HashMap};

use crate::catalog::WORKSPACE_MOUNT;
use crate::runtime::{ContainerState, LaunchSpec, ManagedContainer, RuntimeError, LABEL_REGISTRY};

/// Map a bollard error onto the runtime error taxonomy.
pub fn classify(err: BollardError, target: &str) -> RuntimeError {
    match err {
        BollardError::DockerResponseServerError {
            status_code: 404, ..
        } => RuntimeError::NotFound(target.to_string()),
        BollardError::DockerResponseServerError {
            status_code,
            message,
        } => RuntimeError::Api(format!("docker returned {status_code}: {message}")),
        other => RuntimeError::Unavailable(other.to_string()),
    }
}

/// Create a container for `spec`: host port bound to the template's
/// container port, project directory mounted at `/workspace`.
pub async fn create_container(docker: &Docker, spec: &LaunchSpec) -> Result<String, RuntimeError> {
    let source = &spec.source;
    let env: Vec<String> = source
        .env
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();

    let container_port_key = format!("{}/tcp", source.container_port);
    let port_bindings = HashMap::from([(
        container_port_key.clone(),
        Some(vec![PortBinding {
            host_ip: Some("0.0.0.0".to_string()),
            host_port: Some(spec.host_port.to_string()),
        }]),
    )]);

    let host_dir = spec
        .project_dir
        .canonicalize()
        .unwrap_or_else(|_| spec.project_dir.clone());
    let host_config = HostConfig {
        port_bindings: Some(port_bindings),
        binds: Some(vec![format!("{}:{}", host_dir.display(), WORKSPACE_MOUNT)]),
        ..Default::default()
    };

    let config = ContainerCreateBody {
        image: Some(source.image.clone()),
        env: Some(env),
        exposed_ports: Some(vec![container_port_key]),
        host_config: Some(host_config),
        labels: Some(spec.labels.clone().into_iter().collect()),
        cmd: source.command.clone(),
        working_dir: Some(WORKSPACE_MOUNT.to_string()),
        ..Default::default()
    };

    let options = CreateContainerOptions {
        name: Some(spec.container_name.clone()),
        ..Default::default()
    };

    let response = docker
        .create_container(Some(options), config)
        .await
        .map_err(|e| classify(e, &spec.container_name))?;

    tracing::debug!(
        container = %spec.container_name,
        id = %response.id,
        "container created"
    );

    Ok(response.id)
}

/// Start a container by name or ID. Starting a running container is a no-op.
pub async fn start_container(docker: &Docker, target: &str) -> Result<(), RuntimeError> {
    match docker
        .start_container(target, None::<StartContainerOptions>)
        .await
    {
        Ok(()) => Ok(()),
        Err(BollardError::DockerResponseServerError {
            status_code: 304, ..
        }) => Ok(()),
        Err(e) => Err(classify(e, target)),
    }
}

/// Stop a container by name or ID, killing it after `timeout_secs`.
/// An already stopped container counts as stopped.
pub async fn stop_container(
    docker: &Docker,
    target: &str,
    timeout_secs: i32,
) -> Result<(), RuntimeError> {
    let options = StopContainerOptions {
        t: Some(timeout_secs),
        signal: None,
    };
    match docker.stop_container(target, Some(options)).await {
        Ok(()) => Ok(()),
        Err(BollardError::DockerResponseServerError {
            status_code: 304, ..
        }) => Ok(()),
        Err(e) => Err(classify(e, target)),
    }
}

/// Remove a container by name or ID.
pub async fn remove_container(docker: &Docker, target: &str, force: bool) -> Result<(), RuntimeError> {
    let options = RemoveContainerOptions {
        force,
        ..Default::default()
    };
    docker
        .remove_container(target, Some(options))
        .await
        .map_err(|e| classify(e, target))
}

/// `Ok(None)` when no such container exists.
pub async fn inspect_container(
    docker: &Docker,
    target: &str,
) -> Result<Option<ContainerState>, RuntimeError> {
    match docker
        .inspect_container(target, None::<InspectContainerOptions>)
        .await
    {
        Ok(info) => {
            let state = info.state.unwrap_or_default();
            Ok(Some(ContainerState {
                id: info.id.unwrap_or_else(|| target.to_string()),
                running: state.running.unwrap_or(false),
                status: state
                    .status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            }))
        }
        Err(e) => match classify(e, target) {
            RuntimeError::NotFound(_) => Ok(None),
            other => Err(other),
        },
    }
}

/// The last `tail` lines a container wrote, stdout and stderr interleaved.
pub async fn container_logs(
    docker: &Docker,
    target: &str,
    tail: usize,
) -> Result<String, RuntimeError> {
    let options = LogsOptions {
        follow: false,
        stdout: true,
        stderr: true,
        tail: tail.to_string(),
        ..Default::default()
    };

    let mut stream = docker.logs(target, Some(options));
    let mut text = String::new();
    while let Some(item) = stream.next().await {
        match item.map_err(|e| classify(e, target))? {
            LogOutput::StdOut { message }
            | LogOutput::StdErr { message }
            | LogOutput::Console { message } => {
                text.push_str(&String::from_utf8_lossy(&message));
            }
            LogOutput::StdIn { .. } => {}
        }
    }
    Ok(text)
}

/// Host ports published by running containers, whoever started them.
pub async fn published_ports(docker: &Docker) -> Result<BTreeSet<u16>, RuntimeError> {
    let options = ListContainersOptions {
        all: false,
        ..Default::default()
    };
    let containers = docker
        .list_containers(Some(options))
        .await
        .map_err(|e| classify(e, "containers"))?;

    Ok(containers
        .iter()
        .flat_map(|c| c.ports.iter().flatten())
        .filter_map(|p| p.public_port)
        .collect())
}

/// All containers, running or not, labelled as belonging to `registry_id`.
pub async fn list_registry_containers(
    docker: &Docker,
    registry_id: &str,
) -> Result<Vec<ManagedContainer>, RuntimeError> {
    let filters = HashMap::from([(
        "label".to_string(),
        vec![format!("{}={}", LABEL_REGISTRY, registry_id)],
    )]);
    let options = ListContainersOptions {
        all: true,
        filters: Some(filters),
        ..Default::default()
    };
    let containers = docker
        .list_containers(Some(options))
        .await
        .map_err(|e| classify(e, "containers"))?;

    Ok(containers
        .into_iter()
        .filter_map(|c| {
            let id = c.id?;
            let name = c
                .names
                .and_then(|names| names.into_iter().next())
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_else(|| id.clone());
            let running = c.state.map(|s| s.to_string() == "running").unwrap_or(false);
            Some(ManagedContainer { id, name, running })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_classified() {
        let err = BollardError::DockerResponseServerError {
            status_code: 404,
            message: "No such container: x".into(),
        };
        assert!(classify(err, "x").is_not_found());
    }

    #[test]
    fn other_status_codes_are_api_errors() {
        let err = BollardError::DockerResponseServerError {
            status_code: 409,
            message: "Conflict".into(),
        };
        match classify(err, "x") {
            RuntimeError::Api(msg) => assert!(msg.contains("409"), "got: {msg}"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}

//! In-process [`ContainerRuntime`] that keeps containers in a map.
//!
//! Used by the test suites to drive the orchestrator without a Docker
//! daemon. Failures can be scripted per operation and per container.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::{
    ContainerRuntime, ContainerState, LaunchSpec, ManagedContainer, RuntimeError, LABEL_REGISTRY,
};

/// Runtime operation a scripted failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Create,
    Stop,
    Start,
    Remove,
    Inspect,
    Logs,
}

#[derive(Debug, Clone)]
struct Container {
    id: String,
    name: String,
    running: bool,
    host_port: Option<u16>,
    labels: BTreeMap<String, String>,
    output: Vec<String>,
}

#[derive(Debug)]
struct Failure {
    op: Op,
    target: Option<String>,
    error: RuntimeError,
}

#[derive(Debug, Default)]
struct State {
    containers: Vec<Container>,
    next_id: u64,
    external_ports: BTreeSet<u16>,
    failures: Vec<Failure>,
    port_listing_fails: bool,
    unavailable: bool,
    new_id_on_start: bool,
    calls: Vec<String>,
    launched: Vec<LaunchSpec>,
}

impl State {
    fn find(&self, target: &str) -> Option<usize> {
        self.containers
            .iter()
            .position(|c| c.id == target || c.name == target)
    }

    fn fresh_id(&mut self) -> String {
        self.next_id += 1;
        format!("mem{:012x}", self.next_id)
    }

    /// Take the first scripted failure for `op` matching `target`.
    fn scripted(&mut self, op: Op, target: &str) -> Result<(), RuntimeError> {
        let names: Vec<String> = match self.find(target) {
            Some(i) => vec![self.containers[i].id.clone(), self.containers[i].name.clone()],
            None => vec![target.to_string()],
        };
        let hit = self.failures.iter().position(|f| {
            f.op == op && f.target.as_ref().map_or(true, |t| names.contains(t))
        });
        match hit {
            Some(i) => Err(self.failures.remove(i).error),
            None => Ok(()),
        }
    }

    fn record(&mut self, call: String) {
        self.calls.push(call);
    }
}

#[derive(Debug, Default)]
pub struct MemoryRuntime {
    state: Mutex<State>,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the next `op` (on any container) fail with an API error.
    pub fn fail_next(&self, op: Op) {
        self.state().failures.push(Failure {
            op,
            target: None,
            error: RuntimeError::Api(format!("injected {op:?} failure")),
        });
    }

    /// Make the next `op` on `target` (id or name) fail with `error`.
    pub fn fail_next_on(&self, op: Op, target: &str, error: RuntimeError) {
        self.state().failures.push(Failure {
            op,
            target: Some(target.to_string()),
            error,
        });
    }

    pub fn fail_port_listing(&self, fail: bool) {
        self.state().port_listing_fails = fail;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Hand out a new container id on every start, as a recreated container would.
    pub fn new_id_on_start(&self, enabled: bool) {
        self.state().new_id_on_start = enabled;
    }

    /// A port published by something this runtime did not create.
    pub fn bind_external_port(&self, port: u16) {
        self.state().external_ports.insert(port);
    }

    /// Create a container directly, bypassing the orchestrator.
    pub fn add_container(
        &self,
        name: &str,
        labels: BTreeMap<String, String>,
        running: bool,
    ) -> String {
        let mut state = self.state();
        let id = state.fresh_id();
        state.containers.push(Container {
            id: id.clone(),
            name: name.to_string(),
            running,
            host_port: None,
            labels,
            output: Vec::new(),
        });
        id
    }

    /// Append a line to a container's output.
    pub fn emit(&self, target: &str, line: &str) -> bool {
        let mut state = self.state();
        match state.find(target) {
            Some(i) => {
                state.containers[i].output.push(line.to_string());
                true
            }
            None => false,
        }
    }

    /// Delete a container behind the orchestrator's back.
    pub fn vanish(&self, target: &str) -> bool {
        let mut state = self.state();
        match state.find(target) {
            Some(i) => {
                state.containers.remove(i);
                true
            }
            None => false,
        }
    }

    /// Mark a container as exited, as if its process died.
    pub fn exit(&self, target: &str) -> bool {
        let mut state = self.state();
        match state.find(target) {
            Some(i) => {
                state.containers[i].running = false;
                true
            }
            None => false,
        }
    }

    pub fn state_of(&self, target: &str) -> Option<ContainerState> {
        let state = self.state();
        state.find(target).map(|i| {
            let c = &state.containers[i];
            ContainerState {
                id: c.id.clone(),
                running: c.running,
                status: if c.running { "running" } else { "exited" }.to_string(),
            }
        })
    }

    pub fn container_count(&self) -> usize {
        self.state().containers.len()
    }

    /// Every call made so far, as `"<op> <target>"`.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Specs of every successful `create_and_start`, oldest first.
    pub fn launched(&self) -> Vec<LaunchSpec> {
        self.state().launched.clone()
    }
}

#[async_trait]
impl ContainerRuntime for MemoryRuntime {
    async fn ping(&self) -> Result<(), RuntimeError> {
        if self.state().unavailable {
            return Err(RuntimeError::Unavailable("memory runtime switched off".into()));
        }
        Ok(())
    }

    async fn create_and_start(&self, spec: &LaunchSpec) -> Result<String, RuntimeError> {
        let mut state = self.state();
        state.record(format!("create {}", spec.container_name));
        state.scripted(Op::Create, &spec.container_name)?;
        if state.find(&spec.container_name).is_some() {
            return Err(RuntimeError::Api(format!(
                "Conflict. The container name \"/{}\" is already in use",
                spec.container_name
            )));
        }
        let id = state.fresh_id();
        state.containers.push(Container {
            id: id.clone(),
            name: spec.container_name.clone(),
            running: true,
            host_port: Some(spec.host_port),
            labels: spec.labels.clone(),
            output: Vec::new(),
        });
        state.launched.push(spec.clone());
        Ok(id)
    }

    async fn stop(&self, target: &str, _timeout: Duration) -> Result<(), RuntimeError> {
        let mut state = self.state();
        state.record(format!("stop {target}"));
        state.scripted(Op::Stop, target)?;
        let i = state
            .find(target)
            .ok_or_else(|| RuntimeError::NotFound(target.to_string()))?;
        state.containers[i].running = false;
        Ok(())
    }

    async fn start(&self, target: &str) -> Result<String, RuntimeError> {
        let mut state = self.state();
        state.record(format!("start {target}"));
        state.scripted(Op::Start, target)?;
        let i = state
            .find(target)
            .ok_or_else(|| RuntimeError::NotFound(target.to_string()))?;
        if state.new_id_on_start {
            let id = state.fresh_id();
            state.containers[i].id = id;
        }
        state.containers[i].running = true;
        Ok(state.containers[i].id.clone())
    }

    async fn remove(&self, target: &str, force: bool) -> Result<(), RuntimeError> {
        let mut state = self.state();
        state.record(format!("remove {target}"));
        state.scripted(Op::Remove, target)?;
        let i = state
            .find(target)
            .ok_or_else(|| RuntimeError::NotFound(target.to_string()))?;
        if state.containers[i].running && !force {
            return Err(RuntimeError::Api(format!(
                "cannot remove running container {target}: stop the container before removing or force remove"
            )));
        }
        state.containers.remove(i);
        Ok(())
    }

    async fn list_active_port_bindings(&self) -> Result<BTreeSet<u16>, RuntimeError> {
        let state = self.state();
        if state.port_listing_fails {
            return Err(RuntimeError::Unavailable("port listing disabled".into()));
        }
        let mut ports = state.external_ports.clone();
        ports.extend(
            state
                .containers
                .iter()
                .filter(|c| c.running)
                .filter_map(|c| c.host_port),
        );
        Ok(ports)
    }

    async fn inspect(&self, target: &str) -> Result<Option<ContainerState>, RuntimeError> {
        self.state().scripted(Op::Inspect, target)?;
        Ok(self.state_of(target))
    }

    async fn logs(&self, target: &str, tail: usize) -> Result<String, RuntimeError> {
        let mut state = self.state();
        state.record(format!("logs {target}"));
        state.scripted(Op::Logs, target)?;
        let i = state
            .find(target)
            .ok_or_else(|| RuntimeError::NotFound(target.to_string()))?;
        let output = &state.containers[i].output;
        let skip = output.len().saturating_sub(tail);
        Ok(output[skip..]
            .iter()
            .map(|line| format!("{line}\n"))
            .collect())
    }

    async fn list_managed(
        &self,
        registry_id: &str,
    ) -> Result<Vec<ManagedContainer>, RuntimeError> {
        let state = self.state();
        Ok(state
            .containers
            .iter()
            .filter(|c| c.labels.get(LABEL_REGISTRY).map(String::as_str) == Some(registry_id))
            .map(|c| ManagedContainer {
                id: c.id.clone(),
                name: c.name.clone(),
                running: c.running,
            })
            .collect())
    }
}

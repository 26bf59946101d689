pub mod cleanup;
pub mod instance;
pub mod ports;
pub mod registry;
pub mod shutdown;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::TemplateCatalog;
use crate::config::LoadedConfig;
use crate::error::{Result, RigError};
use crate::identity;
use crate::runtime::{resource_labels, ContainerRuntime, ContainerState, LaunchSpec, RuntimeError};

use instance::{auto_discriminator, next_instance_id, project_dir, sanitize_label, service_id};
use ports::{PortAllocator, PortProbe};
use registry::{Registry, ServiceMap, ServiceRecord, ServiceStatus};

/// Host value that asks for the outward-facing address to be detected.
pub const AUTO_HOST: &str = "auto";

/// Resolved settings the lifecycle operations need.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Root of the per-instance project directories.
    pub workspace: PathBuf,
    /// Host part of every reachable URL.
    pub host: String,
    /// Grace period given to a container before it is killed.
    pub stop_timeout: Duration,
}

impl OrchestratorSettings {
    pub fn new(workspace: PathBuf) -> Self {
        Self {
            workspace,
            host: "localhost".to_string(),
            stop_timeout: Duration::from_secs(10),
        }
    }

    pub fn from_config(loaded: &LoadedConfig) -> Self {
        let settings = &loaded.config.settings;
        Self {
            workspace: loaded.workspace(),
            host: resolve_host(&settings.host),
            stop_timeout: settings.stop_timeout,
        }
    }
}

fn resolve_host(host: &str) -> String {
    if host != AUTO_HOST {
        return host.to_string();
    }
    match crate::platform::outbound_ip() {
        Some(ip) => ip.to_string(),
        None => {
            warn!("could not detect outbound address, using localhost");
            "localhost".to_string()
        }
    }
}

/// Result of a successful launch.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchOutcome {
    pub record: ServiceRecord,
    pub url: String,
}

/// What the runtime says about a registered service right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum LiveStatus {
    Running,
    Exited,
    NotFound,
    Error(String),
}

impl std::fmt::Display for LiveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiveStatus::Running => f.write_str("running"),
            LiveStatus::Exited => f.write_str("exited"),
            LiveStatus::NotFound => f.write_str("not found"),
            LiveStatus::Error(e) => write!(f, "error: {e}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub record: ServiceRecord,
    pub url: String,
    pub live: LiveStatus,
}

/// Recent container output of one service.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceLogs {
    pub service_id: String,
    pub tail: usize,
    pub logs: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceStats {
    pub total: usize,
    pub running: usize,
    pub stopped: usize,
    pub templates: BTreeMap<String, usize>,
    pub used_ports: Vec<u16>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub stats: ServiceStats,
    pub services: BTreeMap<String, ServiceInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum RecoveryOutcome {
    /// Already running.
    Confirmed,
    /// Was stopped and has been started again.
    Restarted,
    /// Container is gone; the record was dropped.
    Dropped,
    Failed(String),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RecoveryReport {
    pub recovered: usize,
    pub dropped: usize,
    pub failed: usize,
    pub services: BTreeMap<String, RecoveryOutcome>,
}

/// Lifecycle controller for template instances.
///
/// Every mutating operation holds the registry lock from its load to its
/// save, so a port chosen by [`PortAllocator`] is persisted before any other
/// launch can look at the registry.
pub struct Orchestrator {
    catalog: Arc<TemplateCatalog>,
    registry: Arc<Registry>,
    runtime: Arc<dyn ContainerRuntime>,
    probe: Arc<dyn PortProbe>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<TemplateCatalog>,
        registry: Arc<Registry>,
        runtime: Arc<dyn ContainerRuntime>,
        probe: Arc<dyn PortProbe>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            catalog,
            registry,
            runtime,
            probe,
            settings,
        }
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn runtime(&self) -> &dyn ContainerRuntime {
        self.runtime.as_ref()
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn url_for(&self, record: &ServiceRecord) -> String {
        format!("http://{}:{}", self.settings.host, record.port)
    }

    /// Start a new instance of `template_name`.
    ///
    /// Without a label the instance gets the next `instance_<n>`
    /// discriminator. A label is refused while a record or a project
    /// directory with that name exists. If the runtime fails, the project directory and any
    /// half-created container stay behind but nothing is recorded.
    pub async fn launch(&self, template_name: &str, label: Option<&str>) -> Result<LaunchOutcome> {
        let template = self.catalog.lookup(template_name)?;
        let label = label.map(sanitize_label).transpose()?;

        let guard = self.registry.lock().await?;
        let mut services = guard.load()?;

        let instance_id = next_instance_id(&services, &self.settings.workspace, &template.name)?;
        let discriminator = label
            .clone()
            .unwrap_or_else(|| auto_discriminator(instance_id));
        let service_id = service_id(&template.name, &discriminator);
        if services.contains_key(&service_id) {
            return Err(RigError::InstanceLabelTaken {
                template: template.name.clone(),
                label: discriminator,
            });
        }

        let dir = project_dir(&self.settings.workspace, &template.name, &discriminator);
        // A label whose directory survives from an earlier instance stays taken.
        if label.is_some() && dir.exists() {
            return Err(RigError::InstanceLabelTaken {
                template: template.name.clone(),
                label: discriminator,
            });
        }
        std::fs::create_dir_all(&dir).map_err(|source| RigError::Workspace {
            path: dir.clone(),
            source,
        })?;

        let registry_ports: BTreeSet<u16> = services.values().map(|r| r.port).collect();
        let port = PortAllocator::new(self.probe.as_ref())
            .allocate(template.preferred_port, &registry_ports, self.runtime.as_ref())
            .await?;

        let container_name = identity::container_name(self.registry.id(), &service_id);
        let spec = LaunchSpec {
            container_name: container_name.clone(),
            source: template.source.clone(),
            host_port: port,
            project_dir: dir.clone(),
            labels: resource_labels(self.registry.id(), &service_id, &template.name),
        };

        info!(service = %service_id, port, image = %template.source.image, "launching");
        let container_id = self
            .runtime
            .create_and_start(&spec)
            .await
            .map_err(|e| {
                RigError::runtime(
                    format!("launch of template '{}' on port {}", template.name, port),
                    &container_name,
                    e,
                )
            })?;

        let record = ServiceRecord {
            service_id: service_id.clone(),
            template: template.name.clone(),
            container_name,
            container_id: Some(container_id),
            port,
            instance_id,
            project_dir: dir,
            created_at: Utc::now(),
            status: ServiceStatus::Running,
        };
        services.insert(service_id.clone(), record.clone());
        guard.save(&services)?;

        let url = self.url_for(&record);
        info!(service = %service_id, %url, "service running");
        Ok(LaunchOutcome { record, url })
    }

    /// Stop a service's container, keeping it for a later restart.
    pub async fn stop(&self, id: &str) -> Result<ServiceRecord> {
        let guard = self.registry.lock().await?;
        let mut services = guard.load()?;
        let record = lookup_mut(&mut services, id)?;

        self.runtime
            .stop(runtime_target(record), self.settings.stop_timeout)
            .await
            .map_err(|e| RigError::runtime("stop", id, e))?;
        record.status = ServiceStatus::Stopped;
        let record = record.clone();

        guard.save(&services)?;
        info!(service = %id, "service stopped");
        Ok(record)
    }

    /// Start a service's existing container again. A running service is
    /// stopped first, so restart is always allowed.
    pub async fn restart(&self, id: &str) -> Result<ServiceRecord> {
        let guard = self.registry.lock().await?;
        let mut services = guard.load()?;
        let record = lookup_mut(&mut services, id)?;

        if record.status == ServiceStatus::Running {
            self.runtime
                .stop(runtime_target(record), self.settings.stop_timeout)
                .await
                .map_err(|e| RigError::runtime("restart", id, e))?;
        }
        let container_id = self
            .runtime
            .start(runtime_target(record))
            .await
            .map_err(|e| RigError::runtime("restart", id, e))?;
        record.container_id = Some(container_id);
        record.status = ServiceStatus::Running;
        let record = record.clone();

        guard.save(&services)?;
        info!(service = %id, port = record.port, "service restarted");
        Ok(record)
    }

    /// Stop and remove a service's container and drop its record.
    ///
    /// The record is dropped even when the runtime could not remove the
    /// container; that case is reported as [`RigError::PartialCleanupFailure`].
    pub async fn remove(&self, id: &str, force: bool) -> Result<ServiceRecord> {
        let guard = self.registry.lock().await?;
        let mut services = guard.load()?;
        let record = match services.remove(id) {
            Some(record) => record,
            None => return Err(service_not_found(id, &services)),
        };

        let failures = self.dispose(&record, force).await;

        guard.save(&services)?;
        if failures.is_empty() {
            info!(service = %id, "service removed");
            Ok(record)
        } else {
            Err(RigError::PartialCleanupFailure {
                operation: format!("remove {id}"),
                failures,
            })
        }
    }

    /// Stop then remove a record's container. Returns the failures; a
    /// container that no longer exists counts as removed.
    async fn dispose(&self, record: &ServiceRecord, force: bool) -> Vec<String> {
        let target = runtime_target(record);
        let mut force = force;

        match self.runtime.stop(target, self.settings.stop_timeout).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Vec::new(),
            Err(e) => {
                warn!(service = %record.service_id, error = %e, "stop failed, forcing removal");
                force = true;
            }
        }

        match self.runtime.remove(target, force).await {
            Ok(()) => Vec::new(),
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => {
                warn!(service = %record.service_id, error = %e, "container removal failed");
                vec![format!("{}: remove {}: {}", record.service_id, target, e)]
            }
        }
    }

    /// Registered services, optionally restricted to one template.
    /// Reads the cached view; use [`Orchestrator::all_status`] for a fresh one.
    pub fn list(&self, template: Option<&str>) -> Result<Vec<ServiceRecord>> {
        Ok(self
            .registry
            .snapshot()?
            .into_values()
            .filter(|r| template.map_or(true, |t| r.template == t))
            .collect())
    }

    pub async fn info(&self, id: &str) -> Result<ServiceInfo> {
        let services = self.load_fresh().await?;
        let record = services
            .get(id)
            .ok_or_else(|| service_not_found(id, &services))?;
        Ok(self.describe(record).await)
    }

    /// The last `tail` lines of a service's container output.
    pub async fn logs(&self, id: &str, tail: usize) -> Result<ServiceLogs> {
        let services = self.load_fresh().await?;
        let record = services
            .get(id)
            .ok_or_else(|| service_not_found(id, &services))?;
        let logs = self
            .runtime
            .logs(runtime_target(record), tail)
            .await
            .map_err(|e| RigError::runtime("logs", id, e))?;
        Ok(ServiceLogs {
            service_id: id.to_string(),
            tail,
            logs,
        })
    }

    pub async fn stats(&self) -> Result<ServiceStats> {
        Ok(compute_stats(&self.load_fresh().await?))
    }

    pub async fn all_status(&self) -> Result<StatusReport> {
        let services = self.load_fresh().await?;
        let mut infos = BTreeMap::new();
        for (id, record) in &services {
            infos.insert(id.clone(), self.describe(record).await);
        }
        Ok(StatusReport {
            stats: compute_stats(&services),
            services: infos,
        })
    }

    /// Bring the registry back in line with the runtime after a restart of
    /// the host or the managing process.
    ///
    /// Records whose container is gone are dropped, stopped containers are
    /// started, running ones are confirmed. A stale container id is
    /// refreshed by looking the container up by name.
    pub async fn recover(&self) -> Result<RecoveryReport> {
        let guard = self.registry.lock().await?;
        let mut services = guard.load()?;
        let mut report = RecoveryReport::default();

        let ids: Vec<String> = services.keys().cloned().collect();
        for id in ids {
            let Some(record) = services.get_mut(&id) else {
                continue;
            };
            let outcome = self.recover_one(record).await;
            match &outcome {
                RecoveryOutcome::Confirmed | RecoveryOutcome::Restarted => report.recovered += 1,
                RecoveryOutcome::Dropped => {
                    services.remove(&id);
                    report.dropped += 1;
                }
                RecoveryOutcome::Failed(reason) => {
                    warn!(service = %id, %reason, "recovery failed");
                    report.failed += 1;
                }
            }
            report.services.insert(id, outcome);
        }

        guard.save(&services)?;
        info!(
            recovered = report.recovered,
            dropped = report.dropped,
            failed = report.failed,
            "recovery finished"
        );
        Ok(report)
    }

    async fn recover_one(&self, record: &mut ServiceRecord) -> RecoveryOutcome {
        let found = match self.locate(record).await {
            Ok(found) => found,
            Err(e) => return RecoveryOutcome::Failed(e.to_string()),
        };

        let Some(state) = found else {
            return RecoveryOutcome::Dropped;
        };
        record.container_id = Some(state.id.clone());

        if state.running {
            record.status = ServiceStatus::Running;
            return RecoveryOutcome::Confirmed;
        }
        match self.runtime.start(&state.id).await {
            Ok(id) => {
                record.container_id = Some(id);
                record.status = ServiceStatus::Running;
                RecoveryOutcome::Restarted
            }
            Err(e) => {
                record.status = ServiceStatus::Stopped;
                RecoveryOutcome::Failed(e.to_string())
            }
        }
    }

    /// Find a record's container, falling back to its name when the stored
    /// id no longer resolves.
    async fn locate(
        &self,
        record: &ServiceRecord,
    ) -> std::result::Result<Option<ContainerState>, RuntimeError> {
        let found = self.runtime.inspect(runtime_target(record)).await?;
        if found.is_none() && record.container_id.is_some() {
            return self.runtime.inspect(&record.container_name).await;
        }
        Ok(found)
    }

    /// Load the registry under its lock, releasing the lock before returning.
    async fn load_fresh(&self) -> Result<ServiceMap> {
        let guard = self.registry.lock().await?;
        guard.load()
    }

    async fn describe(&self, record: &ServiceRecord) -> ServiceInfo {
        let live = match self.runtime.inspect(runtime_target(record)).await {
            Ok(Some(state)) if state.running => LiveStatus::Running,
            Ok(Some(_)) => LiveStatus::Exited,
            Ok(None) => LiveStatus::NotFound,
            Err(e) => LiveStatus::Error(e.to_string()),
        };
        ServiceInfo {
            url: self.url_for(record),
            record: record.clone(),
            live,
        }
    }
}

/// The handle used to address a record's container: its id when known.
pub(crate) fn runtime_target(record: &ServiceRecord) -> &str {
    record
        .container_id
        .as_deref()
        .unwrap_or(&record.container_name)
}

fn service_not_found(id: &str, services: &ServiceMap) -> RigError {
    RigError::ServiceNotFound {
        id: id.to_string(),
        known: services.keys().cloned().collect(),
    }
}

fn lookup_mut<'a>(services: &'a mut ServiceMap, id: &str) -> Result<&'a mut ServiceRecord> {
    let known: Vec<String> = services.keys().cloned().collect();
    services.get_mut(id).ok_or_else(|| RigError::ServiceNotFound {
        id: id.to_string(),
        known,
    })
}

/// Counts by status and template plus the ports in use.
pub fn compute_stats(services: &ServiceMap) -> ServiceStats {
    let mut stats = ServiceStats {
        total: services.len(),
        ..Default::default()
    };
    for record in services.values() {
        match record.status {
            ServiceStatus::Running => stats.running += 1,
            ServiceStatus::Stopped => stats.stopped += 1,
        }
        *stats.templates.entry(record.template.clone()).or_default() += 1;
        stats.used_ports.push(record.port);
    }
    stats.used_ports.sort_unstable();
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::runtime::memory::{MemoryRuntime, Op};
    use tempfile::TempDir;

    struct AlwaysFree;

    impl PortProbe for AlwaysFree {
        fn is_free(&self, _port: u16) -> bool {
            true
        }
    }

    fn setup() -> (TempDir, Arc<MemoryRuntime>, Orchestrator) {
        let tmp = TempDir::new().unwrap();
        let registry = Arc::new(Registry::open(&tmp.path().join("state")).unwrap());
        let runtime = Arc::new(MemoryRuntime::new());
        let orch = Orchestrator::new(
            Arc::new(TemplateCatalog::builtin()),
            registry,
            runtime.clone(),
            Arc::new(AlwaysFree),
            OrchestratorSettings::new(tmp.path().join("templates")),
        );
        (tmp, runtime, orch)
    }

    #[tokio::test]
    async fn launch_records_service_and_url() {
        let (tmp, runtime, orch) = setup();
        let out = orch.launch("buckets", None).await.unwrap();

        assert_eq!(out.record.service_id, "buckets_instance_1");
        assert_eq!(out.record.port, 8000);
        assert_eq!(out.url, "http://localhost:8000");
        assert_eq!(
            out.record.project_dir,
            tmp.path().join("templates/buckets/instance_1")
        );
        assert!(out.record.project_dir.is_dir());
        assert!(out
            .record
            .container_name
            .starts_with(&identity::container_prefix(orch.registry().id())));
        let state = runtime.state_of(&out.record.container_name).unwrap();
        assert_eq!(out.record.container_id.as_deref(), Some(state.id.as_str()));
    }

    #[tokio::test]
    async fn launch_mounts_project_dir_and_fetches_template_code() {
        let (_tmp, runtime, orch) = setup();
        let out = orch.launch("db", Some("main")).await.unwrap();

        let specs = runtime.launched();
        assert_eq!(specs.len(), 1);
        let spec = &specs[0];
        assert_eq!(spec.container_name, out.record.container_name);
        assert_eq!(spec.project_dir, out.record.project_dir);
        assert_eq!(spec.host_port, 8010);
        assert_eq!(spec.source.checkout.as_ref().unwrap().folder, "DB");
        let command = spec.source.command.as_deref().unwrap();
        assert_eq!(&command[4..6], ["DB", "dbEndPoint:app"]);
        // Nothing is fetched on the host; the container does it on first start.
        assert_eq!(std::fs::read_dir(&out.record.project_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn logs_resolve_through_the_registry() {
        let (_tmp, runtime, orch) = setup();
        let out = orch.launch("queue", None).await.unwrap();
        runtime.emit(&out.record.container_name, "INFO: Started server process");
        runtime.emit(&out.record.container_name, "INFO: Uvicorn running on http://0.0.0.0:8000");

        let logs = orch.logs("queue_instance_1", 1).await.unwrap();
        assert_eq!(logs.service_id, "queue_instance_1");
        assert_eq!(logs.logs, "INFO: Uvicorn running on http://0.0.0.0:8000\n");

        let err = orch.logs("queue_instance_2", 50).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServiceNotFound);

        runtime.vanish(&out.record.container_name);
        let err = orch.logs("queue_instance_1", 50).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RuntimeOperationFailed);
    }

    #[tokio::test]
    async fn launch_failure_writes_no_record() {
        let (_tmp, runtime, orch) = setup();
        runtime.fail_next(Op::Create);

        let err = orch.launch("db", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RuntimeOperationFailed);
        let msg = err.to_string();
        assert!(msg.contains("template 'db'") && msg.contains("8010"), "got: {msg}");
        assert!(orch.list(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn stop_of_vanished_container_leaves_record() {
        let (_tmp, runtime, orch) = setup();
        let out = orch.launch("queue", None).await.unwrap();
        runtime.vanish(&out.record.container_name);

        let err = orch.stop("queue_instance_1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RuntimeOperationFailed);
        let rec = &orch.list(None).unwrap()[0];
        assert_eq!(rec.status, ServiceStatus::Running);
    }

    #[tokio::test]
    async fn unknown_service_lists_known_ids() {
        let (_tmp, _runtime, orch) = setup();
        orch.launch("queue", None).await.unwrap();
        let err = orch.stop("queue_instance_9").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServiceNotFound);
        assert!(err.to_string().contains("queue_instance_1"));
    }

    #[tokio::test]
    async fn remove_of_vanished_container_is_clean() {
        let (_tmp, runtime, orch) = setup();
        let out = orch.launch("secrets", None).await.unwrap();
        runtime.vanish(&out.record.container_name);
        orch.remove("secrets_instance_1", false).await.unwrap();
        assert!(orch.list(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_forces_when_stop_fails() {
        let (_tmp, runtime, orch) = setup();
        orch.launch("secrets", None).await.unwrap();
        runtime.fail_next(Op::Stop);
        orch.remove("secrets_instance_1", false).await.unwrap();
        assert_eq!(runtime.container_count(), 0);
    }

    #[tokio::test]
    async fn status_reports_live_state() {
        let (_tmp, runtime, orch) = setup();
        let a = orch.launch("buckets", None).await.unwrap();
        orch.launch("buckets", None).await.unwrap();
        orch.launch("db", Some("main")).await.unwrap();
        orch.stop("buckets_instance_2").await.unwrap();
        runtime.exit(&a.record.container_name);

        let report = orch.all_status().await.unwrap();
        assert_eq!(report.stats.total, 3);
        assert_eq!(report.stats.running, 2);
        assert_eq!(report.stats.stopped, 1);
        assert_eq!(report.stats.templates["buckets"], 2);
        assert_eq!(report.stats.used_ports, vec![8000, 8001, 8010]);
        assert_eq!(report.services["buckets_instance_1"].live, LiveStatus::Exited);
        assert_eq!(report.services["db_main"].live, LiveStatus::Running);

        let info = orch.info("db_main").await.unwrap();
        assert_eq!(info.url, "http://localhost:8010");
    }

    #[tokio::test]
    async fn list_filters_by_template() {
        let (_tmp, _runtime, orch) = setup();
        orch.launch("buckets", None).await.unwrap();
        orch.launch("db", None).await.unwrap();
        let only_db = orch.list(Some("db")).unwrap();
        assert_eq!(only_db.len(), 1);
        assert_eq!(only_db[0].service_id, "db_instance_1");
    }

    #[tokio::test]
    async fn recover_restarts_confirms_and_drops() {
        let (_tmp, runtime, orch) = setup();
        let a = orch.launch("buckets", None).await.unwrap();
        let b = orch.launch("buckets", None).await.unwrap();
        let c = orch.launch("buckets", None).await.unwrap();
        runtime.exit(&b.record.container_name);
        runtime.vanish(&c.record.container_name);

        let report = orch.recover().await.unwrap();
        assert_eq!(report.recovered, 2);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.services["buckets_instance_1"], RecoveryOutcome::Confirmed);
        assert_eq!(report.services["buckets_instance_2"], RecoveryOutcome::Restarted);
        assert!(runtime.state_of(&b.record.container_name).unwrap().running);

        let ids: Vec<String> = orch
            .list(None)
            .unwrap()
            .into_iter()
            .map(|r| r.service_id)
            .collect();
        assert_eq!(ids, vec!["buckets_instance_1", "buckets_instance_2"]);
        assert!(runtime.state_of(&a.record.container_name).unwrap().running);
    }
}

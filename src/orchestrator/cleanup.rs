//! Registry/runtime reconciliation and the full teardown sweep.

use serde::Serialize;
use tracing::{info, warn};

use super::registry::{ServiceMap, ServiceStatus};
use super::{runtime_target, Orchestrator};
use crate::error::{ErrorKind, Result};
use crate::runtime::ManagedContainer;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AutoCleanupReport {
    /// Records whose container still exists; their status was synced.
    pub reconciled: usize,
    /// Records dropped because their container is gone.
    pub removed: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    pub registered: usize,
    pub stopped: usize,
    pub removed: usize,
    pub orphans_removed: usize,
    pub errors: Vec<String>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingRemoval {
    pub service_id: String,
    pub container_name: String,
    pub exists: bool,
    pub status: String,
}

/// What a teardown would touch right now.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupStatus {
    pub registered: usize,
    pub would_remove: Vec<PendingRemoval>,
    pub orphans: Vec<ManagedContainer>,
}

impl Orchestrator {
    /// Drop records whose container no longer exists and sync the status of
    /// the rest. Containers unknown to the registry are left alone.
    pub async fn auto_cleanup(&self) -> Result<AutoCleanupReport> {
        let guard = self.registry.lock().await?;
        let mut services = guard.load()?;
        let mut report = AutoCleanupReport::default();
        let mut gone = Vec::new();
        let mut changed = false;

        for (id, record) in services.iter_mut() {
            match self.locate(record).await {
                Ok(None) => gone.push(id.clone()),
                Ok(Some(state)) => {
                    let status = if state.running {
                        ServiceStatus::Running
                    } else {
                        ServiceStatus::Stopped
                    };
                    if record.status != status
                        || record.container_id.as_deref() != Some(state.id.as_str())
                    {
                        record.status = status;
                        record.container_id = Some(state.id);
                        changed = true;
                    }
                    report.reconciled += 1;
                }
                Err(e) => {
                    warn!(service = %id, error = %e, "could not inspect container");
                    report.errors.push(format!("{id}: inspect: {e}"));
                }
            }
        }

        for id in &gone {
            info!(service = %id, "dropping record for missing container");
            services.remove(id);
        }
        report.removed = gone.len();

        if changed || report.removed > 0 {
            guard.save(&services)?;
        }
        Ok(report)
    }

    /// Read-only preview of what a teardown would do.
    pub async fn cleanup_status(&self) -> Result<CleanupStatus> {
        let services = self.load_fresh().await?;

        let mut would_remove = Vec::new();
        for record in services.values() {
            let (exists, status) = match self.locate(record).await {
                Ok(Some(state)) => (true, state.status),
                Ok(None) => (false, "not found".to_string()),
                Err(e) => (false, format!("error: {e}")),
            };
            would_remove.push(PendingRemoval {
                service_id: record.service_id.clone(),
                container_name: record.container_name.clone(),
                exists,
                status,
            });
        }

        let orphans = match self.runtime.list_managed(self.registry.id()).await {
            Ok(list) => list
                .into_iter()
                .filter(|c| !is_tracked(&services, c))
                .collect(),
            Err(e) => {
                warn!(error = %e, "could not list managed containers");
                Vec::new()
            }
        };

        Ok(CleanupStatus {
            registered: services.len(),
            would_remove,
            orphans,
        })
    }

    /// Stop and remove every registered container, clear the registry, then
    /// remove any container labelled as ours that the registry did not know.
    ///
    /// Not latched: every call sweeps again. Signal-driven shutdown goes
    /// through [`super::shutdown::ShutdownCoordinator`] instead.
    pub async fn force_cleanup_all(&self) -> Result<TeardownReport> {
        let guard = self.registry.lock().await?;
        let mut report = TeardownReport::default();

        match guard.load() {
            Ok(services) => {
                report.registered = services.len();
                self.sweep_records(&services, &mut report).await;
                guard.save(&ServiceMap::new())?;
            }
            // The file is left untouched; labelled containers are still swept below.
            Err(e) if e.kind() == ErrorKind::CorruptRegistry => {
                warn!(error = %e, "registry unreadable, sweeping by label only");
                report.errors.push(e.to_string());
            }
            Err(e) => return Err(e),
        }

        self.sweep_orphans(&mut report).await;

        info!(
            registered = report.registered,
            stopped = report.stopped,
            removed = report.removed,
            orphans = report.orphans_removed,
            errors = report.errors.len(),
            "teardown finished"
        );
        Ok(report)
    }

    async fn sweep_records(&self, services: &ServiceMap, report: &mut TeardownReport) {
        for record in services.values() {
            let target = runtime_target(record);

            match self.runtime.stop(target, self.settings.stop_timeout).await {
                Ok(()) => report.stopped += 1,
                Err(e) if e.is_not_found() => continue,
                Err(e) => {
                    warn!(service = %record.service_id, error = %e, "stop failed");
                    report
                        .errors
                        .push(format!("{}: stop: {e}", record.service_id));
                }
            }

            match self.runtime.remove(target, true).await {
                Ok(()) => report.removed += 1,
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(service = %record.service_id, error = %e, "remove failed");
                    report
                        .errors
                        .push(format!("{}: remove: {e}", record.service_id));
                }
            }
        }
    }

    async fn sweep_orphans(&self, report: &mut TeardownReport) {
        let orphans = match self.runtime.list_managed(self.registry.id()).await {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "could not list managed containers");
                report.errors.push(format!("orphan sweep: {e}"));
                return;
            }
        };

        for orphan in orphans {
            match self.runtime.remove(&orphan.id, true).await {
                Ok(()) => {
                    info!(container = %orphan.name, "removed orphaned container");
                    report.orphans_removed += 1;
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(container = %orphan.name, error = %e, "orphan removal failed");
                    report.errors.push(format!("{}: remove: {e}", orphan.name));
                }
            }
        }
    }
}

fn is_tracked(services: &ServiceMap, container: &ManagedContainer) -> bool {
    services.values().any(|r| {
        r.container_name == container.name || r.container_id.as_deref() == Some(container.id.as_str())
    })
}

//! Read-only views: `ls`, `info`, `logs`, `stats` and `status`.

use anyhow::Result;

use super::{print_json, Session};
use crate::error::RigError;
use crate::orchestrator::compute_stats;
use crate::orchestrator::registry::ServiceRecord;
use crate::ui::summary;

/// Lists from the registry file alone; no container runtime needed.
pub fn run_list(session: &Session, template: Option<&str>) -> Result<()> {
    let records: Vec<ServiceRecord> = session
        .registry
        .snapshot()?
        .into_values()
        .filter(|r| template.map_or(true, |t| r.template == t))
        .collect();

    if session.output.is_json() {
        return print_json(&records);
    }
    summary::print_services(&records, &session.settings().host);
    Ok(())
}

/// Unknown ids are answered from the registry before dialling the daemon.
fn ensure_registered(session: &Session, id: &str) -> Result<()> {
    let known = session.registry.snapshot()?;
    if known.contains_key(id) {
        return Ok(());
    }
    Err(RigError::ServiceNotFound {
        id: id.to_string(),
        known: known.into_keys().collect(),
    }
    .into())
}

pub async fn run_info(session: &Session, id: &str) -> Result<()> {
    ensure_registered(session, id)?;

    let orchestrator = session.connect().await?;
    let info = orchestrator.info(id).await?;

    if session.output.is_json() {
        return print_json(&info);
    }
    summary::print_service_info(&info);
    Ok(())
}

pub async fn run_logs(session: &Session, id: &str, tail: usize) -> Result<()> {
    ensure_registered(session, id)?;

    let orchestrator = session.connect().await?;
    let logs = orchestrator.logs(id, tail).await?;

    if session.output.is_json() {
        return print_json(&logs);
    }
    print!("{}", logs.logs);
    Ok(())
}

/// Counts come from the registry alone; no container runtime needed.
pub async fn run_stats(session: &Session) -> Result<()> {
    let services = session.registry.lock().await?.load()?;
    let stats = compute_stats(&services);

    if session.output.is_json() {
        return print_json(&stats);
    }
    summary::print_stats(&stats);
    Ok(())
}

pub async fn run_status(session: &Session) -> Result<()> {
    let orchestrator = session.connect().await?;
    let report = orchestrator.all_status().await?;

    if session.output.is_json() {
        return print_json(&report);
    }
    summary::print_status(&report);
    Ok(())
}

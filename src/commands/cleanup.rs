use std::sync::Arc;

use anyhow::Result;

use super::{print_json, Session};
use crate::orchestrator::cleanup::TeardownReport;
use crate::orchestrator::shutdown::{ShutdownCoordinator, ShutdownTrigger};
use crate::ui::summary;

/// Which cleanup `svcrig cleanup` performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupMode {
    /// Drop records whose container is gone.
    Auto,
    /// Stop and remove everything, registered or merely labelled.
    All,
    /// Show what `All` would touch.
    Status,
}

pub async fn run(session: &Session, mode: CleanupMode) -> Result<()> {
    let orchestrator = session.connect().await?;

    match mode {
        CleanupMode::Auto => {
            let report = orchestrator.auto_cleanup().await?;
            if session.output.is_json() {
                print_json(&report)?;
            } else {
                summary::print_auto_cleanup(&report);
            }
        }
        CleanupMode::Status => {
            let status = orchestrator.cleanup_status().await?;
            if session.output.is_json() {
                print_json(&status)?;
            } else {
                summary::print_cleanup_status(&status);
            }
        }
        CleanupMode::All => {
            let report = orchestrator.force_cleanup_all().await?;
            finish_teardown(session, &report)?;
        }
    }
    Ok(())
}

/// Graceful teardown through the shutdown coordinator.
pub async fn run_shutdown(session: &Session) -> Result<()> {
    let orchestrator = Arc::new(session.connect().await?);
    let coordinator = ShutdownCoordinator::new(orchestrator);
    let report = coordinator.teardown(ShutdownTrigger::Manual).await?;
    finish_teardown(session, &report)
}

/// Print a teardown report; exits non-zero when anything was left behind.
pub(crate) fn finish_teardown(session: &Session, report: &TeardownReport) -> Result<()> {
    if session.output.is_json() {
        print_json(report)?;
    } else {
        summary::print_teardown(report);
    }
    if !report.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}

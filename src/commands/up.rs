//! `svcrig up`: launch a set of templates and hold them for the lifetime of
//! the session.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use super::cleanup::finish_teardown;
use super::{print_json, Session};
use crate::orchestrator::cleanup::TeardownReport;
use crate::orchestrator::shutdown::{ShutdownCoordinator, ShutdownTrigger};
use crate::orchestrator::{runtime_target, LaunchOutcome, Orchestrator};
use crate::ui::summary;

/// How often the launched containers are checked for having exited.
const EXIT_POLL: Duration = Duration::from_secs(2);

#[derive(Serialize)]
struct SessionReport<'a> {
    launched: &'a [LaunchOutcome],
    trigger: ShutdownTrigger,
    teardown: &'a TeardownReport,
}

pub async fn run(session: &Session, templates: &[String], label: Option<&str>) -> Result<()> {
    let orchestrator = Arc::new(session.connect().await?);
    let coordinator = Arc::new(ShutdownCoordinator::new(Arc::clone(&orchestrator)));
    let signals = coordinator.install_signal_handlers()?;

    let mut launched = Vec::new();
    let mut failure = None;
    for template in templates {
        if coordinator.is_requested() {
            break;
        }
        match orchestrator.launch(template, label).await {
            Ok(outcome) => launched.push(outcome),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    let trigger = if coordinator.is_requested() {
        coordinator.requested().await
    } else if failure.is_some() || launched.is_empty() {
        ShutdownTrigger::Exit
    } else {
        if !session.output.is_json() {
            summary::print_launched(&launched);
            summary::print_press_ctrl_c();
        }
        tokio::select! {
            trigger = coordinator.requested() => trigger,
            () = all_exited(&orchestrator, &launched) => {
                info!("every launched service has exited");
                ShutdownTrigger::Exit
            }
        }
    };

    let report = coordinator.teardown(trigger).await?;
    signals.abort();

    if let Some(e) = failure {
        if !session.output.is_json() {
            summary::print_teardown(&report);
        }
        return Err(e.into());
    }

    if session.output.is_json() {
        print_json(&SessionReport {
            launched: &launched,
            trigger,
            teardown: &report,
        })?;
        if !report.is_clean() {
            std::process::exit(1);
        }
        return Ok(());
    }
    finish_teardown(session, &report)
}

/// Resolves once none of the launched containers is running any more.
/// A container whose state cannot be read counts as running.
async fn all_exited(orchestrator: &Orchestrator, launched: &[LaunchOutcome]) {
    let mut interval = tokio::time::interval(EXIT_POLL);
    loop {
        interval.tick().await;

        let mut running = 0;
        for outcome in launched {
            match orchestrator
                .runtime()
                .inspect(runtime_target(&outcome.record))
                .await
            {
                Ok(Some(state)) if state.running => running += 1,
                Ok(_) => {}
                Err(e) => {
                    debug!(service = %outcome.record.service_id, error = %e, "inspect failed");
                    running += 1;
                }
            }
        }
        if running == 0 {
            return;
        }
    }
}

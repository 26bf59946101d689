use anyhow::Result;

use super::{print_json, Session};
use crate::ui::summary;

pub async fn run_launch(session: &Session, template: &str, label: Option<&str>) -> Result<()> {
    let orchestrator = session.connect().await?;
    let outcome = orchestrator.launch(template, label).await?;

    if session.output.is_json() {
        return print_json(&outcome);
    }
    summary::print_launched(std::slice::from_ref(&outcome));
    Ok(())
}

pub async fn run_stop(session: &Session, id: &str) -> Result<()> {
    let orchestrator = session.connect().await?;
    let record = orchestrator.stop(id).await?;

    if session.output.is_json() {
        return print_json(&record);
    }
    summary::print_record_action("stopped", &record);
    Ok(())
}

pub async fn run_restart(session: &Session, id: &str) -> Result<()> {
    let orchestrator = session.connect().await?;
    let record = orchestrator.restart(id).await?;

    if session.output.is_json() {
        return print_json(&record);
    }
    summary::print_record_action("restarted", &record);
    println!("    {}", orchestrator.url_for(&record));
    Ok(())
}

pub async fn run_remove(session: &Session, id: &str, force: bool) -> Result<()> {
    let orchestrator = session.connect().await?;
    let record = orchestrator.remove(id, force).await?;

    if session.output.is_json() {
        return print_json(&record);
    }
    summary::print_record_action("removed", &record);
    Ok(())
}

pub async fn run_recover(session: &Session) -> Result<()> {
    let orchestrator = session.connect().await?;
    let report = orchestrator.recover().await?;

    if session.output.is_json() {
        print_json(&report)?;
    } else {
        summary::print_recovery(&report);
    }
    if report.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

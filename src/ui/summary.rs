use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

use crate::catalog::Template;
use crate::orchestrator::cleanup::{AutoCleanupReport, CleanupStatus, TeardownReport};
use crate::orchestrator::registry::ServiceRecord;
use crate::orchestrator::{
    LaunchOutcome, LiveStatus, RecoveryOutcome, RecoveryReport, ServiceInfo, ServiceStats,
    StatusReport,
};

fn use_color() -> bool {
    std::io::stdout().is_terminal()
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).set_alignment(CellAlignment::Left))
            .collect::<Vec<_>>(),
    );
    table
}

fn print_indented(table: &Table) {
    // Indent the table by 2 spaces
    for line in table.to_string().lines() {
        println!("  {}", line);
    }
}

fn heading(text: &str) {
    println!();
    if use_color() {
        println!("  {}", text.bold());
    } else {
        println!("  {}", text);
    }
    println!();
}

/// A status word with the coloured bullet used throughout the tables.
fn status_text(status: &str) -> String {
    if !use_color() {
        return format!("\u{25cf} {}", status);
    }
    match status {
        "running" => format!("{} {}", "\u{25cf}".green(), "running".green()),
        "stopped" | "exited" => format!("{} {}", "\u{25cf}".yellow(), status.yellow()),
        "not found" => format!("{} {}", "\u{25cf}".red(), status.red()),
        other if other.starts_with("error") => format!("{} {}", "\u{25cf}".red(), other.red()),
        other => format!("\u{25cf} {}", other),
    }
}

fn check(ok: bool) -> String {
    match (ok, use_color()) {
        (true, true) => "\u{2713}".green().to_string(),
        (true, false) => "\u{2713}".to_string(),
        (false, true) => "\u{2717}".red().to_string(),
        (false, false) => "\u{2717}".to_string(),
    }
}

fn print_errors(errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    println!();
    for error in errors {
        println!("  {} {}", check(false), error);
    }
}

pub fn print_launched(outcomes: &[LaunchOutcome]) {
    let mut table = new_table(&["Service", "URL", "Project directory"]);
    for outcome in outcomes {
        table.add_row(vec![
            Cell::new(&outcome.record.service_id),
            Cell::new(&outcome.url),
            Cell::new(outcome.record.project_dir.display()),
        ]);
    }
    println!();
    print_indented(&table);
    println!();
}

/// One-line confirmation for stop / restart / rm.
pub fn print_record_action(action: &str, record: &ServiceRecord) {
    println!(
        "  {} {} {} (port {})",
        check(true),
        action,
        record.service_id,
        record.port
    );
}

pub fn print_services(records: &[ServiceRecord], host: &str) {
    if records.is_empty() {
        println!("No services registered.");
        println!("Run `svcrig launch <template>` to start one.");
        return;
    }

    let mut table = new_table(&["Service", "Template", "URL", "Status", "Created"]);
    for record in records {
        table.add_row(vec![
            Cell::new(&record.service_id),
            Cell::new(&record.template),
            Cell::new(format!("http://{}:{}", host, record.port)),
            Cell::new(status_text(&record.status.to_string())),
            Cell::new(record.created_at.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }
    println!();
    print_indented(&table);
    println!();
}

pub fn print_service_info(info: &ServiceInfo) {
    let record = &info.record;
    heading(&record.service_id);
    println!("    Template:    {}", record.template);
    println!("    URL:         {}", info.url);
    println!("    Registry:    {}", record.status);
    println!("    Live:        {}", status_text(&info.live.to_string()));
    println!("    Container:   {}", record.container_name);
    if let Some(id) = &record.container_id {
        println!("    Id:          {}", &id[..id.len().min(12)]);
    }
    println!("    Project dir: {}", record.project_dir.display());
    println!(
        "    Created:     {}",
        record.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!();
}

pub fn print_stats(stats: &ServiceStats) {
    heading("Services");
    println!(
        "    Total: {}   Running: {}   Stopped: {}",
        stats.total, stats.running, stats.stopped
    );
    if !stats.templates.is_empty() {
        let per_template: Vec<String> = stats
            .templates
            .iter()
            .map(|(t, n)| format!("{t} ({n})"))
            .collect();
        println!("    Templates: {}", per_template.join(", "));
    }
    if !stats.used_ports.is_empty() {
        let ports: Vec<String> = stats.used_ports.iter().map(u16::to_string).collect();
        println!("    Ports: {}", ports.join(", "));
    }
    println!();
}

pub fn print_status(report: &StatusReport) {
    print_stats(&report.stats);
    if report.services.is_empty() {
        return;
    }

    let mut table = new_table(&["Service", "URL", "Registry", "Live"]);
    for (id, info) in &report.services {
        let live = match &info.live {
            LiveStatus::Error(_) => status_text("error"),
            other => status_text(&other.to_string()),
        };
        table.add_row(vec![
            Cell::new(id),
            Cell::new(&info.url),
            Cell::new(info.record.status),
            Cell::new(live),
        ]);
    }
    print_indented(&table);
    println!();
}

pub fn print_templates<'a>(templates: impl IntoIterator<Item = &'a Template>) {
    let mut table = new_table(&["Template", "Port", "Image", "Description"]);
    for template in templates {
        table.add_row(vec![
            Cell::new(&template.name),
            Cell::new(template.preferred_port),
            Cell::new(&template.source.image),
            Cell::new(&template.description),
        ]);
    }
    println!();
    print_indented(&table);
    println!();
}

pub fn print_auto_cleanup(report: &AutoCleanupReport) {
    println!(
        "  {} {} record(s) in sync, {} stale record(s) removed",
        check(report.errors.is_empty()),
        report.reconciled,
        report.removed
    );
    print_errors(&report.errors);
}

pub fn print_cleanup_status(status: &CleanupStatus) {
    heading(&format!("{} registered service(s)", status.registered));
    if !status.would_remove.is_empty() {
        let mut table = new_table(&["Service", "Container", "State"]);
        for pending in &status.would_remove {
            table.add_row(vec![
                Cell::new(&pending.service_id),
                Cell::new(&pending.container_name),
                Cell::new(status_text(&pending.status)),
            ]);
        }
        print_indented(&table);
        println!();
    }

    if !status.orphans.is_empty() {
        println!("  Unregistered containers carrying this registry's labels:");
        for orphan in &status.orphans {
            let state = if orphan.running { "running" } else { "exited" };
            println!("    {} ({})", orphan.name, status_text(state));
        }
        println!();
    }
}

pub fn print_teardown(report: &TeardownReport) {
    println!(
        "  {} stopped {}, removed {} of {} registered, {} orphan(s) removed",
        check(report.is_clean()),
        report.stopped,
        report.removed,
        report.registered,
        report.orphans_removed
    );
    print_errors(&report.errors);
}

pub fn print_recovery(report: &RecoveryReport) {
    if report.services.is_empty() {
        println!("No services registered.");
        return;
    }

    let mut table = new_table(&["Service", "Outcome"]);
    for (id, outcome) in &report.services {
        let text = match outcome {
            RecoveryOutcome::Confirmed => status_text("running"),
            RecoveryOutcome::Restarted => status_text("restarted"),
            RecoveryOutcome::Dropped => status_text("not found"),
            RecoveryOutcome::Failed(reason) => status_text(&format!("error: {reason}")),
        };
        table.add_row(vec![Cell::new(id), Cell::new(text)]);
    }
    println!();
    print_indented(&table);
    println!(
        "  {} recovered, {} dropped, {} failed",
        report.recovered, report.dropped, report.failed
    );
    println!();
}

pub fn print_press_ctrl_c() {
    if use_color() {
        println!("  Press {} to stop", "Ctrl+C".bold());
    } else {
        println!("  Press Ctrl+C to stop");
    }
    println!();
}

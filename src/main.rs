use clap::{CommandFactory, Parser};
use clap_complete::aot::generate;
use std::path::Path;
use svcrig::cli::{Cli, Commands};
use svcrig::commands;
use svcrig::commands::cleanup::CleanupMode;
use svcrig::commands::{Output, Session};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber with env-filter support. Logs go to
    // stderr so `--json` output on stdout stays parseable.
    let default_level = if cli.global.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::from_flag(cli.global.json);
    let result = run(cli.command, cli.global.config_file.as_deref(), output).await;

    if let Err(e) = result {
        if output.is_json() {
            let payload = commands::error_payload(&e);
            match serde_json::to_string_pretty(&payload) {
                Ok(json) => println!("{}", json),
                Err(_) => eprintln!("Error: {:#}", e),
            }
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

async fn run(command: Commands, config_file: Option<&Path>, output: Output) -> anyhow::Result<()> {
    let open = || Session::open(config_file, output);

    match command {
        Commands::Templates => commands::templates::run(config_file, output),
        Commands::Doctor => commands::doctor::run(config_file).await,
        Commands::Validate => commands::validate::run(config_file),
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "svcrig", &mut std::io::stdout());
            Ok(())
        }
        Commands::Launch { template, label } => {
            commands::lifecycle::run_launch(&open()?, &template, label.as_deref()).await
        }
        Commands::Stop { id } => commands::lifecycle::run_stop(&open()?, &id).await,
        Commands::Restart { id } => commands::lifecycle::run_restart(&open()?, &id).await,
        Commands::Remove { id, force } => {
            commands::lifecycle::run_remove(&open()?, &id, force).await
        }
        Commands::Recover => commands::lifecycle::run_recover(&open()?).await,
        Commands::List { template } => {
            commands::inspect::run_list(&open()?, template.as_deref())
        }
        Commands::Info { id } => commands::inspect::run_info(&open()?, &id).await,
        Commands::Logs { id, tail } => commands::inspect::run_logs(&open()?, &id, tail).await,
        Commands::Stats => commands::inspect::run_stats(&open()?).await,
        Commands::Status => commands::inspect::run_status(&open()?).await,
        Commands::Cleanup { all, status } => {
            let mode = if all {
                CleanupMode::All
            } else if status {
                CleanupMode::Status
            } else {
                CleanupMode::Auto
            };
            commands::cleanup::run(&open()?, mode).await
        }
        Commands::Shutdown => commands::cleanup::run_shutdown(&open()?).await,
        Commands::Up { templates, label } => {
            commands::up::run(&open()?, &templates, label.as_deref()).await
        }
    }
}

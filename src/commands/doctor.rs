use std::path::Path;

use anyhow::Result;

use crate::config::model::Settings;
use crate::config::LoadedConfig;
use crate::docker::DockerRuntime;
use crate::orchestrator::registry::Registry;

pub async fn run(config_file: Option<&Path>) -> Result<()> {
    println!("svcrig doctor");
    println!("=============");
    println!();

    let mut all_ok = true;

    let settings = match LoadedConfig::load(config_file) {
        Ok(loaded) => {
            let source = loaded
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "built-in defaults".to_string());
            println!("  [ok] {:<16} {}", "config", source);

            match Registry::open(&loaded.state_dir()).and_then(|r| {
                let count = r.snapshot()?.len();
                Ok((r, count))
            }) {
                Ok((registry, count)) => println!(
                    "  [ok] {:<16} {} ({} services)",
                    "registry",
                    registry.path().display(),
                    count
                ),
                Err(e) => {
                    println!("  [!!] {:<16} {}", "registry", e);
                    all_ok = false;
                }
            }
            loaded.config.settings
        }
        Err(e) => {
            println!("  [!!] {:<16} {:#}", "config", e);
            all_ok = false;
            Settings::default()
        }
    };

    match DockerRuntime::connect(settings.runtime_timeout, settings.launch_timeout).await {
        Ok(runtime) => {
            let version = runtime
                .docker()
                .version()
                .await
                .ok()
                .and_then(|v| v.version)
                .unwrap_or_else(|| "unknown version".to_string());
            println!("  [ok] {:<16} {}", "docker", version);
        }
        Err(e) => {
            println!("  [!!] {:<16} {}", "docker", e);
            all_ok = false;
        }
    }

    println!();
    if all_ok {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Launching services needs a reachable Docker daemon.");
        std::process::exit(1);
    }

    Ok(())
}

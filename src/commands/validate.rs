use anyhow::Result;
use owo_colors::OwoColorize;
use std::path::Path;

use crate::config;
use crate::config::resolve::{resolve_config, CONFIG_FILENAME};
use crate::config::validate::validate;

pub fn run(config_file: Option<&Path>) -> Result<()> {
    let Some(config_path) = resolve_config(config_file)? else {
        println!(
            "  No {} found; the built-in templates and defaults are in effect.",
            CONFIG_FILENAME
        );
        return Ok(());
    };

    let (config, source) = config::load_config(&config_path)?;

    let filename = config_path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| CONFIG_FILENAME.to_string());

    match validate(&config, &source, &filename) {
        Ok(()) => {
            println!(
                "  {} {} is valid ({} template definitions)",
                "\u{2713}".green(),
                filename,
                config.templates.len(),
            );
            Ok(())
        }
        Err(errors) => {
            for err in errors {
                let report: miette::Report = err.into();
                eprintln!("{:?}", report);
            }
            std::process::exit(1);
        }
    }
}

use std::path::Path;

use anyhow::Result;

use super::{print_json, Output};
use crate::catalog::{Template, TemplateCatalog};
use crate::config::LoadedConfig;
use crate::ui::summary;

pub fn run(config_file: Option<&Path>, output: Output) -> Result<()> {
    let loaded = LoadedConfig::load(config_file)?;
    let catalog = TemplateCatalog::builtin().with_overrides(&loaded.config);

    if output.is_json() {
        let templates: Vec<&Template> = catalog.iter().collect();
        return print_json(&templates);
    }
    summary::print_templates(catalog.iter());
    Ok(())
}

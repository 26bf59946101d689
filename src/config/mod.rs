pub mod model;
pub mod resolve;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

use crate::platform::expand_home;
use model::RigConfig;
use resolve::{resolve_config, CONFIG_FILENAME};
use validate::validate;

/// Read and parse a config file, returning the raw source alongside it for
/// diagnostics.
pub fn load_config(path: &Path) -> anyhow::Result<(RigConfig, String)> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
    let config: RigConfig = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file {}: {}", path.display(), e))?;
    Ok((config, content))
}

/// A parsed and validated configuration plus the directory relative paths
/// resolve against.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: RigConfig,
    /// `None` when no `svcrig.toml` was found and defaults are in effect.
    pub path: Option<PathBuf>,
    pub base_dir: PathBuf,
}

impl LoadedConfig {
    /// Resolve, parse and validate the configuration.
    pub fn load(cli_file: Option<&Path>) -> anyhow::Result<Self> {
        let Some(config_path) = resolve_config(cli_file)? else {
            let cwd = std::env::current_dir().context("reading current directory")?;
            return Ok(Self::defaults(cwd));
        };

        let (config, source) = load_config(&config_path)
            .with_context(|| format!("loading config from {}", config_path.display()))?;

        let filename = config_path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| CONFIG_FILENAME.to_string());

        if let Err(errors) = validate(&config, &source, &filename) {
            let mut msg = String::from("Configuration errors:\n");
            for err in &errors {
                msg.push_str(&format!("  - {}\n", err));
            }
            bail!("{}", msg.trim_end());
        }

        let base_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            config,
            path: Some(config_path),
            base_dir,
        })
    }

    pub fn defaults(base_dir: PathBuf) -> Self {
        Self {
            config: RigConfig::default(),
            path: None,
            base_dir,
        }
    }

    /// Directory holding `registry.json` and its lock file.
    pub fn state_dir(&self) -> PathBuf {
        resolve_path(&self.base_dir, &self.config.settings.state_dir)
    }

    /// Root under which per-instance project directories are created.
    pub fn workspace(&self) -> PathBuf {
        resolve_path(&self.base_dir, &self.config.settings.workspace)
    }
}

fn resolve_path(base: &Path, raw: &str) -> PathBuf {
    let expanded = PathBuf::from(expand_home(raw));
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "[settings]\nstate_dir = \"state\"\n").unwrap();

        let loaded = LoadedConfig::load(Some(&path)).unwrap();
        let base = tmp.path().canonicalize().unwrap();
        assert_eq!(loaded.state_dir(), base.join("state"));
        assert_eq!(loaded.workspace(), base.join("templates"));
    }

    #[test]
    fn absolute_paths_are_kept() {
        let loaded = LoadedConfig {
            config: toml::from_str("[settings]\nworkspace = \"/srv/rig\"\n").unwrap(),
            path: None,
            base_dir: PathBuf::from("/home/someone"),
        };
        assert_eq!(loaded.workspace(), PathBuf::from("/srv/rig"));
        assert_eq!(loaded.state_dir(), PathBuf::from("/home/someone/.svcrig"));
    }

    #[test]
    fn invalid_config_lists_every_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            "[templates.web]\nimage = \"\"\nport = 0\n",
        )
        .unwrap();

        let err = LoadedConfig::load(Some(&path)).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("Configuration errors"), "got: {msg}");
        assert!(msg.contains("empty image"), "got: {msg}");
        assert!(msg.contains("base port 0"), "got: {msg}");
    }

    #[test]
    fn parse_error_names_the_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "[templates.web\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}

use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "svcrig.toml";

/// Walk up the directory tree from `start`, checking for `filename` at each level.
/// Returns the full path to the file if found, or None if the root is reached
/// without finding it.
pub fn find_config(start: &Path, filename: &str) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(filename);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Resolve the config file path.
///
/// An explicit `cli_file` must exist. Without one, the current directory and
/// its parents are searched for `svcrig.toml`; finding nothing is not an
/// error, the built-in defaults apply.
pub fn resolve_config(cli_file: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = cli_file {
        if path.is_file() {
            return Ok(Some(path.canonicalize()?));
        }
        anyhow::bail!("Config file not found: {}", path.display());
    }

    let cwd = std::env::current_dir()?;
    Ok(find_config(&cwd, CONFIG_FILENAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn config_in_current_dir_found() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&config_path, "").unwrap();

        assert_eq!(find_config(tmp.path(), CONFIG_FILENAME), Some(config_path));
    }

    #[test]
    fn config_in_grandparent_found() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&config_path, "").unwrap();

        let grandchild = tmp.path().join("a").join("b");
        fs::create_dir_all(&grandchild).unwrap();

        assert_eq!(find_config(&grandchild, CONFIG_FILENAME), Some(config_path));
    }

    #[test]
    fn missing_config_is_not_found_inside_tree() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a").join("b").join("c");
        fs::create_dir_all(&nested).unwrap();

        // The walk continues above the temp dir; only assert nothing inside it matched.
        if let Some(found) = find_config(&nested, CONFIG_FILENAME) {
            assert!(!found.starts_with(tmp.path()));
        }
    }

    #[test]
    fn cli_file_valid_path() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("custom.toml");
        fs::write(&config_path, "").unwrap();

        let result = resolve_config(Some(&config_path)).unwrap();
        assert_eq!(result, Some(config_path.canonicalize().unwrap()));
    }

    #[test]
    fn cli_file_invalid_path_errors() {
        let missing = Path::new("/tmp/definitely_does_not_exist_svcrig.toml");
        let err = resolve_config(Some(missing)).unwrap_err();
        assert!(err.to_string().contains("Config file not found"), "got: {err}");
    }
}

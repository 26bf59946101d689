//! Instance naming: discriminators, service ids and project directories.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, RigError};
use crate::orchestrator::registry::ServiceMap;

const AUTO_PREFIX: &str = "instance_";

fn label_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_.-]*$").expect("static regex is valid"))
}

/// The number in an auto-assigned discriminator like `instance_3`.
fn auto_number(discriminator: &str) -> Option<u32> {
    discriminator
        .strip_prefix(AUTO_PREFIX)
        .filter(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        .and_then(|n| n.parse().ok())
}

/// Normalize a caller-supplied instance label.
///
/// Trims, lowercases and turns spaces into `_`. The result must be usable as
/// a directory and container name component and must not collide with the
/// auto-assigned `instance_<n>` names.
pub fn sanitize_label(raw: &str) -> Result<String> {
    let label = raw.trim().to_lowercase().replace(' ', "_");
    let invalid = |reason: &str| RigError::InvalidLabel {
        label: raw.to_string(),
        reason: reason.to_string(),
    };

    if label.is_empty() {
        return Err(invalid("label is empty"));
    }
    if !label_pattern().is_match(&label) {
        return Err(invalid(
            "use lowercase letters, digits, '_', '.' or '-', starting with a letter or digit",
        ));
    }
    if auto_number(&label).is_some() {
        return Err(invalid("names of the form 'instance_<n>' are reserved"));
    }
    Ok(label)
}

pub fn service_id(template: &str, discriminator: &str) -> String {
    format!("{template}_{discriminator}")
}

pub fn project_dir(workspace: &Path, template: &str, discriminator: &str) -> PathBuf {
    workspace.join(template).join(discriminator)
}

/// Next instance number for `template`.
///
/// One past the highest of the registry's instance ids and any
/// `instance_<n>` directory already on disk, so an unlabeled instance never
/// lands in a directory an earlier instance used.
pub fn next_instance_id(registry: &ServiceMap, workspace: &Path, template: &str) -> Result<u32> {
    let from_registry = registry
        .values()
        .filter(|r| r.template == template)
        .map(|r| r.instance_id)
        .max()
        .unwrap_or(0);

    let from_disk = std::fs::read_dir(workspace.join(template))
        .into_iter()
        .flatten()
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| auto_number(&entry.file_name().to_string_lossy()))
        .max()
        .unwrap_or(0);

    from_registry
        .max(from_disk)
        .checked_add(1)
        .ok_or_else(|| RigError::InstanceIdsExhausted {
            template: template.to_string(),
        })
}

/// Discriminator for an unlabeled instance.
pub fn auto_discriminator(instance_id: u32) -> String {
    format!("{AUTO_PREFIX}{instance_id}")
}

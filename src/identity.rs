use sha2::{Digest, Sha256};
use std::path::Path;

/// Compute a registry id by hashing the given path string with SHA-256
/// and returning the first 8 hex characters.
///
/// The path is hashed as given; callers canonicalize first so the id does
/// not depend on how the path was spelled.
pub fn compute_registry_id(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let hash = hasher.finalize();
    hex::encode(&hash[..4])
}

/// Prefix shared by every container name this registry creates.
pub fn container_prefix(registry_id: &str) -> String {
    format!("svcrig-{registry_id}-")
}

/// Runtime container name for a service.
pub fn container_name(registry_id: &str, service_id: &str) -> String {
    format!("{}{}", container_prefix(registry_id), service_id)
}

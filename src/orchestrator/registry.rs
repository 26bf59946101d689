//! The durable service registry: `registry.json` in the state directory.
//!
//! Every mutation is a strict load → mutate → save cycle performed while a
//! [`RegistryGuard`] is held. The guard combines an in-process async mutex
//! with an exclusive `flock` on `registry.json.lock`, so neither a signal
//! driven teardown nor a second CLI invocation can interleave its own
//! load/save pair with ours.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::{Result, RigError};
use crate::identity::compute_registry_id;

pub const REGISTRY_FILE: &str = "registry.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Running,
    Stopped,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceStatus::Running => f.write_str("running"),
            ServiceStatus::Stopped => f.write_str("stopped"),
        }
    }
}

/// One launched instance of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// Older registries only stored the id as the map key.
    #[serde(default)]
    pub service_id: String,
    pub template: String,
    pub container_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    pub port: u16,
    pub instance_id: u32,
    pub project_dir: PathBuf,
    pub created_at: DateTime<Utc>,
    pub status: ServiceStatus,
}

pub type ServiceMap = BTreeMap<String, ServiceRecord>;

pub struct Registry {
    path: PathBuf,
    lock_path: PathBuf,
    id: String,
    mutex: Mutex<()>,
    cache: StdMutex<Option<ServiceMap>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("path", &self.path)
            .field("id", &self.id)
            .finish()
    }
}

impl Registry {
    /// Open the registry stored in `state_dir`, creating the directory if needed.
    /// The file itself is not read until first use.
    pub fn open(state_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_dir).map_err(|source| RigError::Registry {
            path: state_dir.to_path_buf(),
            source,
        })?;
        let state_dir = state_dir
            .canonicalize()
            .map_err(|source| RigError::Registry {
                path: state_dir.to_path_buf(),
                source,
            })?;
        let path = state_dir.join(REGISTRY_FILE);
        let id = compute_registry_id(&path);
        Ok(Self {
            lock_path: state_dir.join(format!("{REGISTRY_FILE}.lock")),
            path,
            id,
            mutex: Mutex::new(()),
            cache: StdMutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Short stable id of this registry, embedded in container names and labels.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Take exclusive access for a load → mutate → save cycle.
    pub async fn lock(&self) -> Result<RegistryGuard<'_>> {
        let held = self.mutex.lock().await;

        let lock_path = self.lock_path.clone();
        let file = tokio::task::spawn_blocking(move || -> io::Result<File> {
            let file = File::create(&lock_path)?;
            crate::platform::lock_exclusive(&file)?;
            Ok(file)
        })
        .await
        .map_err(|e| io::Error::other(e.to_string()))
        .and_then(|r| r)
        .map_err(|source| RigError::Registry {
            path: self.lock_path.clone(),
            source,
        })?;

        Ok(RegistryGuard {
            registry: self,
            _held: held,
            _file: file,
        })
    }

    /// The last known registry contents, loaded on first access.
    ///
    /// Suitable for display only. Anything that makes a decision (port
    /// allocation, status reconciliation) must go through [`Registry::lock`].
    pub fn snapshot(&self) -> Result<ServiceMap> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(map) = cache.as_ref() {
            return Ok(map.clone());
        }
        let map = read_registry(&self.path)?;
        *cache = Some(map.clone());
        Ok(map)
    }

    fn remember(&self, map: &ServiceMap) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        *cache = Some(map.clone());
    }
}

/// Exclusive access to the registry file. Dropping it releases both locks.
pub struct RegistryGuard<'a> {
    registry: &'a Registry,
    _held: MutexGuard<'a, ()>,
    _file: File,
}

impl RegistryGuard<'_> {
    /// Read the registry from disk. A missing file is an empty registry.
    pub fn load(&self) -> Result<ServiceMap> {
        let map = read_registry(&self.registry.path)?;
        self.registry.remember(&map);
        Ok(map)
    }

    /// Replace the registry on disk with `map`.
    pub fn save(&self, map: &ServiceMap) -> Result<()> {
        let path = &self.registry.path;
        let io_err = |source| RigError::Registry {
            path: path.clone(),
            source,
        };
        let content = serde_json::to_string_pretty(map).map_err(|e| io_err(e.into()))?;
        // Atomic write: write to tmp file then rename
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content).map_err(io_err)?;
        std::fs::rename(&tmp_path, path).map_err(io_err)?;
        self.registry.remember(map);
        debug!(path = %path.display(), services = map.len(), "registry saved");
        Ok(())
    }

    /// Insert or replace a record; returns the record it replaced.
    pub fn upsert(&self, record: ServiceRecord) -> Result<Option<ServiceRecord>> {
        let mut map = self.load()?;
        let previous = map.insert(record.service_id.clone(), record);
        self.save(&map)?;
        Ok(previous)
    }

    /// Delete a record; returns it if it existed.
    pub fn remove(&self, service_id: &str) -> Result<Option<ServiceRecord>> {
        let mut map = self.load()?;
        let previous = map.remove(service_id);
        if previous.is_some() {
            self.save(&map)?;
        }
        Ok(previous)
    }

    /// Delete every record; returns what was there.
    pub fn clear(&self) -> Result<ServiceMap> {
        let map = self.load()?;
        self.save(&ServiceMap::new())?;
        Ok(map)
    }
}

fn read_registry(path: &Path) -> Result<ServiceMap> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ServiceMap::new()),
        Err(source) => {
            return Err(RigError::Registry {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    parse_registry(&content).map_err(|reason| RigError::CorruptRegistry {
        path: path.to_path_buf(),
        reason,
    })
}

/// Parse and validate a registry document.
fn parse_registry(content: &str) -> std::result::Result<ServiceMap, String> {
    if content.trim().is_empty() {
        return Ok(ServiceMap::new());
    }

    let raw: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(content).map_err(|e| format!("not a JSON object of records: {e}"))?;

    let mut map = ServiceMap::new();
    let mut ports: HashMap<u16, String> = HashMap::new();
    for (key, value) in raw {
        let mut record: ServiceRecord =
            serde_json::from_value(value).map_err(|e| format!("record '{key}': {e}"))?;
        if record.service_id.is_empty() {
            record.service_id = key.clone();
        }
        if record.service_id != key {
            return Err(format!(
                "record '{key}' carries service_id '{}'",
                record.service_id
            ));
        }
        if let Some(other) = ports.insert(record.port, key.clone()) {
            return Err(format!(
                "records '{other}' and '{key}' both hold port {}",
                record.port
            ));
        }
        map.insert(key, record);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(id: &str, port: u16) -> ServiceRecord {
        ServiceRecord {
            service_id: id.to_string(),
            template: "buckets".to_string(),
            container_name: format!("svcrig-test-{id}"),
            container_id: Some(format!("c-{id}")),
            port,
            instance_id: 1,
            project_dir: PathBuf::from(format!("/tmp/{id}")),
            created_at: Utc::now(),
            status: ServiceStatus::Running,
        }
    }

    #[tokio::test]
    async fn missing_file_is_empty_registry() {
        let tmp = TempDir::new().unwrap();
        let registry = Registry::open(tmp.path()).unwrap();
        let guard = registry.lock().await.unwrap();
        assert!(guard.load().unwrap().is_empty());
        assert!(!registry.path().exists());
    }

    #[tokio::test]
    async fn upsert_and_remove_return_previous_state() {
        let tmp = TempDir::new().unwrap();
        let registry = Registry::open(tmp.path()).unwrap();
        let guard = registry.lock().await.unwrap();

        assert_eq!(guard.upsert(record("a", 8000)).unwrap(), None);
        let mut stopped = record("a", 8000);
        stopped.status = ServiceStatus::Stopped;
        let previous = guard.upsert(stopped).unwrap().unwrap();
        assert_eq!(previous.status, ServiceStatus::Running);

        let removed = guard.remove("a").unwrap().unwrap();
        assert_eq!(removed.status, ServiceStatus::Stopped);
        assert_eq!(guard.remove("a").unwrap(), None);
        assert!(guard.load().unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_uses_documented_shape() {
        let tmp = TempDir::new().unwrap();
        let registry = Registry::open(tmp.path()).unwrap();
        registry
            .lock()
            .await
            .unwrap()
            .upsert(record("buckets_instance_1", 8000))
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(registry.path()).unwrap()).unwrap();
        let entry = &raw["buckets_instance_1"];
        assert_eq!(entry["status"], "running");
        assert_eq!(entry["port"], 8000);
        let created = entry["created_at"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(created).is_ok(), "got: {created}");
        assert!(!tmp.path().join("registry.json.tmp").exists());
    }

    #[test]
    fn legacy_records_take_id_from_key() {
        let doc = r#"{
            "db_instance_1": {
                "template": "db",
                "container_name": "db_instance_1",
                "port": 8010,
                "instance_id": 1,
                "project_dir": "templates/db/instance_1",
                "created_at": "2024-05-01T10:00:00Z",
                "status": "stopped"
            }
        }"#;
        let map = parse_registry(doc).unwrap();
        let rec = &map["db_instance_1"];
        assert_eq!(rec.service_id, "db_instance_1");
        assert_eq!(rec.container_id, None);
        assert_eq!(rec.status, ServiceStatus::Stopped);
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(parse_registry("[1, 2]").is_err());
        assert!(parse_registry("{\"a\": {\"template\": 3}}").is_err());
        assert!(parse_registry("{\"a\": {").is_err());
    }

    #[test]
    fn rejects_key_mismatch_and_shared_ports() {
        let a = record("a", 8000);
        let mut doc = ServiceMap::new();
        doc.insert("b".into(), a.clone());
        let err = parse_registry(&serde_json::to_string(&doc).unwrap()).unwrap_err();
        assert!(err.contains("carries service_id 'a'"), "got: {err}");

        let mut doc = ServiceMap::new();
        doc.insert("a".into(), a);
        doc.insert("b".into(), record("b", 8000));
        let err = parse_registry(&serde_json::to_string(&doc).unwrap()).unwrap_err();
        assert!(err.contains("both hold port 8000"), "got: {err}");
    }

    #[tokio::test]
    async fn corrupt_file_is_reported_and_left_alone() {
        let tmp = TempDir::new().unwrap();
        let registry = Registry::open(tmp.path()).unwrap();
        std::fs::write(registry.path(), "not json").unwrap();

        let guard = registry.lock().await.unwrap();
        let err = guard.upsert(record("a", 8000)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptRegistry);
        assert_eq!(std::fs::read_to_string(registry.path()).unwrap(), "not json");
    }

    #[tokio::test]
    async fn snapshot_is_lazy_and_follows_saves() {
        let tmp = TempDir::new().unwrap();
        let registry = Registry::open(tmp.path()).unwrap();
        assert!(registry.snapshot().unwrap().is_empty());

        registry
            .lock()
            .await
            .unwrap()
            .upsert(record("a", 8000))
            .unwrap();
        assert!(registry.snapshot().unwrap().contains_key("a"));
    }

    #[tokio::test]
    async fn concurrent_mutations_do_not_lose_updates() {
        let tmp = TempDir::new().unwrap();
        let registry = Arc::new(Registry::open(tmp.path()).unwrap());

        let mut handles = Vec::new();
        for i in 0..16u16 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let guard = registry.lock().await.unwrap();
                guard.upsert(record(&format!("svc{i}"), 9000 + i)).unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let guard = registry.lock().await.unwrap();
        assert_eq!(guard.load().unwrap().len(), 16);
    }

    #[test]
    fn registry_id_depends_on_location() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let ra = Registry::open(a.path()).unwrap();
        let rb = Registry::open(b.path()).unwrap();
        assert_ne!(ra.id(), rb.id());
        assert_eq!(ra.id(), Registry::open(a.path()).unwrap().id());
    }
}

#![allow(dead_code)]
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use svcrig::catalog::TemplateCatalog;
use svcrig::orchestrator::ports::PortProbe;
use svcrig::orchestrator::registry::Registry;
use svcrig::orchestrator::{Orchestrator, OrchestratorSettings};
use svcrig::runtime::memory::MemoryRuntime;
use tempfile::TempDir;

/// OS probe whose busy ports are set by the test.
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    busy: Mutex<BTreeSet<u16>>,
}

impl ScriptedProbe {
    pub fn occupy(&self, port: u16) {
        self.busy.lock().unwrap().insert(port);
    }

    pub fn release(&self, port: u16) {
        self.busy.lock().unwrap().remove(&port);
    }
}

impl PortProbe for ScriptedProbe {
    fn is_free(&self, port: u16) -> bool {
        !self.busy.lock().unwrap().contains(&port)
    }
}

/// A registry in a scratch directory wired to an in-memory runtime.
pub struct Fixture {
    pub dir: TempDir,
    pub runtime: Arc<MemoryRuntime>,
    pub probe: Arc<ScriptedProbe>,
    pub orchestrator: Arc<Orchestrator>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let runtime = Arc::new(MemoryRuntime::new());
        let probe = Arc::new(ScriptedProbe::default());
        let orchestrator = Arc::new(build(dir.path(), &runtime, &probe));
        Self {
            dir,
            runtime,
            probe,
            orchestrator,
        }
    }

    /// A second orchestrator over the same registry file and runtime, as a
    /// separate CLI invocation would see it.
    pub fn reopen(&self) -> Orchestrator {
        build(self.dir.path(), &self.runtime, &self.probe)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    pub fn workspace(&self) -> PathBuf {
        self.dir.path().join("templates")
    }

    pub fn registry_file(&self) -> PathBuf {
        self.orchestrator.registry().path().to_path_buf()
    }
}

fn build(root: &Path, runtime: &Arc<MemoryRuntime>, probe: &Arc<ScriptedProbe>) -> Orchestrator {
    let registry = Registry::open(&root.join("state")).unwrap();
    Orchestrator::new(
        Arc::new(TemplateCatalog::builtin()),
        Arc::new(registry),
        runtime.clone(),
        probe.clone(),
        OrchestratorSettings::new(root.join("templates")),
    )
}

/// The `svcrig` binary running in `dir` with no inherited config.
pub fn svcrig(dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(env!("CARGO_BIN_EXE_svcrig"));
    cmd.current_dir(dir)
        .env_remove("SVCRIG_CONFIG")
        .env("RUST_LOG", "warn");
    cmd
}

pub async fn wait_for_port(port: u16, timeout: std::time::Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if std::net::TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    false
}

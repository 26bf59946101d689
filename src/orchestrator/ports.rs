//! Lowest-free-port search across the registry, the container runtime and
//! the operating system.

use std::collections::BTreeSet;
use std::net::TcpListener;

use tracing::{debug, warn};

use crate::error::{Result, RigError};
use crate::runtime::ContainerRuntime;

/// Direct OS-level check that a port can be bound.
pub trait PortProbe: Send + Sync {
    fn is_free(&self, port: u16) -> bool;
}

/// Binds `127.0.0.1:<port>` and releases it immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpProbe;

impl PortProbe for TcpProbe {
    fn is_free(&self, port: u16) -> bool {
        TcpListener::bind(("127.0.0.1", port)).is_ok()
    }
}

/// Identify which process owns a given port.
pub fn identify_port_owner(port: u16) -> Option<String> {
    crate::platform::identify_port_owner(port)
}

/// Which of the three checks turned a candidate port down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Registry,
    Runtime,
    Os,
}

pub struct PortAllocator<'a> {
    probe: &'a dyn PortProbe,
}

impl<'a> PortAllocator<'a> {
    pub fn new(probe: &'a dyn PortProbe) -> Self {
        Self { probe }
    }

    /// Find the lowest port at or above `start` that no registry record holds,
    /// no container publishes, and the OS lets us bind.
    ///
    /// The port is not reserved; the caller must persist a record using it
    /// before releasing the registry lock.
    pub async fn allocate(
        &self,
        start: u16,
        registry_ports: &BTreeSet<u16>,
        runtime: &dyn ContainerRuntime,
    ) -> Result<u16> {
        let runtime_ports = match runtime.list_active_port_bindings().await {
            Ok(ports) => ports,
            Err(e) => {
                warn!(error = %e, "could not list runtime port bindings, relying on OS probe");
                BTreeSet::new()
            }
        };

        for port in start.max(1)..=u16::MAX {
            match self.check(port, registry_ports, &runtime_ports) {
                None => {
                    debug!(port, start, "allocated port");
                    return Ok(port);
                }
                Some(Rejection::Os) => {
                    debug!(
                        port,
                        owner = identify_port_owner(port).as_deref().unwrap_or("unknown"),
                        "port in use outside svcrig"
                    );
                }
                Some(reason) => debug!(port, ?reason, "port taken"),
            }
        }

        Err(RigError::ResourceExhausted { start })
    }

    fn check(
        &self,
        port: u16,
        registry_ports: &BTreeSet<u16>,
        runtime_ports: &BTreeSet<u16>,
    ) -> Option<Rejection> {
        if registry_ports.contains(&port) {
            Some(Rejection::Registry)
        } else if runtime_ports.contains(&port) {
            Some(Rejection::Runtime)
        } else if !self.probe.is_free(port) {
            Some(Rejection::Os)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::runtime::memory::MemoryRuntime;
    use std::sync::Mutex;

    /// Probe reporting a fixed set of ports as bound, recording what it was asked.
    #[derive(Default)]
    struct ScriptedProbe {
        busy: BTreeSet<u16>,
        asked: Mutex<Vec<u16>>,
    }

    impl PortProbe for ScriptedProbe {
        fn is_free(&self, port: u16) -> bool {
            self.asked.lock().unwrap().push(port);
            !self.busy.contains(&port)
        }
    }

    #[tokio::test]
    async fn first_free_port_is_the_start() {
        let probe = ScriptedProbe::default();
        let runtime = MemoryRuntime::new();
        let port = PortAllocator::new(&probe)
            .allocate(8000, &BTreeSet::new(), &runtime)
            .await
            .unwrap();
        assert_eq!(port, 8000);
    }

    #[tokio::test]
    async fn each_layer_rejects_its_own_ports() {
        let probe = ScriptedProbe {
            busy: BTreeSet::from([8002]),
            ..Default::default()
        };
        let runtime = MemoryRuntime::new();
        runtime.bind_external_port(8001);
        let registry = BTreeSet::from([8000]);

        let port = PortAllocator::new(&probe)
            .allocate(8000, &registry, &runtime)
            .await
            .unwrap();
        assert_eq!(port, 8003);
        // Registry and runtime hits never reach the OS probe.
        assert_eq!(*probe.asked.lock().unwrap(), vec![8002, 8003]);
    }

    #[tokio::test]
    async fn runtime_listing_failure_falls_back_to_probe() {
        let probe = ScriptedProbe::default();
        let runtime = MemoryRuntime::new();
        runtime.fail_port_listing(true);
        let port = PortAllocator::new(&probe)
            .allocate(8010, &BTreeSet::new(), &runtime)
            .await
            .unwrap();
        assert_eq!(port, 8010);
    }

    #[tokio::test]
    async fn exhausted_range_is_an_error() {
        let probe = ScriptedProbe {
            busy: BTreeSet::from([65534]),
            ..Default::default()
        };
        let runtime = MemoryRuntime::new();
        let registry = BTreeSet::from([65535]);
        let err = PortAllocator::new(&probe)
            .allocate(65534, &registry, &runtime)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    }

    #[tokio::test]
    async fn start_zero_scans_from_one() {
        let probe = ScriptedProbe::default();
        let runtime = MemoryRuntime::new();
        let port = PortAllocator::new(&probe)
            .allocate(0, &BTreeSet::new(), &runtime)
            .await
            .unwrap();
        assert_eq!(port, 1);
    }

    #[test]
    fn tcp_probe_sees_bound_port() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(!TcpProbe.is_free(port));
    }
}

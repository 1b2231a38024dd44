//! The per-actor-identity container: registries, hardware handle, frame
//! sink, and the distributed relay portals of one LACP system.

use crate::drcp::PortalHandle;
use crate::event::PortEvent;
use crate::registry::Registry;
use sonic_lacp_sai::LagSaiApi;
use sonic_lacp_types::{MacAddress, SystemId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// Where outgoing frames go. The daemon wires a real packet interface
/// here; tests wire the simulation bridge.
pub trait FrameIo: Send + Sync {
    /// Queues a frame for transmission on `port`. Must not block.
    fn transmit(&self, port: u16, frame: Vec<u8>);
}

/// Frame sink that drops everything; for running without links.
#[derive(Debug, Default)]
pub struct NullFrameIo;

impl FrameIo for NullFrameIo {
    fn transmit(&self, port: u16, frame: Vec<u8>) {
        trace!(port, len = frame.len(), "frame dropped (no link interface)");
    }
}

struct SystemInner {
    id: SystemId,
    registry: Registry,
    sai: Arc<dyn LagSaiApi>,
    io: Arc<dyn FrameIo>,
    portals: Mutex<HashMap<String, PortalHandle>>,
    /// Intra-portal link port -> owning portal, for frame routing.
    ipp_ports: Mutex<HashMap<u16, PortalHandle>>,
}

/// One LACP system (actor identity). Cheap to clone; all clones share the
/// same registries and actors.
#[derive(Clone)]
pub struct LacpSystem {
    inner: Arc<SystemInner>,
}

impl LacpSystem {
    pub fn new(
        priority: u16,
        mac: MacAddress,
        sai: Arc<dyn LagSaiApi>,
        io: Arc<dyn FrameIo>,
    ) -> Self {
        LacpSystem {
            inner: Arc::new(SystemInner {
                id: SystemId::new(priority, mac),
                registry: Registry::new(),
                sai,
                io,
                portals: Mutex::new(HashMap::new()),
                ipp_ports: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn system_id(&self) -> SystemId {
        self.inner.id
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub(crate) fn sai(&self) -> &Arc<dyn LagSaiApi> {
        &self.inner.sai
    }

    pub(crate) fn io(&self) -> &Arc<dyn FrameIo> {
        &self.inner.io
    }

    pub(crate) fn insert_portal(&self, name: String, handle: PortalHandle, ipp_port: u16) {
        self.inner.portals.lock().unwrap().insert(name, handle.clone());
        self.inner.ipp_ports.lock().unwrap().insert(ipp_port, handle);
    }

    pub(crate) fn remove_portal(&self, name: &str) -> Option<PortalHandle> {
        let handle = self.inner.portals.lock().unwrap().remove(name)?;
        self.inner
            .ipp_ports
            .lock()
            .unwrap()
            .retain(|_, h| !h.same_portal(&handle));
        Some(handle)
    }

    pub(crate) fn portal(&self, name: &str) -> Option<PortalHandle> {
        self.inner.portals.lock().unwrap().get(name).cloned()
    }

    pub fn portal_count(&self) -> usize {
        self.inner.portals.lock().unwrap().len()
    }

    pub fn aggregator_count(&self) -> usize {
        self.inner.registry.aggregator_count()
    }

    pub fn port_count(&self) -> usize {
        self.inner.registry.port_count()
    }

    /// Entry point for the packet path: a raw frame arrived on `port`.
    ///
    /// Frames on intra-portal links go to the owning portal; everything
    /// else goes to the port actor. Frames for unknown ports are dropped.
    pub fn deliver_frame(&self, port: u16, frame: &[u8]) {
        if let Some(portal) = self.inner.ipp_ports.lock().unwrap().get(&port).cloned() {
            portal.deliver_frame(port, frame.to_vec());
            return;
        }
        match self.inner.registry.port_handle(port) {
            Some(handle) => handle.send(PortEvent::Frame(frame.to_vec())),
            None => debug!(port, "frame for unknown port dropped"),
        }
    }
}

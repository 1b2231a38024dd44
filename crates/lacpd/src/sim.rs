//! In-process frame bridge for two-party protocol simulation.
//!
//! Wires ports of one [`LacpSystem`] to ports of another so the full
//! LACP/DRCP exchange runs without links. Integration tests use this for
//! the convergence scenarios; a cut link models a silent partner.

use crate::system::{FrameIo, LacpSystem};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::trace;

struct Peer {
    system: LacpSystem,
    port: u16,
}

/// One side's frame sink: every local port maps to a peer system/port.
#[derive(Default)]
pub struct SimEndpoint {
    peers: Mutex<HashMap<u16, Peer>>,
}

impl SimEndpoint {
    pub fn new() -> Self {
        SimEndpoint::default()
    }

    /// Wires `local_port` to `peer_port` on `peer`. Frames transmitted on
    /// an unwired port are dropped, like a dark fiber.
    pub fn connect(&self, local_port: u16, peer: LacpSystem, peer_port: u16) {
        self.peers.lock().unwrap().insert(
            local_port,
            Peer {
                system: peer,
                port: peer_port,
            },
        );
    }

    /// Cuts the wire: subsequent frames from `local_port` vanish.
    pub fn disconnect(&self, local_port: u16) {
        self.peers.lock().unwrap().remove(&local_port);
    }
}

impl FrameIo for SimEndpoint {
    fn transmit(&self, port: u16, frame: Vec<u8>) {
        let peers = self.peers.lock().unwrap();
        match peers.get(&port) {
            Some(peer) => peer.system.deliver_frame(peer.port, &frame),
            None => trace!(port, "frame dropped on unwired simulation port"),
        }
    }
}

//! Addressing information for a remote host that receives input events.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

/// Default TCP port of the reliable (control) channel on the host.
pub const DEFAULT_RELIABLE_PORT: u16 = 2855;

/// Default UDP port hosts listen on for discovery probes.
pub const DEFAULT_DISCOVERY_PORT: u16 = 2856;

/// A host that can be connected to.
///
/// Identity is `(address, reliable_port, unreliable_port)`.  The `name` is
/// advertised by the host and purely informational: two peers that differ only
/// in name compare equal and hash identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerAddress {
    address: IpAddr,
    reliable_port: u16,
    unreliable_port: u16,
    name: String,
}

impl PeerAddress {
    pub fn new(
        address: IpAddr,
        reliable_port: u16,
        unreliable_port: u16,
        name: impl Into<String>,
    ) -> Self {
        Self {
            address,
            reliable_port,
            unreliable_port,
            name: name.into(),
        }
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn reliable_port(&self) -> u16 {
        self.reliable_port
    }

    pub fn unreliable_port(&self) -> u16 {
        self.unreliable_port
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Socket address of the reliable (TCP) channel.
    pub fn reliable_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.reliable_port)
    }

    /// Socket address of the unreliable (UDP) channel.
    pub fn unreliable_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.unreliable_port)
    }
}

impl PartialEq for PeerAddress {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
            && self.reliable_port == other.reliable_port
            && self.unreliable_port == other.unreliable_port
    }
}

impl Eq for PeerAddress {}

impl Hash for PeerAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
        self.reliable_port.hash(state);
        self.unreliable_port.hash(state);
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, tcp {}, udp {})",
            self.name, self.address, self.reliable_port, self.unreliable_port
        )
    }
}

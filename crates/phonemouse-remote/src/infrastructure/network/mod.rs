//! Network infrastructure: LAN discovery and the dual-channel session.
//!
//! - [`discovery`] finds hosts by broadcasting probes on every interface.
//! - [`interfaces`] lists the interfaces discovery probes from.
//! - [`session`] opens and drives the TCP + UDP channel pair to one host.

pub mod discovery;
pub mod interfaces;
pub mod session;

pub use discovery::{DiscoveryConfig, DiscoveryEngine, DiscoveryError, DiscoveryRun};
pub use interfaces::{InterfaceProvider, ProbeInterface, StaticInterfaces, SystemInterfaces};
pub use session::{Channel, Connector, NetworkConnector, NetworkSession, Session, TransportError};

//! Domain entities for PhoneMouse.
//!
//! Pure data types with no socket or OS dependencies, shared by the discovery
//! engine, the transport session and the connection controller.

/// Addressing of a remote host; see [`peer::PeerAddress`].
pub mod peer;

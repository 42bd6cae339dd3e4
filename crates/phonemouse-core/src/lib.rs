//! # phonemouse-core
//!
//! Shared library for PhoneMouse containing the wire protocol codec and the
//! domain types that describe remote hosts.
//!
//! A handheld device streams input events (mode switches, gravity samples,
//! button edges, touch frames) to a paired host.  This crate defines how those
//! events look on the wire and has no dependency on sockets or runtimes.
//!
//! - **`protocol`** – Packet types and the little-endian binary codec.  Every
//!   frame is a one-byte identifier followed by a fixed-size or
//!   length-prefixed payload.
//!
//! - **`domain`** – [`PeerAddress`], the identity of a host found by discovery
//!   and used to open a connection.

pub mod domain;
pub mod protocol;

pub use domain::peer::{PeerAddress, DEFAULT_DISCOVERY_PORT, DEFAULT_RELIABLE_PORT};
pub use protocol::codec::{decode_frame, encode_frame, FrameDefect, ProtocolError};
pub use protocol::messages::{
    ControllerMode, GravitySample, KeyPacket, MouseButton, Packet, PacketIdentifier, TouchPoint,
};
pub use protocol::reader::FrameReader;

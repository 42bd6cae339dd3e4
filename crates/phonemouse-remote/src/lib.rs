//! phonemouse-remote library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the remote do? (for beginners)
//!
//! The *remote* is the handheld side of PhoneMouse.  It turns a phone into a
//! pointing device for a nearby computer (the *host*):
//!
//! 1. **Discover** – broadcast a one-byte probe on every LAN interface and
//!    collect the hosts that answer.
//! 2. **Connect** – open a TCP stream (reliable channel) and a UDP socket
//!    (unreliable channel) to the chosen host, and tell it to start in
//!    `Idle` mode.
//! 3. **Stream** – encode input events with the `phonemouse-core` codec:
//!    button presses go over TCP so none are lost; gravity and touch samples
//!    go over UDP because only the newest one matters.
//! 4. **Switch modes** – tell the host how to interpret the stream
//!    (gravity pointer, touchpad, tablet, mouse).
//!
//! Sensor sampling and gesture screens live outside this crate; they talk to
//! [`application::RemoteControl`].

/// Application layer: connection state machine and producer-facing API.
pub mod application;

/// Infrastructure layer: sockets, interface enumeration, configuration.
pub mod infrastructure;

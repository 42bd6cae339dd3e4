//! Infrastructure layer for the remote.
//!
//! Contains the OS-facing adapters: sockets for discovery and sessions, the
//! interface enumerator, and the TOML configuration file.
//!
//! **Dependency rule**: this layer may depend on `phonemouse_core`, but the
//! `application` layer only reaches it through the [`network::Connector`] and
//! [`network::Session`] traits and the discovery engine.
//!
//! # Sub-modules
//!
//! - **`network`** – UDP broadcast discovery, interface enumeration and the
//!   TCP + UDP transport session.
//! - **`storage`** – read-only `config.toml` loading with serde defaults.

pub mod network;
pub mod storage;

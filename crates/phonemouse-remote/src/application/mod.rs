//! Application layer use cases for the remote.
//!
//! - **`input_event`** – the events producers hand over (button edges,
//!   gravity samples, touch contacts) and the channel each one travels on.
//!
//! - **`connection_controller`** – the `Disconnected / Connecting /
//!   Connected` state machine.  Owns the session and the current mode.
//!
//! - **`remote_control`** – the producer-facing facade: discovery with a
//!   single-run guard, connection operations, and fire-and-forget variants.
//!
//! This layer depends on `infrastructure::network` only through the
//! `Connector` / `Session` traits and the discovery engine, so every use case
//! is testable with in-memory doubles.

pub mod connection_controller;
pub mod input_event;
pub mod remote_control;

pub use connection_controller::{
    ConnectionController, ConnectionStatus, ControllerError, Dispatch, StateKind,
};
pub use input_event::InputEvent;
pub use remote_control::RemoteControl;

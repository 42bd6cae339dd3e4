//! ConnectionController: owns the connection to the selected host.
//!
//! The controller is a three-state machine:
//!
//! ```text
//!              connect(peer)                 session open + Idle sent
//! Disconnected ────────────► Connecting(peer) ─────────────────────────► Connected
//!      ▲                          │  open/send failed,                      │
//!      │                          │  or disconnect()                        │
//!      └──────────────────────────┴─────────────── disconnect() ────────────┘
//! ```
//!
//! While connected it turns [`InputEvent`]s into frames and writes them to
//! the session: button edges on the reliable channel, gravity and touch on
//! the unreliable one.  It also remembers the last mode the host accepted.
//!
//! # Locking
//!
//! The state lives behind a short-held mutex.  Every send clones the session
//! `Arc` out of the state and releases the lock before doing I/O, so a slow
//! socket never blocks `disconnect()`.  Mode switches additionally hold a
//! dedicated lock so two `set_mode` calls cannot reorder their frames and
//! their state updates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use phonemouse_core::{encode_frame, ControllerMode, MouseButton, Packet, PeerAddress};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::input_event::InputEvent;
use crate::infrastructure::network::{Channel, Connector, Session, TransportError};

/// Errors returned by controller operations.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// `disconnect()` or a newer `connect()` superseded this attempt.
    #[error("connect to {0} was cancelled")]
    Cancelled(PeerAddress),
}

/// Outcome of a send that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The frame was handed to the session.
    Sent,
    /// There is no connected session; nothing was sent.
    NotConnected,
}

/// Name of the controller state, as reported by [`ConnectionStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    Disconnected,
    Connecting,
    Connected,
}

/// Immutable snapshot of the controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStatus {
    pub state: StateKind,
    pub peer: Option<PeerAddress>,
    pub mode: Option<ControllerMode>,
    /// Time since the connection was established.
    pub connected_for: Option<Duration>,
}

struct Connection {
    peer: PeerAddress,
    session: Arc<dyn Session>,
    mode: ControllerMode,
    since: Instant,
}

enum ConnectionState {
    Disconnected,
    Connecting { peer: PeerAddress, attempt: u64 },
    Connected(Connection),
}

/// Drives one connection at a time.
pub struct ConnectionController {
    connector: Arc<dyn Connector>,
    state: Mutex<ConnectionState>,
    mode_lock: Mutex<()>,
    attempts: AtomicU64,
}

impl ConnectionController {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            state: Mutex::new(ConnectionState::Disconnected),
            mode_lock: Mutex::new(()),
            attempts: AtomicU64::new(0),
        }
    }

    /// Opens a session to `peer` and announces [`ControllerMode::Idle`].
    ///
    /// Any existing connection is closed first.  No retries are made.
    ///
    /// # Errors
    ///
    /// - [`ControllerError::Transport`] if the session cannot be opened or
    ///   the initial mode frame cannot be written.  The state is back to
    ///   `Disconnected`.
    /// - [`ControllerError::Cancelled`] if `disconnect()` (or another
    ///   `connect()`) ran while this attempt was in progress.  The late
    ///   session is closed.
    pub async fn connect(&self, peer: PeerAddress) -> Result<(), ControllerError> {
        let initial = encode_frame(&Packet::SwitchMode(ControllerMode::Idle))
            .map_err(TransportError::from)?;
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        // Claim the state and evict the previous owner in one critical
        // section; a concurrent connect can then only supersede this one.
        let previous = {
            let mut state = self.state.lock().await;
            std::mem::replace(
                &mut *state,
                ConnectionState::Connecting {
                    peer: peer.clone(),
                    attempt,
                },
            )
        };
        release(previous).await;
        info!(peer = %peer, "connecting");

        let session = match self.connector.open(&peer).await {
            Ok(session) => session,
            Err(e) => {
                warn!(peer = %peer, "connect failed: {e}");
                self.abandon(attempt).await;
                return Err(e.into());
            }
        };

        if let Err(e) = session.send_reliable(&initial).await {
            warn!(peer = %peer, "initial mode switch failed: {e}");
            session.close().await;
            self.abandon(attempt).await;
            return Err(e.into());
        }

        let mut state = self.state.lock().await;
        if is_attempt(&state, attempt) {
            info!(peer = %peer, "connected");
            *state = ConnectionState::Connected(Connection {
                peer,
                session,
                mode: ControllerMode::Idle,
                since: Instant::now(),
            });
            return Ok(());
        }
        drop(state);

        debug!(peer = %peer, "connect superseded; closing late session");
        session.close().await;
        Err(ControllerError::Cancelled(peer))
    }

    /// Closes the current session, if any, and returns to `Disconnected`.
    /// A connect in progress is cancelled.
    pub async fn disconnect(&self) {
        let previous = {
            let mut state = self.state.lock().await;
            std::mem::replace(&mut *state, ConnectionState::Disconnected)
        };
        release(previous).await;
    }

    /// Switches the host to `mode` over the reliable channel.
    ///
    /// The stored mode changes only after the frame was written.
    pub async fn set_mode(&self, mode: ControllerMode) -> Result<Dispatch, ControllerError> {
        let _serialized = self.mode_lock.lock().await;
        let Some(session) = self.current_session().await else {
            debug!(%mode, "not connected; mode switch dropped");
            return Ok(Dispatch::NotConnected);
        };

        let frame = encode_frame(&Packet::SwitchMode(mode)).map_err(TransportError::from)?;
        if let Err(e) = session.send_reliable(&frame).await {
            warn!(%mode, "mode switch failed: {e}");
            return Err(e.into());
        }

        let mut state = self.state.lock().await;
        if let ConnectionState::Connected(conn) = &mut *state {
            if Arc::ptr_eq(&conn.session, &session) {
                conn.mode = mode;
                info!(%mode, "mode switched");
            }
        }
        Ok(Dispatch::Sent)
    }

    /// Encodes `event` and writes it to the channel its kind uses.
    pub async fn send(&self, event: InputEvent) -> Result<Dispatch, ControllerError> {
        let Some(session) = self.current_session().await else {
            return Ok(Dispatch::NotConnected);
        };

        let channel = event.channel();
        let frame = encode_frame(&event.into_packet()).map_err(TransportError::from)?;
        match channel {
            Channel::Reliable => session.send_reliable(&frame).await?,
            Channel::Unreliable => session.send_unreliable(&frame).await?,
        }
        Ok(Dispatch::Sent)
    }

    /// Sends a press followed by a release of `button`.  If the press fails
    /// the release is not attempted.
    pub async fn click(&self, button: MouseButton) -> Result<Dispatch, ControllerError> {
        match self.send(InputEvent::press(button)).await? {
            Dispatch::Sent => self.send(InputEvent::release(button)).await,
            Dispatch::NotConnected => Ok(Dispatch::NotConnected),
        }
    }

    /// Current mode, or `None` when not connected.
    pub async fn mode(&self) -> Option<ControllerMode> {
        match &*self.state.lock().await {
            ConnectionState::Connected(conn) => Some(conn.mode),
            _ => None,
        }
    }

    pub async fn status(&self) -> ConnectionStatus {
        match &*self.state.lock().await {
            ConnectionState::Disconnected => ConnectionStatus {
                state: StateKind::Disconnected,
                peer: None,
                mode: None,
                connected_for: None,
            },
            ConnectionState::Connecting { peer, .. } => ConnectionStatus {
                state: StateKind::Connecting,
                peer: Some(peer.clone()),
                mode: None,
                connected_for: None,
            },
            ConnectionState::Connected(conn) => ConnectionStatus {
                state: StateKind::Connected,
                peer: Some(conn.peer.clone()),
                mode: Some(conn.mode),
                connected_for: Some(conn.since.elapsed()),
            },
        }
    }

    async fn current_session(&self) -> Option<Arc<dyn Session>> {
        match &*self.state.lock().await {
            ConnectionState::Connected(conn) => Some(Arc::clone(&conn.session)),
            _ => None,
        }
    }

    /// Returns to `Disconnected` unless a newer attempt already took over.
    async fn abandon(&self, attempt: u64) {
        let mut state = self.state.lock().await;
        if is_attempt(&state, attempt) {
            *state = ConnectionState::Disconnected;
        }
    }
}

/// Closes whatever a state transition evicted.  Runs outside the state lock.
async fn release(previous: ConnectionState) {
    match previous {
        ConnectionState::Connected(conn) => {
            conn.session.close().await;
            info!(peer = %conn.peer, uptime = ?conn.since.elapsed(), "disconnected");
        }
        ConnectionState::Connecting { peer, .. } => {
            info!(peer = %peer, "pending connect cancelled");
        }
        ConnectionState::Disconnected => {}
    }
}

fn is_attempt(state: &ConnectionState, attempt: u64) -> bool {
    matches!(state, ConnectionState::Connecting { attempt: current, .. } if *current == attempt)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

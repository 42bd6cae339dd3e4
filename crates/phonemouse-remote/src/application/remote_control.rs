//! RemoteControl: the API that input producers and screens talk to.
//!
//! Bundles the discovery engine and the connection controller behind one
//! handle:
//!
//! - only one discovery run may be active at a time;
//! - every controller operation is available both awaited and as an
//!   `*_in_background` variant that spawns onto the Tokio runtime, so a
//!   sensor or gesture callback never waits on a socket.
//!
//! Background variants log failures instead of returning them.  Two
//! background sends are independent tasks, so their relative order is not
//! guaranteed; producers that need ordering await the plain variants.

use std::sync::Arc;

use phonemouse_core::{ControllerMode, MouseButton, PeerAddress};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::connection_controller::{
    ConnectionController, ConnectionStatus, ControllerError, Dispatch,
};
use super::input_event::InputEvent;
use crate::infrastructure::network::{
    Connector, DiscoveryEngine, DiscoveryError, DiscoveryRun, NetworkConnector,
};
use crate::infrastructure::storage::config::AppConfig;

#[derive(Clone)]
pub struct RemoteControl {
    discovery: DiscoveryEngine,
    discovery_slot: Arc<Semaphore>,
    controller: Arc<ConnectionController>,
}

impl RemoteControl {
    pub fn new(discovery: DiscoveryEngine, connector: Arc<dyn Connector>) -> Self {
        Self {
            discovery,
            discovery_slot: Arc::new(Semaphore::new(1)),
            controller: Arc::new(ConnectionController::new(connector)),
        }
    }

    /// Production wiring: system interfaces and socket-backed sessions,
    /// parameterised from the configuration file.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            DiscoveryEngine::with_system_interfaces(config.discovery.to_discovery_config()),
            Arc::new(NetworkConnector::new(config.connection.connect_timeout())),
        )
    }

    pub fn controller(&self) -> &Arc<ConnectionController> {
        &self.controller
    }

    /// Starts a discovery run.
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::AlreadyRunning`] while a previous run has neither
    /// finished nor been dropped, and whatever the engine reports.
    pub async fn discover(&self) -> Result<DiscoveryRun, DiscoveryError> {
        let permit = Arc::clone(&self.discovery_slot)
            .try_acquire_owned()
            .map_err(|_| DiscoveryError::AlreadyRunning)?;
        let run = self.discovery.discover().await?;
        Ok(run.hold(permit))
    }

    pub async fn connect(&self, peer: PeerAddress) -> Result<(), ControllerError> {
        self.controller.connect(peer).await
    }

    pub async fn disconnect(&self) {
        self.controller.disconnect().await
    }

    pub async fn set_mode(&self, mode: ControllerMode) -> Result<Dispatch, ControllerError> {
        self.controller.set_mode(mode).await
    }

    pub async fn send(&self, event: InputEvent) -> Result<Dispatch, ControllerError> {
        self.controller.send(event).await
    }

    /// Press + release of `button` on the reliable channel.
    pub async fn click(&self, button: MouseButton) -> Result<Dispatch, ControllerError> {
        self.controller.click(button).await
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.controller.status().await
    }

    // ── Fire-and-forget variants ──────────────────────────────────────────────

    pub fn connect_in_background(&self, peer: PeerAddress) -> JoinHandle<()> {
        let controller = Arc::clone(&self.controller);
        tokio::spawn(async move {
            if let Err(e) = controller.connect(peer).await {
                warn!("background connect failed: {e}");
            }
        })
    }

    pub fn disconnect_in_background(&self) -> JoinHandle<()> {
        let controller = Arc::clone(&self.controller);
        tokio::spawn(async move { controller.disconnect().await })
    }

    pub fn set_mode_in_background(&self, mode: ControllerMode) -> JoinHandle<()> {
        let controller = Arc::clone(&self.controller);
        tokio::spawn(async move { log_dispatch("set_mode", controller.set_mode(mode).await) })
    }

    pub fn send_in_background(&self, event: InputEvent) -> JoinHandle<()> {
        let controller = Arc::clone(&self.controller);
        tokio::spawn(async move { log_dispatch("send", controller.send(event).await) })
    }

    pub fn click_in_background(&self, button: MouseButton) -> JoinHandle<()> {
        let controller = Arc::clone(&self.controller);
        tokio::spawn(async move { log_dispatch("click", controller.click(button).await) })
    }
}

fn log_dispatch(operation: &str, result: Result<Dispatch, ControllerError>) {
    match result {
        Ok(Dispatch::Sent) => {}
        Ok(Dispatch::NotConnected) => debug!(operation, "dropped: not connected"),
        Err(e) => warn!("background {operation} failed: {e}"),
    }
}

//! UDP broadcast probe-and-listen discovery.
//!
//! Hosts that accept PhoneMouse connections listen on the discovery port
//! (default 2856).  To find them the remote:
//!
//! 1. Binds one UDP socket per IPv4 interface.
//! 2. Sends `probe_count` single-byte probes (`0x04`) to the interface's
//!    broadcast address, `interval` apart.
//! 3. Meanwhile listens on the same socket.  Each host answers the probe
//!    with a short datagram; the envelope gives us its address and the
//!    source port it answered from (which becomes the unreliable port).
//! 4. Stops listening on an interface one `interval` after its last probe.
//!
//! Answers are de-duplicated across all interfaces and every new peer is
//! delivered as soon as it arrives.
//!
//! # Response format
//!
//! ```text
//! minimal:   [0x04]
//! extended:  [0x04][reliable_port: u16 LE][name_len: u8][name: name_len bytes UTF-8]
//! ```
//!
//! A minimal answer uses the configured default reliable port and the
//! sender's IP as the name.  Anything else is ignored.
//!
//! # Cancellation
//!
//! Each run holds a `watch` channel.  [`DiscoveryRun::close`] (or dropping
//! the run) flips it; probers blocked in their inter-probe sleep wake up,
//! signal their listener, and every blocked `recv_from` is abandoned through
//! `tokio::select!`.  Nothing polls a flag.

use std::collections::HashSet;
use std::io;
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use phonemouse_core::{PeerAddress, DEFAULT_DISCOVERY_PORT, DEFAULT_RELIABLE_PORT};
use thiserror::Error;
use tokio::{
    net::UdpSocket,
    sync::{mpsc, watch, OwnedSemaphorePermit},
    task::JoinSet,
    time,
};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::interfaces::{InterfaceProvider, ProbeInterface, SystemInterfaces};

/// Payload of a probe datagram, and first byte of every valid answer.
pub const PROBE_SENTINEL: u8 = 4;

/// Fixed part of an extended answer: sentinel, port, name length.
const EXTENDED_HEADER_LEN: usize = 4;

/// Errors from the discovery subsystem.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The OS interface list could not be read.
    #[error("could not enumerate network interfaces: {0}")]
    Interfaces(#[source] io::Error),

    /// A per-interface socket could not be bound.  Other interfaces continue.
    #[error("failed to bind discovery socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// A listener stopped waiting for answers.  This is how every run ends.
    #[error("listener on {interface} interrupted")]
    Interrupted { interface: String },

    /// A second run was requested while one is still active.
    #[error("a discovery run is already in progress")]
    AlreadyRunning,
}

// ── Configuration ─────────────────────────────────────────────────────────────

/// Parameters of a discovery run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// UDP port hosts listen on for probes.
    pub port: u16,
    /// Number of probes sent per interface.
    pub probe_count: u32,
    /// Gap after each probe.
    pub interval: Duration,
    /// Reliable port assumed for hosts that send a minimal answer.
    pub default_reliable_port: u16,
    /// Receive buffer size in bytes; longer datagrams are truncated and then
    /// rejected by the length check.
    pub response_buffer: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_DISCOVERY_PORT,
            probe_count: 5,
            interval: Duration::from_millis(1000),
            default_reliable_port: DEFAULT_RELIABLE_PORT,
            response_buffer: 512,
        }
    }
}

impl DiscoveryConfig {
    /// Upper bound on how long a run lasts when nobody closes it.
    /// Saturates at `Duration::MAX` for absurd configurations.
    pub fn window(&self) -> Duration {
        self.interval.saturating_mul(self.probe_count)
    }
}

// ── Response parsing ──────────────────────────────────────────────────────────

/// Turns an answer datagram into a peer, or `None` if it is not a valid answer.
pub fn parse_response(
    datagram: &[u8],
    source: SocketAddr,
    default_reliable_port: u16,
) -> Option<PeerAddress> {
    if source.port() == 0 || datagram.first() != Some(&PROBE_SENTINEL) {
        return None;
    }
    let address = source.ip();

    if datagram.len() == 1 {
        return Some(PeerAddress::new(
            address,
            default_reliable_port,
            source.port(),
            address.to_string(),
        ));
    }

    if datagram.len() < EXTENDED_HEADER_LEN {
        return None;
    }
    let reliable_port = u16::from_le_bytes([datagram[1], datagram[2]]);
    let name_len = datagram[3] as usize;
    if reliable_port == 0 || datagram.len() != EXTENDED_HEADER_LEN + name_len {
        return None;
    }
    let name = std::str::from_utf8(&datagram[EXTENDED_HEADER_LEN..]).ok()?;
    let name = if name.is_empty() {
        address.to_string()
    } else {
        name.to_string()
    };
    Some(PeerAddress::new(address, reliable_port, source.port(), name))
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// Starts discovery runs.
#[derive(Clone)]
pub struct DiscoveryEngine {
    config: DiscoveryConfig,
    interfaces: Arc<dyn InterfaceProvider>,
}

impl DiscoveryEngine {
    pub fn new(config: DiscoveryConfig, interfaces: Arc<dyn InterfaceProvider>) -> Self {
        Self { config, interfaces }
    }

    /// Engine over the machine's real interfaces.
    pub fn with_system_interfaces(config: DiscoveryConfig) -> Self {
        Self::new(config, Arc::new(SystemInterfaces))
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Starts a run: one prober + listener pair per interface, all running
    /// concurrently on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Interfaces`] when the interface list cannot
    /// be read.  Bind failures on individual interfaces are logged and do not
    /// fail the run.
    pub async fn discover(&self) -> Result<DiscoveryRun, DiscoveryError> {
        let interfaces = self
            .interfaces
            .interfaces()
            .map_err(DiscoveryError::Interfaces)?;

        let id = Uuid::new_v4();
        let span = info_span!("discovery", run = %id);
        if interfaces.is_empty() {
            span.in_scope(|| warn!("no usable interfaces; run ends immediately"));
        } else {
            span.in_scope(|| {
                info!(
                    interfaces = interfaces.len(),
                    probes = self.config.probe_count,
                    window = ?self.config.window(),
                    "discovery started"
                )
            });
        }

        let (found_tx, found_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = watch::channel(false);
        let known = Arc::new(Mutex::new(KnownPeers::default()));
        let config = Arc::new(self.config.clone());

        let mut tasks = JoinSet::new();
        for iface in interfaces.iter().cloned() {
            let probe = InterfaceProbe {
                config: Arc::clone(&config),
                known: Arc::clone(&known),
                found: found_tx.clone(),
                close: close_rx.clone(),
            };
            let iface_span = info_span!(parent: &span, "interface", name = %iface.name);
            tasks.spawn(probe.run(iface).instrument(iface_span));
        }
        // Once every task has dropped its sender the run is complete.
        drop(found_tx);

        Ok(DiscoveryRun {
            id,
            interfaces,
            found: found_rx,
            known,
            close: close_tx,
            tasks,
            guard: None,
            finished: false,
        })
    }
}

// ── Run ───────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct KnownPeers {
    seen: HashSet<PeerAddress>,
    in_order: Vec<PeerAddress>,
}

impl KnownPeers {
    /// Returns `true` when the peer was not known before.
    fn insert(&mut self, peer: &PeerAddress) -> bool {
        if self.seen.insert(peer.clone()) {
            self.in_order.push(peer.clone());
            true
        } else {
            false
        }
    }
}

/// A single, finite discovery run.
///
/// Yields every distinct peer once through [`next`](Self::next) and ends when
/// all interfaces have finished or the run is closed.  A run cannot be
/// restarted; start a new one from the engine.
pub struct DiscoveryRun {
    id: Uuid,
    interfaces: Vec<ProbeInterface>,
    found: mpsc::UnboundedReceiver<PeerAddress>,
    known: Arc<Mutex<KnownPeers>>,
    close: watch::Sender<bool>,
    tasks: JoinSet<()>,
    guard: Option<OwnedSemaphorePermit>,
    finished: bool,
}

impl DiscoveryRun {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Interfaces this run probes.
    pub fn interfaces(&self) -> &[ProbeInterface] {
        &self.interfaces
    }

    /// Waits for the next newly found peer.  `None` means the run is over.
    pub async fn next(&mut self) -> Option<PeerAddress> {
        match self.found.recv().await {
            Some(peer) => Some(peer),
            None => {
                self.reap().await;
                None
            }
        }
    }

    /// Snapshot of every peer found so far, in discovery order.
    pub fn peers(&self) -> Vec<PeerAddress> {
        self.known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_order
            .clone()
    }

    /// Stops probing and listening on every interface and waits for the
    /// per-interface tasks to exit.  Peers already found remain available
    /// through [`peers`](Self::peers).
    pub async fn close(&mut self) {
        if !self.close.send_replace(true) {
            debug!(run = %self.id, "discovery closed early");
        }
        self.found.close();
        self.reap().await;
    }

    /// Drives the run to completion and returns everything it found.
    pub async fn collect(mut self) -> Vec<PeerAddress> {
        while self.next().await.is_some() {}
        self.peers()
    }

    /// Ties an exclusivity permit to the run; released when the run ends.
    pub(crate) fn hold(mut self, permit: OwnedSemaphorePermit) -> Self {
        self.guard = Some(permit);
        self
    }

    async fn reap(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                warn!(run = %self.id, "interface task failed: {e}");
            }
        }
        self.guard.take();
        if !self.finished {
            self.finished = true;
            info!(run = %self.id, found = self.peers().len(), "discovery finished");
        }
    }
}

impl Drop for DiscoveryRun {
    fn drop(&mut self) {
        // The JoinSet aborts whatever is still running.
        self.close.send_replace(true);
    }
}

// ── Per-interface worker ──────────────────────────────────────────────────────

struct InterfaceProbe {
    config: Arc<DiscoveryConfig>,
    known: Arc<Mutex<KnownPeers>>,
    found: mpsc::UnboundedSender<PeerAddress>,
    close: watch::Receiver<bool>,
}

impl InterfaceProbe {
    async fn run(self, iface: ProbeInterface) {
        let local = SocketAddr::V4(SocketAddrV4::new(iface.address, 0));
        let socket = match bind_probe_socket(local).await {
            Ok(socket) => socket,
            Err(e) => {
                warn!("{e}");
                return;
            }
        };
        let target = SocketAddr::V4(SocketAddrV4::new(iface.broadcast, self.config.port));
        let (done_tx, done_rx) = watch::channel(false);

        let mut close = self.close.clone();
        let config = Arc::clone(&self.config);
        let prober = async {
            send_probes(&socket, target, &config, &mut close).await;
            // The listener only stops after the prober is done.
            let _ = done_tx.send(true);
        };
        let listener = self.listen(&socket, &iface.name, done_rx);
        tokio::join!(prober, listener);
    }

    async fn listen(&self, socket: &UdpSocket, name: &str, mut done: watch::Receiver<bool>) {
        let mut buf = vec![0u8; self.config.response_buffer.max(EXTENDED_HEADER_LEN)];
        loop {
            tokio::select! {
                _ = done.wait_for(|done| *done) => {
                    debug!("{}", DiscoveryError::Interrupted { interface: name.to_string() });
                    return;
                }
                received = socket.recv_from(&mut buf) => match received {
                    Ok((len, source)) => self.accept(&buf[..len], source),
                    // Windows reports ICMP port-unreachable from an earlier
                    // send as a receive error.
                    Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                        debug!("ignoring connection reset on discovery socket");
                    }
                    Err(e) => {
                        warn!("discovery receive failed: {e}");
                        return;
                    }
                },
            }
        }
    }

    fn accept(&self, datagram: &[u8], source: SocketAddr) {
        let Some(peer) = parse_response(datagram, source, self.config.default_reliable_port) else {
            debug!(%source, len = datagram.len(), "discarding unrecognised datagram");
            return;
        };
        let is_new = self
            .known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(&peer);
        if is_new {
            info!(peer = %peer, "found host");
            // The receiver may already be gone if the run was closed.
            let _ = self.found.send(peer);
        } else {
            debug!(peer = %peer, "duplicate answer");
        }
    }
}

async fn bind_probe_socket(local: SocketAddr) -> Result<UdpSocket, DiscoveryError> {
    let bind_failure = |source| DiscoveryError::Bind {
        addr: local,
        source,
    };
    let socket = UdpSocket::bind(local).await.map_err(bind_failure)?;
    socket.set_broadcast(true).map_err(bind_failure)?;
    Ok(socket)
}

async fn send_probes(
    socket: &UdpSocket,
    target: SocketAddr,
    config: &DiscoveryConfig,
    close: &mut watch::Receiver<bool>,
) {
    for attempt in 1..=config.probe_count {
        if let Err(e) = socket.send_to(&[PROBE_SENTINEL], target).await {
            warn!(%target, attempt, "probe send failed: {e}");
            return;
        }
        debug!(%target, attempt, "probe sent");

        tokio::select! {
            _ = time::sleep(config.interval) => {}
            _ = close.wait_for(|closed| *closed) => {
                debug!("probing cancelled");
                return;
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

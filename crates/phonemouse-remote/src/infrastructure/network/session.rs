//! Dual-channel transport session to a single host.
//!
//! A session owns two channels to the same peer:
//!
//! - the **reliable** channel, a TCP stream used for frames that must arrive
//!   and arrive in order (button edges, mode switches);
//! - the **unreliable** channel, a connected UDP socket used for high-rate
//!   samples where a lost datagram is simply superseded by the next one
//!   (gravity, touch).
//!
//! # Closing (for beginners)
//!
//! `close()` can be called from any task while other tasks are in the middle
//! of a send.  The session keeps a `watch` channel holding a "closed" flag:
//!
//! 1. Every send checks the flag first and returns
//!    [`TransportError::SessionClosed`] without touching the socket.
//! 2. A TCP write that is already in flight is never abandoned.  Dropping a
//!    half-done `write_all` would leave a truncated frame on the wire, so
//!    `close()` waits for the stream lock and the in-flight frame completes
//!    first.  Writes are not time-bounded.
//! 3. `close()` flips the flag, then takes both sockets out of their slots and
//!    drops them.  Calling it again is a no-op.

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use phonemouse_core::{PeerAddress, ProtocolError};
use thiserror::Error;
use tokio::{
    io::AsyncWriteExt,
    net::{TcpStream, UdpSocket},
    sync::{watch, Mutex},
    time,
};
use tracing::{debug, info, warn};

/// Which of the two session channels an operation concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// TCP stream.
    Reliable,
    /// Connected UDP socket.
    Unreliable,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Reliable => f.write_str("reliable (tcp)"),
            Channel::Unreliable => f.write_str("unreliable (udp)"),
        }
    }
}

/// Errors produced by the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// One of the two channels could not be opened.
    #[error("failed to open {channel} channel to {addr}: {source}")]
    ConnectFailure {
        addr: SocketAddr,
        channel: Channel,
        #[source]
        source: io::Error,
    },

    /// The session was closed before or during the send.
    #[error("session is closed")]
    SessionClosed,

    /// An I/O error occurred on an open channel.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),

    /// A packet could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

// ── Seams ─────────────────────────────────────────────────────────────────────

/// An open connection to one peer.
///
/// Each call carries exactly one encoded frame.  Frames are never split or
/// merged by the session.
#[async_trait]
pub trait Session: Send + Sync {
    /// Writes the whole frame to the reliable channel.  Concurrent callers
    /// are serialized; order between them is the order they got the lock.
    async fn send_reliable(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Sends the frame as a single datagram.  Delivery is not confirmed.
    async fn send_unreliable(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Releases both channels.  Idempotent.
    async fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Opens sessions.  The connection controller only ever talks to this trait,
/// so tests can hand it in-memory sessions instead of sockets.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, peer: &PeerAddress) -> Result<Arc<dyn Session>, TransportError>;
}

// ── Socket-backed implementation ──────────────────────────────────────────────

/// [`Connector`] that opens real TCP + UDP sockets.
#[derive(Debug, Clone, Default)]
pub struct NetworkConnector {
    connect_timeout: Option<Duration>,
}

impl NetworkConnector {
    /// `connect_timeout = None` waits for as long as the OS does.
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Connector for NetworkConnector {
    async fn open(&self, peer: &PeerAddress) -> Result<Arc<dyn Session>, TransportError> {
        let session = NetworkSession::open(peer, self.connect_timeout).await?;
        Ok(Arc::new(session))
    }
}

/// Session backed by a `TcpStream` and a connected `UdpSocket`.
pub struct NetworkSession {
    peer: PeerAddress,
    reliable: Mutex<Option<TcpStream>>,
    unreliable: Mutex<Option<UdpSocket>>,
    closed: watch::Sender<bool>,
}

impl NetworkSession {
    /// Connects both channels to `peer`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectFailure`] naming the channel that
    /// failed.  If the UDP side fails after TCP connected, the TCP stream is
    /// dropped before returning.
    pub async fn open(
        peer: &PeerAddress,
        connect_timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let reliable_addr = peer.reliable_addr();
        let reliable_failure = |source| TransportError::ConnectFailure {
            addr: reliable_addr,
            channel: Channel::Reliable,
            source,
        };

        let connect = TcpStream::connect(reliable_addr);
        let stream = match connect_timeout {
            Some(limit) => match time::timeout(limit, connect).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no answer within {limit:?}"),
                )),
            },
            None => connect.await,
        }
        .map_err(reliable_failure)?;
        stream.set_nodelay(true).map_err(reliable_failure)?;
        debug!(%reliable_addr, "reliable channel connected");

        let unreliable_addr = peer.unreliable_addr();
        let unreliable_failure = |source| TransportError::ConnectFailure {
            addr: unreliable_addr,
            channel: Channel::Unreliable,
            source,
        };
        let local: IpAddr = match unreliable_addr {
            SocketAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
            SocketAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
        };
        let socket = UdpSocket::bind(SocketAddr::new(local, 0))
            .await
            .map_err(unreliable_failure)?;
        socket
            .connect(unreliable_addr)
            .await
            .map_err(unreliable_failure)?;
        debug!(%unreliable_addr, "unreliable channel connected");

        info!(peer = %peer, "session opened");
        let (closed, _) = watch::channel(false);
        Ok(Self {
            peer: peer.clone(),
            reliable: Mutex::new(Some(stream)),
            unreliable: Mutex::new(Some(socket)),
            closed,
        })
    }

    pub fn peer(&self) -> &PeerAddress {
        &self.peer
    }

    /// Local address of the UDP socket, or `None` once closed.
    pub async fn unreliable_local_addr(&self) -> Option<SocketAddr> {
        let guard = self.unreliable.lock().await;
        guard.as_ref().and_then(|s| s.local_addr().ok())
    }
}

#[async_trait]
impl Session for NetworkSession {
    async fn send_reliable(&self, frame: &[u8]) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::SessionClosed);
        }
        let mut guard = self.reliable.lock().await;
        // close() may have flipped the flag while we waited for the lock.
        if self.is_closed() {
            return Err(TransportError::SessionClosed);
        }
        let stream = guard.as_mut().ok_or(TransportError::SessionClosed)?;
        stream.write_all(frame).await?;
        Ok(())
    }

    async fn send_unreliable(&self, frame: &[u8]) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::SessionClosed);
        }
        let guard = self.unreliable.lock().await;
        let socket = guard.as_ref().ok_or(TransportError::SessionClosed)?;
        let sent = socket.send(frame).await?;
        if sent != frame.len() {
            warn!(sent, expected = frame.len(), "datagram truncated by the OS");
        }
        Ok(())
    }

    async fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }

        if let Some(mut stream) = self.reliable.lock().await.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("reliable channel shutdown: {e}");
            }
        }
        self.unreliable.lock().await.take();
        info!(peer = %self.peer, "session closed");
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Binds a TCP listener and a UDP socket on loopback and returns a peer
    /// pointing at both.
    async fn loopback_peer() -> (TcpListener, UdpSocket, PeerAddress) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer = PeerAddress::new(
            "127.0.0.1".parse().unwrap(),
            listener.local_addr().unwrap().port(),
            udp.local_addr().unwrap().port(),
            "loopback",
        );
        (listener, udp, peer)
    }

    #[tokio::test]
    async fn test_open_connects_both_channels() {
        // Arrange
        let (listener, udp, peer) = loopback_peer().await;

        // Act
        let session = NetworkSession::open(&peer, Some(Duration::from_secs(2)))
            .await
            .expect("open must succeed");
        let (mut accepted, _) = listener.accept().await.unwrap();

        session.send_reliable(&[0x02, 0x10, 0x01, 0x01]).await.unwrap();
        session.send_unreliable(&[0x01, 0xAA]).await.unwrap();

        // Assert
        let mut tcp_buf = [0u8; 4];
        accepted.read_exact(&mut tcp_buf).await.unwrap();
        assert_eq!(tcp_buf, [0x02, 0x10, 0x01, 0x01]);

        let mut udp_buf = [0u8; 16];
        let (len, src) = udp.recv_from(&mut udp_buf).await.unwrap();
        assert_eq!(&udp_buf[..len], &[0x01, 0xAA]);
        assert_eq!(Some(src.port()), session.unreliable_local_addr().await.map(|a| a.port()));
    }

    #[tokio::test]
    async fn test_open_fails_when_nothing_listens() {
        // Arrange: reserve a port, then free it so the connect is refused.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let peer = PeerAddress::new("127.0.0.1".parse().unwrap(), port, 9, "gone");

        // Act
        let result = NetworkSession::open(&peer, Some(Duration::from_secs(2))).await;

        // Assert
        match result {
            Err(TransportError::ConnectFailure { channel, addr, .. }) => {
                assert_eq!(channel, Channel::Reliable);
                assert_eq!(addr.port(), port);
            }
            Err(other) => panic!("expected ConnectFailure, got {other:?}"),
            Ok(_) => panic!("expected ConnectFailure, got a session"),
        }
    }

    #[tokio::test]
    async fn test_send_after_close_returns_session_closed() {
        // Arrange
        let (listener, _udp, peer) = loopback_peer().await;
        let session = NetworkSession::open(&peer, None).await.unwrap();
        let (_accepted, _) = listener.accept().await.unwrap();

        // Act
        session.close().await;

        // Assert
        assert!(session.is_closed());
        assert!(matches!(
            session.send_reliable(&[0x00, 0x00]).await,
            Err(TransportError::SessionClosed)
        ));
        assert!(matches!(
            session.send_unreliable(&[0x01]).await,
            Err(TransportError::SessionClosed)
        ));
        assert!(session.unreliable_local_addr().await.is_none());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (listener, _udp, peer) = loopback_peer().await;
        let session = NetworkSession::open(&peer, None).await.unwrap();
        let (_accepted, _) = listener.accept().await.unwrap();

        session.close().await;
        session.close().await;

        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn test_close_shuts_down_reliable_stream() {
        // Arrange
        let (listener, _udp, peer) = loopback_peer().await;
        let session = NetworkSession::open(&peer, None).await.unwrap();
        let (mut accepted, _) = listener.accept().await.unwrap();

        // Act
        session.close().await;

        // Assert: the host observes end-of-stream.
        let mut buf = [0u8; 1];
        let read = accepted.read(&mut buf).await.unwrap();
        assert_eq!(read, 0);
    }

    /// Close lands while a large frame is stuck on a full socket buffer.
    /// The host must only ever see whole frames.
    #[tokio::test]
    async fn test_close_during_blocked_send_never_truncates_a_frame() {
        // Arrange: the host does not read until the sender stalls.
        let (listener, _udp, peer) = loopback_peer().await;
        let session = Arc::new(NetworkSession::open(&peer, None).await.unwrap());
        let (mut accepted, _) = listener.accept().await.unwrap();
        let frame = vec![0x03; 4082];
        let completed = Arc::new(AtomicUsize::new(0));
        let sender = {
            let session = Arc::clone(&session);
            let completed = Arc::clone(&completed);
            let frame = frame.clone();
            tokio::spawn(async move {
                loop {
                    match session.send_reliable(&frame).await {
                        Ok(()) => completed.fetch_add(1, Ordering::SeqCst),
                        Err(e) => return e,
                    };
                }
            })
        };
        let mut last = usize::MAX;
        loop {
            time::sleep(Duration::from_millis(100)).await;
            let now = completed.load(Ordering::SeqCst);
            if now == last {
                break;
            }
            last = now;
        }

        // Act: close while a send is pending, then drain the host side.
        let closing = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.close().await })
        };
        let mut received = Vec::new();
        time::timeout(Duration::from_secs(10), accepted.read_to_end(&mut received))
            .await
            .expect("host must reach end of stream")
            .unwrap();
        closing.await.unwrap();
        let stopped_with = sender.await.unwrap();

        // Assert
        assert!(matches!(stopped_with, TransportError::SessionClosed));
        assert_eq!(received.len() % frame.len(), 0, "partial frame on the wire");
        assert_eq!(received.len(), completed.load(Ordering::SeqCst) * frame.len());
    }

    #[tokio::test]
    async fn test_concurrent_reliable_sends_do_not_interleave() {
        // Arrange
        let (listener, _udp, peer) = loopback_peer().await;
        let session = Arc::new(NetworkSession::open(&peer, None).await.unwrap());
        let (mut accepted, _) = listener.accept().await.unwrap();
        let frame_a = vec![0xA0; 4096];
        let frame_b = vec![0xB0; 4096];

        // Act
        let a = {
            let session = Arc::clone(&session);
            let frame = frame_a.clone();
            tokio::spawn(async move { session.send_reliable(&frame).await })
        };
        let b = {
            let session = Arc::clone(&session);
            let frame = frame_b.clone();
            tokio::spawn(async move { session.send_reliable(&frame).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        // Assert: each 4 KiB block is homogeneous.
        let mut received = vec![0u8; 8192];
        accepted.read_exact(&mut received).await.unwrap();
        for block in received.chunks(4096) {
            assert!(block.iter().all(|b| *b == block[0]), "frames interleaved");
        }
    }
}

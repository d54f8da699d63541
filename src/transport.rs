use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::{lookup_host, UdpSocket};
use tokio::time;
use tracing::{debug, warn};

use crate::codec;
use crate::messages::Envelope;

pub const DEFAULT_PORT: u16 = 7000;
pub const DEFAULT_TRY_LIMIT: u32 = 3;

/// Timing and buffer parameters for one request/response exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Deadline covering the write and the read of a single attempt.
    pub deadline: Duration,
    /// Pause before every transmission, the first one included.
    pub pacing: Duration,
    /// Replies must fit in one datagram of this size.
    pub recv_buffer: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(5),
            pacing: Duration::from_secs(1),
            recv_buffer: 1024,
        }
    }
}

impl TransportConfig {
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    #[must_use]
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    #[must_use]
    pub fn with_recv_buffer(mut self, recv_buffer: usize) -> Self {
        self.recv_buffer = recv_buffer;
        self
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(String),
    #[error("{peer} unreachable after {attempts} attempt(s)")]
    Unreachable { peer: String, attempts: u32 },
}

/// Sends one framed request and waits for a `pack` envelope in reply.
#[async_trait]
pub trait DatagramTransport: Send + Sync {
    /// Makes at most `try_limit` attempts (at least one) and returns the first
    /// reply whose envelope type is `pack`.
    async fn exchange(
        &self,
        peer: &str,
        request: &[u8],
        try_limit: u32,
    ) -> Result<Envelope, TransportError>;
}

/// JSON-over-UDP transport. Opens a fresh socket for every exchange.
#[derive(Debug, Clone, Default)]
pub struct UdpTransport {
    config: TransportConfig,
}

impl UdpTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    async fn open(peer: &str) -> Result<UdpSocket, TransportError> {
        let target = lookup_host(peer)
            .await
            .map_err(|e| TransportError::Io(format!("resolve {peer}: {e}")))?
            .next()
            .ok_or_else(|| TransportError::Io(format!("resolve {peer}: no address")))?;
        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        socket
            .connect(target)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(socket)
    }

    async fn attempt(
        &self,
        socket: &UdpSocket,
        request: &[u8],
        buf: &mut [u8],
    ) -> Result<Envelope, String> {
        let round_trip = async {
            socket
                .send(request)
                .await
                .map_err(|e| format!("udp write: {e}"))?;
            let len = socket
                .recv(buf)
                .await
                .map_err(|e| format!("udp read: {e}"))?;
            debug!(response = %String::from_utf8_lossy(&buf[..len]), "udp reply");
            codec::parse_envelope(&buf[..len]).map_err(|e| format!("decode: {e}"))
        };
        match time::timeout(self.config.deadline, round_trip).await {
            Ok(res) => res,
            Err(_) => Err("deadline exceeded".into()),
        }
    }
}

#[async_trait]
impl DatagramTransport for UdpTransport {
    async fn exchange(
        &self,
        peer: &str,
        request: &[u8],
        try_limit: u32,
    ) -> Result<Envelope, TransportError> {
        let socket = Self::open(peer).await?;
        let attempts = try_limit.max(1);
        let mut buf = vec![0u8; self.config.recv_buffer];
        debug!(%peer, request = %String::from_utf8_lossy(request), "udp request");

        for attempt in 1..=attempts {
            time::sleep(self.config.pacing).await;
            match self.attempt(&socket, request, &mut buf).await {
                Ok(envelope) if envelope.is_pack() => return Ok(envelope),
                Ok(envelope) => {
                    warn!(%peer, attempt, t = %envelope.t, "unexpected envelope type")
                }
                Err(reason) => warn!(%peer, attempt, %reason, "attempt abandoned"),
            }
        }

        Err(TransportError::Unreachable {
            peer: peer.to_string(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_device_expectations() {
        let config = TransportConfig::default();
        assert_eq!(config.deadline, Duration::from_secs(5));
        assert_eq!(config.pacing, Duration::from_secs(1));
        assert_eq!(config.recv_buffer, 1024);
    }

    #[tokio::test]
    async fn unresolvable_peer_is_io_error() {
        let transport = UdpTransport::new(TransportConfig::default().with_pacing(Duration::ZERO));
        let err = transport
            .exchange("not a host name", b"{}", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
    }

    #[tokio::test]
    async fn silent_peer_exhausts_attempts() {
        let silent = UdpSocket::bind(("127.0.0.1", 0)).await.unwrap();
        let peer = silent.local_addr().unwrap().to_string();
        let transport = UdpTransport::new(
            TransportConfig::default()
                .with_pacing(Duration::ZERO)
                .with_deadline(Duration::from_millis(50)),
        );
        let err = transport.exchange(&peer, b"{}", 2).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Unreachable { attempts: 2, .. }
        ));
    }
}

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::codec;
use crate::crypto::EcbCipher;
use crate::messages::DeviceInfo;

/// Outer-only scan probe, identical to the unicast one.
const SCAN_PROBE: &[u8] = br#"{"t":"scan"}"#;

/// A device that answered a broadcast scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub addr: SocketAddr,
    pub info: DeviceInfo,
}

#[derive(Debug, Error)]
pub enum DiscoveryClientError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no device answered within {0:?}")]
    Timeout(Duration),
}

/// Sends one scan probe to a broadcast address and gathers the answers.
///
/// Each answer goes through the same identity check as
/// [`GreeClient::scan`](crate::sdk::GreeClient::scan); the result feeds
/// [`Session`](crate::session::Session) construction for every unit found.
#[derive(Debug, Clone)]
pub struct DiscoveryClient {
    local_addr: SocketAddr,
    broadcast_addr: SocketAddr,
    timeout: Duration,
}

impl DiscoveryClient {
    pub fn new(local_addr: SocketAddr, broadcast_addr: SocketAddr, timeout: Duration) -> Self {
        Self {
            local_addr,
            broadcast_addr,
            timeout,
        }
    }

    /// Devices that answered before the timeout, ordered by address.
    pub async fn discover(&self) -> Result<Vec<DiscoveredDevice>, DiscoveryClientError> {
        let socket = UdpSocket::bind(self.local_addr).await?;
        socket.set_broadcast(true)?;
        socket.send_to(SCAN_PROBE, self.broadcast_addr).await?;

        let cipher = EcbCipher::default_key();
        let until = Instant::now() + self.timeout;
        let mut found = BTreeMap::new();
        let mut buf = [0u8; 1024];

        while let Ok(received) = timeout_at(until, socket.recv_from(&mut buf)).await {
            let (len, addr) = received?;
            match decode_reply(&buf[..len], &cipher) {
                Some(info) => {
                    debug!(%addr, cid = %info.mac, "scan answer");
                    found.entry(addr).or_insert(info);
                }
                None => warn!(%addr, "ignoring unusable scan answer"),
            }
        }

        if found.is_empty() {
            return Err(DiscoveryClientError::Timeout(self.timeout));
        }
        Ok(found
            .into_iter()
            .map(|(addr, info)| DiscoveredDevice { addr, info })
            .collect())
    }
}

/// Metadata from a scan answer that carries a non-empty, self-consistent identity.
fn decode_reply(datagram: &[u8], cipher: &EcbCipher) -> Option<DeviceInfo> {
    let envelope = codec::parse_envelope(datagram).ok()?;
    if !envelope.is_pack() {
        return None;
    }
    let response = codec::decode_response(envelope, cipher).ok()?;
    let pack = response.pack?;
    let identified = !pack.mac.is_empty() && pack.mac == response.envelope.cid;
    identified.then(|| DeviceInfo::from(&pack))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::messages::Envelope;

    fn answer(cid: &str, metadata: serde_json::Value) -> Vec<u8> {
        let envelope = Envelope {
            t: "pack".into(),
            cid: cid.into(),
            pack: Some(codec::seal(&metadata, &EcbCipher::default_key()).unwrap()),
            ..Envelope::default()
        };
        serde_json::to_vec(&envelope).unwrap()
    }

    #[test]
    fn answer_with_matching_identity_is_kept() {
        let datagram = answer("f4911e000001", json!({"t": "dev", "mac": "f4911e000001"}));
        let info = decode_reply(&datagram, &EcbCipher::default_key()).unwrap();
        assert_eq!(info.mac, "f4911e000001");
    }

    #[test]
    fn answer_without_identity_is_dropped() {
        let datagram = answer("", json!({"t": "dev", "name": "anonymous unit"}));
        assert_eq!(decode_reply(&datagram, &EcbCipher::default_key()), None);
    }

    #[test]
    fn answer_with_foreign_identity_is_dropped() {
        let datagram = answer("000000000000", json!({"t": "dev", "mac": "f4911e000001"}));
        assert_eq!(decode_reply(&datagram, &EcbCipher::default_key()), None);
    }
}

//! Loopback stand-in for an air conditioner, used by the end-to-end tests.
//!
//! The simulator speaks the same JSON-over-UDP protocol as real units: it
//! answers scans with encrypted metadata, hands out a key on bind, and keeps a
//! property table that `cmd` writes and `status` reads.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::codec;
use crate::crypto::EcbCipher;
use crate::messages::{Envelope, InnerRequest, PACK};

/// Behaviour of a simulated unit.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    pub mac: String,
    /// Envelope `cid` to report instead of `mac` in scan replies.
    pub claimed_cid: Option<String>,
    /// Reported in scan metadata; a long name inflates the reply datagram.
    pub name: String,
    pub bind_key: String,
    pub refuse_bind: bool,
    /// Number of leading requests dropped without a reply.
    pub silent_requests: usize,
    /// Number of requests (after the silent ones) answered with a non-pack envelope.
    pub non_pack_replies: usize,
    pub properties: HashMap<String, i64>,
}

impl SimulatedDevice {
    pub fn new(mac: impl Into<String>, bind_key: impl Into<String>) -> Self {
        Self {
            mac: mac.into(),
            claimed_cid: None,
            name: "sim-unit".into(),
            bind_key: bind_key.into(),
            refuse_bind: false,
            silent_requests: 0,
            non_pack_replies: 0,
            properties: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_property(mut self, code: impl Into<String>, value: i64) -> Self {
        self.properties.insert(code.into(), value);
        self
    }

    fn scan_reply(&self, cipher: &EcbCipher) -> Result<Envelope, codec::CodecError> {
        let metadata = json!({
            "t": "dev",
            "cid": self.mac,
            "bc": "gree",
            "brand": "gree",
            "catalog": "gree",
            "mac": self.mac,
            "mid": "10001",
            "model": "gree",
            "name": self.name,
            "series": "gree",
            "vender": "1",
            "ver": "V1.1.13",
            "lock": 0
        });
        Ok(Envelope {
            t: PACK.into(),
            i: 1,
            cid: self.claimed_cid.clone().unwrap_or_else(|| self.mac.clone()),
            pack: Some(codec::seal(&metadata, cipher)?),
            ..Envelope::default()
        })
    }

    fn answer(&mut self, inner: InnerRequest, bound: &mut Option<String>) -> Value {
        match inner {
            InnerRequest::Bind { .. } if self.refuse_bind => {
                json!({"t": "binderr", "mac": self.mac, "r": 500})
            }
            InnerRequest::Bind { .. } => {
                *bound = Some(self.bind_key.clone());
                json!({"t": "bindok", "mac": self.mac, "key": self.bind_key, "r": 200})
            }
            InnerRequest::Cmd { opt, p, .. } => {
                for (code, value) in opt.iter().zip(&p) {
                    self.properties.insert(code.clone(), *value);
                }
                json!({"t": "res", "mac": self.mac, "r": 200, "opt": opt, "p": p, "val": p})
            }
            InnerRequest::Status { cols, .. } => {
                let dat: Vec<i64> = cols
                    .iter()
                    .map(|code| self.properties.get(code).copied().unwrap_or(0))
                    .collect();
                json!({"t": "dat", "mac": self.mac, "r": 200, "cols": cols, "dat": dat})
            }
        }
    }
}

/// Running simulator. The task stops when the handle is dropped.
#[derive(Debug)]
pub struct DeviceHandle {
    pub addr: SocketAddr,
    received: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl DeviceHandle {
    /// Datagrams received so far, answered or not.
    pub fn received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Binds the simulator to an ephemeral loopback port and starts serving.
pub async fn spawn_device(mut device: SimulatedDevice) -> io::Result<DeviceHandle> {
    let socket = UdpSocket::bind(("127.0.0.1", 0)).await?;
    let addr = socket.local_addr()?;
    let received = Arc::new(AtomicUsize::new(0));
    let counter = received.clone();

    let task = tokio::spawn(async move {
        let mut bound: Option<String> = None;
        let mut buf = vec![0u8; 4096];
        loop {
            let (len, peer) = match socket.recv_from(&mut buf).await {
                Ok(res) => res,
                Err(_) => continue,
            };
            let seen = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if seen <= device.silent_requests {
                continue;
            }
            let reply = if seen <= device.silent_requests + device.non_pack_replies {
                Some(Envelope {
                    t: "hb".into(),
                    ..Envelope::default()
                })
            } else {
                handle(&mut device, &buf[..len], &mut bound).ok()
            };
            if let Some(reply) = reply {
                if let Ok(bytes) = serde_json::to_vec(&reply) {
                    let _ = socket.send_to(&bytes, peer).await;
                }
            }
        }
    });

    Ok(DeviceHandle {
        addr,
        received,
        task,
    })
}

fn handle(
    device: &mut SimulatedDevice,
    datagram: &[u8],
    bound: &mut Option<String>,
) -> Result<Envelope, codec::CodecError> {
    let request = codec::parse_envelope(datagram)?;
    debug!(t = %request.t, "simulator request");
    let default_key = EcbCipher::default_key();
    if request.t != PACK {
        return device.scan_reply(&default_key);
    }

    let pack = request
        .pack
        .as_deref()
        .ok_or_else(|| codec::CodecError::Protocol("request without pack".into()))?;
    // Bind requests are flagged with i=1 and always use the default key.
    let cipher = match (request.i, bound.as_deref()) {
        (1, _) | (_, None) => default_key,
        (_, Some(key)) => EcbCipher::new(key.as_bytes())?,
    };
    let inner: InnerRequest = codec::open_as(pack, &cipher)?;
    let answer = device.answer(inner, bound);
    Ok(Envelope {
        t: PACK.into(),
        cid: device.mac.clone(),
        pack: Some(codec::seal(&answer, &cipher)?),
        ..Envelope::default()
    })
}

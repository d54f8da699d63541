use serde::{Deserialize, Serialize};

/// Outer type tag for every request addressed to a known device.
pub const PACK: &str = "pack";
pub const SCAN: &str = "scan";
/// Inner type tag of a successful bind reply.
pub const BIND_OK: &str = "bindok";

/// Transport-level JSON message. `pack` carries the base64 ciphertext.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub t: String,
    #[serde(default)]
    pub i: u8,
    #[serde(default)]
    pub uid: u32,
    #[serde(default)]
    pub cid: String,
    #[serde(default)]
    pub tcid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack: Option<String>,
}

impl Envelope {
    pub fn scan() -> Self {
        Self {
            t: SCAN.into(),
            ..Self::default()
        }
    }

    pub fn is_pack(&self) -> bool {
        self.t == PACK
    }
}

/// Logical request issued by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Outer-only discovery probe.
    Scan,
    /// Key exchange for the given device identity.
    Bind { cid: String },
    /// Sets `opt[n]` to `p[n]`.
    Set { opt: Vec<String>, p: Vec<i64> },
    /// Reads the listed properties.
    Get { cols: Vec<String> },
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Scan => SCAN,
            Request::Bind { .. } => "bind",
            Request::Set { .. } => "cmd",
            Request::Get { .. } => "status",
        }
    }
}

/// Encrypted inner payload, tagged by `t` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "lowercase")]
pub enum InnerRequest {
    Bind {
        mac: String,
        #[serde(default)]
        uid: u32,
    },
    Cmd {
        opt: Vec<String>,
        p: Vec<i64>,
        mac: String,
    },
    Status {
        cols: Vec<String>,
        mac: String,
    },
}

/// Decrypted inner payload of a device reply.
///
/// One record covers device metadata (scan), binding (`key`), command
/// acknowledgement (`opt`/`p`/`val`) and status (`cols`/`dat`). `raw` never
/// appears on the wire; it holds the decrypted text when it did not parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponsePack {
    pub t: String,
    pub mac: String,
    pub cid: String,
    pub bc: String,
    pub brand: String,
    pub catalog: String,
    pub key: String,
    pub mid: String,
    pub model: String,
    pub name: String,
    pub series: String,
    pub vender: String,
    pub ver: String,
    pub lock: u8,
    pub r: i64,
    pub opt: Vec<String>,
    pub p: Vec<i64>,
    pub val: Vec<i64>,
    pub cols: Vec<String>,
    pub dat: Vec<i64>,
    #[serde(skip)]
    pub raw: Option<String>,
}

/// Device metadata reported by a scan reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub mac: String,
    pub name: String,
    pub brand: String,
    pub catalog: String,
    pub model: String,
    pub mid: String,
    pub series: String,
    pub vender: String,
    pub ver: String,
    pub bc: String,
    pub lock: u8,
}

impl From<&ResponsePack> for DeviceInfo {
    fn from(pack: &ResponsePack) -> Self {
        Self {
            mac: pack.mac.clone(),
            name: pack.name.clone(),
            brand: pack.brand.clone(),
            catalog: pack.catalog.clone(),
            model: pack.model.clone(),
            mid: pack.mid.clone(),
            series: pack.series.clone(),
            vender: pack.vender.clone(),
            ver: pack.ver.clone(),
            bc: pack.bc.clone(),
            lock: pack.lock,
        }
    }
}

/// Outer envelope paired with its decoded inner payload, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub envelope: Envelope,
    pub pack: Option<ResponsePack>,
}

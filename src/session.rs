use serde::{Deserialize, Serialize};

use crate::crypto::{CryptoError, EcbCipher};
use crate::transport::{DEFAULT_PORT, DEFAULT_TRY_LIMIT};

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_try_limit() -> u32 {
    DEFAULT_TRY_LIMIT
}

/// Connection parameters and identity for one device.
///
/// Owned by the caller and changed only through the setters. `sec_key` stays
/// empty until binding succeeds (or the caller restores a known key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    cid: String,
    #[serde(default)]
    sec_key: Option<String>,
    #[serde(default = "default_try_limit")]
    try_limit: u32,
}

impl Session {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            cid: String::new(),
            sec_key: None,
            try_limit: DEFAULT_TRY_LIMIT,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn cid(&self) -> &str {
        &self.cid
    }

    pub fn sec_key(&self) -> Option<&str> {
        self.sec_key.as_deref()
    }

    pub fn try_limit(&self) -> u32 {
        self.try_limit
    }

    pub fn is_bound(&self) -> bool {
        self.sec_key.is_some()
    }

    /// `host:port` as handed to the transport. IPv6 literals get brackets.
    pub fn peer(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn set_host(&mut self, host: impl Into<String>) {
        self.host = host.into();
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    pub fn set_cid(&mut self, cid: impl Into<String>) {
        self.cid = cid.into();
    }

    pub fn set_sec_key(&mut self, sec_key: impl Into<String>) {
        self.sec_key = Some(sec_key.into());
    }

    pub fn set_try_limit(&mut self, try_limit: u32) {
        self.try_limit = try_limit;
    }

    /// Cipher for device traffic: the bound key, or the vendor default.
    pub fn cipher(&self) -> Result<EcbCipher, CryptoError> {
        match &self.sec_key {
            Some(key) => EcbCipher::new(key.as_bytes()),
            None => Ok(EcbCipher::default_key()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_uses_protocol_defaults() {
        let session = Session::new("192.168.1.20");
        assert_eq!(session.port(), 7000);
        assert_eq!(session.try_limit(), 3);
        assert!(!session.is_bound());
        assert_eq!(session.peer(), "192.168.1.20:7000");
    }

    #[test]
    fn ipv6_hosts_are_bracketed() {
        let mut session = Session::new("fe80::1");
        session.set_port(7001);
        assert_eq!(session.peer(), "[fe80::1]:7001");
    }

    #[test]
    fn deserializes_with_defaults() {
        let session: Session =
            serde_json::from_str(r#"{"host":"10.0.0.5","cid":"aabbccddeeff"}"#).unwrap();
        assert_eq!(session.port(), 7000);
        assert_eq!(session.try_limit(), 3);
        assert_eq!(session.cid(), "aabbccddeeff");
        assert_eq!(session.sec_key(), None);
    }

    #[test]
    fn bad_bound_key_surfaces_as_crypto_error() {
        let mut session = Session::new("10.0.0.5");
        session.set_sec_key("short");
        assert_eq!(
            session.cipher().unwrap_err(),
            CryptoError::InvalidKeyLength(5)
        );
    }
}

//! Envelope codec: builds the outer JSON envelope around an encrypted inner
//! payload and reverses it for device replies.
//!
//! Zero padding leaves garbage after the decrypted JSON text, so decoding cuts
//! the plaintext at the first `}`. Text that still fails to parse is kept
//! verbatim in [`ResponsePack::raw`] rather than rejected.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::crypto::{CryptoError, EcbCipher};
use crate::messages::{Envelope, InnerRequest, Request, Response, ResponsePack, PACK};

/// Packs shorter than this many base64 characters are treated as absent.
pub const MIN_PACK_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serializes `inner`, encrypts it and returns the base64 pack.
pub fn seal<T: Serialize>(inner: &T, cipher: &EcbCipher) -> Result<String, CodecError> {
    let json = serde_json::to_vec(inner)?;
    debug!(pack = %String::from_utf8_lossy(&json), "sealing pack");
    Ok(STANDARD.encode(cipher.encrypt(&json)))
}

/// Base64-decodes and decrypts a pack, returning the unpadded plaintext.
pub fn unseal(pack: &str, cipher: &EcbCipher) -> Result<Vec<u8>, CodecError> {
    let sealed = STANDARD
        .decode(pack)
        .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
    Ok(cipher.decrypt(&sealed)?)
}

/// Cuts decrypted text just after the first closing brace.
pub fn json_body(plain: &[u8]) -> Result<&[u8], CodecError> {
    match plain.iter().position(|b| *b == b'}') {
        Some(end) if end > 1 => Ok(&plain[..=end]),
        _ => Err(CodecError::Protocol("malformed payload".into())),
    }
}

/// Decodes a pack into any JSON type, without the raw-text fallback.
pub fn open_as<T: DeserializeOwned>(pack: &str, cipher: &EcbCipher) -> Result<T, CodecError> {
    let plain = unseal(pack, cipher)?;
    Ok(serde_json::from_slice(json_body(&plain)?)?)
}

/// Decodes a device reply pack.
///
/// JSON that fails to parse is not an error: the plaintext lands in
/// `raw` of an otherwise empty pack.
pub fn open(pack: &str, cipher: &EcbCipher) -> Result<ResponsePack, CodecError> {
    let plain = unseal(pack, cipher)?;
    let body = json_body(&plain)?;
    debug!(pack = %String::from_utf8_lossy(body), "opened pack");
    match serde_json::from_slice::<ResponsePack>(body) {
        Ok(parsed) => Ok(parsed),
        Err(err) => {
            warn!(error = %err, "pack is not valid json, keeping raw text");
            Ok(ResponsePack {
                raw: Some(String::from_utf8_lossy(&plain).into_owned()),
                ..ResponsePack::default()
            })
        }
    }
}

/// Parses the outer envelope of a received datagram.
pub fn parse_envelope(datagram: &[u8]) -> Result<Envelope, CodecError> {
    Ok(serde_json::from_slice(datagram)?)
}

/// Builds the wire bytes for `request`.
///
/// Everything except a scan is re-tagged `pack` and carries the device
/// identity inside the encrypted payload.
pub fn encode_request(
    request: &Request,
    cid: &str,
    cipher: &EcbCipher,
) -> Result<Vec<u8>, CodecError> {
    let envelope = match request {
        Request::Scan => Envelope::scan(),
        Request::Bind { cid: target } => Envelope {
            t: PACK.into(),
            i: 1,
            tcid: target.clone(),
            pack: Some(seal(
                &InnerRequest::Bind {
                    mac: target.clone(),
                    uid: 0,
                },
                cipher,
            )?),
            ..Envelope::default()
        },
        Request::Set { opt, p } => Envelope {
            t: PACK.into(),
            cid: cid.to_string(),
            pack: Some(seal(
                &InnerRequest::Cmd {
                    opt: opt.clone(),
                    p: p.clone(),
                    mac: cid.to_string(),
                },
                cipher,
            )?),
            ..Envelope::default()
        },
        Request::Get { cols } => Envelope {
            t: PACK.into(),
            cid: cid.to_string(),
            pack: Some(seal(
                &InnerRequest::Status {
                    cols: cols.clone(),
                    mac: cid.to_string(),
                },
                cipher,
            )?),
            ..Envelope::default()
        },
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Decodes the inner payload of a received envelope, if it has one.
pub fn decode_response(envelope: Envelope, cipher: &EcbCipher) -> Result<Response, CodecError> {
    let pack = match envelope.pack.as_deref() {
        Some(pack) if pack.len() >= MIN_PACK_LEN => Some(open(pack, cipher)?),
        _ => None,
    };
    Ok(Response { envelope, pack })
}

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::alias::{AliasError, AliasTable, PropertyValue};
use crate::codec::{self, CodecError};
use crate::crypto::{CryptoError, EcbCipher};
use crate::messages::{DeviceInfo, Request, Response, ResponsePack, BIND_OK};
use crate::session::Session;
use crate::transport::{DatagramTransport, TransportError, UdpTransport};

/// Alias-translated property values keyed by property code.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// Errors emitted by the protocol engine.
///
/// Transport and codec failures are passed through from the lower layers;
/// `Discovery` and `Binding` report replies that arrived but failed the
/// phase's checks.
#[derive(Debug)]
#[non_exhaustive]
pub enum ClientError {
    /// Socket failures or exhausted attempts.
    Transport(TransportError),
    /// Encryption, encoding or payload framing failures.
    Codec(CodecError),
    /// Values with no alias entry, or names the table does not know.
    Alias(AliasError),
    /// Scan reply whose identity did not check out.
    Discovery(String),
    /// Bind reply without a usable key.
    Binding(String),
    /// Reply that does not answer the request that was sent.
    Protocol(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Transport(err) => write!(f, "transport error: {}", err),
            ClientError::Codec(err) => write!(f, "{}", err),
            ClientError::Alias(err) => write!(f, "alias error: {}", err),
            ClientError::Discovery(err) => write!(f, "discovery error: {}", err),
            ClientError::Binding(err) => write!(f, "binding error: {}", err),
            ClientError::Protocol(err) => write!(f, "protocol error: {}", err),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Transport(err) => Some(err),
            ClientError::Codec(err) => Some(err),
            ClientError::Alias(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        ClientError::Transport(err)
    }
}

impl From<CodecError> for ClientError {
    fn from(err: CodecError) -> Self {
        ClientError::Codec(err)
    }
}

impl From<CryptoError> for ClientError {
    fn from(err: CryptoError) -> Self {
        ClientError::Codec(CodecError::Crypto(err))
    }
}

impl From<AliasError> for ClientError {
    fn from(err: AliasError) -> Self {
        ClientError::Alias(err)
    }
}

/// Protocol engine for a single device.
///
/// Phases run in order by caller discipline: `scan` adopts the device
/// identity, `bind` adopts the shared key, then `set`/`get` exchange commands.
/// Scan and bind always use the vendor default key. `set`/`get` use the bound
/// key, falling back to the default key when nothing is bound yet.
///
/// # Guarantees
/// * One exchange at a time: every call takes `&mut self` and awaits its reply.
/// * The session changes only on a successful scan (identity) or bind (key).
/// * No background tasks; each exchange opens and drops its own socket.
#[derive(Debug)]
pub struct GreeClient<T: DatagramTransport = UdpTransport> {
    session: Session,
    aliases: Arc<AliasTable>,
    transport: T,
}

impl GreeClient<UdpTransport> {
    /// Client over UDP with default timings and the stock alias table.
    pub fn new(session: Session) -> Self {
        Self::with_transport(
            session,
            Arc::new(AliasTable::gree_default()),
            UdpTransport::default(),
        )
    }
}

impl<T: DatagramTransport> GreeClient<T> {
    pub fn with_transport(session: Session, aliases: Arc<AliasTable>, transport: T) -> Self {
        Self {
            session,
            aliases,
            transport,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    async fn round_trip(
        &self,
        request: &Request,
        cipher: &EcbCipher,
    ) -> Result<Response, ClientError> {
        debug!(kind = request.kind(), peer = %self.session.peer(), "sending request");
        let bytes = codec::encode_request(request, self.session.cid(), cipher)?;
        let envelope = self
            .transport
            .exchange(&self.session.peer(), &bytes, self.session.try_limit())
            .await?;
        Ok(codec::decode_response(envelope, cipher)?)
    }

    /// Probes the device and adopts the identity it reports.
    ///
    /// # Errors
    /// `Discovery` when the reply has no metadata, reports an empty `mac`, or
    /// its `mac` differs from the envelope `cid`.
    pub async fn scan(&mut self) -> Result<DeviceInfo, ClientError> {
        let response = self
            .round_trip(&Request::Scan, &EcbCipher::default_key())
            .await?;
        let mut pack = response
            .pack
            .ok_or_else(|| ClientError::Discovery("scan reply carries no device metadata".into()))?;
        if pack.mac.is_empty() {
            return Err(ClientError::Discovery(match pack.raw.take() {
                Some(raw) => format!("scan reply is not device metadata: {raw:?}"),
                None => "scan reply carries no device identity".into(),
            }));
        }
        if pack.mac != response.envelope.cid {
            return Err(ClientError::Discovery(format!(
                "device claims {:?} but reports {:?}",
                response.envelope.cid, pack.mac
            )));
        }

        self.session.set_cid(pack.mac.clone());
        info!(cid = %pack.mac, name = %pack.name, "found device");
        Ok(DeviceInfo::from(&pack))
    }

    /// Negotiates the per-device key and stores it in the session.
    ///
    /// # Errors
    /// `Binding` when no identity is known yet, the reply is not JSON (its
    /// text is quoted in the message), or it is not `bindok` with a key.
    pub async fn bind(&mut self) -> Result<String, ClientError> {
        if self.session.cid().is_empty() {
            return Err(ClientError::Binding("device identity unknown; scan first".into()));
        }
        let request = Request::Bind {
            cid: self.session.cid().to_string(),
        };
        let response = self.round_trip(&request, &EcbCipher::default_key()).await?;
        let mut pack = response.pack.unwrap_or_default();
        if let Some(raw) = pack.raw.take() {
            return Err(ClientError::Binding(format!("bind reply is not json: {raw:?}")));
        }
        if pack.t != BIND_OK || pack.key.is_empty() {
            return Err(ClientError::Binding(format!(
                "device answered {:?} without a key",
                pack.t
            )));
        }

        self.session.set_sec_key(pack.key.clone());
        info!(cid = %self.session.cid(), "bound device key");
        Ok(pack.key)
    }

    /// Sets each property to its raw wire value and returns the device's
    /// acknowledged values, alias-translated.
    pub async fn set(&mut self, props: &[(&str, i64)]) -> Result<PropertyMap, ClientError> {
        let opt: Vec<String> = props.iter().map(|(code, _)| code.to_string()).collect();
        let p = props.iter().map(|(_, value)| *value).collect();
        let cipher = self.session.cipher()?;
        let response = self
            .round_trip(&Request::Set { opt: opt.clone(), p }, &cipher)
            .await?;
        let pack = expect_pack(response)?;
        if pack.val.len() != opt.len() {
            return Err(ClientError::Protocol(format!(
                "acknowledged {} value(s) for {} properties",
                pack.val.len(),
                opt.len()
            )));
        }
        self.translate(opt.iter().map(String::as_str).zip(pack.val))
    }

    /// Like [`set`](Self::set), with values given as alias names.
    ///
    /// Names are checked before anything is sent.
    pub async fn set_named(&mut self, props: &[(&str, &str)]) -> Result<PropertyMap, ClientError> {
        let raw = props
            .iter()
            .map(|(code, name)| {
                let index = self.aliases.reverse_resolve(code, name)?;
                Ok::<_, AliasError>((*code, index))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.set(&raw).await
    }

    /// Reads the listed properties.
    pub async fn get(&mut self, cols: &[&str]) -> Result<PropertyMap, ClientError> {
        let cols: Vec<String> = cols.iter().map(|code| code.to_string()).collect();
        let cipher = self.session.cipher()?;
        let response = self
            .round_trip(&Request::Get { cols: cols.clone() }, &cipher)
            .await?;
        let pack = expect_pack(response)?;
        if pack.cols != cols {
            return Err(ClientError::Protocol(format!(
                "asked for {:?}, device answered {:?}",
                cols, pack.cols
            )));
        }
        if pack.dat.len() != cols.len() {
            return Err(ClientError::Protocol(format!(
                "{} value(s) for {} column(s)",
                pack.dat.len(),
                cols.len()
            )));
        }
        self.translate(cols.iter().map(String::as_str).zip(pack.dat))
    }

    fn translate<'a>(
        &self,
        values: impl Iterator<Item = (&'a str, i64)>,
    ) -> Result<PropertyMap, ClientError> {
        values
            .map(|(code, raw)| {
                let value = self.aliases.resolve_value(code, raw)?;
                Ok::<_, AliasError>((code.to_string(), value))
            })
            .collect::<Result<PropertyMap, AliasError>>()
            .map_err(ClientError::from)
    }
}

fn expect_pack(response: Response) -> Result<ResponsePack, ClientError> {
    let mut pack = response
        .pack
        .ok_or_else(|| ClientError::Protocol("reply carries no payload".into()))?;
    match pack.raw.take() {
        Some(raw) => Err(ClientError::Protocol(format!("reply is not json: {raw:?}"))),
        None => Ok(pack),
    }
}

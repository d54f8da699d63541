//! Gree air-conditioner LAN protocol client.
//!
//! Discovers a unit, binds a per-device AES key with it and exchanges
//! encrypted command/status packs over JSON-on-UDP. Device integer codes are
//! translated to readable names through an injected [`AliasTable`].

pub mod alias;
pub mod codec;
pub mod crypto;
pub mod e2e_common;
pub mod messages;
pub mod sdk;
pub mod session;
pub mod transport;

pub use alias::{AliasError, AliasTable, PropertyValue};
pub use codec::CodecError;
pub use crypto::{CryptoError, EcbCipher, DEFAULT_KEY};
pub use messages::{DeviceInfo, Envelope, InnerRequest, Request, ResponsePack};
pub use sdk::{ClientError, DiscoveryClient, GreeClient, PropertyMap};
pub use session::Session;
pub use transport::{DatagramTransport, TransportConfig, TransportError, UdpTransport};

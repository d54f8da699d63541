//! Client-side engine: discovery, key binding and the generic get/set
//! primitive, plus a LAN-wide scan helper.
pub mod client;
pub mod discovery;

pub use client::{ClientError, GreeClient, PropertyMap};
pub use discovery::{DiscoveredDevice, DiscoveryClient, DiscoveryClientError};

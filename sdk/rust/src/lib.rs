//! Per-feature convenience API built on the generic get/set primitive.
//!
//! Each call maps to exactly one `set`/`get` on [`GreeClient`]; alias
//! translation and error reporting come from the protocol layer unchanged.
use gree::sdk::{ClientError, GreeClient, PropertyMap};
use gree::session::Session;
use gree::transport::{DatagramTransport, UdpTransport};
use gree::DeviceInfo;

/// SDK error is the protocol client's error; the layering stays visible.
pub type SDKError = ClientError;

/// Columns read by [`AirConditioner::status`].
pub const STATUS_COLUMNS: [&str; 18] = [
    "Pow",
    "Mod",
    "SetTem",
    "WdSpd",
    "Air",
    "Blo",
    "Health",
    "SwhSlp",
    "Lig",
    "SwingLfRig",
    "SwUpDn",
    "Quiet",
    "Tur",
    "StHt",
    "TemUn",
    "HeatCoolType",
    "TemRec",
    "SvSt",
];

/// High-level handle for one air conditioner.
pub struct AirConditioner<T: DatagramTransport = UdpTransport> {
    inner: GreeClient<T>,
}

impl AirConditioner<UdpTransport> {
    pub fn new(session: Session) -> Self {
        Self {
            inner: GreeClient::new(session),
        }
    }
}

impl<T: DatagramTransport> AirConditioner<T> {
    pub fn from_client(inner: GreeClient<T>) -> Self {
        Self { inner }
    }

    pub fn client(&self) -> &GreeClient<T> {
        &self.inner
    }

    pub fn client_mut(&mut self) -> &mut GreeClient<T> {
        &mut self.inner
    }

    /// Finds the unit at the session address and adopts its identity.
    pub async fn scan(&mut self) -> Result<DeviceInfo, SDKError> {
        self.inner.scan().await
    }

    /// Obtains the per-device key; call after [`scan`](Self::scan).
    pub async fn bind(&mut self) -> Result<String, SDKError> {
        self.inner.bind().await
    }

    pub async fn on(&mut self) -> Result<PropertyMap, SDKError> {
        self.inner.set(&[("Pow", 1)]).await
    }

    pub async fn off(&mut self) -> Result<PropertyMap, SDKError> {
        self.inner.set(&[("Pow", 0)]).await
    }

    /// Reads every column in [`STATUS_COLUMNS`].
    pub async fn status(&mut self) -> Result<PropertyMap, SDKError> {
        let status = self.inner.get(&STATUS_COLUMNS).await?;
        tracing::debug!(columns = status.len(), "read unit status");
        Ok(status)
    }

    pub async fn power(&mut self) -> Result<PropertyMap, SDKError> {
        self.inner.get(&["Pow"]).await
    }

    pub async fn mode(&mut self) -> Result<PropertyMap, SDKError> {
        self.inner.get(&["Mod"]).await
    }

    /// `mode` is one of `auto`, `cool`, `dry`, `fan`, `heat`.
    pub async fn set_mode(&mut self, mode: &str) -> Result<PropertyMap, SDKError> {
        self.inner.set_named(&[("Mod", mode)]).await
    }

    pub async fn vent_speed(&mut self) -> Result<PropertyMap, SDKError> {
        self.inner.get(&["WdSpd"]).await
    }

    /// `speed` is one of `auto`, `low`, `medium-low`, `medium`, `medium-high`, `high`.
    pub async fn set_vent_speed(&mut self, speed: &str) -> Result<PropertyMap, SDKError> {
        self.inner.set_named(&[("WdSpd", speed)]).await
    }

    /// Target temperature (`SetTem`) and the half-degree flag (`Add0.5`).
    pub async fn temperature(&mut self) -> Result<PropertyMap, SDKError> {
        self.inner.get(&["SetTem", "Add0.5"]).await
    }

    /// Sets the target in whole degrees Celsius, plus half a degree when `add_half`.
    pub async fn set_temperature(
        &mut self,
        degrees: i64,
        add_half: bool,
    ) -> Result<PropertyMap, SDKError> {
        self.inner
            .set(&[("SetTem", degrees), ("Add0.5", i64::from(add_half))])
            .await
    }

    pub async fn health(&mut self) -> Result<PropertyMap, SDKError> {
        self.inner.get(&["Health"]).await
    }

    pub async fn set_health(&mut self, enable: bool) -> Result<PropertyMap, SDKError> {
        self.inner.set(&[("Health", i64::from(enable))]).await
    }
}

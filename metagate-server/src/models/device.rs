use serde::{Deserialize, Serialize};

/// A detector/gate unit known to the gateway.
///
/// `online` is derived state: it is recomputed by the liveness monitor and
/// by protocol activity, and deliberately never restored from persisted
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub uid: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub firmware: String,
    #[serde(default)]
    pub revision: String,
    /// Physical object/location label reported by the device.
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub ip: String,
    /// Per-device ONVIF HTTP port.
    #[serde(default)]
    pub port: u16,
    /// Transport adapter kind ("udp", "tcp").
    #[serde(default)]
    pub adapter: String,
    /// Adapter connection string, e.g. "192.168.1.50:50000".
    #[serde(default)]
    pub adapter_ds: String,

    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default, skip_deserializing)]
    pub online: bool,
}

fn enabled_default() -> bool {
    true
}

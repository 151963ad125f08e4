use std::env;
use std::error::Error;
use std::fs;

use serde::{Deserialize, Serialize};

use crate::models::Device;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

impl Default for Logger {
    fn default() -> Self {
        Self {
            level: String::from("info"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Web {
    pub host: String,
    pub port: u16,
}

impl Default for Web {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 8080,
        }
    }
}

/// ONVIF surface settings shared by the device services, the events
/// service and the WS-Discovery responder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Onvif {
    /// Address advertised in XAddrs; auto-detected per request when empty.
    #[serde(default)]
    pub public_ip: Option<String>,
    /// Interface address used for the multicast group join.
    #[serde(default)]
    pub lan_ip: Option<String>,
    pub device_path: String,
    pub events_path: String,
    /// Pull-point subscription lifetime.
    pub subscription_ttl_secs: u64,
}

impl Default for Onvif {
    fn default() -> Self {
        Self {
            public_ip: None,
            lan_ip: None,
            device_path: String::from("/onvif/device_service"),
            events_path: String::from("/onvif/events"),
            subscription_ttl_secs: 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detector {
    /// UDP port the detectors broadcast on; also the liveness probe port.
    pub port: u16,
    pub ping_interval_secs: u64,
    pub monitor_interval_secs: u64,
    pub pump_interval_millis: u64,
    pub event_buffer: usize,
    pub audit_log: String,
    pub state_path: String,
}

impl Default for Detector {
    fn default() -> Self {
        Self {
            port: 50000,
            ping_interval_secs: 10,
            monitor_interval_secs: 30,
            pump_interval_millis: 100,
            event_buffer: 1024,
            audit_log: String::from("./detector_logs.csv"),
            state_path: String::from("./state/state.json"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub logger: Logger,
    #[serde(default)]
    pub web: Web,
    #[serde(default)]
    pub onvif: Onvif,
    #[serde(default)]
    pub detector: Detector,
    /// Seed devices merged into the persisted state on first start.
    #[serde(default)]
    pub devices: Vec<Device>,
}

impl Settings {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let path =
            env::var("METAGATE_CONFIG").unwrap_or_else(|_| String::from("configs/default.toml"));

        let settings: Settings = toml::from_str(&fs::read_to_string(&path)?)?;

        Ok(settings)
    }

    /// Base URL the events service embeds in subscription references.
    pub fn base_url(&self) -> String {
        let host = self
            .onvif
            .public_ip
            .clone()
            .unwrap_or_else(|| self.web.host.clone());
        format!("http://{}:{}", host, self.web.port)
    }
}

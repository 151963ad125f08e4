use std::env;
use std::error::Error;
use std::fs;

use serde::{Deserialize, Serialize};

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
pub struct Settings {
    #[serde(default)]
    pub logger: Logger,
    /// Gateway base URL.
    pub gateway_url: String,
    /// Built-in gate identity to emulate.
    pub device_id: String,
    #[serde(default = "status_interval_default")]
    pub status_interval_secs: u64,
}

fn status_interval_default() -> u64 {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            logger: Logger::default(),
            gateway_url: String::from("http://127.0.0.1:8080"),
            device_id: String::from("gate-001"),
            status_interval_secs: status_interval_default(),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let path = env::var("METAGATE_EMULATOR_CONFIG")
            .unwrap_or_else(|_| String::from("configs/emulator.toml"));

        let settings: Settings = toml::from_str(&fs::read_to_string(&path)?)?;

        Ok(settings)
    }
}

use std::error::Error;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::Device;

#[derive(Debug, Serialize, Deserialize)]
struct State {
    devices: Vec<Device>,
}

/// Loads the persisted device snapshot, seeding it from the configured
/// devices when the file does not exist yet. Failures here are fatal to
/// startup; everything downstream runs off the returned snapshot.
pub fn load_or_init(path: &str, seed: &[Device]) -> Result<Vec<Device>, Box<dyn Error>> {
    let file = Path::new(path);

    if !file.exists() {
        if let Some(dir) = file.parent() {
            fs::create_dir_all(dir)?;
        }
        let state = State {
            devices: seed.to_vec(),
        };
        fs::write(file, serde_json::to_vec_pretty(&state)?)?;
        tracing::info!(path, devices = seed.len(), "state file initialized");
        return Ok(state.devices);
    }

    let state: State = serde_json::from_slice(&fs::read(file)?)?;
    tracing::info!(path, devices = state.devices.len(), "state file loaded");

    Ok(state.devices)
}

/// Persists the current device snapshot after an administrative edit.
pub fn save_devices(path: &str, devices: Vec<Device>) -> Result<(), Box<dyn Error>> {
    let file = Path::new(path);
    if let Some(dir) = file.parent() {
        fs::create_dir_all(dir)?;
    }

    let state = State { devices };
    fs::write(file, serde_json::to_vec_pretty(&state)?)?;

    Ok(())
}

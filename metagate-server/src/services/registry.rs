use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::models::Device;

/// Virtual gates that exist regardless of what is discovered on the wire.
/// They back the HTTP-polling emulators and are exempt from TCP liveness
/// probing.
pub const BUILT_IN_UIDS: [&str; 4] = ["gate-001", "gate-002", "gate-003", "gate-004"];

pub fn is_built_in(uid: &str) -> bool {
    BUILT_IN_UIDS.contains(&uid)
}

/// Authoritative in-memory set of known devices, keyed by uid.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, Device>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, uid: &str) -> Option<Device> {
        self.devices.read().await.get(uid).cloned()
    }

    /// Inserts or replaces a device. Replacing keeps the previous `enabled`
    /// flag so an operator's choice survives re-discovery.
    pub async fn upsert(&self, mut device: Device) {
        let mut devices = self.devices.write().await;
        if let Some(existing) = devices.get(&device.uid) {
            device.enabled = existing.enabled;
        }
        devices.insert(device.uid.clone(), device);
    }

    /// Flips the online flag. Returns true when this was a transition, so
    /// callers can log only the edges.
    pub async fn set_online(&self, uid: &str, online: bool) -> bool {
        let mut devices = self.devices.write().await;
        match devices.get_mut(uid) {
            Some(device) if device.online != online => {
                device.online = online;
                true
            }
            _ => false,
        }
    }

    pub async fn set_enabled(&self, uid: &str, enabled: bool) -> bool {
        let mut devices = self.devices.write().await;
        match devices.get_mut(uid) {
            Some(device) => {
                device.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Resolves a device by its adapter connection string.
    pub async fn find_by_adapter_ds(&self, adapter_ds: &str) -> Option<Device> {
        self.devices
            .read()
            .await
            .values()
            .find(|device| device.adapter_ds == adapter_ds)
            .cloned()
    }

    /// All devices, sorted by uid for stable API output.
    pub async fn list(&self) -> Vec<Device> {
        let mut devices: Vec<Device> = self.devices.read().await.values().cloned().collect();
        devices.sort_by(|a, b| a.uid.cmp(&b.uid));
        devices
    }

    /// Devices an operator has not switched off. Liveness is a separate
    /// concern; consumers that need it filter on `online` themselves.
    pub async fn list_visible(&self) -> Vec<Device> {
        let mut devices: Vec<Device> = self
            .devices
            .read()
            .await
            .values()
            .filter(|device| device.enabled)
            .cloned()
            .collect();
        devices.sort_by(|a, b| a.uid.cmp(&b.uid));
        devices
    }
}

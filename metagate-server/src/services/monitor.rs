use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tracing::{debug, info};

use super::registry::{DeviceRegistry, is_built_in};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Periodic TCP liveness probe. A device that accepts a connection on the
/// detector port is online; a refused or timed-out connect marks it
/// offline. Built-in virtual gates are skipped, their liveness is driven
/// by HTTP polling activity instead.
pub struct LivenessMonitor {
    registry: Arc<DeviceRegistry>,
    interval: Duration,
    probe_port: u16,
}

impl LivenessMonitor {
    pub fn new(registry: Arc<DeviceRegistry>, interval: Duration, probe_port: u16) -> Self {
        Self {
            registry,
            interval,
            probe_port,
        }
    }

    /// Spawns the probe loop. Dropping or signalling the returned sender
    /// stops it.
    pub fn start(self) -> oneshot::Sender<()> {
        let (stop_tx, mut stop_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        info!("liveness monitor stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.sweep().await;
                    }
                }
            }
        });

        stop_tx
    }

    async fn sweep(&self) {
        for device in self.registry.list().await {
            if is_built_in(&device.uid) || device.ip.is_empty() {
                continue;
            }

            let online = probe(&device.ip, self.probe_port).await;
            if self.registry.set_online(&device.uid, online).await {
                info!(uid = %device.uid, ip = %device.ip, online, "device liveness changed");
            } else {
                debug!(uid = %device.uid, online, "device liveness unchanged");
            }
        }
    }
}

async fn probe(ip: &str, port: u16) -> bool {
    let addr = format!("{ip}:{port}");
    matches!(
        tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(&addr)).await,
        Ok(Ok(_))
    )
}

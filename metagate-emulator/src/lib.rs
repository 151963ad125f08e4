pub mod command;
pub mod settings;
pub mod simulate;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::command::PingResponse;
use crate::settings::Settings;
use crate::simulate::GateSimulator;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_PAUSE: Duration = Duration::from_secs(3);

/// Drives one emulated gate against the gateway: a long-poll loop that
/// fetches commands, plus periodic status reports. The two loops run
/// independently so a status tick never cuts a long poll short.
pub async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
    let simulator = Arc::new(Mutex::new(GateSimulator::new(settings.device_id.clone())));
    info!(device_id = %settings.device_id, gateway = %settings.gateway_url, "emulator started");

    let status_task = {
        let client = client.clone();
        let simulator = simulator.clone();
        let url = format!(
            "{}/api/v1/device/{}/status",
            settings.gateway_url, settings.device_id
        );
        let interval = Duration::from_secs(settings.status_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let status = simulator.lock().await.next_status();
                if let Err(err) = client.post(&url).json(&status).send().await {
                    warn!(%err, "status report failed");
                }
            }
        })
    };

    let ping_task = {
        let url = format!(
            "{}/api/v1/device/{}/ping",
            settings.gateway_url, settings.device_id
        );
        tokio::spawn(async move {
            loop {
                match client.post(&url).send().await {
                    Ok(response) => match response.json::<PingResponse>().await {
                        Ok(ping) if ping.ok => {
                            let mut simulator = simulator.lock().await;
                            for command in &ping.commands {
                                simulator.apply_command(command);
                            }
                        }
                        Ok(_) => {
                            warn!("gateway rejected ping");
                            tokio::time::sleep(RETRY_PAUSE).await;
                        }
                        Err(err) => {
                            warn!(%err, "bad ping response");
                            tokio::time::sleep(RETRY_PAUSE).await;
                        }
                    },
                    Err(err) => {
                        warn!(%err, "ping failed");
                        tokio::time::sleep(RETRY_PAUSE).await;
                    }
                }
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    info!("emulator stopped");
    status_task.abort();
    ping_task.abort();

    Ok(())
}

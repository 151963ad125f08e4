pub mod adapters;
pub mod app;
pub mod codec;
pub mod configs;
pub mod errors;
pub mod handles;
pub mod models;
pub mod onvif;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::adapters::{TcpAdapter, UdpAdapter};
use crate::configs::Settings;
use crate::handles::DeviceState;
use crate::models::Device;
use crate::onvif::{EventService, SubscriptionManager, serve_device_services, spawn_pump};
use crate::services::{
    BUILT_IN_UIDS, CommandHub, CsvAudit, DeviceRegistry, DiscoveryResponder, EventBus,
    LivenessMonitor, PacketIngest, PgmRenderer,
};

pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let devices = configs::load_or_init(&settings.detector.state_path, &settings.devices)
        .map_err(|err| anyhow!("state load failed: {err}"))?;

    let registry = Arc::new(DeviceRegistry::new());
    for device in &devices {
        // Wire devices start offline; the monitor and protocol activity
        // bring them back up. Built-in virtual gates are always up.
        let mut device = device.clone();
        device.online = services::is_built_in(&device.uid);
        registry.upsert(device).await;
    }
    for uid in BUILT_IN_UIDS {
        if registry.get(uid).await.is_none() {
            registry
                .upsert(Device {
                    uid: uid.to_string(),
                    name: uid.to_string(),
                    adapter: String::from("http"),
                    enabled: true,
                    online: true,
                    ..Device::default()
                })
                .await;
        }
    }

    let bus = Arc::new(EventBus::new(settings.detector.event_buffer));
    let hub = Arc::new(CommandHub::new());
    let subscriptions = Arc::new(SubscriptionManager::new());
    let audit = Arc::new(
        CsvAudit::open(&settings.detector.audit_log)
            .map_err(|err| anyhow!("audit log open failed: {err}"))?,
    );
    let ingest = Arc::new(PacketIngest::new(
        registry.clone(),
        bus.clone(),
        Arc::new(PgmRenderer),
        audit,
    ));

    let mut stops: Vec<oneshot::Sender<()>> = Vec::new();

    stops.push(
        LivenessMonitor::new(
            registry.clone(),
            Duration::from_secs(settings.detector.monitor_interval_secs),
            settings.detector.port,
        )
        .start(),
    );

    match UdpAdapter::new(
        settings.detector.port,
        Duration::from_secs(settings.detector.ping_interval_secs),
        ingest.clone(),
    )
    .start()
    .await
    {
        Ok(stop) => stops.push(stop),
        Err(err) => warn!(%err, "udp adapter not started"),
    }

    for device in &devices {
        if device.adapter == "tcp" && !device.adapter_ds.is_empty() {
            stops.push(
                TcpAdapter::new(device.uid.clone(), device.adapter_ds.clone(), ingest.clone())
                    .start(),
            );
        }
    }

    match DiscoveryResponder::new(
        registry.clone(),
        settings.onvif.public_ip.clone(),
        settings.onvif.lan_ip.clone(),
        settings.onvif.device_path.clone(),
    )
    .start()
    .await
    {
        Ok(stop) => stops.push(stop),
        Err(err) => warn!(%err, "ws-discovery responder not started"),
    }

    stops.push(spawn_pump(
        bus.clone(),
        subscriptions.clone(),
        Duration::from_millis(settings.detector.pump_interval_millis),
    ));

    stops.extend(serve_device_services(&settings, &devices).await);

    let event_service = Arc::new(EventService::new(
        subscriptions,
        settings.base_url(),
        settings.onvif.events_path.clone(),
        Duration::from_secs(settings.onvif.subscription_ttl_secs),
    ));
    let device_state = DeviceState {
        registry,
        hub,
        bus,
        state_path: settings.detector.state_path.clone(),
    };
    let app = app::create_app(device_state, event_service, &settings.onvif.events_path);

    let addr = format!("{}:{}", settings.web.host, settings.web.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    for stop in stops {
        let _ = stop.send(());
    }

    Ok(())
}

use std::net::SocketAddr;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::codec::{CMD_DISCOVERY, CMD_EVENT, DiscoveryPacket, EventPacket};
use crate::models::{Device, Event};

use super::event_bus::EventBus;
use super::registry::DeviceRegistry;

/// Renders the zone level grid of an event packet into an image.
pub trait ZoneRenderer: Send + Sync {
    /// Returns the encoded image bytes, or None when rendering is
    /// unavailable for this packet.
    fn render(&self, packet: &EventPacket) -> Option<Vec<u8>>;
}

/// Sink for the detection audit trail.
pub trait DetectionAudit: Send + Sync {
    fn record(&self, device_id: &str, ip: &str, packet: &EventPacket);
}

/// Turns raw datagrams from the detector transports into registry updates
/// and bus events.
pub struct PacketIngest {
    registry: Arc<DeviceRegistry>,
    bus: Arc<EventBus>,
    renderer: Arc<dyn ZoneRenderer>,
    audit: Arc<dyn DetectionAudit>,
}

impl PacketIngest {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        bus: Arc<EventBus>,
        renderer: Arc<dyn ZoneRenderer>,
        audit: Arc<dyn DetectionAudit>,
    ) -> Self {
        Self {
            registry,
            bus,
            renderer,
            audit,
        }
    }

    /// Dispatches on the leading command byte. Unknown commands are
    /// logged and dropped.
    pub async fn handle_packet(&self, buf: &[u8], peer: SocketAddr) {
        match buf.first() {
            Some(&CMD_DISCOVERY) => self.handle_discovery(buf, peer).await,
            Some(&CMD_EVENT) => self.handle_event(buf, peer).await,
            Some(&cmd) => debug!(cmd, %peer, "unknown command byte"),
            None => {}
        }
    }

    async fn handle_discovery(&self, buf: &[u8], peer: SocketAddr) {
        let msg = match DiscoveryPacket::decode(buf) {
            Ok(msg) => msg,
            Err(err) => {
                warn!(%peer, %err, "bad discovery packet");
                return;
            }
        };

        let uid = msg.uid.to_string();
        let device = Device {
            uid: uid.clone(),
            serial_number: msg.serial_number,
            name: msg.name,
            vendor: msg.vendor,
            model: msg.model,
            firmware: msg.version,
            revision: msg.revision,
            object: msg.object,
            ip: peer.ip().to_string(),
            port: msg.port,
            adapter: String::from("udp"),
            adapter_ds: format!("{}:{}", peer.ip(), msg.port),
            enabled: true,
            online: true,
        };

        info!(uid = %uid, ip = %device.ip, name = %device.name, "device announced");
        self.registry.upsert(device).await;

        let payload = json!({ "uid": uid, "ip": peer.ip().to_string() });
        self.bus
            .push(Event::new(uid, "system/discovery", payload.to_string().into_bytes()))
            .await;
    }

    async fn handle_event(&self, buf: &[u8], peer: SocketAddr) {
        let packet = match EventPacket::decode(buf) {
            Ok(packet) => packet,
            Err(err) => {
                warn!(%peer, %err, "bad event packet");
                return;
            }
        };

        // Events carry no uid; the sender is matched by its adapter
        // connection string, falling back to the source address alone.
        let ds = format!("{}:{}", peer.ip(), peer.port());
        let device_id = match self.registry.find_by_adapter_ds(&ds).await {
            Some(device) => device.uid,
            None => String::from("unknown"),
        };
        if device_id != "unknown" {
            self.registry.set_online(&device_id, true).await;
        }

        let mut payload = json!({ "data": packet });
        if let Some(image) = self.renderer.render(&packet) {
            payload["image"] = json!(BASE64.encode(image));
        }

        self.audit.record(&device_id, &peer.ip().to_string(), &packet);
        self.bus
            .push(Event::new(
                device_id,
                "detector/event",
                payload.to_string().into_bytes(),
            ))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::sync::Mutex;

    use super::*;

    struct NoImage;
    impl ZoneRenderer for NoImage {
        fn render(&self, _packet: &EventPacket) -> Option<Vec<u8>> {
            None
        }
    }

    #[derive(Default)]
    struct RecordingAudit {
        rows: Mutex<Vec<String>>,
    }
    impl DetectionAudit for RecordingAudit {
        fn record(&self, device_id: &str, _ip: &str, _packet: &EventPacket) {
            self.rows.lock().unwrap().push(device_id.to_string());
        }
    }

    fn ingest(
        registry: Arc<DeviceRegistry>,
        bus: Arc<EventBus>,
        audit: Arc<RecordingAudit>,
    ) -> PacketIngest {
        PacketIngest::new(registry, bus, Arc::new(NoImage), audit)
    }

    fn discovery_packet() -> DiscoveryPacket {
        DiscoveryPacket {
            serial_number: "SN-1".into(),
            name: "Gate-A".into(),
            object: "Lobby".into(),
            ip: Ipv4Addr::new(10, 0, 0, 5),
            port: 50000,
            uid: 7001,
            version: "1.0".into(),
            git_hash: "abc".into(),
            revision: "r1".into(),
            vendor: "Inforion".into(),
            model: "MD-6".into(),
        }
    }

    #[tokio::test]
    async fn test_discovery_registers_device_and_emits_event() {
        let registry = Arc::new(DeviceRegistry::new());
        let bus = Arc::new(EventBus::new(16));
        let audit = Arc::new(RecordingAudit::default());
        let ingest = ingest(registry.clone(), bus.clone(), audit);

        let peer: SocketAddr = "10.0.0.5:50000".parse().unwrap();
        ingest.handle_packet(&discovery_packet().encode(), peer).await;

        let device = registry.get("7001").await.unwrap();
        assert_eq!(device.name, "Gate-A");
        assert_eq!(device.adapter_ds, "10.0.0.5:50000");
        assert!(device.online);

        let events = bus.pull(0, 10).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1.topic, "system/discovery");
    }

    #[tokio::test]
    async fn test_event_resolves_device_and_audits() {
        let registry = Arc::new(DeviceRegistry::new());
        let bus = Arc::new(EventBus::new(16));
        let audit = Arc::new(RecordingAudit::default());
        let ingest = ingest(registry.clone(), bus.clone(), audit.clone());

        let peer: SocketAddr = "10.0.0.5:50000".parse().unwrap();
        ingest.handle_packet(&discovery_packet().encode(), peer).await;
        ingest
            .handle_packet(&EventPacket::default().encode(), peer)
            .await;

        let events = bus.pull(0, 10).await;
        assert_eq!(events[1].1.topic, "detector/event");
        assert_eq!(events[1].1.device_id, "7001");
        assert_eq!(audit.rows.lock().unwrap().as_slice(), ["7001"]);
    }

    #[tokio::test]
    async fn test_event_from_unknown_sender() {
        let registry = Arc::new(DeviceRegistry::new());
        let bus = Arc::new(EventBus::new(16));
        let audit = Arc::new(RecordingAudit::default());
        let ingest = ingest(registry, bus.clone(), audit);

        let peer: SocketAddr = "10.9.9.9:50000".parse().unwrap();
        ingest
            .handle_packet(&EventPacket::default().encode(), peer)
            .await;

        let events = bus.pull(0, 10).await;
        assert_eq!(events[0].1.device_id, "unknown");
    }

    #[tokio::test]
    async fn test_unknown_command_is_dropped() {
        let registry = Arc::new(DeviceRegistry::new());
        let bus = Arc::new(EventBus::new(16));
        let audit = Arc::new(RecordingAudit::default());
        let ingest = ingest(registry, bus.clone(), audit);

        let peer: SocketAddr = "10.0.0.5:50000".parse().unwrap();
        ingest.handle_packet(&[0x42, 0, 0], peer).await;
        assert!(bus.pull(0, 10).await.is_empty());
    }
}

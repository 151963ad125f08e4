use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::models::Device;
use crate::onvif::soap;

use super::registry::DeviceRegistry;

pub const WS_DISCOVERY_PORT: u16 = 3702;
const WS_DISCOVERY_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// Fragmentation-safe datagram ceiling for probe replies.
const MAX_DATAGRAM: usize = 1300;
/// Pause between reply chunks so slow clients keep up.
const CHUNK_PAUSE: Duration = Duration::from_millis(10);

/// WS-Discovery responder: answers multicast Probe requests with one
/// ProbeMatch per visible device, splitting across datagrams when the
/// match list outgrows a single packet.
pub struct DiscoveryResponder {
    registry: Arc<DeviceRegistry>,
    public_ip: Option<String>,
    lan_ip: Option<String>,
    device_path: String,
}

impl DiscoveryResponder {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        public_ip: Option<String>,
        lan_ip: Option<String>,
        device_path: String,
    ) -> Self {
        Self {
            registry,
            public_ip,
            lan_ip,
            device_path,
        }
    }

    pub async fn start(self) -> io::Result<oneshot::Sender<()>> {
        let socket = UdpSocket::bind(("0.0.0.0", WS_DISCOVERY_PORT)).await?;

        let interface = self
            .lan_ip
            .as_deref()
            .and_then(|ip| ip.parse().ok())
            .unwrap_or(Ipv4Addr::UNSPECIFIED);
        if let Err(err) = socket.join_multicast_v4(WS_DISCOVERY_GROUP, interface) {
            // Unicast probes still work without the group membership.
            warn!(%err, "multicast join failed");
        }
        info!(port = WS_DISCOVERY_PORT, "ws-discovery responder listening");

        let (stop_tx, mut stop_rx) = oneshot::channel();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 8192];
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        info!("ws-discovery responder stopped");
                        break;
                    }
                    received = socket.recv_from(&mut buf) => {
                        match received {
                            Ok((len, peer)) => self.respond(&socket, &buf[..len], peer).await,
                            Err(err) => warn!(%err, "ws-discovery recv failed"),
                        }
                    }
                }
            }
        });

        Ok(stop_tx)
    }

    async fn respond(&self, socket: &UdpSocket, buf: &[u8], peer: SocketAddr) {
        let request = String::from_utf8_lossy(buf);
        if !looks_like_probe(&request) {
            return;
        }
        let relates_to = soap::extract_message_id(&request)
            .unwrap_or_else(|| format!("urn:uuid:{}", uuid::Uuid::new_v4()));

        let devices = online_only(self.registry.list_visible().await);
        if devices.is_empty() {
            debug!(%peer, "probe received, no advertisable devices");
            return;
        }

        let host = self
            .public_ip
            .clone()
            .or_else(|| local_ip_for(peer))
            .unwrap_or_else(|| String::from("127.0.0.1"));

        let replies = build_probe_replies(&devices, &relates_to, &host, &self.device_path);
        debug!(%peer, devices = devices.len(), chunks = replies.len(), "answering probe");
        for (i, reply) in replies.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(CHUNK_PAUSE).await;
            }
            if let Err(err) = socket.send_to(reply.as_bytes(), peer).await {
                warn!(%peer, %err, "probe reply send failed");
                break;
            }
        }
    }
}

fn looks_like_probe(request: &str) -> bool {
    request.contains("Probe") && !request.contains("ProbeMatch")
}

/// Probes only advertise devices that are actually reachable; an enabled
/// but offline gate stays out of the match list.
fn online_only(devices: Vec<Device>) -> Vec<Device> {
    devices.into_iter().filter(|device| device.online).collect()
}

/// Source address a reply to `peer` would leave from. No packet is sent;
/// the connect only fixes the route.
fn local_ip_for(peer: SocketAddr) -> Option<String> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect(peer).ok()?;
    Some(socket.local_addr().ok()?.ip().to_string())
}

/// Stable endpoint address derived from the device uid, so repeated
/// probes see the same endpoint for the same gate.
fn endpoint_address(uid: &str) -> String {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in uid.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    format!("urn:uuid:6d657461-6761-7465-0000-{:012x}", hash & 0xffff_ffff_ffff)
}

fn probe_match(device: &Device, host: &str, device_path: &str) -> String {
    format!(
        "<d:ProbeMatch>\
         <wsa:EndpointReference><wsa:Address>{}</wsa:Address></wsa:EndpointReference>\
         <d:Types>dn:NetworkVideoTransmitter</d:Types>\
         <d:Scopes>onvif://www.onvif.org/name/{} onvif://www.onvif.org/type/{}</d:Scopes>\
         <d:XAddrs>http://{}:{}{}</d:XAddrs>\
         <d:MetadataVersion>1</d:MetadataVersion>\
         </d:ProbeMatch>",
        endpoint_address(&device.uid),
        soap::xml_escape(&device.name),
        soap::xml_escape(&device.model),
        host,
        device.port,
        device_path,
    )
}

fn wrap_matches(matches: &str, relates_to: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <s:Envelope xmlns:s=\"{}\" xmlns:wsa=\"{}\" \
         xmlns:d=\"http://schemas.xmlsoap.org/ws/2005/04/discovery\" \
         xmlns:dn=\"http://www.onvif.org/ver10/network/wsdl\">\
         <s:Header>\
         <wsa:Action>http://schemas.xmlsoap.org/ws/2005/04/discovery/ProbeMatches</wsa:Action>\
         <wsa:MessageID>urn:uuid:{}</wsa:MessageID>\
         <wsa:RelatesTo>{}</wsa:RelatesTo>\
         <wsa:To>http://www.w3.org/2005/08/addressing/anonymous</wsa:To>\
         </s:Header>\
         <s:Body><d:ProbeMatches>{}</d:ProbeMatches></s:Body>\
         </s:Envelope>",
        soap::ENV_NS,
        soap::WSA_NS,
        uuid::Uuid::new_v4(),
        soap::xml_escape(relates_to),
        matches,
    )
}

/// Splits the visible device set into ProbeMatches envelopes that each
/// fit in `MAX_DATAGRAM` bytes. A single oversized match still goes out
/// alone rather than being dropped.
fn build_probe_replies(
    devices: &[Device],
    relates_to: &str,
    host: &str,
    device_path: &str,
) -> Vec<String> {
    let overhead = wrap_matches("", relates_to).len();

    let mut replies = Vec::new();
    let mut pending = String::new();
    for device in devices {
        let fragment = probe_match(device, host, device_path);
        if !pending.is_empty() && overhead + pending.len() + fragment.len() > MAX_DATAGRAM {
            replies.push(wrap_matches(&pending, relates_to));
            pending.clear();
        }
        pending.push_str(&fragment);
    }
    if !pending.is_empty() {
        replies.push(wrap_matches(&pending, relates_to));
    }
    replies
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(uid: &str) -> Device {
        Device {
            uid: uid.to_string(),
            name: format!("Gate-{uid}"),
            model: String::from("MD-6"),
            port: 8101,
            enabled: true,
            online: true,
            ..Device::default()
        }
    }

    #[test]
    fn test_probe_detection() {
        assert!(looks_like_probe("<d:Probe/>"));
        assert!(!looks_like_probe("<d:ProbeMatches><d:ProbeMatch/></d:ProbeMatches>"));
        assert!(!looks_like_probe("<d:Hello/>"));
    }

    #[test]
    fn test_single_device_fits_one_datagram() {
        let devices = [device("7001")];
        let replies = build_probe_replies(&devices, "urn:uuid:1", "10.0.0.1", "/onvif/device_service");
        assert_eq!(replies.len(), 1);
        assert!(replies[0].len() <= MAX_DATAGRAM);
        assert!(replies[0].contains("<wsa:RelatesTo>urn:uuid:1</wsa:RelatesTo>"));
        assert!(replies[0].contains("http://10.0.0.1:8101/onvif/device_service"));
    }

    #[test]
    fn test_many_devices_are_chunked() {
        let devices: Vec<Device> = (0..20).map(|i| device(&format!("70{i:02}"))).collect();
        let replies = build_probe_replies(&devices, "urn:uuid:1", "10.0.0.1", "/onvif/device_service");

        assert!(replies.len() > 1);
        for reply in &replies {
            assert!(reply.len() <= MAX_DATAGRAM);
        }
        let total_matches: usize = replies
            .iter()
            .map(|reply| reply.matches("<d:ProbeMatch>").count())
            .sum();
        assert_eq!(total_matches, 20);
    }

    #[test]
    fn test_offline_devices_are_not_advertised() {
        let mut offline = device("7002");
        offline.online = false;
        let devices = online_only(vec![device("7001"), offline]);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].uid, "7001");
    }

    #[test]
    fn test_endpoint_address_is_stable() {
        assert_eq!(endpoint_address("gate-001"), endpoint_address("gate-001"));
        assert_ne!(endpoint_address("gate-001"), endpoint_address("gate-002"));
        assert!(endpoint_address("gate-001").starts_with("urn:uuid:"));
    }
}

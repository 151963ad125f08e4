use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::configs::Settings;
use crate::models::Device;

use super::soap;

/// One ONVIF Device Management endpoint, bound to a single device's
/// advertised port.
struct DeviceService {
    device: Device,
    public_ip: Option<String>,
    device_path: String,
    events_path: String,
    web_port: u16,
}

impl DeviceService {
    /// Host to embed in service XAddrs: the configured public address when
    /// set, otherwise whatever host the client reached us on.
    fn host_for(&self, headers: &HeaderMap) -> String {
        if let Some(ip) = &self.public_ip {
            return ip.clone();
        }
        headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(|host| host.split(':').next().unwrap_or(host).to_string())
            .unwrap_or_else(|| String::from("127.0.0.1"))
    }

    fn device_xaddr(&self, host: &str) -> String {
        format!("http://{}:{}{}", host, self.device.port, self.device_path)
    }

    fn events_xaddr(&self, host: &str) -> String {
        format!("http://{}:{}{}", host, self.web_port, self.events_path)
    }

    async fn handle(
        State(service): State<Arc<DeviceService>>,
        headers: HeaderMap,
        body: String,
    ) -> Response {
        let host = service.host_for(&headers);
        let relates_to = &soap::extract_message_id(&body).unwrap_or_default();

        let xml = if body.contains("GetDeviceInformation") {
            service.device_information(relates_to)
        } else if body.contains("GetServices") {
            service.services(&host, relates_to)
        } else if body.contains("GetCapabilities") {
            service.capabilities(&host, relates_to)
        } else if body.contains("GetScopes") {
            service.scopes(relates_to)
        } else {
            debug!(uid = %service.device.uid, "unsupported device operation");
            soap::fault("unsupported operation")
        };

        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/soap+xml; charset=utf-8")],
            xml,
        )
            .into_response()
    }

    fn device_information(&self, relates_to: &str) -> String {
        soap::envelope(
            &soap::reply_header(
                "http://www.onvif.org/ver10/device/wsdl/GetDeviceInformationResponse",
                relates_to,
            ),
            &format!(
                "<tds:GetDeviceInformationResponse xmlns:tds=\"http://www.onvif.org/ver10/device/wsdl\">\
                 <tds:Manufacturer>{}</tds:Manufacturer>\
                 <tds:Model>{}</tds:Model>\
                 <tds:FirmwareVersion>{}</tds:FirmwareVersion>\
                 <tds:SerialNumber>{}</tds:SerialNumber>\
                 <tds:HardwareId>{}</tds:HardwareId>\
                 </tds:GetDeviceInformationResponse>",
                soap::xml_escape(&self.device.vendor),
                soap::xml_escape(&self.device.model),
                soap::xml_escape(&self.device.firmware),
                soap::xml_escape(&self.device.serial_number),
                soap::xml_escape(&self.device.revision),
            ),
        )
    }

    fn services(&self, host: &str, relates_to: &str) -> String {
        soap::envelope(
            &soap::reply_header(
                "http://www.onvif.org/ver10/device/wsdl/GetServicesResponse",
                relates_to,
            ),
            &format!(
                "<tds:GetServicesResponse xmlns:tds=\"http://www.onvif.org/ver10/device/wsdl\">\
                 <tds:Service>\
                 <tds:Namespace>http://www.onvif.org/ver10/device/wsdl</tds:Namespace>\
                 <tds:XAddr>{}</tds:XAddr>\
                 <tds:Version><tt:Major xmlns:tt=\"http://www.onvif.org/ver10/schema\">2</tt:Major>\
                 <tt:Minor xmlns:tt=\"http://www.onvif.org/ver10/schema\">40</tt:Minor></tds:Version>\
                 </tds:Service>\
                 <tds:Service>\
                 <tds:Namespace>http://www.onvif.org/ver10/events/wsdl</tds:Namespace>\
                 <tds:XAddr>{}</tds:XAddr>\
                 <tds:Version><tt:Major xmlns:tt=\"http://www.onvif.org/ver10/schema\">2</tt:Major>\
                 <tt:Minor xmlns:tt=\"http://www.onvif.org/ver10/schema\">40</tt:Minor></tds:Version>\
                 </tds:Service>\
                 </tds:GetServicesResponse>",
                soap::xml_escape(&self.device_xaddr(host)),
                soap::xml_escape(&self.events_xaddr(host)),
            ),
        )
    }

    fn capabilities(&self, host: &str, relates_to: &str) -> String {
        soap::envelope(
            &soap::reply_header(
                "http://www.onvif.org/ver10/device/wsdl/GetCapabilitiesResponse",
                relates_to,
            ),
            &format!(
                "<tds:GetCapabilitiesResponse xmlns:tds=\"http://www.onvif.org/ver10/device/wsdl\" \
                 xmlns:tt=\"http://www.onvif.org/ver10/schema\">\
                 <tds:Capabilities>\
                 <tt:Device><tt:XAddr>{}</tt:XAddr></tt:Device>\
                 <tt:Events><tt:XAddr>{}</tt:XAddr>\
                 <tt:WSPullPointSupport>true</tt:WSPullPointSupport>\
                 </tt:Events>\
                 </tds:Capabilities>\
                 </tds:GetCapabilitiesResponse>",
                soap::xml_escape(&self.device_xaddr(host)),
                soap::xml_escape(&self.events_xaddr(host)),
            ),
        )
    }

    fn scopes(&self, relates_to: &str) -> String {
        let scopes = [
            format!(
                "onvif://www.onvif.org/name/{}",
                soap::xml_escape(&self.device.name)
            ),
            format!(
                "onvif://www.onvif.org/hardware/{}",
                soap::xml_escape(&self.device.model)
            ),
            format!(
                "onvif://www.onvif.org/location/{}",
                soap::xml_escape(&self.device.object)
            ),
        ];
        let items: String = scopes
            .iter()
            .map(|scope| {
                format!(
                    "<tds:Scopes><tt:ScopeDef xmlns:tt=\"http://www.onvif.org/ver10/schema\">Fixed</tt:ScopeDef>\
                     <tt:ScopeItem xmlns:tt=\"http://www.onvif.org/ver10/schema\">{scope}</tt:ScopeItem></tds:Scopes>"
                )
            })
            .collect();
        soap::envelope(
            &soap::reply_header(
                "http://www.onvif.org/ver10/device/wsdl/GetScopesResponse",
                relates_to,
            ),
            &format!(
                "<tds:GetScopesResponse xmlns:tds=\"http://www.onvif.org/ver10/device/wsdl\">{items}</tds:GetScopesResponse>"
            ),
        )
    }
}

/// Binds one Device Management endpoint per enabled device that declares
/// an ONVIF port. A port that cannot be bound is logged and skipped, the
/// rest of the gateway keeps running.
pub async fn serve_device_services(
    settings: &Settings,
    devices: &[Device],
) -> Vec<oneshot::Sender<()>> {
    let mut stops = Vec::new();

    for device in devices {
        if !device.enabled || device.port == 0 {
            continue;
        }

        let addr = format!("{}:{}", settings.web.host, device.port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(err) => {
                warn!(uid = %device.uid, %addr, %err, "device service bind failed");
                continue;
            }
        };
        info!(uid = %device.uid, %addr, "device service listening");

        let service = Arc::new(DeviceService {
            device: device.clone(),
            public_ip: settings.onvif.public_ip.clone(),
            device_path: settings.onvif.device_path.clone(),
            events_path: settings.onvif.events_path.clone(),
            web_port: settings.web.port,
        });
        let router = Router::new()
            .route(&settings.onvif.device_path, post(DeviceService::handle))
            .with_state(service);

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let shutdown = async {
                let _ = stop_rx.await;
            };
            if let Err(err) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                warn!(%err, "device service exited");
            }
        });
        stops.push(stop_tx);
    }

    stops
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> DeviceService {
        DeviceService {
            device: Device {
                uid: String::from("7001"),
                name: String::from("Gate-A"),
                vendor: String::from("Inforion"),
                model: String::from("MD-6"),
                firmware: String::from("1.2.3"),
                serial_number: String::from("SN-1"),
                revision: String::from("r4"),
                object: String::from("Lobby"),
                port: 8101,
                enabled: true,
                ..Device::default()
            },
            public_ip: None,
            device_path: String::from("/onvif/device_service"),
            events_path: String::from("/onvif/events"),
            web_port: 8080,
        }
    }

    #[test]
    fn test_host_prefers_public_ip() {
        let mut svc = service();
        svc.public_ip = Some(String::from("203.0.113.7"));
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "10.0.0.1:8101".parse().unwrap());
        assert_eq!(svc.host_for(&headers), "203.0.113.7");
    }

    #[test]
    fn test_host_falls_back_to_host_header() {
        let svc = service();
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "10.0.0.1:8101".parse().unwrap());
        assert_eq!(svc.host_for(&headers), "10.0.0.1");
        assert_eq!(svc.host_for(&HeaderMap::new()), "127.0.0.1");
    }

    #[test]
    fn test_device_information_body() {
        let xml = service().device_information("");
        assert!(xml.contains("<tds:Manufacturer>Inforion</tds:Manufacturer>"));
        assert!(xml.contains("<tds:Model>MD-6</tds:Model>"));
        assert!(xml.contains("<tds:FirmwareVersion>1.2.3</tds:FirmwareVersion>"));
    }

    #[test]
    fn test_capabilities_xaddrs() {
        let xml = service().capabilities("10.0.0.1", "");
        assert!(xml.contains("http://10.0.0.1:8101/onvif/device_service"));
        assert!(xml.contains("http://10.0.0.1:8080/onvif/events"));
    }
}

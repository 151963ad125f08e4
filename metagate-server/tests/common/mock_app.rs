use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use serde_json::Value;
use tower::ServiceExt;

use metagate_server::app::create_app;
use metagate_server::handles::DeviceState;
use metagate_server::models::Device;
use metagate_server::onvif::{EventService, SubscriptionManager};
use metagate_server::services::{CommandHub, DeviceRegistry, EventBus};

pub const EVENTS_PATH: &str = "/onvif/events";

/// Fully wired gateway router backed by in-memory components, no sockets.
pub struct MockApp {
    pub router: Router,
    pub registry: Arc<DeviceRegistry>,
    pub bus: Arc<EventBus>,
    pub hub: Arc<CommandHub>,
    pub subscriptions: Arc<SubscriptionManager>,
}

impl MockApp {
    pub fn new() -> Self {
        let registry = Arc::new(DeviceRegistry::new());
        let bus = Arc::new(EventBus::new(64));
        let hub = Arc::new(CommandHub::new());
        let subscriptions = Arc::new(SubscriptionManager::new());

        let state_path = std::env::temp_dir()
            .join(format!("mock-state-{}.json", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .to_string();
        let device_state = DeviceState {
            registry: registry.clone(),
            hub: hub.clone(),
            bus: bus.clone(),
            state_path,
        };
        let event_service = Arc::new(EventService::new(
            subscriptions.clone(),
            String::from("http://127.0.0.1:8080"),
            String::from(EVENTS_PATH),
            Duration::from_secs(3600),
        ));

        Self {
            router: create_app(device_state, event_service, EVENTS_PATH),
            registry,
            bus,
            hub,
            subscriptions,
        }
    }

    pub async fn seed_device(&self, uid: &str) -> Device {
        let device = Device {
            uid: uid.to_string(),
            name: format!("Gate {uid}"),
            enabled: true,
            ..Device::default()
        };
        self.registry.upsert(device.clone()).await;
        device
    }

    pub async fn request(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn json(&self, request: Request<Body>) -> (u16, Value) {
        let response = self.request(request).await;
        let status = response.status().as_u16();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    pub async fn soap(&self, path: &str, body: &str) -> String {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/soap+xml")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = self.request(request).await;
        assert_eq!(response.status().as_u16(), 200);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }
}

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handles;
use crate::handles::DeviceState;
use crate::onvif::EventService;

/// Assembles the single HTTP surface: the JSON API for the web UI and
/// emulators, and the SOAP events service on its configured path.
pub fn create_app(
    device_state: DeviceState,
    event_service: Arc<EventService>,
    events_path: &str,
) -> Router {
    let api = Router::new()
        .route("/api/v1/health", get(handles::check_health))
        .route("/api/v1/devices", get(handles::get_devices))
        .route("/api/v1/device/:id", patch(handles::patch_device))
        .route("/api/v1/device/:id/ping", post(handles::ping_device))
        .route("/api/v1/device/:id/commands", post(handles::enqueue_command))
        .route("/api/v1/device/:id/status", post(handles::post_status))
        .route("/api/v1/events", get(handles::stream_events))
        .with_state(device_state);

    let soap = Router::new()
        .route(events_path, post(EventService::handle))
        .route(
            &format!("{events_path}/subscription/:id"),
            post(EventService::handle_subscription),
        )
        .with_state(event_service);

    api.merge(soap)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

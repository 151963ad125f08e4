use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{info, warn};

use crate::configs;
use crate::errors::{ApiError, DeviceError};
use crate::models::{Command, Event};
use crate::services::{CommandHub, DeviceRegistry, EventBus};

/// Long-poll window handed to `ping`; shorter than common proxy idle
/// timeouts.
const POLL_WINDOW: Duration = Duration::from_secs(25);

#[derive(Clone)]
pub struct DeviceState {
    pub registry: Arc<DeviceRegistry>,
    pub hub: Arc<CommandHub>,
    pub bus: Arc<EventBus>,
    pub state_path: String,
}

pub async fn get_devices(State(state): State<DeviceState>) -> Json<Value> {
    let devices = state.registry.list().await;
    Json(json!({ "ok": true, "data": devices }))
}

#[derive(Debug, Deserialize)]
pub struct PatchDevice {
    pub enabled: bool,
}

/// Flips the operator-facing enabled flag and persists it.
pub async fn patch_device(
    State(state): State<DeviceState>,
    Path(id): Path<String>,
    Json(body): Json<PatchDevice>,
) -> Result<Json<Value>, ApiError> {
    if !state.registry.set_enabled(&id, body.enabled).await {
        return Err(DeviceError::DeviceNotFound(id).into());
    }
    info!(uid = %id, enabled = body.enabled, "device toggled");

    if let Err(err) = configs::save_devices(&state.state_path, state.registry.list().await) {
        // The toggle took effect in memory; persistence catches up on the
        // next successful save.
        warn!(%err, "state save failed");
    }

    let device = state.registry.get(&id).await;
    Ok(Json(json!({ "ok": true, "data": device })))
}

/// Device long-poll: marks the caller online and parks until commands
/// arrive or the window closes.
pub async fn ping_device(
    State(state): State<DeviceState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if state.registry.get(&id).await.is_none() {
        return Err(DeviceError::DeviceNotFound(id).into());
    }
    state.registry.set_online(&id, true).await;

    let commands = state.hub.long_poll(&id, POLL_WINDOW).await;
    let ts = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    Ok(Json(json!({
        "ok": true,
        "pong": true,
        "ts": ts,
        "commands": commands,
    })))
}

#[derive(Debug, Deserialize)]
pub struct EnqueueCommand {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Option<Value>,
}

pub async fn enqueue_command(
    State(state): State<DeviceState>,
    Path(id): Path<String>,
    Json(body): Json<EnqueueCommand>,
) -> Result<Json<Value>, ApiError> {
    if body.kind.is_empty() {
        return Err(DeviceError::InvalidRequest(String::from("type is required")).into());
    }
    if state.registry.get(&id).await.is_none() {
        return Err(DeviceError::DeviceNotFound(id).into());
    }

    let command = Command {
        id: uuid::Uuid::new_v4().to_string(),
        kind: body.kind,
        payload: body.payload,
    };
    let command_id = command.id.clone();
    if !state.hub.enqueue(&id, command).await {
        return Err(DeviceError::InvalidRequest(String::from("command queue full")).into());
    }
    Ok(Json(json!({ "ok": true, "data": { "id": command_id } })))
}

/// Status report from an HTTP-polling device; republished on the bus and
/// counted as liveness.
pub async fn post_status(
    State(state): State<DeviceState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    if state.registry.get(&id).await.is_none() {
        return Err(DeviceError::DeviceNotFound(id).into());
    }
    state.registry.set_online(&id, true).await;

    state
        .bus
        .push(Event::new(id, "device/status", body.to_string().into_bytes()))
        .await;
    Ok(Json(json!({ "ok": true })))
}

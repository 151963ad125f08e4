use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use serde_json::{Value, json};
use time::format_description::well_known::Rfc3339;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_stream::wrappers::ReceiverStream;

use crate::services::EventBus;

use super::device_handle::DeviceState;

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Live event feed for the web UI. Each client gets its own cursor
/// starting at the bus head, so connecting shows new events only.
pub async fn stream_events(
    State(state): State<DeviceState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<SseEvent, Infallible>>(32);
    spawn_feed(state.bus.clone(), tx);

    Sse::new(ReceiverStream::new(rx))
        .keep_alive(KeepAlive::new().interval(KEEPALIVE_INTERVAL))
}

/// Pumps bus events into one client's channel. Exits as soon as the
/// receiving side is gone, so a disconnected client on a quiet bus does
/// not keep polling forever.
fn spawn_feed(
    bus: Arc<EventBus>,
    tx: mpsc::Sender<Result<SseEvent, Infallible>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut cursor = bus.head().await.unwrap_or(0);
        loop {
            let batch = bus.pull(cursor, 64).await;
            if let Some((seq, _)) = batch.last() {
                cursor = *seq;
            }
            for (seq, event) in batch {
                // Detector payloads are JSON; raw adapter traffic may not
                // be, so fall back to a lossy string.
                let payload: Value = serde_json::from_slice(&event.payload).unwrap_or_else(|_| {
                    Value::String(String::from_utf8_lossy(&event.payload).into_owned())
                });
                let data = json!({
                    "seq": seq,
                    "device_id": event.device_id,
                    "topic": event.topic,
                    "time": event.time.format(&Rfc3339).unwrap_or_default(),
                    "payload": payload,
                });
                let sse = SseEvent::default().data(data.to_string());
                if tx.send(Ok(sse)).await.is_err() {
                    return;
                }
            }
            tokio::select! {
                _ = tx.closed() => return,
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }
        }
    })
}

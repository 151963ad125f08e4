use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::warn;

use crate::models::Command;

/// Per-device queue capacity. Devices that never poll do not grow memory
/// past this bound; excess commands are dropped.
const QUEUE_CAP: usize = 64;
/// Max commands handed out per poll.
const DRAIN_MAX: usize = 32;

#[derive(Debug)]
struct DeviceQueue {
    commands: Mutex<VecDeque<Command>>,
    notify: Notify,
    last_seen: Mutex<Option<OffsetDateTime>>,
}

impl DeviceQueue {
    fn new() -> Self {
        Self {
            commands: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            last_seen: Mutex::new(None),
        }
    }
}

/// Command fan-out for HTTP-polling devices. Each device owns a bounded
/// FIFO; `long_poll` parks until a command arrives or the window elapses.
#[derive(Debug, Default)]
pub struct CommandHub {
    queues: RwLock<HashMap<String, Arc<DeviceQueue>>>,
}

impl CommandHub {
    pub fn new() -> Self {
        Self::default()
    }

    async fn queue(&self, device_id: &str) -> Arc<DeviceQueue> {
        if let Some(queue) = self.queues.read().await.get(device_id) {
            return queue.clone();
        }
        let mut queues = self.queues.write().await;
        queues
            .entry(device_id.to_string())
            .or_insert_with(|| Arc::new(DeviceQueue::new()))
            .clone()
    }

    /// Queues a command for a device. Returns false when the queue is full
    /// and the command was dropped.
    pub async fn enqueue(&self, device_id: &str, command: Command) -> bool {
        let queue = self.queue(device_id).await;
        let mut commands = queue.commands.lock().await;
        if commands.len() >= QUEUE_CAP {
            warn!(device_id, command = %command.kind, "command queue full, dropping");
            return false;
        }
        commands.push_back(command);
        drop(commands);
        queue.notify.notify_one();
        true
    }

    /// Waits up to `window` for commands, then drains the queue (at most
    /// `DRAIN_MAX` entries). Also records the poll as device activity.
    pub async fn long_poll(&self, device_id: &str, window: Duration) -> Vec<Command> {
        let queue = self.queue(device_id).await;
        *queue.last_seen.lock().await = Some(OffsetDateTime::now_utc());

        // Arm the waiter before checking the queue so an enqueue between
        // the check and the await still wakes us.
        let notified = queue.notify.notified();
        {
            let mut commands = queue.commands.lock().await;
            if !commands.is_empty() {
                return drain(&mut commands);
            }
        }

        let _ = tokio::time::timeout(window, notified).await;

        let mut commands = queue.commands.lock().await;
        drain(&mut commands)
    }

    /// When the device last long-polled, if ever.
    pub async fn last_seen(&self, device_id: &str) -> Option<OffsetDateTime> {
        let queues = self.queues.read().await;
        match queues.get(device_id) {
            Some(queue) => *queue.last_seen.lock().await,
            None => None,
        }
    }
}

fn drain(commands: &mut VecDeque<Command>) -> Vec<Command> {
    let take = commands.len().min(DRAIN_MAX);
    commands.drain(..take).collect()
}

use time::OffsetDateTime;

/// A normalized occurrence on the internal bus. The payload is opaque to
/// the bus itself; detector events carry JSON, raw adapter traffic carries
/// whatever the device sent.
#[derive(Debug, Clone)]
pub struct Event {
    pub device_id: String,
    pub topic: String,
    pub payload: Vec<u8>,
    pub time: OffsetDateTime,
}

impl Event {
    pub fn new(device_id: impl Into<String>, topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            device_id: device_id.into(),
            topic: topic.into(),
            payload,
            time: OffsetDateTime::now_utc(),
        }
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Control-plane instruction destined for a device. Delivery is
/// best-effort: commands queue in the hub until the device long-polls,
/// and are lost on restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

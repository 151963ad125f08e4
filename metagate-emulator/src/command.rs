use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct Command {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Option<Value>,
}

/// Body of the gateway's long-poll response.
#[derive(Debug, Deserialize)]
pub struct PingResponse {
    pub ok: bool,
    #[serde(default)]
    pub pong: bool,
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub commands: Vec<Command>,
}

use serde::{Deserialize, Serialize};

/// A command sent by a client to the table.
///
/// Wire form is a tagged object: `{"type":"shoot","angle":0.5,"power":10}`
/// or `{"type":"restart"}`. Inbound commands are validated by
/// [`crate::net::protocol`] before they become a `ClientCommand`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientCommand {
    /// Strike the cue ball along `angle` (radians) with initial speed `power`.
    Shoot { angle: f64, power: f64 },
    /// Throw away the current match and re-rack.
    Restart,
}

/// How a connection wants snapshots delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    /// UTF-8 JSON text frames.
    #[default]
    Json,
    /// MessagePack binary frames with named fields.
    #[serde(alias = "messagepack")]
    Msgpack,
}

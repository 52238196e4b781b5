use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::messages::ClientCommand;

/// Maximum inbound command size in bytes. Commands are tiny; anything
/// larger is garbage or abuse.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024;

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    PayloadTooLarge(usize),
    UnknownCommand(String),
    MissingField(&'static str),
    InvalidNumber(&'static str),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::UnknownCommand(t) => write!(f, "unknown command type: {t:?}"),
            Self::MissingField(name) => write!(f, "missing field: {name}"),
            Self::InvalidNumber(name) => write!(f, "field {name} is not a valid number"),
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

fn check_size(len: usize) -> Result<(), ProtocolError> {
    if len == 0 {
        return Err(ProtocolError::EmptyMessage);
    }
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(len));
    }
    Ok(())
}

/// Decode a JSON text command and validate every field.
pub fn decode_command_json(text: &str) -> Result<ClientCommand, ProtocolError> {
    check_size(text.len())?;
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::DeserializeError(e.to_string()))?;
    command_from_value(&value)
}

/// Decode a MessagePack command and validate every field.
pub fn decode_command_msgpack(data: &[u8]) -> Result<ClientCommand, ProtocolError> {
    check_size(data.len())?;
    let value: Value =
        rmp_serde::from_slice(data).map_err(|e| ProtocolError::DeserializeError(e.to_string()))?;
    command_from_value(&value)
}

/// Validate a loosely typed command object.
///
/// Clients are untrusted: fields are checked one by one instead of relying on
/// derive so that a bad `power` reports which field was wrong.
pub fn command_from_value(value: &Value) -> Result<ClientCommand, ProtocolError> {
    let Some(obj) = value.as_object() else {
        return Err(ProtocolError::DeserializeError(
            "command must be an object".to_string(),
        ));
    };

    let kind = match obj.get("type") {
        Some(Value::String(s)) => s.as_str(),
        Some(_) => return Err(ProtocolError::UnknownCommand(obj["type"].to_string())),
        None => return Err(ProtocolError::MissingField("type")),
    };

    match kind {
        "shoot" => {
            let angle = number_field(obj, "angle")?;
            let power = number_field(obj, "power")?;
            if power < 0.0 {
                return Err(ProtocolError::InvalidNumber("power"));
            }
            Ok(ClientCommand::Shoot { angle, power })
        },
        "restart" => Ok(ClientCommand::Restart),
        other => Err(ProtocolError::UnknownCommand(other.to_string())),
    }
}

fn number_field(obj: &Map<String, Value>, name: &'static str) -> Result<f64, ProtocolError> {
    let value = obj.get(name).ok_or(ProtocolError::MissingField(name))?;
    match value.as_f64() {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(ProtocolError::InvalidNumber(name)),
    }
}

/// Encode a command as JSON text.
pub fn encode_command_json(cmd: &ClientCommand) -> Result<String, ProtocolError> {
    serde_json::to_string(cmd).map_err(|e| ProtocolError::SerializeError(e.to_string()))
}

/// Encode a command as MessagePack (named fields).
pub fn encode_command_msgpack(cmd: &ClientCommand) -> Result<Vec<u8>, ProtocolError> {
    rmp_serde::to_vec_named(cmd).map_err(|e| ProtocolError::SerializeError(e.to_string()))
}

/// Encode a snapshot as JSON text.
pub fn encode_snapshot_json<T: Serialize>(snapshot: &T) -> Result<String, ProtocolError> {
    serde_json::to_string(snapshot).map_err(|e| ProtocolError::SerializeError(e.to_string()))
}

/// Encode a snapshot as MessagePack with field names, so both encodings
/// carry the same keys.
pub fn encode_snapshot_msgpack<T: Serialize>(snapshot: &T) -> Result<Vec<u8>, ProtocolError> {
    rmp_serde::to_vec_named(snapshot).map_err(|e| ProtocolError::SerializeError(e.to_string()))
}

pub fn decode_snapshot_json<T: DeserializeOwned>(text: &str) -> Result<T, ProtocolError> {
    serde_json::from_str(text).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

pub fn decode_snapshot_msgpack<T: DeserializeOwned>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(data).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

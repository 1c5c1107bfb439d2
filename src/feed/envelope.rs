//! Feed message envelope: `{"payload": "<JSON object as string>", ...}`

use serde_json::{Map, Value};

#[derive(Debug)]
pub enum EnvelopeError {
    NotAnObject,
    MissingPayload,
    PayloadNotString,
    InvalidJson(serde_json::Error),
    PayloadNotObject,
}

impl From<serde_json::Error> for EnvelopeError {
    fn from(err: serde_json::Error) -> Self {
        EnvelopeError::InvalidJson(err)
    }
}

impl std::fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvelopeError::NotAnObject => write!(f, "envelope is not an object"),
            EnvelopeError::MissingPayload => write!(f, "envelope has no payload"),
            EnvelopeError::PayloadNotString => write!(f, "payload is not a string"),
            EnvelopeError::InvalidJson(e) => write!(f, "payload is not valid JSON: {}", e),
            EnvelopeError::PayloadNotObject => write!(f, "payload is not a JSON object"),
        }
    }
}

impl std::error::Error for EnvelopeError {}

/// Extract and decode the payload object from one feed message.
pub fn extract_payload(envelope: &Value) -> Result<Map<String, Value>, EnvelopeError> {
    let envelope = envelope.as_object().ok_or(EnvelopeError::NotAnObject)?;

    let raw = match envelope.get("payload") {
        None | Some(Value::Null) => return Err(EnvelopeError::MissingPayload),
        Some(Value::String(s)) if s.is_empty() => return Err(EnvelopeError::MissingPayload),
        Some(Value::String(s)) => s,
        Some(_) => return Err(EnvelopeError::PayloadNotString),
    };

    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(EnvelopeError::PayloadNotObject),
    }
}

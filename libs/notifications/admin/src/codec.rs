//! Envelope codec.
//!
//! Wire shape, UTF-8 JSON object:
//!
//! ```json
//! {"adminEmails": ["a@x.com", "b@y.org"], "subject": "Hi", "message": "Body"}
//! ```
//!
//! Decoding is lenient: unknown fields are ignored and missing or `null`
//! fields default to empty. Anything that is not a JSON object, or has a
//! known field of the wrong type, is rejected.

use crate::error::{NotificationError, NotificationResult};
use crate::models::NotificationEvent;
use serde_json::Value;

/// Serialize an event to its envelope bytes.
pub fn encode(event: &NotificationEvent) -> NotificationResult<Vec<u8>> {
    serde_json::to_vec(event).map_err(|e| NotificationError::Encoding(e.to_string()))
}

/// Parse envelope bytes back into an event.
pub fn decode(payload: &[u8]) -> NotificationResult<NotificationEvent> {
    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| NotificationError::Decoding(format!("malformed JSON: {}", e)))?;

    // Structs would also accept a JSON array positionally
    if !value.is_object() {
        return Err(NotificationError::Decoding(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )));
    }

    serde_json::from_value(value).map_err(|e| NotificationError::Decoding(e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

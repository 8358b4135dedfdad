//! Binary-safe JSON codec.
//!
//! JSON has no byte-buffer type, so raw bytes travel as a tagged object:
//! `{"marker": true, "type": "Buffer", "data": "<base64>"}`. The explicit
//! passes [`encode_value`] and [`decode_value`] apply that substitution at
//! every node of a [`Value`] tree.
//!
//! Known limitation: a user object that is literally the tagged triple is
//! read back as bytes.

use crate::types::{Object, Value};
use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::{Map as JsonMap, Value as JsonValue};

pub const MARKER_FIELD: &str = "marker";
pub const TYPE_FIELD: &str = "type";
pub const DATA_FIELD: &str = "data";
pub const BUFFER_TYPE_NAME: &str = "Buffer";

const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::RequireNone)
        .with_decode_allow_trailing_bits(true),
);

/// Standard alphabet, `=` padded. Empty input gives an empty string.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Inverse of [`encode`]. Characters outside the base64 alphabet (whitespace,
/// line breaks, padding) are dropped first. Never fails: undecodable input
/// yields an empty vector.
pub fn decode(text: &str) -> Vec<u8> {
    let mut symbols: Vec<u8> = text.bytes().filter(|byte| is_base64_symbol(*byte)).collect();
    // a lone trailing symbol carries fewer than 8 bits
    if symbols.len() % 4 == 1 {
        symbols.pop();
    }
    LENIENT.decode(&symbols).unwrap_or_default()
}

fn is_base64_symbol(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'+' || byte == b'/'
}

pub fn to_json_value(bytes: &[u8]) -> JsonValue {
    let mut fields = JsonMap::new();
    fields.insert(MARKER_FIELD.to_string(), JsonValue::Bool(true));
    fields.insert(
        TYPE_FIELD.to_string(),
        JsonValue::String(BUFFER_TYPE_NAME.to_string()),
    );
    fields.insert(DATA_FIELD.to_string(), JsonValue::String(encode(bytes)));
    JsonValue::Object(fields)
}

/// Returns the decoded buffer when `value` is exactly the tagged triple and
/// `None` when the value should pass through unchanged.
pub fn from_json_value(value: &JsonValue) -> Option<Vec<u8>> {
    let fields = value.as_object()?;
    if fields.len() != 3 {
        return None;
    }
    if fields.get(MARKER_FIELD) != Some(&JsonValue::Bool(true)) {
        return None;
    }
    if fields.get(TYPE_FIELD).and_then(JsonValue::as_str) != Some(BUFFER_TYPE_NAME) {
        return None;
    }
    fields
        .get(DATA_FIELD)
        .and_then(JsonValue::as_str)
        .map(decode)
}

pub fn encode_value(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(flag) => JsonValue::Bool(*flag),
        Value::Number(number) => JsonValue::Number(number.clone()),
        Value::String(text) => JsonValue::String(text.clone()),
        Value::Bytes(bytes) => to_json_value(bytes),
        Value::Array(items) => JsonValue::Array(items.iter().map(encode_value).collect()),
        Value::Object(fields) => JsonValue::Object(
            fields
                .iter()
                .map(|(name, field)| (name.clone(), encode_value(field)))
                .collect(),
        ),
    }
}

pub fn decode_value(value: JsonValue) -> Value {
    if let Some(bytes) = from_json_value(&value) {
        return Value::Bytes(bytes);
    }
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(flag) => Value::Bool(flag),
        JsonValue::Number(number) => Value::Number(number),
        JsonValue::String(text) => Value::String(text),
        JsonValue::Array(items) => Value::Array(items.into_iter().map(decode_value).collect()),
        JsonValue::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(name, field)| (name, decode_value(field)))
                .collect::<Object>(),
        ),
    }
}

//! The export document: one JSON object mapping container names to arrays
//! of records, with byte buffers carried as tagged base64 objects.

use crate::errors::{DumpError, DumpResult};
use kvdump_store::codec;
use kvdump_store::{ContainerName, Value};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::BTreeMap;

pub type Document = BTreeMap<ContainerName, Vec<Value>>;

/// Document entries with their records not yet checked or decoded.
pub type DocumentEntries = BTreeMap<ContainerName, JsonValue>;

/// Parses document text, checking only that the root is an object.
pub fn parse_entries(text: &str) -> DumpResult<DocumentEntries> {
    let root: JsonValue = serde_json::from_str(text)
        .map_err(|err| DumpError::MalformedDocument(err.to_string()))?;
    match root {
        JsonValue::Object(entries) => Ok(entries.into_iter().collect()),
        other => Err(DumpError::MalformedDocument(format!(
            "document root must be an object, found {}",
            kind(&other)
        ))),
    }
}

/// Restores byte buffers in every record of one entry.
///
/// The binary pass runs on records only, never on the root object, so a
/// root that happens to look like a tagged buffer is still read as a
/// container map. A `null` entry counts as an empty container.
pub fn decode_entry(container: &str, entry: JsonValue) -> DumpResult<Vec<Value>> {
    match entry {
        JsonValue::Array(records) => Ok(records.into_iter().map(codec::decode_value).collect()),
        JsonValue::Null => Ok(Vec::new()),
        other => Err(DumpError::MalformedDocument(format!(
            "container {container} must map to an array, found {}",
            kind(&other)
        ))),
    }
}

/// Parses document text and decodes every entry.
pub fn parse_document(text: &str) -> DumpResult<Document> {
    parse_entries(text)?
        .into_iter()
        .map(|(name, entry)| {
            let records = decode_entry(&name, entry)?;
            Ok((name, records))
        })
        .collect()
}

/// Compact JSON, containers in name order, records in the given order.
pub fn render_document(document: &Document) -> DumpResult<String> {
    let root: JsonMap<String, JsonValue> = document
        .iter()
        .map(|(name, records)| {
            (
                name.clone(),
                JsonValue::Array(records.iter().map(codec::encode_value).collect()),
            )
        })
        .collect();
    serde_json::to_string(&JsonValue::Object(root))
        .map_err(|err| DumpError::Serialization(err.to_string()))
}

fn kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

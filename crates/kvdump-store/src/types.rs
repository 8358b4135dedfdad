use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::cmp::Ordering;
use std::fmt;

pub type ContainerName = String;

/// Field map of an object record. Insertion order is preserved end to end.
pub type Object = IndexMap<String, Value>;

/// A record, or any part of one.
///
/// This mirrors the JSON data model with one addition, [`Value::Bytes`], for
/// raw byte buffers that JSON cannot carry natively.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Object(Object),
}

impl Value {
    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Object(
            fields
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.as_object().and_then(|fields| fields.get(field))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value.into())
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Number(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

/// Primary key of a record within one container.
///
/// Keys sort numbers first, then strings, then byte buffers, then arrays
/// (element-wise).
#[derive(Clone, Debug)]
pub enum RecordKey {
    Number(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<RecordKey>),
}

impl RecordKey {
    /// Returns `None` for values that cannot act as keys (null, booleans,
    /// objects, NaN).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number
                .as_f64()
                .filter(|number| !number.is_nan())
                .map(RecordKey::Number),
            Value::String(text) => Some(RecordKey::String(text.clone())),
            Value::Bytes(bytes) => Some(RecordKey::Bytes(bytes.clone())),
            Value::Array(items) => items
                .iter()
                .map(RecordKey::from_value)
                .collect::<Option<Vec<_>>>()
                .map(RecordKey::Array),
            Value::Null | Value::Bool(_) | Value::Object(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RecordKey::Number(number) => {
                if number.fract() == 0.0 && number.abs() < 9_007_199_254_740_992.0 {
                    Value::from(*number as i64)
                } else {
                    Value::from(*number)
                }
            }
            RecordKey::String(text) => Value::String(text.clone()),
            RecordKey::Bytes(bytes) => Value::Bytes(bytes.clone()),
            RecordKey::Array(items) => Value::Array(items.iter().map(Self::to_value).collect()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            RecordKey::Number(_) => 0,
            RecordKey::String(_) => 1,
            RecordKey::Bytes(_) => 2,
            RecordKey::Array(_) => 3,
        }
    }
}

impl Ord for RecordKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (RecordKey::Number(left), RecordKey::Number(right)) => left.total_cmp(right),
            (RecordKey::String(left), RecordKey::String(right)) => left.cmp(right),
            (RecordKey::Bytes(left), RecordKey::Bytes(right)) => left.cmp(right),
            (RecordKey::Array(left), RecordKey::Array(right)) => left.iter().cmp(right.iter()),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for RecordKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RecordKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RecordKey {}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Number(number) => write!(f, "{number}"),
            RecordKey::String(text) => write!(f, "{text:?}"),
            RecordKey::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
            RecordKey::Array(items) => {
                write!(f, "[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Where a container finds the key inside each record. Dotted names walk
/// into nested objects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPath {
    Field(String),
    Compound(Vec<String>),
}

impl KeyPath {
    pub fn extract(&self, record: &Value) -> Option<RecordKey> {
        match self {
            KeyPath::Field(path) => lookup(record, path).and_then(RecordKey::from_value),
            KeyPath::Compound(paths) => paths
                .iter()
                .map(|path| lookup(record, path).and_then(RecordKey::from_value))
                .collect::<Option<Vec<_>>>()
                .map(RecordKey::Array),
        }
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPath::Field(path) => write!(f, "{path}"),
            KeyPath::Compound(paths) => write!(f, "[{}]", paths.join("+")),
        }
    }
}

pub(crate) fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(record);
    }
    path.split('.')
        .try_fold(record, |current, segment| current.get(segment))
}

pub(crate) fn inject(target: &mut Value, segments: &[&str], value: Value) -> bool {
    let Value::Object(fields) = target else {
        return false;
    };
    match segments {
        [] => false,
        [last] => {
            fields.insert((*last).to_string(), value);
            true
        }
        [first, rest @ ..] => {
            let child = fields
                .entry((*first).to_string())
                .or_insert_with(|| Value::Object(Object::new()));
            inject(child, rest, value)
        }
    }
}

/// Key policy of one container.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    pub key_path: Option<KeyPath>,
    pub auto_increment: bool,
}

impl KeySpec {
    pub fn inline(field: impl Into<String>) -> Self {
        Self {
            key_path: Some(KeyPath::Field(field.into())),
            auto_increment: false,
        }
    }

    pub fn auto_increment(field: impl Into<String>) -> Self {
        Self {
            key_path: Some(KeyPath::Field(field.into())),
            auto_increment: true,
        }
    }

    pub fn compound<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key_path: Some(KeyPath::Compound(
                fields.into_iter().map(Into::into).collect(),
            )),
            auto_increment: false,
        }
    }

    /// Records are keyed by a generated sequence that is not stored in them.
    pub fn out_of_line() -> Self {
        Self {
            key_path: None,
            auto_increment: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

impl TransactionMode {
    pub fn is_writable(self) -> bool {
        matches!(self, TransactionMode::ReadWrite)
    }
}

impl fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionMode::ReadOnly => write!(f, "readonly"),
            TransactionMode::ReadWrite => write!(f, "readwrite"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_key_ordering_numbers_before_strings_before_bytes_before_arrays() {
        let mut keys = vec![
            RecordKey::Array(vec![RecordKey::Number(1.0)]),
            RecordKey::Bytes(vec![0]),
            RecordKey::String("a".to_string()),
            RecordKey::Number(10.0),
            RecordKey::Number(2.0),
        ];
        keys.sort();

        assert_eq!(
            keys,
            vec![
                RecordKey::Number(2.0),
                RecordKey::Number(10.0),
                RecordKey::String("a".to_string()),
                RecordKey::Bytes(vec![0]),
                RecordKey::Array(vec![RecordKey::Number(1.0)]),
            ]
        );
    }

    #[test]
    fn key_path_compound_expected_array_key() {
        let record = Value::object([("shape", Value::from("circle")), ("color", Value::from("red"))]);
        let path = KeyPath::Compound(vec!["shape".to_string(), "color".to_string()]);

        assert_eq!(
            path.extract(&record),
            Some(RecordKey::Array(vec![
                RecordKey::String("circle".to_string()),
                RecordKey::String("red".to_string()),
            ]))
        );
    }

    #[test]
    fn key_path_dotted_field_walks_nested_objects() {
        let record = Value::object([("meta", Value::object([("id", Value::from(7_i64))]))]);

        assert_eq!(
            KeyPath::Field("meta.id".to_string()).extract(&record),
            Some(RecordKey::Number(7.0))
        );
        assert_eq!(KeyPath::Field("meta.missing".to_string()).extract(&record), None);
    }

    #[test]
    fn key_path_rejects_unkeyable_values() {
        let record = Value::object([("flag", Value::from(true))]);
        assert_eq!(KeyPath::Field("flag".to_string()).extract(&record), None);
    }

    #[test]
    fn record_key_integral_number_expected_integer_value() {
        assert_eq!(RecordKey::Number(3.0).to_value(), Value::from(3_i64));
        assert_eq!(RecordKey::Number(1.5).to_value(), Value::from(1.5));
    }

    #[test]
    fn inject_creates_intermediate_objects() {
        let mut record = Value::object([("name", Value::from("x"))]);
        assert!(inject(&mut record, &["meta", "id"], Value::from(1_i64)));
        assert_eq!(
            record.get("meta").and_then(|meta| meta.get("id")),
            Some(&Value::from(1_i64))
        );
    }

    #[test]
    fn key_spec_round_trip_expected_lossless() {
        let spec = KeySpec::compound(["shape", "color"]);
        let encoded = serde_json::to_string(&spec).expect("key spec should serialize");
        let decoded: KeySpec = serde_json::from_str(&encoded).expect("key spec should deserialize");

        assert_eq!(decoded, spec);
    }
}

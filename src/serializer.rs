//! Serialization layer. Defaults to JSON via serde_json.
//!
//! Implement [`Serializer`] if you need a different on-disk encoding. The
//! store always hands over the whole mapping, never a single entry.

use crate::error::{Error, Result};
use serde_json::{Map, Value};

/// Converts the full key-value mapping to/from bytes for persistence.
pub trait Serializer: Send + Sync {
    /// Encode the mapping to bytes.
    fn serialize(&self, data: &Map<String, Value>) -> Result<Vec<u8>>;

    /// Decode bytes back into a mapping. Only called with non-blank input.
    fn deserialize(&self, bytes: &[u8]) -> Result<Map<String, Value>>;
}

/// JSON serializer with optional pretty-printing.
#[derive(Debug, Clone, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    /// Compact JSON (single line, no extra whitespace).
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretty-printed JSON with indentation, easier to read by hand.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Serializer for JsonSerializer {
    fn serialize(&self, data: &Map<String, Value>) -> Result<Vec<u8>> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(data)
        } else {
            serde_json::to_vec(data)
        };
        bytes.map_err(Error::from)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Map<String, Value>> {
        match serde_json::from_slice::<Value>(bytes)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::Parse(format!(
                "expected a JSON object at the top level, found {}",
                kind_of(&other)
            ))),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compact_output_is_one_line() {
        let mut map = Map::new();
        map.insert("x".into(), json!({"nested": [1, 2, 3]}));
        let bytes = JsonSerializer::new().serialize(&map).unwrap();
        assert!(!bytes.contains(&b'\n'));
    }

    #[test]
    fn pretty_output_is_indented() {
        let mut map = Map::new();
        map.insert("x".into(), json!(1));
        let text = String::from_utf8(JsonSerializer::pretty().serialize(&map).unwrap()).unwrap();
        assert!(text.contains("\n  \"x\""));
    }

    #[test]
    fn top_level_must_be_an_object() {
        let err = JsonSerializer::new().deserialize(b"[1, 2]").unwrap_err();
        assert!(matches!(err, Error::Parse(msg) if msg.contains("an array")));
    }

    #[test]
    fn malformed_input_is_a_parse_error() {
        let err = JsonSerializer::new().deserialize(b"{\"x\": ").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}

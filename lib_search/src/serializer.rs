//! # JSON Serializer
//!
//! The codec a search client uses for request and response bodies. It is a
//! trait object so that a caller can register their own instance and later
//! check, by pointer identity, that the client picked it up.

use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

/// A JSON codec shared between the registry and the clients it configures.
pub trait JsonSerializer: Debug + Send + Sync {
    /// Encodes a JSON document into a request body.
    fn serialize(&self, value: &Value) -> Result<Vec<u8>, serde_json::Error>;

    /// Decodes a response body into a JSON document.
    fn deserialize(&self, bytes: &[u8]) -> Result<Value, serde_json::Error>;
}

/// The default codec, backed by `serde_json`.
#[derive(Debug, Clone, Default)]
pub struct SerdeJsonSerializer {
    pretty: bool,
}

impl SerdeJsonSerializer {
    /// Compact output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Indented output, handy when inspecting traffic through a proxy.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    pub fn is_pretty(&self) -> bool {
        self.pretty
    }
}

impl JsonSerializer for SerdeJsonSerializer {
    fn serialize(&self, value: &Value) -> Result<Vec<u8>, serde_json::Error> {
        if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        }
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Value, serde_json::Error> {
        // Some endpoints answer HEAD-like requests with an empty body.
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(bytes)
    }
}

/// Returns a fresh default serializer behind an `Arc`.
pub fn default_serializer() -> Arc<dyn JsonSerializer> {
    Arc::new(SerdeJsonSerializer::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compact_and_pretty_output_differ_only_in_whitespace() {
        let doc = json!({"a": "alpha", "b": ["bravo"]});

        let compact = SerdeJsonSerializer::new().serialize(&doc).unwrap();
        let pretty = SerdeJsonSerializer::pretty().serialize(&doc).unwrap();

        assert!(!compact.contains(&b'\n'));
        assert!(pretty.contains(&b'\n'));
        assert_eq!(
            SerdeJsonSerializer::new().deserialize(&pretty).unwrap(),
            doc
        );
    }

    #[test]
    fn empty_body_decodes_to_null() {
        let value = SerdeJsonSerializer::new().deserialize(b"  \n").unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(SerdeJsonSerializer::new().deserialize(b"{not json").is_err());
    }
}

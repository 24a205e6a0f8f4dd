//! Result serialization boundary.
//!
//! Orchestration results and activity extra data are handed to a
//! [`Serializer`] for display; the core never depends on the concrete
//! format.

use crate::errors::Result;
use serde_json::Value;

/// Renders a JSON value for display.
pub trait Serializer: Send + Sync {
    /// Serializes the value to a string.
    ///
    /// # Errors
    ///
    /// Returns a serialization error when the value cannot be rendered.
    fn serialize(&self, value: &Value) -> Result<String>;
}

/// Compact JSON output.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, value: &Value) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }
}

/// Pretty-printed JSON output.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrettyJsonSerializer;

impl Serializer for PrettyJsonSerializer {
    fn serialize(&self, value: &Value) -> Result<String> {
        Ok(serde_json::to_string_pretty(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_serializer_compact() {
        let out = JsonSerializer.serialize(&json!({"a": 1})).unwrap();
        assert_eq!(out, r#"{"a":1}"#);
    }

    #[test]
    fn test_pretty_serializer_multiline() {
        let out = PrettyJsonSerializer.serialize(&json!({"a": 1})).unwrap();
        assert!(out.contains('\n'));
    }
}

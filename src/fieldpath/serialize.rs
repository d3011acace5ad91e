//! Serialization of field sets in the nested `fieldsV1` form.
//!
//! `{"f:data":{"f:key":{}}}` encodes the single path `data.key`. A node that
//! is itself in the set and also has children carries a `".": {}` marker.

use super::set::Set;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

/// Error type for serialization/deserialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializeError {
    pub message: String,
}

impl SerializeError {
    pub fn new(message: impl Into<String>) -> Self {
        SerializeError {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SerializeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SerializeError {}

const FIELD_PREFIX: &str = "f:";
const SELF_MARKER: &str = ".";

/// Serializes a key to its `f:` form.
pub fn serialize_key(key: &str) -> String {
    format!("{}{}", FIELD_PREFIX, key)
}

/// Deserializes a key from its `f:` form.
pub fn deserialize_key(s: &str) -> Result<String, SerializeError> {
    match s.strip_prefix(FIELD_PREFIX) {
        Some(key) => Ok(key.to_string()),
        None if s.len() < 2 => Err(SerializeError::new(
            "key must be at least 2 characters long",
        )),
        None => Err(SerializeError::new(format!(
            "unknown path element type: {}",
            s.chars().take(2).collect::<String>()
        ))),
    }
}

impl Set {
    /// Converts the set to its `fieldsV1` JSON object.
    pub fn to_json_value(&self) -> JsonValue {
        JsonValue::Object(self.to_json_object(false))
    }

    /// Serializes the set to `fieldsV1` JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>, SerializeError> {
        serde_json::to_vec(&self.to_json_value())
            .map_err(|e| SerializeError::new(format!("JSON error: {}", e)))
    }

    /// Deserializes a set from `fieldsV1` JSON bytes.
    pub fn from_json(data: &[u8]) -> Result<Set, SerializeError> {
        let json_value: JsonValue = serde_json::from_slice(data)
            .map_err(|e| SerializeError::new(format!("JSON parse error: {}", e)))?;
        Self::from_json_value(json_value)
    }

    /// Converts a `fieldsV1` JSON object back into a set.
    pub fn from_json_value(value: JsonValue) -> Result<Set, SerializeError> {
        match value {
            JsonValue::Object(obj) => Self::from_json_object(obj),
            _ => Err(SerializeError::new("expected JSON object")),
        }
    }

    fn to_json_object(&self, include_self: bool) -> JsonMap<String, JsonValue> {
        let mut result = JsonMap::new();

        if include_self {
            result.insert(SELF_MARKER.to_string(), JsonValue::Object(JsonMap::new()));
        }

        for member in &self.members {
            if !self.children.contains_key(member) {
                result.insert(serialize_key(member), JsonValue::Object(JsonMap::new()));
            }
        }

        for (key, child) in &self.children {
            let is_member = self.members.contains(key);
            result.insert(
                serialize_key(key),
                JsonValue::Object(child.to_json_object(is_member)),
            );
        }

        result
    }

    fn from_json_object(obj: JsonMap<String, JsonValue>) -> Result<Set, SerializeError> {
        let mut set = Set::new();

        for (key, value) in obj {
            if key == SELF_MARKER {
                continue;
            }

            // Unknown element kinds are dropped.
            if key.len() >= 2 && !key.starts_with(FIELD_PREFIX) {
                continue;
            }
            let field = deserialize_key(&key)?;

            let JsonValue::Object(child_obj) = value else {
                return Err(SerializeError::new(format!(
                    "expected object value for key: {}",
                    key
                )));
            };

            if child_obj.is_empty() {
                set.members.insert(field);
                continue;
            }

            let is_member = child_obj.contains_key(SELF_MARKER);
            let child_set = Self::from_json_object(child_obj)?;
            if is_member {
                set.members.insert(field.clone());
            }
            if !child_set.is_empty() {
                set.children.insert(field, child_set);
            }
        }

        Ok(set)
    }
}

impl Serialize for Set {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Set {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        Set::from_json_value(value).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fieldpath::Path;
    use pretty_assertions::assert_eq;

    fn p(dotted: &str) -> Path {
        Path::parse(dotted).unwrap()
    }

    #[test]
    fn test_serialize_key() {
        let s = serialize_key("foo");
        assert_eq!(s, "f:foo");
        assert_eq!(deserialize_key(&s).unwrap(), "foo");
        assert!(deserialize_key("x").is_err());
    }

    #[test]
    fn test_set_fields_v1_form() {
        let set: Set = [p("data.key"), p("data.my-key")].into_iter().collect();
        let json = String::from_utf8(set.to_json().unwrap()).unwrap();
        assert_eq!(json, r#"{"f:data":{"f:key":{},"f:my-key":{}}}"#);
    }

    #[test]
    fn test_member_with_children_marker() {
        let set: Set = [p("a"), p("a.b")].into_iter().collect();
        let json = String::from_utf8(set.to_json().unwrap()).unwrap();
        assert_eq!(json, r#"{"f:a":{".":{},"f:b":{}}}"#);

        let back = Set::from_json(json.as_bytes()).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_set_golden_data() {
        let examples = vec![
            r#"{"f:aaa":{},"f:aab":{}}"#,
            r#"{"f:a":{"f:b":{}}}"#,
            r#"{"f:a":{".":{},"f:b":{"f:c":{}}}}"#,
        ];

        for example in examples {
            let set = Set::from_json(example.as_bytes()).unwrap();
            let json = String::from_utf8(set.to_json().unwrap()).unwrap();
            assert_eq!(json, example);
        }
    }

    #[test]
    fn test_drop_unknown() {
        let input = r#"{"f:aaa":{},"k:{\"name\":\"x\"}":{}}"#;
        let set = Set::from_json(input.as_bytes()).unwrap();
        let json = String::from_utf8(set.to_json().unwrap()).unwrap();
        assert_eq!(json, r#"{"f:aaa":{}}"#);

        let nested = r#"{"f:a":{"v:1":{},"i:0":{"f:b":{}}}}"#;
        assert!(Set::from_json(nested.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_short_keys() {
        let err = Set::from_json(br#"{"f:a":{"x":{}}}"#).unwrap_err();
        assert_eq!(err.message, "key must be at least 2 characters long");
    }

    #[test]
    fn test_rejects_non_object_values() {
        assert!(Set::from_json(br#"{"f:a":1}"#).is_err());
        assert!(Set::from_json(br#"[]"#).is_err());
    }

    #[test]
    fn test_serde_impls() {
        let set: Set = [p("data.key")].into_iter().collect();
        let yaml = serde_yaml::to_string(&set).unwrap();
        let back: Set = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, set);
    }
}

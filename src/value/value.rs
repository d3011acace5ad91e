//! Core value types and operations.

use super::validation::{ValidationError, ValidationErrors};
use crate::fieldpath::{Path, Set};
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value is a node of a resource's data tree: either a leaf or a nested mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(Scalar),
    Map(Map),
}

/// Scalar is a leaf value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Sequences are atomic: they are owned, compared and replaced as a whole.
    List(Vec<Value>),
}

/// Map is a mapping from string keys to values, kept in key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Map {
    fields: BTreeMap<String, Value>,
}

impl Value {
    pub fn null() -> Self {
        Value::Scalar(Scalar::Null)
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::Scalar(Scalar::String(s.into()))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Scalar(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Returns a short name for the kind of node, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Scalar(Scalar::Null) => "null",
            Value::Scalar(Scalar::Bool(_)) => "bool",
            Value::Scalar(Scalar::Int(_)) => "int",
            Value::Scalar(Scalar::Float(_)) => "float",
            Value::Scalar(Scalar::String(_)) => "string",
            Value::Scalar(Scalar::List(_)) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<Map> for Value {
    fn from(m: Map) -> Self {
        Value::Map(m)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Scalar(Scalar::Int(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Scalar(Scalar::Bool(b))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

impl Map {
    pub const fn new() -> Self {
        Map {
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn delete(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Returns the value at the given path, if every step of it exists.
    pub fn get_path(&self, path: &Path) -> Option<&Value> {
        let (last, parents) = path.as_slice().split_last()?;
        let mut current = self;
        for key in parents {
            current = current.get(key)?.as_map()?;
        }
        current.get(last)
    }

    /// Writes `value` at `path`, creating intermediate mappings as needed.
    ///
    /// An intermediate node that holds a scalar is replaced by a mapping.
    pub fn set_path(&mut self, path: &Path, value: Value) {
        self.set_keys(path.as_slice(), value);
    }

    fn set_keys(&mut self, keys: &[String], value: Value) {
        let Some((first, rest)) = keys.split_first() else {
            return;
        };
        if rest.is_empty() {
            self.fields.insert(first.clone(), value);
            return;
        }
        match self.fields.get_mut(first) {
            Some(Value::Map(child)) => child.set_keys(rest, value),
            _ => {
                let mut child = Map::new();
                child.set_keys(rest, value);
                self.fields.insert(first.clone(), Value::Map(child));
            }
        }
    }

    /// Removes the value at `path` and returns it.
    ///
    /// Mappings left empty by the removal are removed as well.
    pub fn remove_path(&mut self, path: &Path) -> Option<Value> {
        self.remove_keys(path.as_slice())
    }

    fn remove_keys(&mut self, keys: &[String]) -> Option<Value> {
        let (first, rest) = keys.split_first()?;
        if rest.is_empty() {
            return self.fields.remove(first);
        }
        let child = match self.fields.get_mut(first) {
            Some(Value::Map(m)) => m,
            _ => return None,
        };
        let removed = child.remove_keys(rest);
        if removed.is_some() && child.is_empty() {
            self.fields.remove(first);
        }
        removed
    }

    /// Flattens the mapping into its (path, leaf) pairs in path order.
    ///
    /// Empty nested mappings contribute no leaves.
    pub fn leaves(&self) -> Vec<(Path, Value)> {
        let mut out = Vec::new();
        self.collect_leaves(&mut Path::new(), &mut out);
        out
    }

    fn collect_leaves(&self, current: &mut Path, out: &mut Vec<(Path, Value)>) {
        for (key, value) in &self.fields {
            current.push(key.clone());
            match value {
                Value::Map(m) => m.collect_leaves(current, out),
                Value::Scalar(_) => out.push((current.clone(), value.clone())),
            }
            current.pop();
        }
    }

    /// Returns the set of every leaf path in the mapping.
    pub fn to_field_set(&self) -> Set {
        self.leaves().into_iter().map(|(path, _)| path).collect()
    }

    /// Builds a mapping from explicit (path, leaf) pairs.
    ///
    /// Rejects duplicate paths and paths that would make one field both a
    /// leaf and a mapping.
    pub fn from_leaves<I>(leaves: I) -> Result<Map, ValidationErrors>
    where
        I: IntoIterator<Item = (Path, Value)>,
    {
        let mut seen = Set::new();
        let mut errors = ValidationErrors::new();
        let mut map = Map::new();

        for (path, value) in leaves {
            if path.is_empty() {
                errors.add(ValidationError::EmptyPath);
                continue;
            }
            if path.iter().any(|key| key.is_empty()) {
                errors.add(ValidationError::empty_field_name(path.to_string()));
                continue;
            }
            if seen.has(&path) {
                errors.add(ValidationError::duplicate_field(path.to_string()));
                continue;
            }
            if seen.covers(&path) || seen.has_descendants_of(&path) {
                errors.add(ValidationError::inconsistent_type(path.to_string()));
                continue;
            }
            if let Value::Map(m) = &value {
                if let Err(nested) = m.validate_at(&path) {
                    errors.extend(nested);
                    continue;
                }
            }
            seen.insert(&path);
            map.set_path(&path, value);
        }

        if errors.is_empty() {
            Ok(map)
        } else {
            Err(errors)
        }
    }

    /// Checks that every field name in the mapping is non-empty.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        self.validate_at(&Path::new())
    }

    fn validate_at(&self, prefix: &Path) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        self.collect_errors(&mut prefix.clone(), &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn collect_errors(&self, current: &mut Path, errors: &mut ValidationErrors) {
        for (key, value) in &self.fields {
            current.push(key.clone());
            if key.is_empty() {
                errors.add(ValidationError::empty_field_name(current.to_string()));
            } else if let Value::Map(m) = value {
                m.collect_errors(current, errors);
            }
            current.pop();
        }
    }
}

impl FromIterator<(String, Value)> for Map {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Map {
            fields: iter.into_iter().collect(),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a scalar, a sequence or a mapping with string keys")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::null())
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::null())
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Scalar(Scalar::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Scalar(Scalar::Int(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        match i64::try_from(v) {
            Ok(i) => Ok(Value::Scalar(Scalar::Int(i))),
            Err(_) => Ok(Value::Scalar(Scalar::Float(v as f64))),
        }
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Scalar(Scalar::Float(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::string(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::string(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<Value>()? {
            items.push(item);
        }
        Ok(Value::Scalar(Scalar::List(items)))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut fields = BTreeMap::new();
        while let Some(key) = access.next_key::<String>()? {
            if fields.contains_key(&key) {
                return Err(de::Error::custom(format_args!("duplicate key {:?}", key)));
            }
            let value = access.next_value::<Value>()?;
            fields.insert(key, value);
        }
        Ok(Value::Map(Map { fields }))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

impl<'de> Deserialize<'de> for Map {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Map(m) => Ok(m),
            other => Err(de::Error::custom(format_args!(
                "expected a mapping, found {}",
                other.kind_name()
            ))),
        }
    }
}

/// Parse a document (a top-level mapping) from YAML or JSON text.
pub fn document_from_yaml(yaml: &str) -> Result<Map, serde_yaml::Error> {
    serde_yaml::from_str(yaml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn p(dotted: &str) -> Path {
        Path::parse(dotted).unwrap()
    }

    #[test]
    fn test_yaml_document() {
        let doc = document_from_yaml("data:\n  key: value\n  count: 3\n  on: true\n").unwrap();
        assert_eq!(doc.get_path(&p("data.key")), Some(&Value::string("value")));
        assert_eq!(doc.get_path(&p("data.count")), Some(&Value::from(3)));
        assert_eq!(doc.get_path(&p("data.on")), Some(&Value::from(true)));
        assert_eq!(doc.get_path(&p("data.missing")), None);
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let err = document_from_yaml("data:\n  key: a\n  key: b\n").unwrap_err();
        assert!(err.to_string().contains("duplicate"));

        let err = serde_json::from_str::<Map>(r#"{"a": 1, "a": 2}"#).unwrap_err();
        assert!(err.to_string().contains("duplicate key \"a\""));
    }

    #[test]
    fn test_document_must_be_mapping() {
        assert!(document_from_yaml("- a\n- b\n").is_err());
        assert!(document_from_yaml("just a string").is_err());
    }

    #[test]
    fn test_sequences_are_leaves() {
        let doc = document_from_yaml("spec:\n  args: [a, b]\n").unwrap();
        let leaves = doc.leaves();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].0, p("spec.args"));
        assert!(matches!(leaves[0].1, Value::Scalar(Scalar::List(ref l)) if l.len() == 2));
    }

    #[test]
    fn test_leaves_skip_empty_maps() {
        let doc = document_from_yaml("a: {}\nb:\n  c: 1\n").unwrap();
        let paths: Vec<Path> = doc.leaves().into_iter().map(|(path, _)| path).collect();
        assert_eq!(paths, vec![p("b.c")]);
    }

    #[test]
    fn test_set_path_replaces_scalar_parent() {
        let mut map = Map::new();
        map.set("a", "scalar");
        map.set_path(&p("a.b.c"), Value::from(1));
        assert_eq!(map.get_path(&p("a.b.c")), Some(&Value::from(1)));
    }

    #[test]
    fn test_remove_path_prunes_empty_parents() {
        let mut map = Map::new();
        map.set_path(&p("a.b.c"), Value::from(1));
        map.set_path(&p("a.d"), Value::from(2));

        assert_eq!(map.remove_path(&p("a.b.c")), Some(Value::from(1)));
        assert!(map.get_path(&p("a.b")).is_none());
        assert!(map.has("a"));

        assert_eq!(map.remove_path(&p("a.d")), Some(Value::from(2)));
        assert!(map.is_empty());

        assert_eq!(map.remove_path(&p("x.y")), None);
    }

    #[test]
    fn test_from_leaves() {
        let map = Map::from_leaves(vec![
            (p("data.key"), Value::string("value")),
            (p("data.other"), Value::from(1)),
        ])
        .unwrap();
        assert_eq!(map.leaves().len(), 2);
    }

    #[test]
    fn test_from_leaves_rejects_malformed_input() {
        let errs = Map::from_leaves(vec![
            (p("data.key"), Value::string("a")),
            (p("data.key"), Value::string("b")),
        ])
        .unwrap_err();
        assert!(matches!(
            errs.iter().next(),
            Some(ValidationError::DuplicateField { .. })
        ));

        let errs = Map::from_leaves(vec![
            (p("data"), Value::string("a")),
            (p("data.key"), Value::string("b")),
        ])
        .unwrap_err();
        assert!(matches!(
            errs.iter().next(),
            Some(ValidationError::InconsistentType { .. })
        ));

        let errs = Map::from_leaves(vec![(Path::new(), Value::null())]).unwrap_err();
        assert_eq!(errs.len(), 1);
    }

    #[test]
    fn test_validate_empty_field_name() {
        let doc = document_from_yaml("data:\n  \"\": x\n").unwrap();
        let errs = doc.validate().unwrap_err();
        assert!(errs.to_string().contains("empty field name"));
    }

    #[test]
    fn test_display_is_json() {
        assert_eq!(Value::string("v").to_string(), "\"v\"");
        assert_eq!(Value::from(4).to_string(), "4");
    }
}

//! ---
//! sdl_section: "02-object-model-schema"
//! sdl_subsection: "module"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "Generic object tree and schema validation engine."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

use serde::{Serialize, Serializer};
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};

static NULL: ObjectTree = ObjectTree::Null;

/// Canonical in-memory representation of one RPC message.
///
/// Every wire generation (mobile JSON, HMI JSON-RPC, legacy V1) is parsed into
/// this shape before validation. Children are owned by their parent.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ObjectTree {
    /// Absent or explicit `null` value.
    #[default]
    Null,
    /// Boolean scalar.
    Boolean(bool),
    /// Signed integer scalar.
    Integer(i64),
    /// Floating point scalar.
    Double(f64),
    /// UTF-8 string scalar.
    String(String),
    /// Opaque bytes, only used for binary attachments.
    Binary(Vec<u8>),
    /// Ordered list of values.
    Array(Vec<ObjectTree>),
    /// Named fields; ordering carries no meaning.
    Struct(BTreeMap<String, ObjectTree>),
}

/// Variant tag of an [`ObjectTree`], used in validation reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// [`ObjectTree::Null`]
    Null,
    /// [`ObjectTree::Boolean`]
    Boolean,
    /// [`ObjectTree::Integer`]
    Integer,
    /// [`ObjectTree::Double`]
    Double,
    /// [`ObjectTree::String`]
    String,
    /// [`ObjectTree::Binary`]
    Binary,
    /// [`ObjectTree::Array`]
    Array,
    /// [`ObjectTree::Struct`]
    Struct,
}

impl ValueKind {
    /// Lower-case label for logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Double => "double",
            ValueKind::String => "string",
            ValueKind::Binary => "binary",
            ValueKind::Array => "array",
            ValueKind::Struct => "struct",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ObjectTree {
    /// Empty struct node.
    pub fn new_struct() -> Self {
        ObjectTree::Struct(BTreeMap::new())
    }

    /// Variant tag of this node.
    pub fn kind(&self) -> ValueKind {
        match self {
            ObjectTree::Null => ValueKind::Null,
            ObjectTree::Boolean(_) => ValueKind::Boolean,
            ObjectTree::Integer(_) => ValueKind::Integer,
            ObjectTree::Double(_) => ValueKind::Double,
            ObjectTree::String(_) => ValueKind::String,
            ObjectTree::Binary(_) => ValueKind::Binary,
            ObjectTree::Array(_) => ValueKind::Array,
            ObjectTree::Struct(_) => ValueKind::Struct,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ObjectTree::Null)
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, ObjectTree::Struct(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ObjectTree::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ObjectTree::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric view that also accepts integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ObjectTree::Integer(value) => Some(*value as f64),
            ObjectTree::Double(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ObjectTree::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            ObjectTree::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ObjectTree]> {
        match self {
            ObjectTree::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&BTreeMap<String, ObjectTree>> {
        match self {
            ObjectTree::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// Field lookup; `None` for missing keys and for non-struct nodes.
    pub fn get(&self, key: &str) -> Option<&ObjectTree> {
        self.as_struct().and_then(|fields| fields.get(key))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ObjectTree> {
        match self {
            ObjectTree::Struct(fields) => fields.get_mut(key),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Set a field, turning this node into a struct first when it is not one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ObjectTree>) -> Option<ObjectTree> {
        self.fields_mut().insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<ObjectTree> {
        match self {
            ObjectTree::Struct(fields) => fields.remove(key),
            _ => None,
        }
    }

    /// Mutable access to a nested struct section, creating it when missing.
    ///
    /// A non-struct value already stored under `key` is replaced.
    pub fn section_mut(&mut self, key: &str) -> &mut ObjectTree {
        let section = self
            .fields_mut()
            .entry(key.to_owned())
            .or_insert_with(ObjectTree::new_struct);
        if !section.is_struct() {
            *section = ObjectTree::new_struct();
        }
        section
    }

    fn fields_mut(&mut self) -> &mut BTreeMap<String, ObjectTree> {
        if !self.is_struct() {
            *self = ObjectTree::new_struct();
        }
        match self {
            ObjectTree::Struct(fields) => fields,
            _ => unreachable!("node was just converted into a struct"),
        }
    }

    /// Render as JSON. Binary data becomes an array of byte values.
    pub fn to_json(&self) -> JsonValue {
        match self {
            ObjectTree::Null => JsonValue::Null,
            ObjectTree::Boolean(value) => JsonValue::Bool(*value),
            ObjectTree::Integer(value) => JsonValue::from(*value),
            ObjectTree::Double(value) => JsonNumber::from_f64(*value)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            ObjectTree::String(value) => JsonValue::String(value.clone()),
            ObjectTree::Binary(bytes) => {
                JsonValue::Array(bytes.iter().map(|b| JsonValue::from(*b)).collect())
            }
            ObjectTree::Array(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            ObjectTree::Struct(fields) => JsonValue::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect::<JsonMap<_, _>>(),
            ),
        }
    }
}

impl Index<&str> for ObjectTree {
    type Output = ObjectTree;

    /// Missing fields read as [`ObjectTree::Null`].
    fn index(&self, key: &str) -> &Self::Output {
        self.get(key).unwrap_or(&NULL)
    }
}

impl Serialize for ObjectTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<JsonValue> for ObjectTree {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => ObjectTree::Null,
            JsonValue::Bool(flag) => ObjectTree::Boolean(flag),
            JsonValue::Number(number) => match number.as_i64() {
                Some(integer) => ObjectTree::Integer(integer),
                None => ObjectTree::Double(number.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(text) => ObjectTree::String(text),
            JsonValue::Array(items) => {
                ObjectTree::Array(items.into_iter().map(ObjectTree::from).collect())
            }
            JsonValue::Object(fields) => ObjectTree::Struct(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, ObjectTree::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for ObjectTree {
    fn from(value: bool) -> Self {
        ObjectTree::Boolean(value)
    }
}

impl From<i64> for ObjectTree {
    fn from(value: i64) -> Self {
        ObjectTree::Integer(value)
    }
}

impl From<i32> for ObjectTree {
    fn from(value: i32) -> Self {
        ObjectTree::Integer(i64::from(value))
    }
}

impl From<u32> for ObjectTree {
    fn from(value: u32) -> Self {
        ObjectTree::Integer(i64::from(value))
    }
}

impl From<f64> for ObjectTree {
    fn from(value: f64) -> Self {
        ObjectTree::Double(value)
    }
}

impl From<&str> for ObjectTree {
    fn from(value: &str) -> Self {
        ObjectTree::String(value.to_owned())
    }
}

impl From<String> for ObjectTree {
    fn from(value: String) -> Self {
        ObjectTree::String(value)
    }
}

impl From<Vec<ObjectTree>> for ObjectTree {
    fn from(items: Vec<ObjectTree>) -> Self {
        ObjectTree::Array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_conversion_keeps_integer_and_double_apart() {
        let tree = ObjectTree::from(json!({
            "count": 3,
            "ratio": 0.5,
            "name": "show",
            "items": [1, null, true]
        }));
        assert_eq!(tree["count"], ObjectTree::Integer(3));
        assert_eq!(tree["ratio"], ObjectTree::Double(0.5));
        assert_eq!(tree["name"].as_str(), Some("show"));
        assert_eq!(tree["items"].as_array().map(<[_]>::len), Some(3));
        assert_eq!(tree.to_json()["ratio"], json!(0.5));
    }

    #[test]
    fn missing_fields_index_as_null() {
        let tree = ObjectTree::new_struct();
        assert!(tree["params"]["function_id"].is_null());
        assert!(ObjectTree::Integer(4)["anything"].is_null());
    }

    #[test]
    fn section_mut_creates_and_replaces_sections() {
        let mut tree = ObjectTree::Integer(1);
        tree.section_mut("params").insert("function_id", 12_i64);
        assert_eq!(tree["params"]["function_id"].as_i64(), Some(12));

        tree.insert("msg_params", "not a struct");
        tree.section_mut("msg_params").insert("info", "ok");
        assert_eq!(tree["msg_params"]["info"].as_str(), Some("ok"));
    }

    #[test]
    fn binary_serializes_as_byte_array() {
        let mut tree = ObjectTree::new_struct();
        tree.insert("binary_data", ObjectTree::Binary(vec![1, 2, 255]));
        let json = serde_json::to_value(&tree).expect("serialize");
        assert_eq!(json, json!({"binary_data": [1, 2, 255]}));
    }
}

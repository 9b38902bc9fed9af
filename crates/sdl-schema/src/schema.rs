//! ---
//! sdl_section: "02-object-model-schema"
//! sdl_subsection: "module"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "Generic object tree and schema validation engine."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Validation rule for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaNode {
    /// Whether the field must be present in its parent struct.
    #[serde(default)]
    pub mandatory: bool,
    /// Expected variant and its bounds.
    #[serde(flatten)]
    pub kind: SchemaKind,
}

/// Expected variant of a value together with its constraints.
///
/// Numeric bounds are inclusive. String lengths count characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchemaKind {
    /// Only `null` is accepted.
    Null,
    /// Boolean scalar.
    Boolean,
    /// Integer scalar with optional bounds.
    Integer {
        #[serde(default)]
        min: Option<i64>,
        #[serde(default)]
        max: Option<i64>,
    },
    /// Floating point scalar with optional bounds; integers are accepted.
    Double {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    /// String with optional length bounds.
    String {
        #[serde(default)]
        min_length: Option<usize>,
        #[serde(default)]
        max_length: Option<usize>,
    },
    /// String restricted to a fixed set of legal values.
    Enum { values: Vec<String> },
    /// Opaque binary data.
    Binary,
    /// Homogeneous list; every element is checked against `element`.
    Array {
        element: Box<SchemaNode>,
        #[serde(default)]
        min_size: Option<usize>,
        #[serde(default)]
        max_size: Option<usize>,
    },
    /// Struct with named fields, kept in declaration order.
    Struct {
        #[serde(default)]
        fields: IndexMap<String, SchemaNode>,
    },
}

impl SchemaNode {
    pub fn mandatory(kind: SchemaKind) -> Self {
        Self {
            mandatory: true,
            kind,
        }
    }

    pub fn optional(kind: SchemaKind) -> Self {
        Self {
            mandatory: false,
            kind,
        }
    }

    /// Struct fields when this node describes a struct.
    pub fn fields(&self) -> Option<&IndexMap<String, SchemaNode>> {
        match &self.kind {
            SchemaKind::Struct { fields } => Some(fields),
            _ => None,
        }
    }
}

impl SchemaKind {
    pub fn integer(min: Option<i64>, max: Option<i64>) -> Self {
        SchemaKind::Integer { min, max }
    }

    pub fn double(min: Option<f64>, max: Option<f64>) -> Self {
        SchemaKind::Double { min, max }
    }

    pub fn string(min_length: Option<usize>, max_length: Option<usize>) -> Self {
        SchemaKind::String {
            min_length,
            max_length,
        }
    }

    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SchemaKind::Enum {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn array(element: SchemaNode, min_size: Option<usize>, max_size: Option<usize>) -> Self {
        SchemaKind::Array {
            element: Box::new(element),
            min_size,
            max_size,
        }
    }

    pub fn structure<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, SchemaNode)>,
        S: Into<String>,
    {
        SchemaKind::Struct {
            fields: fields
                .into_iter()
                .map(|(name, node)| (name.into(), node))
                .collect(),
        }
    }
}

struct Bounds<T>(Option<T>, Option<T>);

impl<T: fmt::Display> fmt::Display for Bounds<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.0, &self.1) {
            (Some(min), Some(max)) => write!(f, " in [{min}, {max}]"),
            (Some(min), None) => write!(f, " >= {min}"),
            (None, Some(max)) => write!(f, " <= {max}"),
            (None, None) => Ok(()),
        }
    }
}

/// Human-readable constraint, used as the "expected" half of a violation.
impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaKind::Null => f.write_str("null"),
            SchemaKind::Boolean => f.write_str("boolean"),
            SchemaKind::Integer { min, max } => write!(f, "integer{}", Bounds(*min, *max)),
            SchemaKind::Double { min, max } => write!(f, "double{}", Bounds(*min, *max)),
            SchemaKind::String {
                min_length,
                max_length,
            } => write!(f, "string with length{}", Bounds(*min_length, *max_length)),
            SchemaKind::Enum { values } => write!(f, "one of [{}]", values.join(", ")),
            SchemaKind::Binary => f.write_str("binary"),
            SchemaKind::Array {
                element,
                min_size,
                max_size,
            } => write!(
                f,
                "array of {} with size{}",
                element.kind,
                Bounds(*min_size, *max_size)
            ),
            SchemaKind::Struct { .. } => f.write_str("struct"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_definitions_deserialize_into_nodes() {
        let yaml = r#"
type: struct
mandatory: true
fields:
  appName:
    type: string
    mandatory: true
    min_length: 1
    max_length: 100
  languageDesired:
    type: enum
    values: [EN-US, DE-DE]
  ttsName:
    type: array
    max_size: 100
    element:
      type: struct
      fields:
        text: { type: string, mandatory: true }
"#;
        let node: SchemaNode = serde_yaml::from_str(yaml).expect("parse schema");
        assert!(node.mandatory);
        let fields = node.fields().expect("struct fields");
        assert_eq!(
            fields.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["appName", "languageDesired", "ttsName"]
        );
        assert_eq!(fields["appName"].kind, SchemaKind::string(Some(1), Some(100)));
        assert!(!fields["languageDesired"].mandatory);
        match &fields["ttsName"].kind {
            SchemaKind::Array { element, max_size, .. } => {
                assert_eq!(*max_size, Some(100));
                assert!(element.fields().is_some());
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn display_describes_constraints() {
        assert_eq!(SchemaKind::integer(Some(0), Some(10)).to_string(), "integer in [0, 10]");
        assert_eq!(SchemaKind::double(None, Some(1.5)).to_string(), "double <= 1.5");
        assert_eq!(
            SchemaKind::enumeration(["A", "B"]).to_string(),
            "one of [A, B]"
        );
        assert_eq!(SchemaKind::Boolean.to_string(), "boolean");
    }
}

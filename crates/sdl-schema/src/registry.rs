//! ---
//! sdl_section: "02-object-model-schema"
//! sdl_subsection: "module"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "Versioned schema registry and definition loader."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use sdl_versioning::SemanticVersion;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::schema::SchemaNode;
use crate::{SchemaError, SchemaResult};

/// Peer-facing API surface a function belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interface {
    Mobile,
    Hmi,
}

impl Interface {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interface::Mobile => "mobile",
            Interface::Hmi => "hmi",
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message kind as carried in `params.message_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Request,
    Response,
    Notification,
    ErrorResponse,
    Unknown,
}

impl MessageKind {
    /// Numeric code stored in the object tree.
    pub fn code(&self) -> i64 {
        match self {
            MessageKind::Request => 0,
            MessageKind::Response => 1,
            MessageKind::Notification => 2,
            MessageKind::ErrorResponse => 3,
            MessageKind::Unknown => -1,
        }
    }

    /// Inverse of [`MessageKind::code`]; unrecognised codes map to `Unknown`.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => MessageKind::Request,
            1 => MessageKind::Response,
            2 => MessageKind::Notification,
            3 => MessageKind::ErrorResponse,
            _ => MessageKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Request => "request",
            MessageKind::Response => "response",
            MessageKind::Notification => "notification",
            MessageKind::ErrorResponse => "error_response",
            MessageKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive range of API versions a schema shape applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRange {
    pub since: SemanticVersion,
    /// `None` means open-ended.
    pub until: Option<SemanticVersion>,
}

impl VersionRange {
    /// Range covering every version, used for unversioned HMI schemas.
    pub const ALL: VersionRange = VersionRange {
        since: SemanticVersion::UNKNOWN,
        until: None,
    };

    pub fn new(since: SemanticVersion, until: Option<SemanticVersion>) -> Self {
        Self { since, until }
    }

    pub fn contains(&self, version: SemanticVersion) -> bool {
        version >= self.since && self.until.map_or(true, |until| version <= until)
    }

    /// Narrower ranges order first: later start, then earlier end.
    fn tightness(&self, other: &VersionRange) -> Ordering {
        other.since.cmp(&self.since).then_with(|| match (self.until, other.until) {
            (Some(mine), Some(theirs)) => mine.cmp(&theirs),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FunctionKey {
    interface: Interface,
    function_id: u32,
    kind: MessageKind,
}

#[derive(Debug, Clone)]
struct VersionedSchema {
    range: VersionRange,
    schema: SchemaNode,
}

/// Immutable lookup table of function schemas.
///
/// Built once through [`SchemaRegistryBuilder`] or a definition document and
/// shared behind an `Arc` afterwards.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entries: HashMap<FunctionKey, Vec<VersionedSchema>>,
    ids_by_name: HashMap<(Interface, String), u32>,
    names_by_id: HashMap<(Interface, u32), String>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// Schema for the function at `version`.
    ///
    /// Picks the tightest range containing `version`, else the entry with the
    /// lowest starting version. `None` means the function has no schema for
    /// this message kind, which callers report as an unknown function.
    pub fn lookup(
        &self,
        interface: Interface,
        function_id: u32,
        kind: MessageKind,
        version: SemanticVersion,
    ) -> Option<&SchemaNode> {
        let candidates = self.entries.get(&FunctionKey {
            interface,
            function_id,
            kind,
        })?;
        candidates
            .iter()
            .filter(|candidate| candidate.range.contains(version))
            .min_by(|a, b| a.range.tightness(&b.range))
            .or_else(|| candidates.iter().min_by_key(|candidate| candidate.range.since))
            .map(|candidate| &candidate.schema)
    }

    pub fn function_id(&self, interface: Interface, name: &str) -> Option<u32> {
        self.ids_by_name.get(&(interface, name.to_owned())).copied()
    }

    pub fn function_name(&self, interface: Interface, function_id: u32) -> Option<&str> {
        self.names_by_id
            .get(&(interface, function_id))
            .map(String::as_str)
    }

    /// Whether `function_id` is declared for `interface` at all.
    pub fn is_known_function(&self, interface: Interface, function_id: u32) -> bool {
        self.names_by_id.contains_key(&(interface, function_id))
    }

    /// Number of declared functions across both interfaces.
    pub fn function_count(&self) -> usize {
        self.names_by_id.len()
    }

    /// Number of `(function, kind)` entries for `interface`.
    pub fn schema_count(&self, interface: Interface) -> usize {
        self.entries
            .keys()
            .filter(|key| key.interface == interface)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a definition document from YAML or JSON (chosen by extension).
    pub fn from_path(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let document: SchemaDocument = if is_json {
            serde_json::from_str(&raw)?
        } else {
            serde_yaml::from_str(&raw)?
        };
        let registry = Self::from_document(document)?;
        debug!(
            path = %path.display(),
            functions = registry.function_count(),
            mobile_schemas = registry.schema_count(Interface::Mobile),
            hmi_schemas = registry.schema_count(Interface::Hmi),
            "schema definitions loaded"
        );
        Ok(registry)
    }

    pub fn from_yaml_str(raw: &str) -> SchemaResult<Self> {
        Self::from_document(serde_yaml::from_str(raw)?)
    }

    pub fn from_document(document: SchemaDocument) -> SchemaResult<Self> {
        let mut builder = Self::builder();
        for (interface, functions) in [
            (Interface::Mobile, document.mobile),
            (Interface::Hmi, document.hmi),
        ] {
            for function in functions {
                builder.register_function(interface, &function.name, function.id)?;
                for (kind, shapes) in [
                    (MessageKind::Request, function.request),
                    (MessageKind::Response, function.response),
                    (MessageKind::Notification, function.notification),
                ] {
                    for shape in shapes {
                        let range = VersionRange::new(
                            shape.since.unwrap_or(SemanticVersion::UNKNOWN),
                            shape.until,
                        );
                        builder.add_schema(interface, function.id, kind, range, shape.schema)?;
                    }
                }
            }
        }
        Ok(builder.build())
    }
}

/// Mutable staging area for a [`SchemaRegistry`].
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    registry: SchemaRegistry,
}

impl SchemaRegistryBuilder {
    /// Declare a function name/id pair. Names and ids are unique per interface.
    pub fn register_function(
        &mut self,
        interface: Interface,
        name: &str,
        function_id: u32,
    ) -> SchemaResult<&mut Self> {
        let name_key = (interface, name.to_owned());
        if self.registry.ids_by_name.contains_key(&name_key) {
            return Err(SchemaError::DuplicateFunctionName {
                interface,
                name: name.to_owned(),
            });
        }
        if self.registry.names_by_id.contains_key(&(interface, function_id)) {
            return Err(SchemaError::DuplicateFunctionId {
                interface,
                function_id,
            });
        }
        self.registry.ids_by_name.insert(name_key, function_id);
        self.registry
            .names_by_id
            .insert((interface, function_id), name.to_owned());
        Ok(self)
    }

    /// Attach a schema shape to a declared function.
    pub fn add_schema(
        &mut self,
        interface: Interface,
        function_id: u32,
        kind: MessageKind,
        range: VersionRange,
        schema: SchemaNode,
    ) -> SchemaResult<&mut Self> {
        if !self.registry.names_by_id.contains_key(&(interface, function_id)) {
            return Err(SchemaError::UndeclaredFunction {
                interface,
                function_id,
            });
        }
        if !matches!(
            kind,
            MessageKind::Request | MessageKind::Response | MessageKind::Notification
        ) {
            return Err(SchemaError::UnsupportedKind(kind));
        }
        if range.until.is_some_and(|until| until < range.since) {
            return Err(SchemaError::InvertedRange {
                function_id,
                since: range.since,
                until: range.until.unwrap_or(range.since),
            });
        }
        if schema.fields().is_none() {
            return Err(SchemaError::NotAStruct { function_id });
        }
        self.registry
            .entries
            .entry(FunctionKey {
                interface,
                function_id,
                kind,
            })
            .or_default()
            .push(VersionedSchema { range, schema });
        Ok(self)
    }

    pub fn build(mut self) -> SchemaRegistry {
        for candidates in self.registry.entries.values_mut() {
            candidates.sort_by_key(|candidate| candidate.range.since);
        }
        self.registry
    }
}

/// On-disk definition document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub mobile: Vec<FunctionDefinition>,
    #[serde(default)]
    pub hmi: Vec<FunctionDefinition>,
}

/// One function and its per-kind, per-version schema shapes.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub id: u32,
    #[serde(default)]
    pub request: Vec<ShapeDefinition>,
    #[serde(default)]
    pub response: Vec<ShapeDefinition>,
    #[serde(default)]
    pub notification: Vec<ShapeDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShapeDefinition {
    #[serde(default)]
    pub since: Option<SemanticVersion>,
    #[serde(default)]
    pub until: Option<SemanticVersion>,
    pub schema: SchemaNode,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaKind;

    fn shape(field: &str) -> SchemaNode {
        SchemaNode::mandatory(SchemaKind::structure([(
            field,
            SchemaNode::mandatory(SchemaKind::Boolean),
        )]))
    }

    fn registry() -> SchemaRegistry {
        let mut builder = SchemaRegistry::builder();
        builder
            .register_function(Interface::Mobile, "Show", 13)
            .expect("register");
        for (since, until, field) in [
            ((1, 0, 0), None, "legacy"),
            ((5, 0, 0), None, "modern"),
            ((5, 1, 0), Some((5, 9, 0)), "narrow"),
        ] {
            let range = VersionRange::new(
                SemanticVersion::new(since.0, since.1, since.2),
                until.map(|(a, b, c)| SemanticVersion::new(a, b, c)),
            );
            builder
                .add_schema(Interface::Mobile, 13, MessageKind::Request, range, shape(field))
                .expect("add schema");
        }
        builder.build()
    }

    fn field_of(node: &SchemaNode) -> &str {
        node.fields()
            .and_then(|fields| fields.keys().next())
            .map(String::as_str)
            .unwrap_or_default()
    }

    #[test]
    fn lookup_prefers_tightest_containing_range() {
        let registry = registry();
        let at = |major, minor| {
            registry
                .lookup(
                    Interface::Mobile,
                    13,
                    MessageKind::Request,
                    SemanticVersion::new(major, minor, 0),
                )
                .map(field_of)
        };
        assert_eq!(at(4, 5), Some("legacy"));
        assert_eq!(at(5, 0), Some("modern"));
        assert_eq!(at(5, 2), Some("narrow"));
        assert_eq!(at(6, 0), Some("modern"));
    }

    #[test]
    fn unknown_version_falls_back_to_lowest_range() {
        let registry = registry();
        let schema = registry
            .lookup(Interface::Mobile, 13, MessageKind::Request, SemanticVersion::UNKNOWN)
            .expect("fallback");
        assert_eq!(field_of(schema), "legacy");
    }

    #[test]
    fn lookup_fails_for_unknown_function_or_kind() {
        let registry = registry();
        let version = SemanticVersion::new(5, 0, 0);
        assert!(registry
            .lookup(Interface::Mobile, 99, MessageKind::Request, version)
            .is_none());
        assert!(registry
            .lookup(Interface::Mobile, 13, MessageKind::Response, version)
            .is_none());
        assert!(registry
            .lookup(Interface::Hmi, 13, MessageKind::Request, version)
            .is_none());
    }

    #[test]
    fn builder_rejects_inconsistent_definitions() {
        let mut builder = SchemaRegistry::builder();
        builder
            .register_function(Interface::Hmi, "UI.Show", 10)
            .expect("register");
        assert!(matches!(
            builder.register_function(Interface::Hmi, "UI.Show", 11),
            Err(SchemaError::DuplicateFunctionName { .. })
        ));
        assert!(matches!(
            builder.register_function(Interface::Hmi, "UI.Alert", 10),
            Err(SchemaError::DuplicateFunctionId { .. })
        ));
        assert!(matches!(
            builder.add_schema(Interface::Hmi, 77, MessageKind::Request, VersionRange::ALL, shape("a")),
            Err(SchemaError::UndeclaredFunction { .. })
        ));
        let inverted = VersionRange::new(
            SemanticVersion::new(6, 0, 0),
            Some(SemanticVersion::new(5, 0, 0)),
        );
        assert!(matches!(
            builder.add_schema(Interface::Hmi, 10, MessageKind::Request, inverted, shape("a")),
            Err(SchemaError::InvertedRange { .. })
        ));
        assert!(matches!(
            builder.add_schema(
                Interface::Hmi,
                10,
                MessageKind::Request,
                VersionRange::ALL,
                SchemaNode::mandatory(SchemaKind::Boolean)
            ),
            Err(SchemaError::NotAStruct { .. })
        ));
    }

    #[test]
    fn names_and_ids_resolve_both_ways() {
        let registry = registry();
        assert_eq!(registry.function_id(Interface::Mobile, "Show"), Some(13));
        assert_eq!(registry.function_name(Interface::Mobile, 13), Some("Show"));
        assert!(registry.is_known_function(Interface::Mobile, 13));
        assert!(!registry.is_known_function(Interface::Hmi, 13));
    }

    #[test]
    fn yaml_document_builds_registry() {
        let yaml = r#"
mobile:
  - name: Show
    id: 13
    request:
      - since: "1.0.0"
        schema:
          type: struct
          fields:
            mainField1: { type: string, mandatory: true }
      - since: "5.0.0"
        schema:
          type: struct
          fields:
            mainField1: { type: string, mandatory: true }
            templateTitle: { type: string }
hmi:
  - name: UI.Show
    id: 10013
    request:
      - schema: { type: struct }
"#;
        let registry = SchemaRegistry::from_yaml_str(yaml).expect("load");
        assert_eq!(registry.function_count(), 2);
        let modern = registry
            .lookup(
                Interface::Mobile,
                13,
                MessageKind::Request,
                SemanticVersion::new(5, 0, 0),
            )
            .expect("modern");
        assert_eq!(modern.fields().map(|f| f.len()), Some(2));
        assert!(registry
            .lookup(Interface::Hmi, 10013, MessageKind::Request, SemanticVersion::UNKNOWN)
            .is_some());
    }
}

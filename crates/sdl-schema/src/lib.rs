//! ---
//! sdl_section: "02-object-model-schema"
//! sdl_subsection: "module"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "Object tree, schema registry and validation entry points."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
//! Object model for bridged RPC messages.
//!
//! Every inbound payload is parsed into an [`ObjectTree`], looked up in a
//! [`SchemaRegistry`] by interface, function id, message kind and version,
//! and then checked with [`validate`]. The registry is loaded once from a
//! YAML or JSON definition document and is read-only afterwards.

use std::path::PathBuf;

use sdl_versioning::SemanticVersion;

pub mod registry;
pub mod schema;
pub mod tree;
pub mod validation;

pub use registry::{
    FunctionDefinition, Interface, MessageKind, SchemaDocument, SchemaRegistry,
    SchemaRegistryBuilder, ShapeDefinition, VersionRange,
};
pub use schema::{SchemaKind, SchemaNode};
pub use tree::{ObjectTree, ValueKind};
pub use validation::{
    validate, FieldPath, PathSegment, ValidationReport, Violation, ViolationReason,
    RPC_REPORT_SUBJECT,
};

/// Shared result type for registry construction.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised while loading or assembling schema definitions.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("failed to read schema definitions from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML schema definitions: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid JSON schema definitions: {0}")]
    Json(#[from] serde_json::Error),
    #[error("function name '{name}' declared twice on the {interface} interface")]
    DuplicateFunctionName { interface: Interface, name: String },
    #[error("function id {function_id} declared twice on the {interface} interface")]
    DuplicateFunctionId { interface: Interface, function_id: u32 },
    #[error("schema attached to undeclared function {function_id} on the {interface} interface")]
    UndeclaredFunction { interface: Interface, function_id: u32 },
    #[error("message kind '{0}' cannot carry a registered schema")]
    UnsupportedKind(MessageKind),
    #[error("version range {since}..={until} of function {function_id} is inverted")]
    InvertedRange {
        function_id: u32,
        since: SemanticVersion,
        until: SemanticVersion,
    },
    #[error("top-level schema of function {function_id} must be a struct")]
    NotAStruct { function_id: u32 },
}

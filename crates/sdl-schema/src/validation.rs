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

use crate::schema::{SchemaKind, SchemaNode};
use crate::tree::{ObjectTree, ValueKind};

/// Subject prefix used for RPC validation reports.
pub const RPC_REPORT_SUBJECT: &str = "RPC";

/// One step in a path from the validated root to a violating value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Named struct field.
    Field(String),
    /// Array element index.
    Index(usize),
}

/// Location of a value inside an [`ObjectTree`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Name of the innermost struct field on the path, if any.
    pub fn leaf_field(&self) -> Option<&str> {
        self.0.iter().rev().find_map(|segment| match segment {
            PathSegment::Field(name) => Some(name.as_str()),
            PathSegment::Index(_) => None,
        })
    }

    fn field(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.0.push(PathSegment::Field(name.to_owned()));
        next
    }

    fn index(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.0.push(PathSegment::Index(index));
        next
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if position == 0 => f.write_str(name)?,
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Why a value failed its rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationReason {
    /// A mandatory field is absent.
    MissingMandatory,
    /// A field is not part of the schema and unknown fields are not allowed.
    UnexpectedField,
    /// The value has a different variant than the schema expects.
    WrongType(ValueKind),
    /// A numeric value lies outside its bounds.
    OutOfRange,
    /// A string is shorter or longer than allowed.
    InvalidLength,
    /// A string is not one of the enumerated values.
    InvalidEnumValue,
    /// An array holds too few or too many elements.
    InvalidArraySize,
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationReason::MissingMandatory => f.write_str("mandatory parameter is missing"),
            ViolationReason::UnexpectedField => f.write_str("unexpected parameter"),
            ViolationReason::WrongType(found) => write!(f, "wrong type, found {found}"),
            ViolationReason::OutOfRange => f.write_str("value is out of range"),
            ViolationReason::InvalidLength => f.write_str("invalid string length"),
            ViolationReason::InvalidEnumValue => f.write_str("invalid enum value"),
            ViolationReason::InvalidArraySize => f.write_str("invalid array size"),
        }
    }
}

/// A single failed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: FieldPath,
    pub reason: ViolationReason,
    /// Description of the constraint that was expected to hold.
    pub expected: String,
}

/// Ordered outcome of one validation run. Empty means valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    subject: String,
    violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            violations: Vec::new(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// One line per violation: `RPC.path: reason (expected ...)`.
    pub fn pretty_format(&self) -> String {
        self.violations
            .iter()
            .map(|violation| {
                let separator = if violation.path.is_root() { "" } else { "." };
                format!(
                    "{}{}{}: {} (expected {})",
                    self.subject, separator, violation.path, violation.reason, violation.expected
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn push(&mut self, path: FieldPath, reason: ViolationReason, expected: impl ToString) {
        self.violations.push(Violation {
            path,
            reason,
            expected: expected.to_string(),
        });
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pretty_format())
    }
}

/// Check `tree` against `schema` without mutating it.
///
/// With `allow_unknown_fields` set, struct fields absent from the schema are
/// tolerated and left untouched; otherwise each one is a violation.
pub fn validate(tree: &ObjectTree, schema: &SchemaNode, allow_unknown_fields: bool) -> ValidationReport {
    let mut report = ValidationReport::new(RPC_REPORT_SUBJECT);
    check(tree, schema, &FieldPath::root(), allow_unknown_fields, &mut report);
    report
}

fn check(
    value: &ObjectTree,
    schema: &SchemaNode,
    path: &FieldPath,
    allow_unknown_fields: bool,
    report: &mut ValidationReport,
) {
    let kind = &schema.kind;
    match (kind, value) {
        (SchemaKind::Null, ObjectTree::Null)
        | (SchemaKind::Boolean, ObjectTree::Boolean(_))
        | (SchemaKind::Binary, ObjectTree::Binary(_)) => {}
        (SchemaKind::Integer { min, max }, ObjectTree::Integer(number)) => {
            if min.is_some_and(|min| *number < min) || max.is_some_and(|max| *number > max) {
                report.push(path.clone(), ViolationReason::OutOfRange, kind);
            }
        }
        (SchemaKind::Double { min, max }, ObjectTree::Integer(_) | ObjectTree::Double(_)) => {
            let number = value.as_f64().unwrap_or(f64::NAN);
            let below = min.is_some_and(|min| number < min);
            let above = max.is_some_and(|max| number > max);
            if below || above || number.is_nan() {
                report.push(path.clone(), ViolationReason::OutOfRange, kind);
            }
        }
        (
            SchemaKind::String {
                min_length,
                max_length,
            },
            ObjectTree::String(text),
        ) => {
            let length = text.chars().count();
            if min_length.is_some_and(|min| length < min)
                || max_length.is_some_and(|max| length > max)
            {
                report.push(path.clone(), ViolationReason::InvalidLength, kind);
            }
        }
        (SchemaKind::Enum { values }, ObjectTree::String(text)) => {
            if !values.iter().any(|legal| legal == text) {
                report.push(path.clone(), ViolationReason::InvalidEnumValue, kind);
            }
        }
        (
            SchemaKind::Array {
                element,
                min_size,
                max_size,
            },
            ObjectTree::Array(items),
        ) => {
            if min_size.is_some_and(|min| items.len() < min)
                || max_size.is_some_and(|max| items.len() > max)
            {
                report.push(path.clone(), ViolationReason::InvalidArraySize, kind);
            }
            for (index, item) in items.iter().enumerate() {
                check(item, element, &path.index(index), allow_unknown_fields, report);
            }
        }
        (SchemaKind::Struct { fields }, ObjectTree::Struct(members)) => {
            for (name, field_schema) in fields {
                match members.get(name) {
                    Some(member) => check(
                        member,
                        field_schema,
                        &path.field(name),
                        allow_unknown_fields,
                        report,
                    ),
                    None if field_schema.mandatory => report.push(
                        path.field(name),
                        ViolationReason::MissingMandatory,
                        &field_schema.kind,
                    ),
                    None => {}
                }
            }
            if !allow_unknown_fields {
                for name in members.keys().filter(|name| !fields.contains_key(*name)) {
                    report.push(
                        path.field(name),
                        ViolationReason::UnexpectedField,
                        "no such parameter",
                    );
                }
            }
        }
        (_, other) => report.push(path.clone(), ViolationReason::WrongType(other.kind()), kind),
    }
}

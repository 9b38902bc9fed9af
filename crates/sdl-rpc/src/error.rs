//! ---
//! sdl_section: "03-rpc-routing"
//! sdl_subsection: "module"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "Conversion and replay error types."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
use sdl_schema::{Interface, MessageKind, ValidationReport};

use crate::types::MobileResult;

/// Why an envelope could not be turned into a dispatchable object tree.
///
/// Every variant is recovered at the router boundary.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// The payload is not valid JSON or lacks its envelope shape.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    /// The payload does not conform to its schema.
    #[error("schema violation: {0}")]
    SchemaViolation(ValidationReport),
    /// No schema is registered for the function and kind.
    #[error("no {kind} schema for {interface} function {function_id}")]
    UnknownFunction {
        interface: Interface,
        function_id: u32,
        kind: MessageKind,
    },
    /// Negative correlation id on a request.
    #[error("invalid correlation id {0} for RPC request")]
    InvalidCorrelationId(i32),
    /// Fewer binary bytes arrived than the header announced.
    #[error("incomplete binary attachment: declared {declared} bytes, delivered {delivered}")]
    IncompleteBinaryAttachment { declared: usize, delivered: usize },
    /// The protocol version tag is not one of HMI, V1..V5.
    #[error("unsupported protocol version tag {0}")]
    UnsupportedProtocolVersion(u8),
    /// The message kind cannot be handled on this path.
    #[error("message kind '{0}' is not supported here")]
    UnsupportedMessageKind(MessageKind),
}

impl ConversionError {
    /// Mobile result code carried by the negative response for this failure.
    pub fn result_code(&self) -> MobileResult {
        match self {
            ConversionError::InvalidCorrelationId(_) => MobileResult::InvalidId,
            ConversionError::UnsupportedProtocolVersion(_) => MobileResult::UnsupportedVersion,
            ConversionError::MalformedPayload(_)
            | ConversionError::SchemaViolation(_)
            | ConversionError::UnknownFunction { .. }
            | ConversionError::IncompleteBinaryAttachment { .. }
            | ConversionError::UnsupportedMessageKind(_) => MobileResult::InvalidData,
        }
    }

    /// Human readable `msg_params.info` text, if the response carries one.
    pub fn info(&self) -> Option<String> {
        match self {
            ConversionError::InvalidCorrelationId(_) => {
                Some("Invalid Correlation ID for RPC Request".to_owned())
            }
            ConversionError::SchemaViolation(report) => Some(report.pretty_format()),
            ConversionError::IncompleteBinaryAttachment { .. } => None,
            other => Some(other.to_string()),
        }
    }

    /// Stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ConversionError::MalformedPayload(_) => "malformed_payload",
            ConversionError::SchemaViolation(_) => "schema_violation",
            ConversionError::UnknownFunction { .. } => "unknown_function",
            ConversionError::InvalidCorrelationId(_) => "invalid_correlation_id",
            ConversionError::IncompleteBinaryAttachment { .. } => "incomplete_binary",
            ConversionError::UnsupportedProtocolVersion(_) => "unsupported_protocol",
            ConversionError::UnsupportedMessageKind(_) => "unsupported_message_kind",
        }
    }
}

/// Errors raised while reading an envelope capture.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid capture record on line {line}: {source}")]
    Record {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

//! ---
//! sdl_section: "03-rpc-routing"
//! sdl_subsection: "module"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "HMI JSON-RPC parsing and wrong-message-type handling."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
//! The head unit speaks JSON-RPC 2.0:
//!
//! * request: `{"id", "method", "params"}`
//! * notification: `{"method", "params"}` without `id`
//! * response: `{"id", "result": {"code", "method", ...}}`
//! * error: `{"id", "error": {"code", "message", "data": {"method", ...}}}`
//!
//! All four are normalised into the same `params` / `msg_params` tree used for
//! mobile messages.

use sdl_schema::{Interface, MessageKind, ObjectTree, SchemaRegistry, ValidationReport};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::error;

use crate::error::ConversionError;
use crate::types::{strings, HmiResult};

/// Info text attached to the generic error shape.
pub const INVALID_VEHICLE_MESSAGE: &str = "Invalid message received from vehicle";

/// HMI message after JSON-RPC normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct HmiMessage {
    pub kind: MessageKind,
    pub method: Option<String>,
    /// Registry id of `method`, when the registry knows it.
    pub function_id: Option<u32>,
    pub tree: ObjectTree,
}

/// Parse a JSON-RPC body and resolve its method name against `registry`.
pub fn parse_json_rpc(
    payload: &str,
    registry: &SchemaRegistry,
) -> Result<HmiMessage, ConversionError> {
    let value: JsonValue = serde_json::from_str(payload)
        .map_err(|err| ConversionError::MalformedPayload(err.to_string()))?;
    let JsonValue::Object(mut root) = value else {
        return Err(ConversionError::MalformedPayload(
            "JSON-RPC message must be an object".to_owned(),
        ));
    };

    // Presence of `id` marks a request. Non-integer ids are echoed back verbatim.
    let id = root.remove("id");
    let mut code = None;
    let mut text = None;

    let (kind, method, body) = if let Some(method) = take_string(&mut root, "method") {
        let kind = if id.is_some() {
            MessageKind::Request
        } else {
            MessageKind::Notification
        };
        (kind, Some(method), root.remove("params"))
    } else if let Some(JsonValue::Object(mut result)) = root.remove("result") {
        code = Some(take_code(&mut result)?);
        let method = take_string(&mut result, "method");
        (MessageKind::Response, method, Some(JsonValue::Object(result)))
    } else if let Some(JsonValue::Object(mut failure)) = root.remove("error") {
        code = Some(take_code(&mut failure)?);
        text = take_string(&mut failure, "message");
        let mut data = match failure.remove("data") {
            Some(JsonValue::Object(data)) => data,
            _ => JsonMap::new(),
        };
        let method = take_string(&mut data, "method");
        (MessageKind::ErrorResponse, method, Some(JsonValue::Object(data)))
    } else {
        (MessageKind::Unknown, None, None)
    };

    let function_id = method
        .as_deref()
        .and_then(|name| registry.function_id(Interface::Hmi, name));

    let mut tree = ObjectTree::new_struct();
    let params = tree.section_mut(strings::PARAMS);
    params.insert(strings::MESSAGE_TYPE, kind.code());
    if let Some(function_id) = function_id {
        params.insert(strings::FUNCTION_ID, function_id);
    }
    if let Some(id) = id {
        params.insert(strings::CORRELATION_ID, ObjectTree::from(id));
    }
    if let Some(code) = code {
        params.insert(strings::CODE, code);
    }
    if let Some(text) = text {
        params.insert(strings::MESSAGE, text);
    }
    tree.insert(
        strings::MSG_PARAMS,
        body.map(ObjectTree::from)
            .unwrap_or_else(ObjectTree::new_struct),
    );

    Ok(HmiMessage {
        kind,
        method,
        function_id,
        tree,
    })
}

fn take_string(object: &mut JsonMap<String, JsonValue>, key: &str) -> Option<String> {
    match object.remove(key) {
        Some(JsonValue::String(value)) => Some(value),
        Some(other) => {
            object.insert(key.to_owned(), other);
            None
        }
        None => None,
    }
}

fn take_code(object: &mut JsonMap<String, JsonValue>) -> Result<i64, ConversionError> {
    object
        .remove("code")
        .and_then(|code| code.as_i64())
        .ok_or_else(|| ConversionError::MalformedPayload("JSON-RPC result lacks an integer code".to_owned()))
}

/// Where a reshaped HMI message goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forward {
    /// Error response back to the head unit.
    ErrorResponse,
    /// Generic error handed to HMI command execution.
    GenericError,
}

/// Reshape an HMI message that failed validation, by its message kind.
///
/// Notifications cannot be answered and are refused with
/// [`ConversionError::UnsupportedMessageKind`]. Requests become an
/// `INVALID_DATA` error response carrying the report. Everything else gets
/// the generic error shape.
pub fn handle_wrong_message_type(
    message: &mut ObjectTree,
    report: &ValidationReport,
) -> Result<Forward, ConversionError> {
    let kind = message[strings::PARAMS][strings::MESSAGE_TYPE]
        .as_i64()
        .map_or(MessageKind::Unknown, MessageKind::from_code);
    match kind {
        MessageKind::Notification => {
            error!("ignoring invalid HMI notification");
            Err(ConversionError::UnsupportedMessageKind(kind))
        }
        MessageKind::Request => {
            error!(report = %report, "received invalid data on HMI request");
            message.remove(strings::MSG_PARAMS);
            let params = message.section_mut(strings::PARAMS);
            params.remove(strings::MESSAGE);
            params.insert(strings::CODE, HmiResult::InvalidData.code());
            params.insert(strings::MESSAGE_TYPE, MessageKind::ErrorResponse.code());
            params.insert(strings::ERROR_MSG, report.pretty_format());
            Ok(Forward::ErrorResponse)
        }
        MessageKind::Response => {
            error!("received invalid data on HMI response");
            apply_generic_error(message);
            Ok(Forward::GenericError)
        }
        MessageKind::Unknown => {
            error!("received unknown type data on HMI");
            apply_generic_error(message);
            Ok(Forward::GenericError)
        }
        MessageKind::ErrorResponse => {
            error!("received invalid error response on HMI");
            apply_generic_error(message);
            Ok(Forward::GenericError)
        }
    }
}

/// Strip the payload and stamp `GENERIC_ERROR` with the fixed info text.
pub fn apply_generic_error(message: &mut ObjectTree) {
    message.remove(strings::MSG_PARAMS);
    let params = message.section_mut(strings::PARAMS);
    params.remove(strings::MESSAGE);
    params.insert(strings::CODE, HmiResult::GenericError.code());
    message
        .section_mut(strings::MSG_PARAMS)
        .insert(strings::INFO, INVALID_VEHICLE_MESSAGE);
}

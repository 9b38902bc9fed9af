//! ---
//! sdl_section: "03-rpc-routing"
//! sdl_subsection: "module"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "Envelope to object tree conversion per protocol version."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
use std::sync::Arc;

use sdl_schema::{validate, Interface, MessageKind, ObjectTree, SchemaRegistry};
use sdl_versioning::SemanticVersion;
use serde_json::Value as JsonValue;
use tracing::{debug, error, warn};

use crate::error::ConversionError;
use crate::hmi::{self, Forward};
use crate::types::{strings, Envelope, MobileResult, ProtocolVersion};
use crate::version::VersionResolver;

/// Outcome of a successful conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum Conversion {
    /// Ready for command execution.
    Accepted(ObjectTree),
    /// Reply that goes straight back to the originating peer.
    Respond(ObjectTree),
    /// Nothing to forward.
    Dropped,
}

/// Turns envelopes into validated object trees.
#[derive(Clone)]
pub struct MessageConverter {
    registry: Arc<SchemaRegistry>,
    resolver: VersionResolver,
}

impl MessageConverter {
    pub fn new(registry: Arc<SchemaRegistry>, resolver: VersionResolver) -> Self {
        Self { registry, resolver }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &VersionResolver {
        &self.resolver
    }

    /// Convert `envelope`, dispatching on its protocol version tag.
    pub fn convert(
        &self,
        envelope: &Envelope,
        allow_unknown_fields: bool,
        should_validate: bool,
    ) -> Result<Conversion, ConversionError> {
        debug!(
            protocol = envelope.protocol_version,
            connection_key = envelope.connection_key,
            function_id = envelope.function_id,
            "converting message"
        );
        let Some(protocol) = envelope.protocol() else {
            warn!(
                protocol = envelope.protocol_version,
                "application used unsupported protocol"
            );
            return Err(ConversionError::UnsupportedProtocolVersion(
                envelope.protocol_version,
            ));
        };
        match protocol {
            ProtocolVersion::V2 | ProtocolVersion::V3 | ProtocolVersion::V4 | ProtocolVersion::V5 => {
                self.convert_mobile(envelope, allow_unknown_fields, should_validate)
            }
            ProtocolVersion::Hmi => self.convert_hmi(envelope, allow_unknown_fields, should_validate),
            ProtocolVersion::V1 => Ok(self.convert_legacy(envelope)),
        }
    }

    /// Registry id of an HMI envelope's method, without validating anything.
    pub fn hmi_function_id(&self, envelope: &Envelope) -> Option<u32> {
        hmi::parse_json_rpc(&envelope.payload, &self.registry)
            .ok()
            .and_then(|message| message.function_id)
    }

    fn convert_mobile(
        &self,
        envelope: &Envelope,
        allow_unknown_fields: bool,
        should_validate: bool,
    ) -> Result<Conversion, ConversionError> {
        let mut tree = mobile_tree(envelope)?;
        let version =
            self.resolver
                .resolve(envelope.connection_key, envelope.function_id, &tree);

        if should_validate {
            self.validate_mobile(envelope, &tree, version, allow_unknown_fields)?;
        }

        if let Some(binary) = &envelope.binary {
            if !binary.is_complete() {
                error!(
                    declared = binary.declared_size,
                    delivered = binary.data.len(),
                    "incomplete binary attachment"
                );
                return Err(ConversionError::IncompleteBinaryAttachment {
                    declared: binary.declared_size,
                    delivered: binary.data.len(),
                });
            }
            tree.section_mut(strings::PARAMS)
                .insert(strings::BINARY_DATA, ObjectTree::Binary(binary.data.clone()));
        }

        stamp(&mut tree, envelope);
        debug!(
            function_id = envelope.function_id,
            version = %version,
            "converted mobile message"
        );
        Ok(Conversion::Accepted(tree))
    }

    fn validate_mobile(
        &self,
        envelope: &Envelope,
        tree: &ObjectTree,
        version: SemanticVersion,
        allow_unknown_fields: bool,
    ) -> Result<(), ConversionError> {
        if !matches!(
            envelope.kind,
            MessageKind::Request | MessageKind::Response | MessageKind::Notification
        ) {
            return Err(ConversionError::UnsupportedMessageKind(envelope.kind));
        }
        let schema = self
            .registry
            .lookup(Interface::Mobile, envelope.function_id, envelope.kind, version)
            .ok_or(ConversionError::UnknownFunction {
                interface: Interface::Mobile,
                function_id: envelope.function_id,
                kind: envelope.kind,
            })?;
        let report = validate(&tree[strings::MSG_PARAMS], schema, allow_unknown_fields);
        if report.is_empty() {
            return Ok(());
        }
        warn!(
            function_id = envelope.function_id,
            version = %version,
            report = %report,
            "mobile message failed validation"
        );
        Err(ConversionError::SchemaViolation(report))
    }

    fn convert_hmi(
        &self,
        envelope: &Envelope,
        allow_unknown_fields: bool,
        should_validate: bool,
    ) -> Result<Conversion, ConversionError> {
        let parsed = hmi::parse_json_rpc(&envelope.payload, &self.registry)?;
        let mut tree = parsed.tree;

        // Error responses carry free-form data and have no registered schema.
        if parsed.kind == MessageKind::ErrorResponse {
            stamp(&mut tree, envelope);
            return Ok(Conversion::Accepted(tree));
        }

        let schema = parsed.function_id.and_then(|function_id| {
            self.registry
                .lookup(Interface::Hmi, function_id, parsed.kind, SemanticVersion::UNKNOWN)
        });
        let Some(schema) = schema else {
            warn!(method = ?parsed.method, kind = %parsed.kind, "failed to attach HMI schema");
            if parsed.kind == MessageKind::Response {
                hmi::apply_generic_error(&mut tree);
                stamp(&mut tree, envelope);
                return Ok(Conversion::Accepted(tree));
            }
            return Err(ConversionError::UnknownFunction {
                interface: Interface::Hmi,
                function_id: parsed.function_id.unwrap_or_default(),
                kind: parsed.kind,
            });
        };

        if should_validate {
            let report = validate(&tree[strings::MSG_PARAMS], schema, allow_unknown_fields);
            if !report.is_empty() {
                error!(report = %report, "incorrect parameter from HMI");
                let forward = hmi::handle_wrong_message_type(&mut tree, &report)?;
                stamp(&mut tree, envelope);
                return Ok(match forward {
                    Forward::ErrorResponse => Conversion::Respond(tree),
                    Forward::GenericError => Conversion::Accepted(tree),
                });
            }
        }

        stamp(&mut tree, envelope);
        Ok(Conversion::Accepted(tree))
    }

    fn convert_legacy(&self, envelope: &Envelope) -> Conversion {
        if envelope.function_id != 0 && envelope.kind != MessageKind::Unknown {
            return Conversion::Accepted(legacy_pass_through(envelope));
        }

        error!(connection_key = envelope.connection_key, "message received: UNSUPPORTED_VERSION");
        let Some(mut tree) = parse_legacy(&envelope.payload, &self.registry) else {
            warn!("legacy payload could not be parsed");
            return Conversion::Dropped;
        };
        let params = tree.section_mut(strings::PARAMS);
        params.insert(strings::MESSAGE_TYPE, MessageKind::Response.code());
        params.insert(strings::CONNECTION_KEY, envelope.connection_key);
        let msg_params = tree.section_mut(strings::MSG_PARAMS);
        *msg_params = ObjectTree::new_struct();
        msg_params.insert(strings::SUCCESS, false);
        msg_params.insert(strings::RESULT_CODE, MobileResult::UnsupportedVersion.as_str());
        Conversion::Respond(tree)
    }
}

/// Build `params` from the envelope header and `msg_params` from the payload.
fn mobile_tree(envelope: &Envelope) -> Result<ObjectTree, ConversionError> {
    let msg_params = if envelope.payload.trim().is_empty() {
        ObjectTree::new_struct()
    } else {
        serde_json::from_str::<JsonValue>(&envelope.payload)
            .map(ObjectTree::from)
            .map_err(|err| ConversionError::MalformedPayload(err.to_string()))?
    };
    let mut tree = ObjectTree::new_struct();
    let params = tree.section_mut(strings::PARAMS);
    params.insert(strings::FUNCTION_ID, envelope.function_id);
    params.insert(strings::MESSAGE_TYPE, envelope.kind.code());
    params.insert(strings::CORRELATION_ID, envelope.correlation_id);
    tree.insert(strings::MSG_PARAMS, msg_params);
    Ok(tree)
}

/// Header-only tree for a V1 message; the body travels as raw bytes.
fn legacy_pass_through(envelope: &Envelope) -> ObjectTree {
    let mut tree = ObjectTree::new_struct();
    let params = tree.section_mut(strings::PARAMS);
    params.insert(strings::FUNCTION_ID, envelope.function_id);
    params.insert(strings::MESSAGE_TYPE, envelope.kind.code());
    params.insert(strings::CORRELATION_ID, envelope.correlation_id);
    params.insert(
        strings::LEGACY_PAYLOAD,
        ObjectTree::Binary(envelope.payload.as_bytes().to_vec()),
    );
    if let Some(binary) = &envelope.binary {
        params.insert(strings::BINARY_DATA, ObjectTree::Binary(binary.data.clone()));
    }
    stamp(&mut tree, envelope);
    tree
}

/// Parse the V1 body: `{"request" | "response" | "notification": {"name", "correlationID", "parameters"}}`.
///
/// The function name is kept, together with its mobile id when the registry knows it.
fn parse_legacy(payload: &str, registry: &SchemaRegistry) -> Option<ObjectTree> {
    let JsonValue::Object(mut root) = serde_json::from_str::<JsonValue>(payload).ok()? else {
        return None;
    };
    let (kind, body) = [
        ("request", MessageKind::Request),
        ("response", MessageKind::Response),
        ("notification", MessageKind::Notification),
    ]
    .into_iter()
    .find_map(|(key, kind)| root.remove(key).map(|body| (kind, body)))?;
    let JsonValue::Object(mut body) = body else {
        return None;
    };
    let Some(JsonValue::String(name)) = body.remove("name") else {
        return None;
    };

    let mut tree = ObjectTree::new_struct();
    let params = tree.section_mut(strings::PARAMS);
    params.insert(strings::MESSAGE_TYPE, kind.code());
    if let Some(function_id) = registry.function_id(Interface::Mobile, &name) {
        params.insert(strings::FUNCTION_ID, function_id);
    }
    params.insert(strings::FUNCTION_NAME, name);
    if let Some(correlation_id) = body.get("correlationID").and_then(JsonValue::as_i64) {
        params.insert(strings::CORRELATION_ID, correlation_id);
    }
    let parameters = body
        .remove("parameters")
        .map(ObjectTree::from)
        .unwrap_or_else(ObjectTree::new_struct);
    tree.insert(strings::MSG_PARAMS, parameters);
    Some(tree)
}

/// Final step on every accepted path; runs after validation.
fn stamp(tree: &mut ObjectTree, envelope: &Envelope) {
    let params = tree.section_mut(strings::PARAMS);
    params.insert(strings::CONNECTION_KEY, envelope.connection_key);
    params.insert(strings::PROTOCOL_VERSION, i64::from(envelope.protocol_version));
    params.insert(strings::PROTECTION, envelope.encrypted);
}

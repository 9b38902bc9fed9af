//! ---
//! sdl_section: "03-rpc-routing"
//! sdl_subsection: "module"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "Negative responses for rejected mobile messages."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
use sdl_schema::{MessageKind, ObjectTree};

use crate::error::ConversionError;
use crate::types::{strings, Envelope, MobileResult};

/// Everything needed to answer a rejected mobile message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub connection_key: u32,
    pub function_id: u32,
    /// Kept signed so a negative id reaches the client unchanged.
    pub correlation_id: i32,
    pub result_code: MobileResult,
    pub info: Option<String>,
}

impl Rejection {
    /// Rejection without diagnostic text.
    pub fn new(
        connection_key: u32,
        function_id: u32,
        correlation_id: i32,
        result_code: MobileResult,
    ) -> Self {
        Self {
            connection_key,
            function_id,
            correlation_id,
            result_code,
            info: None,
        }
    }

    /// Attach the text sent back under `msg_params.info`.
    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    /// Rejection addressed to the sender of `envelope`.
    pub fn for_envelope(envelope: &Envelope, error: &ConversionError) -> Self {
        Self {
            connection_key: envelope.connection_key,
            function_id: envelope.function_id,
            correlation_id: envelope.correlation_id,
            result_code: error.result_code(),
            info: error.info(),
        }
    }

    /// Build the response object sent back to mobile.
    pub fn to_response(&self) -> ObjectTree {
        let mut response = ObjectTree::new_struct();
        let params = response.section_mut(strings::PARAMS);
        params.insert(strings::FUNCTION_ID, self.function_id);
        params.insert(strings::MESSAGE_TYPE, MessageKind::Response.code());
        params.insert(strings::CORRELATION_ID, self.correlation_id);
        params.insert(strings::CONNECTION_KEY, self.connection_key);

        let msg_params = response.section_mut(strings::MSG_PARAMS);
        msg_params.insert(strings::SUCCESS, false);
        msg_params.insert(strings::RESULT_CODE, self.result_code.as_str());
        if let Some(info) = &self.info {
            msg_params.insert(strings::INFO, info.as_str());
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProtocolVersion;

    #[test]
    fn negative_correlation_id_is_preserved() {
        let envelope = Envelope::mobile(
            ProtocolVersion::V4,
            65537,
            13,
            -1,
            MessageKind::Request,
            "{}",
        );
        let response = Rejection::for_envelope(&envelope, &ConversionError::InvalidCorrelationId(-1))
            .to_response();

        assert_eq!(response["params"]["correlation_id"].as_i64(), Some(-1));
        assert_eq!(response["params"]["connection_key"].as_i64(), Some(65537));
        assert_eq!(response["params"]["message_type"].as_i64(), Some(1));
        assert_eq!(response["msg_params"]["success"].as_bool(), Some(false));
        assert_eq!(response["msg_params"]["resultCode"].as_str(), Some("INVALID_ID"));
        assert_eq!(
            response["msg_params"]["info"].as_str(),
            Some("Invalid Correlation ID for RPC Request")
        );
    }

    #[test]
    fn info_is_omitted_when_absent() {
        let response = Rejection::new(1, 32, 5, MobileResult::InvalidData).to_response();
        assert!(!response["msg_params"].contains_key("info"));
        assert_eq!(response["params"]["function_id"].as_i64(), Some(32));
    }
}

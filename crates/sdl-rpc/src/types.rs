//! ---
//! sdl_section: "03-rpc-routing"
//! sdl_subsection: "module"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "Inbound envelope, protocol tags and result codes."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
use std::fmt;

use sdl_schema::MessageKind;
use serde::{Deserialize, Serialize};

/// Field names used inside converted object trees.
pub mod strings {
    pub const PARAMS: &str = "params";
    pub const MSG_PARAMS: &str = "msg_params";
    pub const FUNCTION_ID: &str = "function_id";
    pub const MESSAGE_TYPE: &str = "message_type";
    pub const CORRELATION_ID: &str = "correlation_id";
    pub const CONNECTION_KEY: &str = "connection_key";
    pub const PROTOCOL_VERSION: &str = "protocol_version";
    pub const PROTECTION: &str = "protection";
    pub const BINARY_DATA: &str = "binary_data";
    /// Uninterpreted V1 body carried on pass-through.
    pub const LEGACY_PAYLOAD: &str = "legacy_payload";
    pub const FUNCTION_NAME: &str = "function_name";
    pub const INFO: &str = "info";
    pub const SUCCESS: &str = "success";
    pub const RESULT_CODE: &str = "resultCode";
    pub const CODE: &str = "code";
    pub const ERROR_MSG: &str = "error_msg";
    pub const MESSAGE: &str = "message";
    pub const SYNC_MSG_VERSION: &str = "syncMsgVersion";
    pub const MAJOR_VERSION: &str = "majorVersion";
    pub const MINOR_VERSION: &str = "minorVersion";
    pub const PATCH_VERSION: &str = "patchVersion";
}

/// Wire generation an envelope was framed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// JSON-RPC 2.0 messages from the head unit.
    Hmi,
    /// Legacy mobile format, only answered with `UNSUPPORTED_VERSION`.
    V1,
    V2,
    V3,
    V4,
    V5,
}

impl ProtocolVersion {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ProtocolVersion::Hmi),
            1 => Some(ProtocolVersion::V1),
            2 => Some(ProtocolVersion::V2),
            3 => Some(ProtocolVersion::V3),
            4 => Some(ProtocolVersion::V4),
            5 => Some(ProtocolVersion::V5),
            _ => None,
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            ProtocolVersion::Hmi => 0,
            ProtocolVersion::V1 => 1,
            ProtocolVersion::V2 => 2,
            ProtocolVersion::V3 => 3,
            ProtocolVersion::V4 => 4,
            ProtocolVersion::V5 => 5,
        }
    }
}

/// Transport service channel a mobile frame arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Control,
    #[default]
    Rpc,
    Audio,
    MobileNav,
    Bulk,
    Invalid,
}

impl ServiceType {
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            0x00 => ServiceType::Control,
            0x07 => ServiceType::Rpc,
            0x0A => ServiceType::Audio,
            0x0B => ServiceType::MobileNav,
            0x0F => ServiceType::Bulk,
            _ => ServiceType::Invalid,
        }
    }

    /// Only RPC and bulk frames carry messages for the router.
    pub fn carries_rpc(&self) -> bool {
        matches!(self, ServiceType::Rpc | ServiceType::Bulk)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Control => "control",
            ServiceType::Rpc => "rpc",
            ServiceType::Audio => "audio",
            ServiceType::MobileNav => "mobile_nav",
            ServiceType::Bulk => "bulk",
            ServiceType::Invalid => "invalid",
        }
    }
}

/// Binary payload that travels next to the JSON part of a mobile message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryAttachment {
    /// Size announced in the frame header.
    pub declared_size: usize,
    #[serde(default)]
    pub data: Vec<u8>,
}

impl BinaryAttachment {
    pub fn new(declared_size: usize, data: Vec<u8>) -> Self {
        Self {
            declared_size,
            data,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.data.len() >= self.declared_size
    }
}

/// Transport-decoded message, prior to payload interpretation.
///
/// For HMI envelopes the function id and kind are derived from the JSON-RPC
/// body; the header values are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub protocol_version: u8,
    #[serde(default)]
    pub service_type: ServiceType,
    #[serde(default)]
    pub connection_key: u32,
    #[serde(default)]
    pub function_id: u32,
    #[serde(default)]
    pub correlation_id: i32,
    #[serde(default = "unknown_kind")]
    pub kind: MessageKind,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub binary: Option<BinaryAttachment>,
    #[serde(default)]
    pub encrypted: bool,
}

fn unknown_kind() -> MessageKind {
    MessageKind::Unknown
}

impl Envelope {
    /// Mobile envelope on the RPC service channel.
    pub fn mobile(
        protocol: ProtocolVersion,
        connection_key: u32,
        function_id: u32,
        correlation_id: i32,
        kind: MessageKind,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            protocol_version: protocol.tag(),
            service_type: ServiceType::Rpc,
            connection_key,
            function_id,
            correlation_id,
            kind,
            payload: payload.into(),
            binary: None,
            encrypted: false,
        }
    }

    /// HMI envelope carrying a raw JSON-RPC body.
    pub fn hmi(payload: impl Into<String>) -> Self {
        Self {
            protocol_version: ProtocolVersion::Hmi.tag(),
            service_type: ServiceType::Rpc,
            connection_key: 0,
            function_id: 0,
            correlation_id: 0,
            kind: MessageKind::Unknown,
            payload: payload.into(),
            binary: None,
            encrypted: false,
        }
    }

    pub fn with_binary(mut self, attachment: BinaryAttachment) -> Self {
        self.binary = Some(attachment);
        self
    }

    pub fn with_service_type(mut self, service_type: ServiceType) -> Self {
        self.service_type = service_type;
        self
    }

    pub fn encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    pub fn protocol(&self) -> Option<ProtocolVersion> {
        ProtocolVersion::from_tag(self.protocol_version)
    }
}

/// Result codes sent to mobile applications as `msg_params.resultCode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MobileResult {
    Success,
    UnsupportedRequest,
    Rejected,
    InvalidData,
    InvalidId,
    GenericError,
    UnsupportedVersion,
}

impl MobileResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            MobileResult::Success => "SUCCESS",
            MobileResult::UnsupportedRequest => "UNSUPPORTED_REQUEST",
            MobileResult::Rejected => "REJECTED",
            MobileResult::InvalidData => "INVALID_DATA",
            MobileResult::InvalidId => "INVALID_ID",
            MobileResult::GenericError => "GENERIC_ERROR",
            MobileResult::UnsupportedVersion => "UNSUPPORTED_VERSION",
        }
    }
}

impl fmt::Display for MobileResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric result codes used on the HMI interface (`params.code`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HmiResult {
    Success,
    InvalidData,
    GenericError,
}

impl HmiResult {
    pub fn code(&self) -> i64 {
        match self {
            HmiResult::Success => 0,
            HmiResult::InvalidData => 11,
            HmiResult::GenericError => 22,
        }
    }
}

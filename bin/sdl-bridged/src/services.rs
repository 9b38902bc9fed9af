//! ---
//! sdl_section: "05-daemon"
//! sdl_subsection: "binary"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "Logging command execution and outbound sink used by the daemon."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sdl_rpc::types::strings;
use sdl_rpc::{InMemoryAppRegistry, OutboundSink, RpcService, VersionResolver};
use sdl_schema::{MessageKind, ObjectTree};
use tracing::info;

/// Command execution stand-in: logs every command and records the version
/// negotiated by registration requests.
pub struct LoggingService {
    apps: Arc<InMemoryAppRegistry>,
    resolver: VersionResolver,
    mobile_commands: AtomicU64,
    hmi_commands: AtomicU64,
}

impl LoggingService {
    pub fn new(apps: Arc<InMemoryAppRegistry>, resolver: VersionResolver) -> Self {
        Self {
            apps,
            resolver,
            mobile_commands: AtomicU64::new(0),
            hmi_commands: AtomicU64::new(0),
        }
    }

    pub fn mobile_commands(&self) -> u64 {
        self.mobile_commands.load(Ordering::Relaxed)
    }

    pub fn hmi_commands(&self) -> u64 {
        self.hmi_commands.load(Ordering::Relaxed)
    }

    fn track_registration(&self, message: &ObjectTree) {
        let params = &message[strings::PARAMS];
        let is_registration = params[strings::FUNCTION_ID].as_i64()
            == Some(i64::from(self.resolver.registration_function_id()))
            && params[strings::MESSAGE_TYPE].as_i64() == Some(MessageKind::Request.code());
        if !is_registration {
            return;
        }
        let Some(connection_key) = params[strings::CONNECTION_KEY]
            .as_i64()
            .and_then(|key| u32::try_from(key).ok())
        else {
            return;
        };
        let version = self.resolver.version_from_registration(message);
        if version.is_valid() && self.apps.record(connection_key, version) {
            info!(connection_key, %version, "application registered");
        }
    }
}

impl RpcService for LoggingService {
    fn manage_mobile_command(&self, message: ObjectTree) -> bool {
        self.track_registration(&message);
        self.mobile_commands.fetch_add(1, Ordering::Relaxed);
        info!(command = %message.to_json(), "mobile command");
        true
    }

    fn manage_hmi_command(&self, message: ObjectTree) -> bool {
        self.hmi_commands.fetch_add(1, Ordering::Relaxed);
        info!(command = %message.to_json(), "hmi command");
        true
    }
}

/// Outbound sink that writes every message to the log.
#[derive(Debug, Default)]
pub struct TracingSink;

impl OutboundSink for TracingSink {
    fn send_to_mobile(&self, message: ObjectTree) {
        info!(peer = "mobile", message = %message.to_json(), "outbound message");
    }

    fn send_to_hmi(&self, message: ObjectTree) {
        info!(peer = "hmi", message = %message.to_json(), "outbound message");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdl_rpc::AppVersionRegistry;

    #[test]
    fn registration_records_negotiated_version() {
        let apps = Arc::new(InMemoryAppRegistry::new());
        let service = LoggingService::new(apps.clone(), VersionResolver::new(apps.clone()));
        let registration = ObjectTree::from(serde_json::json!({
            "params": {"function_id": 1, "message_type": 0, "connection_key": 42},
            "msg_params": {"syncMsgVersion": {"majorVersion": 6, "minorVersion": 1}}
        }));
        assert!(service.manage_mobile_command(registration));
        assert_eq!(
            apps.negotiated_version(42).map(|v| v.to_string()),
            Some("6.1.0".to_owned())
        );
        assert_eq!(service.mobile_commands(), 1);
    }

    #[test]
    fn other_commands_leave_registry_untouched() {
        let apps = Arc::new(InMemoryAppRegistry::new());
        let service = LoggingService::new(apps.clone(), VersionResolver::new(apps.clone()));
        let show = ObjectTree::from(serde_json::json!({
            "params": {"function_id": 13, "message_type": 0, "connection_key": 42},
            "msg_params": {}
        }));
        service.manage_mobile_command(show);
        assert!(apps.is_empty());
    }
}

//! ---
//! sdl_section: "03-rpc-routing"
//! sdl_subsection: "module"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "Effective schema version resolution for mobile messages."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use sdl_schema::ObjectTree;
use sdl_versioning::{
    clamp_to_schema_generation, SemanticVersion, BASE_RPC_VERSION, RPC_VERSION_5,
};
use tracing::{debug, warn};

use crate::types::strings;

/// Function id of `RegisterAppInterface` on the mobile API.
pub const REGISTER_APP_INTERFACE_ID: u32 = 1;

/// Source of versions negotiated by registered applications.
pub trait AppVersionRegistry: Send + Sync {
    /// Version on record for the application behind `connection_key`.
    fn negotiated_version(&self, connection_key: u32) -> Option<SemanticVersion>;
}

/// Write-once, in-memory record of negotiated versions.
#[derive(Debug, Default)]
pub struct InMemoryAppRegistry {
    versions: RwLock<HashMap<u32, SemanticVersion>>,
}

impl InMemoryAppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the version for a connection. Returns `false` and keeps the
    /// existing record when one is already present.
    pub fn record(&self, connection_key: u32, version: SemanticVersion) -> bool {
        let mut versions = self.versions.write();
        if versions.contains_key(&connection_key) {
            warn!(connection_key, %version, "negotiated version already recorded");
            return false;
        }
        versions.insert(connection_key, version);
        true
    }

    /// Drop the record of an unregistered application.
    pub fn forget(&self, connection_key: u32) -> Option<SemanticVersion> {
        self.versions.write().remove(&connection_key)
    }

    pub fn len(&self) -> usize {
        self.versions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.read().is_empty()
    }
}

impl AppVersionRegistry for InMemoryAppRegistry {
    fn negotiated_version(&self, connection_key: u32) -> Option<SemanticVersion> {
        self.versions.read().get(&connection_key).copied()
    }
}

/// Picks the version a mobile message is validated against.
#[derive(Clone)]
pub struct VersionResolver {
    apps: Arc<dyn AppVersionRegistry>,
    registration_function_id: u32,
    threshold: SemanticVersion,
    base: SemanticVersion,
}

impl VersionResolver {
    pub fn new(apps: Arc<dyn AppVersionRegistry>) -> Self {
        Self {
            apps,
            registration_function_id: REGISTER_APP_INTERFACE_ID,
            threshold: RPC_VERSION_5,
            base: BASE_RPC_VERSION,
        }
    }

    pub fn with_registration_function(mut self, function_id: u32) -> Self {
        self.registration_function_id = function_id;
        self
    }

    /// Override the first fine-grained version and the legacy fallback.
    pub fn with_generation(mut self, threshold: SemanticVersion, base: SemanticVersion) -> Self {
        self.threshold = threshold;
        self.base = base;
        self
    }

    pub fn registration_function_id(&self) -> u32 {
        self.registration_function_id
    }

    /// Resolve the version for a converted mobile message.
    ///
    /// The negotiated version wins; a registration request is read from its
    /// own `syncMsgVersion`; everything else is [`SemanticVersion::UNKNOWN`].
    pub fn resolve(
        &self,
        connection_key: u32,
        function_id: u32,
        message: &ObjectTree,
    ) -> SemanticVersion {
        if let Some(version) = self.apps.negotiated_version(connection_key) {
            return version;
        }
        if function_id == self.registration_function_id {
            return self.version_from_registration(message);
        }
        SemanticVersion::UNKNOWN
    }

    /// Read `msg_params.syncMsgVersion` from a registration request.
    ///
    /// Absent components count as zero. A malformed or all-zero triple yields
    /// the unknown version; anything below the threshold is clamped to base.
    pub fn version_from_registration(&self, message: &ObjectTree) -> SemanticVersion {
        let Some(sync_version) = message[strings::MSG_PARAMS].get(strings::SYNC_MSG_VERSION)
        else {
            return SemanticVersion::UNKNOWN;
        };
        let component = |key: &str| match sync_version.get(key) {
            None => Some(0),
            Some(value) => value.as_i64(),
        };
        let (Some(major), Some(minor), Some(patch)) = (
            component(strings::MAJOR_VERSION),
            component(strings::MINOR_VERSION),
            component(strings::PATCH_VERSION),
        ) else {
            debug!("syncMsgVersion carries non-integer components");
            return SemanticVersion::UNKNOWN;
        };
        match SemanticVersion::from_components(major, minor, patch) {
            Ok(version) if version.is_valid() => {
                clamp_to_schema_generation(version, self.threshold, self.base)
            }
            Ok(_) => SemanticVersion::UNKNOWN,
            Err(err) => {
                debug!(error = %err, "syncMsgVersion is malformed");
                SemanticVersion::UNKNOWN
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registration(version: serde_json::Value) -> ObjectTree {
        ObjectTree::from(json!({
            "params": {"function_id": 1},
            "msg_params": {"appName": "Nav", "syncMsgVersion": version}
        }))
    }

    fn resolver() -> (VersionResolver, Arc<InMemoryAppRegistry>) {
        let apps = Arc::new(InMemoryAppRegistry::new());
        (VersionResolver::new(apps.clone()), apps)
    }

    #[test]
    fn legacy_versions_clamp_to_base() {
        let (resolver, _) = resolver();
        let message = registration(json!({"majorVersion": 2, "minorVersion": 0}));
        assert_eq!(resolver.resolve(10, 1, &message), BASE_RPC_VERSION);
    }

    #[test]
    fn modern_versions_are_kept() {
        let (resolver, _) = resolver();
        let message = registration(json!({"majorVersion": 5, "minorVersion": 0, "patchVersion": 0}));
        assert_eq!(resolver.resolve(10, 1, &message), SemanticVersion::new(5, 0, 0));
        let message = registration(json!({"majorVersion": 6, "minorVersion": 2}));
        assert_eq!(resolver.resolve(10, 1, &message), SemanticVersion::new(6, 2, 0));
    }

    #[test]
    fn resolution_is_idempotent() {
        let (resolver, _) = resolver();
        let message = registration(json!({"majorVersion": 5, "minorVersion": 1}));
        let first = resolver.resolve(3, 1, &message);
        assert_eq!(resolver.resolve(3, 1, &message), first);
    }

    #[test]
    fn malformed_or_missing_versions_are_unknown() {
        let (resolver, _) = resolver();
        for bad in [
            json!({}),
            json!({"majorVersion": -1, "minorVersion": 0}),
            json!({"majorVersion": 70000}),
            json!({"majorVersion": "5"}),
        ] {
            assert_eq!(
                resolver.resolve(1, 1, &registration(bad)),
                SemanticVersion::UNKNOWN
            );
        }
        let no_version = ObjectTree::from(json!({"msg_params": {"appName": "Nav"}}));
        assert_eq!(resolver.resolve(1, 1, &no_version), SemanticVersion::UNKNOWN);
    }

    #[test]
    fn negotiated_version_takes_precedence() {
        let (resolver, apps) = resolver();
        assert!(apps.record(42, SemanticVersion::new(6, 0, 0)));
        assert!(!apps.record(42, SemanticVersion::new(7, 0, 0)));
        let message = registration(json!({"majorVersion": 2}));
        assert_eq!(resolver.resolve(42, 1, &message), SemanticVersion::new(6, 0, 0));
        assert_eq!(resolver.resolve(42, 13, &message), SemanticVersion::new(6, 0, 0));
    }

    #[test]
    fn non_registration_messages_without_record_are_unknown() {
        let (resolver, _) = resolver();
        let message = registration(json!({"majorVersion": 6}));
        assert_eq!(resolver.resolve(9, 13, &message), SemanticVersion::UNKNOWN);
    }
}

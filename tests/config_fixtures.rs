//! ---
//! sdl_section: "06-testing-qa"
//! sdl_subsection: "integration-tests"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "Checks that the shipped configuration and definitions load cleanly."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
use std::path::PathBuf;

use sdl_common::{BridgeConfig, LogFormat};
use sdl_schema::{Interface, MessageKind, SchemaRegistry};
use sdl_versioning::SemanticVersion;

const BRIDGE_CONFIG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../configs/bridge.toml");

#[test]
fn reference_config_points_at_shipped_definitions() {
    let loaded = BridgeConfig::load_with_source(&[PathBuf::from(BRIDGE_CONFIG)])
        .expect("reference config loads");
    assert_eq!(loaded.config.router.registration_function_id, 1);
    assert_eq!(loaded.config.logging.format, LogFormat::Pretty);
    assert!(!loaded.config.logging.file_enabled);

    let definitions = loaded.definitions_path();
    assert!(definitions.ends_with("configs/schema_definitions.yaml"));
    assert!(definitions.is_file());
}

#[test]
fn shipped_definitions_cover_both_peers() {
    let loaded = BridgeConfig::load_with_source(&[PathBuf::from(BRIDGE_CONFIG)])
        .expect("reference config loads");
    let registry = SchemaRegistry::from_path(loaded.definitions_path()).expect("definitions load");

    assert_eq!(registry.function_id(Interface::Mobile, "Show"), Some(13));
    assert_eq!(registry.function_id(Interface::Hmi, "UI.Show"), Some(10013));
    assert_eq!(registry.function_name(Interface::Mobile, 1), Some("RegisterAppInterface"));
    assert!(registry.schema_count(Interface::Mobile) >= 6);

    let legacy = registry
        .lookup(Interface::Mobile, 13, MessageKind::Request, SemanticVersion::new(4, 5, 0))
        .expect("legacy show schema");
    let modern = registry
        .lookup(Interface::Mobile, 13, MessageKind::Request, SemanticVersion::new(5, 1, 0))
        .expect("modern show schema");
    assert!(!legacy.fields().expect("struct").contains_key("templateTitle"));
    assert!(modern.fields().expect("struct").contains_key("templateTitle"));
}

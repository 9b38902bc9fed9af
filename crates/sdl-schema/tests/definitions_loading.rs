//! ---
//! sdl_section: "02-object-model-schema"
//! sdl_subsection: "integration-tests"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "Loading schema definitions from disk."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
use std::fs;

use sdl_schema::{
    validate, Interface, MessageKind, ObjectTree, SchemaError, SchemaRegistry, ViolationReason,
};
use sdl_versioning::SemanticVersion;
use serde_json::json;
use tempfile::tempdir;

const DEFINITIONS: &str = r#"
mobile:
  - name: RegisterAppInterface
    id: 1
    request:
      - schema:
          type: struct
          fields:
            appName: { type: string, mandatory: true, min_length: 1, max_length: 100 }
            syncMsgVersion:
              type: struct
              mandatory: true
              fields:
                majorVersion: { type: integer, mandatory: true, min: 1, max: 10 }
                minorVersion: { type: integer, mandatory: true, min: 0, max: 1000 }
                patchVersion: { type: integer, min: 0, max: 1000 }
"#;

#[test]
fn yaml_file_loads_and_validates_messages() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("definitions.yaml");
    fs::write(&path, DEFINITIONS).expect("write definitions");

    let registry = SchemaRegistry::from_path(&path).expect("load registry");
    let schema = registry
        .lookup(
            Interface::Mobile,
            1,
            MessageKind::Request,
            SemanticVersion::UNKNOWN,
        )
        .expect("register schema");

    let good = ObjectTree::from(json!({
        "appName": "Navigator",
        "syncMsgVersion": {"majorVersion": 5, "minorVersion": 1}
    }));
    assert!(validate(&good, schema, false).is_empty());

    let bad = ObjectTree::from(json!({
        "appName": "",
        "syncMsgVersion": {"majorVersion": 0, "minorVersion": 1}
    }));
    let report = validate(&bad, schema, false);
    let reasons: Vec<_> = report.violations().iter().map(|v| v.reason).collect();
    assert_eq!(
        reasons,
        vec![ViolationReason::InvalidLength, ViolationReason::OutOfRange]
    );
    assert_eq!(
        report.violations()[1].path.to_string(),
        "syncMsgVersion.majorVersion"
    );
}

#[test]
fn json_file_is_selected_by_extension() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("definitions.json");
    let document = json!({
        "hmi": [{
            "name": "BasicCommunication.OnReady",
            "id": 32768,
            "notification": [{"schema": {"type": "struct"}}]
        }]
    });
    fs::write(&path, document.to_string()).expect("write definitions");

    let registry = SchemaRegistry::from_path(&path).expect("load registry");
    assert_eq!(
        registry.function_id(Interface::Hmi, "BasicCommunication.OnReady"),
        Some(32768)
    );
    assert!(registry
        .lookup(
            Interface::Hmi,
            32768,
            MessageKind::Notification,
            SemanticVersion::UNKNOWN
        )
        .is_some());
}

#[test]
fn missing_file_reports_path() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("absent.yaml");
    match SchemaRegistry::from_path(&path) {
        Err(SchemaError::Io { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn duplicate_ids_are_rejected() {
    let yaml = r#"
mobile:
  - { name: Show, id: 13 }
  - { name: Alert, id: 13 }
"#;
    assert!(matches!(
        SchemaRegistry::from_yaml_str(yaml),
        Err(SchemaError::DuplicateFunctionId { function_id: 13, .. })
    ));
}

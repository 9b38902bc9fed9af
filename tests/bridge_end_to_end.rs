//! ---
//! sdl_section: "06-testing-qa"
//! sdl_subsection: "integration-tests"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "End-to-end routing against the shipped schema definitions."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
use std::sync::Arc;

use parking_lot::Mutex;
use sdl_rpc::types::strings;
use sdl_rpc::{
    correlation_id_of, read_capture, replay_into, BinaryAttachment, Envelope, InMemoryAppRegistry,
    InMemorySink, IngressPipelines, MessageConverter, MobileResult, PowerState, ProtocolRouter,
    ProtocolVersion, RouteOutcome, RpcService, VersionResolver,
};
use sdl_schema::{MessageKind, ObjectTree, SchemaRegistry};
use sdl_versioning::SemanticVersion;
use serde_json::json;

const DEFINITIONS: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../configs/schema_definitions.yaml"
);

const REGISTER_APP_INTERFACE: u32 = 1;
const SHOW: u32 = 13;
const PUT_FILE: u32 = 32;

#[derive(Default)]
struct RecordingService {
    mobile: Mutex<Vec<ObjectTree>>,
    hmi: Mutex<Vec<ObjectTree>>,
}

impl RpcService for RecordingService {
    fn manage_mobile_command(&self, message: ObjectTree) -> bool {
        self.mobile.lock().push(message);
        true
    }

    fn manage_hmi_command(&self, message: ObjectTree) -> bool {
        self.hmi.lock().push(message);
        true
    }
}

struct Bridge {
    router: Arc<ProtocolRouter>,
    apps: Arc<InMemoryAppRegistry>,
    service: Arc<RecordingService>,
    sink: Arc<InMemorySink>,
}

fn bridge() -> Bridge {
    let registry = Arc::new(SchemaRegistry::from_path(DEFINITIONS).expect("definitions load"));
    let apps = Arc::new(InMemoryAppRegistry::new());
    let service = Arc::new(RecordingService::default());
    let sink = Arc::new(InMemorySink::new());
    let converter = MessageConverter::new(registry, VersionResolver::new(apps.clone()));
    let router = ProtocolRouter::new(
        converter,
        service.clone(),
        sink.clone(),
        Arc::new(PowerState::new()),
    );
    Bridge {
        router: Arc::new(router),
        apps,
        service,
        sink,
    }
}

fn registration(connection_key: u32, major: i64, minor: i64) -> Envelope {
    Envelope::mobile(
        ProtocolVersion::V5,
        connection_key,
        REGISTER_APP_INTERFACE,
        1,
        MessageKind::Request,
        json!({
            "appName": "Navigator",
            "appID": "nav-1",
            "syncMsgVersion": {"majorVersion": major, "minorVersion": minor},
            "isMediaApplication": false,
            "languageDesired": "EN-US"
        })
        .to_string(),
    )
}

fn show_with_title(connection_key: u32, correlation_id: i32) -> Envelope {
    Envelope::mobile(
        ProtocolVersion::V5,
        connection_key,
        SHOW,
        correlation_id,
        MessageKind::Request,
        json!({"mainField1": "Now playing", "templateTitle": "Media"}).to_string(),
    )
}

/// Register an app and record the version it negotiated, as command
/// execution would.
fn register(bridge: &Bridge, connection_key: u32, major: i64, minor: i64) -> SemanticVersion {
    let outcome = bridge
        .router
        .route_from_mobile(&registration(connection_key, major, minor));
    assert_eq!(outcome, RouteOutcome::Dispatched { succeeded: true });
    let command = bridge
        .service
        .mobile
        .lock()
        .pop()
        .expect("registration dispatched");
    let version = bridge
        .router
        .converter()
        .resolver()
        .version_from_registration(&command);
    assert!(bridge.apps.record(connection_key, version));
    version
}

#[test]
fn negotiated_version_selects_schema_generation() {
    let bridge = bridge();
    assert_eq!(register(&bridge, 1, 5, 1), SemanticVersion::new(5, 1, 0));
    assert_eq!(register(&bridge, 2, 4, 0), SemanticVersion::new(4, 5, 0));

    assert_eq!(
        bridge.router.route_from_mobile(&show_with_title(1, 10)),
        RouteOutcome::Dispatched { succeeded: true }
    );
    assert_eq!(
        bridge.router.route_from_mobile(&show_with_title(2, 11)),
        RouteOutcome::Rejected(MobileResult::InvalidData)
    );

    let rejections = bridge.sink.mobile();
    assert_eq!(rejections.len(), 1);
    assert_eq!(correlation_id_of(&rejections[0]), Some(11));
    assert_eq!(
        rejections[0][strings::PARAMS][strings::CONNECTION_KEY].as_i64(),
        Some(2)
    );
    let info = rejections[0][strings::MSG_PARAMS][strings::INFO]
        .as_str()
        .expect("violation report attached");
    assert!(info.contains("templateTitle"));
}

#[test]
fn invalid_registration_is_answered_and_not_recorded() {
    let bridge = bridge();
    let mut envelope = registration(7, 5, 0);
    envelope.payload = json!({"appName": "", "appID": "x"}).to_string();
    assert_eq!(
        bridge.router.route_from_mobile(&envelope),
        RouteOutcome::Rejected(MobileResult::InvalidData)
    );
    assert!(bridge.apps.is_empty());
    assert!(bridge.service.mobile.lock().is_empty());
}

#[test]
fn legacy_protocol_gets_unsupported_version() {
    let bridge = bridge();
    let envelope = Envelope::mobile(
        ProtocolVersion::V1,
        9,
        0,
        0,
        MessageKind::Unknown,
        json!({"request": {"name": "Show", "correlationID": 4, "parameters": {}}}).to_string(),
    );
    assert_eq!(bridge.router.route_from_mobile(&envelope), RouteOutcome::Responded);

    let replies = bridge.sink.mobile();
    assert_eq!(replies.len(), 1);
    assert_eq!(
        replies[0][strings::MSG_PARAMS][strings::RESULT_CODE].as_str(),
        Some("UNSUPPORTED_VERSION")
    );
    assert_eq!(replies[0][strings::MSG_PARAMS][strings::SUCCESS].as_bool(), Some(false));
    assert!(bridge.service.mobile.lock().is_empty());
}

#[test]
fn binary_attachment_travels_with_the_command() {
    let bridge = bridge();
    let put_file = |correlation_id: i32, attachment: BinaryAttachment| {
        Envelope::mobile(
            ProtocolVersion::V3,
            4,
            PUT_FILE,
            correlation_id,
            MessageKind::Request,
            json!({"syncFileName": "icon.png", "fileType": "GRAPHIC_PNG"}).to_string(),
        )
        .with_binary(attachment)
    };

    assert_eq!(
        bridge
            .router
            .route_from_mobile(&put_file(1, BinaryAttachment::new(4, vec![1, 2, 3, 4]))),
        RouteOutcome::Dispatched { succeeded: true }
    );
    let commands = bridge.service.mobile.lock();
    assert_eq!(
        commands[0][strings::PARAMS][strings::BINARY_DATA].as_binary(),
        Some(&[1u8, 2, 3, 4][..])
    );
    drop(commands);

    assert_eq!(
        bridge
            .router
            .route_from_mobile(&put_file(2, BinaryAttachment::new(100, vec![0; 50]))),
        RouteOutcome::Rejected(MobileResult::InvalidData)
    );
}

#[test]
fn hmi_traffic_is_checked_against_hmi_definitions() {
    let bridge = bridge();
    let ready = Envelope::hmi(r#"{"jsonrpc":"2.0","method":"BasicCommunication.OnReady"}"#);
    assert_eq!(
        bridge.router.route_from_hmi(&ready),
        RouteOutcome::Dispatched { succeeded: true }
    );

    let activated = Envelope::hmi(
        r#"{"jsonrpc":"2.0","method":"BasicCommunication.OnAppActivated","params":{"appID":"x"}}"#,
    );
    assert_eq!(
        bridge.router.route_from_hmi(&activated),
        RouteOutcome::Dropped(sdl_rpc::DropReason::InvalidHmiMessage)
    );

    let show = Envelope::hmi(r#"{"jsonrpc":"2.0","id":21,"method":"UI.Show","params":{"appID":3}}"#);
    assert_eq!(bridge.router.route_from_hmi(&show), RouteOutcome::Responded);
    let errors = bridge.sink.hmi();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0][strings::PARAMS][strings::CODE].as_i64(), Some(11));
    assert_eq!(bridge.service.hmi.lock().len(), 1);
}

#[tokio::test]
async fn capture_replays_through_pipelines() {
    let bridge = bridge();
    let capture = tempfile::NamedTempFile::new().expect("capture file");
    let show = json!({"mainField1": "hello"}).to_string();
    let lines = [
        json!({
            "peer": "mobile",
            "envelope": {
                "protocol_version": 4,
                "connection_key": 5,
                "function_id": SHOW,
                "correlation_id": 1,
                "kind": "request",
                "payload": show
            }
        }),
        json!({
            "peer": "hmi",
            "delay_ms": 1,
            "envelope": {
                "protocol_version": 0,
                "payload": r#"{"jsonrpc":"2.0","method":"BasicCommunication.OnReady"}"#
            }
        }),
        json!({
            "peer": "mobile",
            "envelope": {
                "protocol_version": 4,
                "service_type": "audio",
                "connection_key": 5,
                "function_id": SHOW,
                "correlation_id": 2,
                "kind": "request",
                "payload": show
            }
        }),
        json!({
            "peer": "mobile",
            "envelope": {
                "protocol_version": 4,
                "connection_key": 5,
                "function_id": SHOW,
                "correlation_id": -3,
                "kind": "request",
                "payload": show
            }
        }),
    ];
    let body = lines
        .iter()
        .map(|line| line.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    std::fs::write(capture.path(), body).expect("write capture");

    let records = read_capture(capture.path()).expect("capture parses");
    assert_eq!(records.len(), 4);

    let pipelines = IngressPipelines::spawn(bridge.router.clone());
    let accepted = replay_into(&pipelines, records).await;
    let stats = pipelines.shutdown().await;

    assert_eq!(accepted, 3);
    assert_eq!(stats.mobile_processed, 2);
    assert_eq!(stats.hmi_processed, 1);
    assert_eq!(bridge.service.mobile.lock().len(), 1);
    assert_eq!(bridge.service.hmi.lock().len(), 1);

    let rejections = bridge.sink.mobile();
    assert_eq!(rejections.len(), 1);
    assert_eq!(correlation_id_of(&rejections[0]), Some(-3));
    assert_eq!(
        rejections[0][strings::MSG_PARAMS][strings::RESULT_CODE].as_str(),
        Some("INVALID_ID")
    );
}

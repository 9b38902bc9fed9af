//! ---
//! sdl_section: "03-rpc-routing"
//! sdl_subsection: "module"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "Protocol conversion and routing core."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
//! Conversion and routing of RPC envelopes between mobile applications and
//! the vehicle head unit.
//!
//! Envelopes enter through [`IngressPipelines`], are converted by the
//! [`MessageConverter`] for their protocol generation and validated against the
//! schema registry, then dispatched by the [`ProtocolRouter`] to command
//! execution or answered with a negative response.

pub mod boundary;
pub mod converter;
pub mod error;
pub mod hmi;
pub mod metrics;
pub mod negative;
pub mod pipeline;
pub mod replay;
pub mod router;
pub mod types;
pub mod version;

pub use boundary::{
    InMemorySink, LivenessProbe, NoPassThrough, OutboundSink, PassThroughHandler, PowerState,
    RpcService,
};
pub use converter::{Conversion, MessageConverter};
pub use error::{ConversionError, ReplayError};
pub use metrics::RouterMetrics;
pub use negative::Rejection;
pub use pipeline::{IngressPipelines, PipelineStats};
pub use replay::{read_capture, replay_into, ReplayRecord};
pub use router::{correlation_id_of, DropReason, ProtocolRouter, RouteOutcome};
pub use types::{
    BinaryAttachment, Envelope, HmiResult, MobileResult, ProtocolVersion, ServiceType,
};
pub use version::{AppVersionRegistry, InMemoryAppRegistry, VersionResolver, REGISTER_APP_INTERFACE_ID};

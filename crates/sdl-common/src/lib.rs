//! ---
//! sdl_section: "01-shared-runtime"
//! sdl_subsection: "module"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "Shared runtime primitives for the bridge daemon."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
//! Shared runtime pieces for the SDL bridge workspace: TOML configuration
//! loading and tracing initialisation.

pub mod config;
pub mod logging;

pub use config::{
    BridgeConfig, LoadedBridgeConfig, LoggingConfig, MetricsConfig, RouterConfig, SchemaConfig,
};
pub use logging::{init_tracing, LogFormat};

//! ---
//! sdl_section: "05-daemon"
//! sdl_subsection: "binary"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "Binary entrypoint for the SDL bridge daemon."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prometheus::{Encoder, Registry, TextEncoder};
use sdl_common::config::{BridgeConfig, RouterConfig};
use sdl_common::logging::init_tracing;
use sdl_rpc::{
    read_capture, replay_into, InMemoryAppRegistry, IngressPipelines, MessageConverter,
    PowerState, ProtocolRouter, RouterMetrics, VersionResolver,
};
use sdl_schema::{Interface, SchemaRegistry};
use tracing::{info, warn};

use crate::services::{LoggingService, TracingSink};

#[derive(Debug, Parser)]
#[command(author, version, about = "SDL RPC bridge daemon", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(
        long,
        value_name = "FILE",
        help = "Schema definitions file, overriding the configured one"
    )]
    definitions: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Load the schema definitions and print a summary")]
    CheckSchema,
    #[command(about = "Route a newline-delimited envelope capture through the pipelines")]
    Replay {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
        #[arg(long, help = "Print router metrics in text exposition format when done")]
        print_metrics: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/bridge.toml"));

    let loaded = BridgeConfig::load_with_source(&candidates)?;
    init_tracing("sdl-bridged", &loaded.config.logging)?;
    info!(config_path = %loaded.source.display(), "configuration loaded");

    let definitions = cli
        .definitions
        .clone()
        .unwrap_or_else(|| loaded.definitions_path());
    let registry = load_registry(&definitions)?;

    match cli.command {
        Commands::CheckSchema => {
            println!(
                "{}: {} functions, {} mobile schemas, {} hmi schemas",
                definitions.display(),
                registry.function_count(),
                registry.schema_count(Interface::Mobile),
                registry.schema_count(Interface::Hmi)
            );
        }
        Commands::Replay {
            file,
            print_metrics,
        } => {
            let metrics_registry = loaded.config.metrics.enabled.then(Registry::new);
            if print_metrics && metrics_registry.is_none() {
                warn!("metrics printing requested but metrics are disabled by configuration");
            }
            run_replay(
                registry,
                &loaded.config.router,
                &file,
                metrics_registry.as_ref(),
            )
            .await?;
            if let (true, Some(registry)) = (print_metrics, &metrics_registry) {
                let mut buffer = Vec::new();
                TextEncoder::new()
                    .encode(&registry.gather(), &mut buffer)
                    .context("failed to encode metrics")?;
                println!("{}", String::from_utf8_lossy(&buffer));
            }
        }
    }

    Ok(())
}

fn load_registry(path: &Path) -> Result<Arc<SchemaRegistry>> {
    let started = Instant::now();
    let registry = SchemaRegistry::from_path(path)
        .with_context(|| format!("failed to load schema definitions {}", path.display()))?;
    info!(
        definitions = %path.display(),
        functions = registry.function_count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "schema registry loaded"
    );
    Ok(Arc::new(registry))
}

async fn run_replay(
    registry: Arc<SchemaRegistry>,
    settings: &RouterConfig,
    capture: &Path,
    metrics_registry: Option<&Registry>,
) -> Result<()> {
    let records = read_capture(capture)
        .with_context(|| format!("failed to read capture {}", capture.display()))?;

    let apps = Arc::new(InMemoryAppRegistry::new());
    let resolver = VersionResolver::new(apps.clone())
        .with_registration_function(settings.registration_function_id)
        .with_generation(settings.rpc_version_threshold, settings.base_rpc_version);
    let service = Arc::new(LoggingService::new(apps.clone(), resolver.clone()));
    let converter = MessageConverter::new(registry, resolver);
    let mut router = ProtocolRouter::new(
        converter,
        service.clone(),
        Arc::new(TracingSink),
        Arc::new(PowerState::new()),
    );
    if let Some(metrics_registry) = metrics_registry {
        let metrics = RouterMetrics::register(metrics_registry)
            .context("failed to register router metrics")?;
        router = router.with_metrics(metrics);
    }

    let pipelines = IngressPipelines::spawn(Arc::new(router));
    let total = records.len();
    let accepted = replay_into(&pipelines, records).await;
    let stats = pipelines.shutdown().await;
    info!(
        capture = %capture.display(),
        total,
        accepted,
        mobile_processed = stats.mobile_processed,
        hmi_processed = stats.hmi_processed,
        mobile_commands = service.mobile_commands(),
        hmi_commands = service.hmi_commands(),
        registered_apps = apps.len(),
        "replay finished"
    );
    println!(
        "replayed {accepted}/{total} records: {} mobile, {} hmi processed; {} mobile and {} hmi commands executed",
        stats.mobile_processed,
        stats.hmi_processed,
        service.mobile_commands(),
        service.hmi_commands()
    );
    Ok(())
}

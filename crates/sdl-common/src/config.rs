//! ---
//! sdl_section: "01-shared-runtime"
//! sdl_subsection: "module"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "TOML configuration for the bridge daemon."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use sdl_versioning::{SemanticVersion, BASE_RPC_VERSION, RPC_VERSION_5};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging::LogFormat;

fn default_definitions_path() -> PathBuf {
    PathBuf::from("schema_definitions.yaml")
}

fn default_registration_function_id() -> u32 {
    1
}

fn default_rpc_version_threshold() -> SemanticVersion {
    RPC_VERSION_5
}

fn default_base_rpc_version() -> SemanticVersion {
    BASE_RPC_VERSION
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_file_enabled() -> bool {
    true
}

fn default_metrics_enabled() -> bool {
    true
}

/// Primary configuration object for the bridge daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where a [`BridgeConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedBridgeConfig {
    pub config: BridgeConfig,
    pub source: PathBuf,
}

impl LoadedBridgeConfig {
    /// Definitions path, resolved against the directory holding the config file
    /// when it is relative.
    pub fn definitions_path(&self) -> PathBuf {
        let definitions = &self.config.schema.definitions;
        if definitions.is_absolute() {
            return definitions.clone();
        }
        match self.source.parent() {
            Some(dir) => dir.join(definitions),
            None => definitions.clone(),
        }
    }
}

impl BridgeConfig {
    pub const ENV_CONFIG_PATH: &str = "SDL_BRIDGE_CONFIG";

    /// Load configuration from disk, respecting the `SDL_BRIDGE_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedBridgeConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedBridgeConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedBridgeConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<BridgeConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.schema.definitions.as_os_str().is_empty() {
            return Err(anyhow!("schema.definitions must name a definitions file"));
        }
        self.router.validate()
    }
}

impl std::str::FromStr for BridgeConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: BridgeConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// YAML or JSON file with the mobile and HMI function definitions.
    #[serde(default = "default_definitions_path")]
    pub definitions: PathBuf,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            definitions: default_definitions_path(),
        }
    }
}

/// Version resolution knobs handed to the RPC router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_registration_function_id")]
    pub registration_function_id: u32,
    /// Negotiated versions below this collapse onto `base_rpc_version`.
    #[serde(default = "default_rpc_version_threshold")]
    pub rpc_version_threshold: SemanticVersion,
    #[serde(default = "default_base_rpc_version")]
    pub base_rpc_version: SemanticVersion,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            registration_function_id: default_registration_function_id(),
            rpc_version_threshold: default_rpc_version_threshold(),
            base_rpc_version: default_base_rpc_version(),
        }
    }
}

impl RouterConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.base_rpc_version.is_valid() {
            return Err(anyhow!("router.base_rpc_version must not be 0.0.0"));
        }
        if self.base_rpc_version >= self.rpc_version_threshold {
            return Err(anyhow!(
                "router.base_rpc_version {} must be below rpc_version_threshold {}",
                self.base_rpc_version,
                self.rpc_version_threshold
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Write a daily rolling JSON file next to stdout output.
    #[serde(default = "default_file_enabled")]
    pub file_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
            file_enabled: default_file_enabled(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = BridgeConfig::from_str("").expect("defaults are valid");
        assert_eq!(config.router.registration_function_id, 1);
        assert_eq!(config.router.rpc_version_threshold, RPC_VERSION_5);
        assert_eq!(config.router.base_rpc_version, BASE_RPC_VERSION);
        assert_eq!(config.logging.format, LogFormat::StructuredJson);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn sections_override_defaults() {
        let config = BridgeConfig::from_str(
            r#"
[schema]
definitions = "/etc/sdl/definitions.json"

[router]
registration_function_id = 7
base_rpc_version = "4.0.0"

[logging]
format = "pretty"
file_enabled = false

[metrics]
enabled = false
"#,
        )
        .expect("valid configuration");
        assert_eq!(config.router.registration_function_id, 7);
        assert_eq!(config.router.base_rpc_version, SemanticVersion::new(4, 0, 0));
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(!config.logging.file_enabled);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn base_version_must_stay_below_threshold() {
        let err = BridgeConfig::from_str(
            r#"
[router]
base_rpc_version = "6.0.0"
"#,
        )
        .expect_err("inverted versions rejected");
        assert!(err.to_string().contains("rpc_version_threshold"));

        assert!(BridgeConfig::from_str("[router]\nbase_rpc_version = \"five\"\n").is_err());
    }

    #[test]
    fn relative_definitions_resolve_next_to_config() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("bridge.toml");
        fs::write(&path, "[schema]\ndefinitions = \"defs.yaml\"\n").expect("write config");

        let loaded = BridgeConfig::load_with_source(&[path.clone()]).expect("load config");
        assert_eq!(loaded.source, path);
        assert_eq!(loaded.definitions_path(), dir.path().join("defs.yaml"));
    }

    #[test]
    fn missing_candidates_are_listed() {
        let err = BridgeConfig::load_with_source(&["does/not/exist.toml"])
            .expect_err("nothing to load");
        assert!(err.to_string().contains("does/not/exist.toml"));
    }
}

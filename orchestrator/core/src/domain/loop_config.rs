// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Loop Configuration Types
//
// Defines the configuration schema for a MAPE-K loop host, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Loop identity and history bounds
// - Severity thresholds for the Analyze phase
// - Continuous monitoring schedule
// - Logging and metrics exposition settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::policy::SeverityThresholds;
use crate::domain::cycle::DEFAULT_MAX_HISTORY_SIZE;

pub const API_VERSION: &str = "mapek.io/v1";
pub const KIND: &str = "LoopConfig";
pub const CONFIG_PATH_ENV: &str = "MAPEK_CONFIG_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level Kubernetes-style loop configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfigManifest {
    /// API version (must be "mapek.io/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "LoopConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: LoopConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable host name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Loop configuration specification (content under spec:)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoopConfigSpec {
    #[serde(default, rename = "loop")]
    pub loop_settings: LoopSettings,

    #[serde(default)]
    pub thresholds: SeverityThresholds,

    #[serde(default)]
    pub monitoring: MonitoringConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopSettings {
    /// Namespace for the loop's metrics registry
    #[serde(default = "default_component_name")]
    pub component_name: String,

    /// Number of cycle records retained for introspection
    #[serde(default = "default_max_history_size")]
    pub max_history_size: usize,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            component_name: default_component_name(),
            max_history_size: default_max_history_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between cycles
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// Pause after a metrics source failure before trying again
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,

    /// Records returned by history queries when no limit is given
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: default_interval_seconds(),
            retry_delay_seconds: default_retry_delay_seconds(),
            history_limit: default_history_limit(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus exposition
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_component_name() -> String {
    "mapek_loop".to_string()
}

fn default_max_history_size() -> usize {
    DEFAULT_MAX_HISTORY_SIZE
}

fn default_interval_seconds() -> u64 {
    300
}

fn default_retry_delay_seconds() -> u64 {
    60
}

fn default_history_limit() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_metrics_port() -> u16 {
    9000
}

impl Default for LoopConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "mapek-host".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: LoopConfigSpec::default(),
        }
    }
}

impl LoopConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Discover configuration file using precedence order
    /// 1. MAPEK_CONFIG_PATH environment variable
    /// 2. ./mapek-config.yaml (working directory)
    /// 3. ~/.mapek/config.yaml (user home)
    /// 4. /etc/mapek/config.yaml (system, Unix) or C:\ProgramData\Mapek\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./mapek-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".mapek").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/mapek/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Mapek\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides on top of file values
    /// - MAPEK_LOG_LEVEL
    /// - MAPEK_MAX_HISTORY_SIZE
    /// - MAPEK_INTERVAL_SECONDS
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup("MAPEK_LOG_LEVEL") {
            self.spec.observability.logging.level = level;
        }

        if let Some(raw) = lookup("MAPEK_MAX_HISTORY_SIZE") {
            match raw.parse() {
                Ok(size) => self.spec.loop_settings.max_history_size = size,
                Err(_) => tracing::warn!("Ignoring invalid MAPEK_MAX_HISTORY_SIZE: {}", raw),
            }
        }

        if let Some(raw) = lookup("MAPEK_INTERVAL_SECONDS") {
            match raw.parse() {
                Ok(secs) => self.spec.monitoring.interval_seconds = secs,
                Err(_) => tracing::warn!("Ignoring invalid MAPEK_INTERVAL_SECONDS: {}", raw),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_version != API_VERSION {
            return Err(ConfigError::Invalid(format!(
                "Unsupported apiVersion '{}', expected '{}'",
                self.api_version, API_VERSION
            )));
        }
        if self.kind != KIND {
            return Err(ConfigError::Invalid(format!(
                "Unsupported kind '{}', expected '{}'",
                self.kind, KIND
            )));
        }

        let spec = &self.spec;
        if spec.loop_settings.component_name.trim().is_empty() {
            return Err(ConfigError::Invalid("loop.component_name must not be empty".to_string()));
        }
        if spec.loop_settings.max_history_size == 0 {
            return Err(ConfigError::Invalid("loop.max_history_size must be at least 1".to_string()));
        }

        let SeverityThresholds {
            critical_below,
            warning_below,
        } = spec.thresholds;
        if !(0.0..=1.0).contains(&critical_below)
            || !(0.0..=1.0).contains(&warning_below)
            || critical_below > warning_below
        {
            return Err(ConfigError::Invalid(format!(
                "thresholds must satisfy 0 <= critical_below ({}) <= warning_below ({}) <= 1",
                critical_below, warning_below
            )));
        }

        if spec.monitoring.interval_seconds == 0 {
            return Err(ConfigError::Invalid("monitoring.interval_seconds must be at least 1".to_string()));
        }

        match spec.observability.logging.format.as_str() {
            "json" | "text" => Ok(()),
            other => Err(ConfigError::Invalid(format!(
                "Unknown logging format '{}'. Supported: json, text",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
apiVersion: mapek.io/v1
kind: LoopConfig
metadata:
  name: edge-01
"#;

    #[test]
    fn test_minimal_manifest_uses_defaults() {
        let config = LoopConfigManifest::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.metadata.name, "edge-01");
        assert_eq!(config.spec.loop_settings.component_name, "mapek_loop");
        assert_eq!(config.spec.loop_settings.max_history_size, 1000);
        assert_eq!(config.spec.thresholds, SeverityThresholds::default());
        assert_eq!(config.spec.monitoring.interval_seconds, 300);
        assert_eq!(config.spec.monitoring.retry_delay_seconds, 60);
        assert!(!config.spec.observability.metrics.enabled);
        tokio_test::assert_ok!(config.validate());
    }

    #[test]
    fn test_full_manifest() {
        let yaml = r#"
apiVersion: mapek.io/v1
kind: LoopConfig
metadata:
  name: quality
  labels:
    team: platform
spec:
  loop:
    component_name: quality_monitor
    max_history_size: 50
  thresholds:
    critical_below: 0.2
    warning_below: 0.5
  monitoring:
    interval_seconds: 30
  observability:
    logging:
      level: debug
      format: json
    metrics:
      enabled: true
      port: 9100
"#;
        let config = LoopConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(config.spec.loop_settings.component_name, "quality_monitor");
        assert_eq!(config.spec.loop_settings.max_history_size, 50);
        assert_eq!(config.spec.thresholds.critical_below, 0.2);
        assert_eq!(config.spec.monitoring.interval_seconds, 30);
        assert_eq!(config.spec.monitoring.history_limit, 10);
        assert_eq!(config.spec.observability.logging.format, "json");
        assert_eq!(config.spec.observability.metrics.port, 9100);
        tokio_test::assert_ok!(config.validate());
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let mut config = LoopConfigManifest::default();
        config.spec.thresholds = SeverityThresholds {
            critical_below: 0.8,
            warning_below: 0.4,
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_zero_history_and_bad_kind() {
        let mut config = LoopConfigManifest::default();
        config.spec.loop_settings.max_history_size = 0;
        tokio_test::assert_err!(config.validate());

        let mut config = LoopConfigManifest::default();
        config.kind = "NodeConfig".to_string();
        tokio_test::assert_err!(config.validate());
    }

    #[test]
    fn test_overrides_apply_and_ignore_garbage() {
        let mut config = LoopConfigManifest::default();
        config.apply_overrides(|key| match key {
            "MAPEK_LOG_LEVEL" => Some("trace".to_string()),
            "MAPEK_MAX_HISTORY_SIZE" => Some("not-a-number".to_string()),
            "MAPEK_INTERVAL_SECONDS" => Some("15".to_string()),
            _ => None,
        });

        assert_eq!(config.spec.observability.logging.level, "trace");
        assert_eq!(config.spec.loop_settings.max_history_size, 1000);
        assert_eq!(config.spec.monitoring.interval_seconds, 15);
    }

    #[test]
    fn test_yaml_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapek-config.yaml");

        let mut config = LoopConfigManifest::default();
        config.spec.loop_settings.max_history_size = 25;
        config.to_yaml_file(&path).unwrap();

        let loaded = LoopConfigManifest::load_or_default(Some(path)).unwrap();
        assert_eq!(loaded.spec.loop_settings.max_history_size, 25);
        assert_eq!(loaded.api_version, API_VERSION);
    }

    #[test]
    fn test_missing_explicit_path_is_an_error() {
        let result = LoopConfigManifest::load_or_default(Some(PathBuf::from(
            "/definitely/not/here/mapek.yaml",
        )));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}

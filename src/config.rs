//! Configuration loading for the evaluation engine: where to reach Docker
//! and Kafka, and the default resource caps new requests fall back to when
//! they don't supply their own `ExecutionConfig`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::ExecutionConfig;

/// Root configuration structure, loaded once at process start.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub event_bus: EventBusConfig,
    #[serde(default)]
    pub defaults: ExecutionConfig,
    #[serde(default = "default_server_instance")]
    pub server_instance: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sandbox: SandboxConfig::default(),
            event_bus: EventBusConfig::default(),
            defaults: ExecutionConfig::default(),
            server_instance: default_server_instance(),
        }
    }
}

fn default_server_instance() -> String {
    "codecheck-0".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SandboxConfig {
    /// `None` connects to the local Docker daemon via its default socket.
    #[serde(default)]
    pub docker_host: Option<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self { docker_host: None }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventBusConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_bootstrap_servers")]
    pub bootstrap_servers: String,
    #[serde(default = "default_topic")]
    pub topic: String,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bootstrap_servers: default_bootstrap_servers(),
            topic: default_topic(),
        }
    }
}

fn default_bootstrap_servers() -> String {
    "localhost:9092".to_string()
}

fn default_topic() -> String {
    "challenge-completed".to_string()
}

/// Loads configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    load_config_str(&content)
}

/// Loads configuration from a TOML string. Useful for tests and for
/// embedding configuration without a filesystem round-trip.
pub fn load_config_str(content: &str) -> Result<Config> {
    toml::from_str(content).context("failed to parse config")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_all_defaults() {
        let config = load_config_str("").unwrap();
        assert_eq!(config.server_instance, "codecheck-0");
        assert!(!config.event_bus.enabled);
        assert_eq!(config.defaults.timeout_seconds, crate::model::DEFAULT_TIMEOUT_SECONDS);
    }

    #[test]
    fn overrides_are_applied() {
        let toml = r#"
            server_instance = "codecheck-1"

            [event_bus]
            enabled = true
            bootstrap_servers = "kafka:9092"
            topic = "custom-topic"

            [defaults]
            timeout_seconds = 60
            memory_limit_mb = 512
        "#;
        let config = load_config_str(toml).unwrap();
        assert_eq!(config.server_instance, "codecheck-1");
        assert!(config.event_bus.enabled);
        assert_eq!(config.event_bus.bootstrap_servers, "kafka:9092");
        assert_eq!(config.defaults.timeout_seconds, 60);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(load_config_str("not valid toml [[[").is_err());
    }
}

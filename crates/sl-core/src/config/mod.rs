//! Configuration management for the screenlink agent

mod agent;
pub mod serde_utils;

pub use agent::AgentConfig;

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("screenlink")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("agent.json")
}

/// Load the agent configuration from a file
///
/// Never fails: a missing file is created with defaults, a malformed file
/// falls back to defaults, and keys absent from the file keep their
/// default values.
pub fn load_config(path: &Path) -> AgentConfig {
    if !path.exists() {
        let config = AgentConfig::default();
        match save_config(path, &config) {
            Ok(()) => tracing::info!("Created default config at {:?}", path),
            Err(e) => tracing::warn!("Failed to write default config to {:?}: {}", path, e),
        }
        return config;
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Failed to read config from {:?}: {}", path, e);
            return AgentConfig::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Malformed config at {:?}, using defaults: {}", path, e);
            AgentConfig::default()
        }
    }
}

/// Save the agent configuration to a file
pub fn save_config(path: &Path, config: &AgentConfig) -> Result<(), ConfigError> {
    let content = serde_json::to_string_pretty(config)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    std::fs::write(path, content).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_save_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent.json");

        let mut config = AgentConfig::default();
        config.server_url = "https://coordinator.example.net".to_string();
        config.vnc_port = 5901;
        config.heartbeat_interval = Duration::from_secs(45);
        config.reverse_tunnel_enabled = false;

        save_config(&path, &config).unwrap();
        let loaded = load_config(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_creates_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("agent.json");

        let config = load_config(&path);
        assert_eq!(config.vnc_port, 5900);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        // The defaults were written to disk
        assert!(path.exists());
    }

    #[test]
    fn test_partial_file_merges_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent.json");
        std::fs::write(&path, r#"{"vnc_port": 6000}"#).unwrap();

        let config = load_config(&path);
        let defaults = AgentConfig::default();
        assert_eq!(config.vnc_port, 6000);
        assert_eq!(config.heartbeat_interval, defaults.heartbeat_interval);
        assert_eq!(config.server_url, defaults.server_url);
        assert_eq!(config.ssh_port, defaults.ssh_port);
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent.json");
        std::fs::write(&path, "{not json").unwrap();

        let config = load_config(&path);
        assert_eq!(config, AgentConfig::default());
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent.json");
        std::fs::write(&path, r#"{"vnc_port": 6000, "future_key": true}"#).unwrap();

        let config = load_config(&path);
        assert_eq!(config.vnc_port, 6000);
    }
}

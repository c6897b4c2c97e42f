//! Configuration loading

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::mcp::LaunchConfig;

/// Config file name looked up from the working directory upwards
pub const CONFIG_FILE_NAME: &str = ".mcp-bridge.toml";

/// Find a config file by walking up the directory tree, then checking global config.
///
/// Search order:
/// 1. Current directory and parent directories (walking up to root)
/// 2. Global config at ~/.config/mcp-bridge/
fn find_config_file(filename: &str) -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let candidate = current.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_path = config_dir.join("mcp-bridge").join(filename);
        if global_path.exists() {
            return Some(global_path);
        }
    }

    None
}

/// Top-level bridge configuration (from .mcp-bridge.toml)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub server: LaunchConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// Timeout section
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    /// Bounds spawn + handshake + initial discovery
    #[serde(default = "default_startup_secs")]
    pub startup_secs: u64,
    /// Bounds every single tool call
    #[serde(default = "default_call_secs")]
    pub call_secs: u64,
    /// Bounds the graceful session shutdown during close
    #[serde(default = "default_shutdown_secs")]
    pub shutdown_secs: u64,
}

// Default value functions
fn default_startup_secs() -> u64 {
    30
}

fn default_call_secs() -> u64 {
    60
}

fn default_shutdown_secs() -> u64 {
    5
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            startup_secs: default_startup_secs(),
            call_secs: default_call_secs(),
            shutdown_secs: default_shutdown_secs(),
        }
    }
}

impl TimeoutConfig {
    pub fn startup(&self) -> Duration {
        Duration::from_secs(self.startup_secs)
    }

    pub fn call(&self) -> Duration {
        Duration::from_secs(self.call_secs)
    }

    pub fn shutdown(&self) -> Duration {
        Duration::from_secs(self.shutdown_secs)
    }
}

impl BridgeConfig {
    /// Load config from .mcp-bridge.toml
    ///
    /// Returns defaults when no file is found.
    pub fn load() -> Result<Self> {
        if let Some(config_path) = find_config_file(CONFIG_FILE_NAME) {
            tracing::debug!("Loading bridge config from: {}", config_path.display());
            return Self::load_from_path(&config_path);
        }

        tracing::debug!("No {} found, using defaults", CONFIG_FILE_NAME);
        Ok(Self::default())
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.server.validate()?;
        Ok(config)
    }
}

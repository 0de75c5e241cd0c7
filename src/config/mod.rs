//! Configuration management for the playback gateway
//!
//! Handles loading, parsing, and hot-reloading of YAML configuration files.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::fs;

use crate::feedback::Feedback;
use crate::sync::clamp_interval;

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub api: ApiConfig,
    /// Registered feedback instances by id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub feedbacks: BTreeMap<String, Feedback>,
}

/// Playback device connection and polling
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub enable_polling: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enable_polling: true,
            poll_interval_ms: default_poll_interval(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl PlaybackConfig {
    /// Poll interval after clamping to the supported range
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(clamp_interval(self.poll_interval_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Whether switching to `other` requires retargeting the transport
    pub fn target_changed(&self, other: &PlaybackConfig) -> bool {
        self.host != other.host
            || self.port != other.port
            || self.request_timeout_ms != other.request_timeout_ms
    }
}

/// Local HTTP API
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_api_port(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config = Self::parse(&contents)
            .with_context(|| format!("Invalid config file: {}", path))?;

        Ok(config)
    }

    /// Parse and validate YAML text
    pub fn parse(contents: &str) -> Result<Self> {
        // An empty file means "all defaults"
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate configuration for correctness
    pub fn validate(&self) -> Result<()> {
        if self.playback.host.trim().is_empty() {
            anyhow::bail!("playback.host cannot be empty");
        }
        if self.playback.port == 0 {
            anyhow::bail!("playback.port cannot be 0");
        }
        if self.playback.request_timeout_ms == 0 {
            anyhow::bail!("playback.request_timeout_ms cannot be 0");
        }
        if self.api.enabled && self.api.port == 0 {
            anyhow::bail!("api.port cannot be 0 when the API is enabled");
        }

        for (id, feedback) in &self.feedbacks {
            if id.is_empty() {
                anyhow::bail!("Feedback id cannot be empty");
            }
            if feedback.button() == Some(0) {
                anyhow::bail!("Feedback '{}' has invalid button 0 (buttons start at 1)", id);
            }
        }

        Ok(())
    }
}

// Default value functions
fn default_host() -> String { "localhost".to_string() }
fn default_port() -> u16 { 8090 }
fn default_true() -> bool { true }
fn default_poll_interval() -> u64 { crate::sync::DEFAULT_POLL_INTERVAL_MS }
fn default_request_timeout() -> u64 { 2000 }
fn default_api_port() -> u16 { 8126 }

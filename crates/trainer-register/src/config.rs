//! Application configuration loaded from environment variables.

use anyhow::{Context, Result};
use points_channel::{push_endpoint, ChannelConfig, ChannelError};
use serde::Deserialize;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Registration backend configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Push channel configuration
    #[serde(default)]
    pub channel: ChannelSettings,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Base URL the registration API is served from
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Registration request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelSettings {
    /// Push endpoint; derived from the base URL when unset
    #[serde(default)]
    pub url: Option<String>,

    /// Wait before reconnecting a lost push connection
    #[serde(default = "default_reconnect_delay", with = "humantime_serde")]
    pub reconnect_delay: Duration,

    /// Wait between registering and the first push connection
    #[serde(default = "default_open_delay", with = "humantime_serde")]
    pub open_delay: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines
    #[serde(default)]
    pub json: bool,
}

// Default implementations
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
        }
    }
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            url: None,
            reconnect_delay: default_reconnect_delay(),
            open_delay: default_open_delay(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:3000".into()
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_reconnect_delay() -> Duration {
    points_channel::DEFAULT_RECONNECT_DELAY
}

fn default_open_delay() -> Duration {
    points_channel::DEFAULT_OPEN_DELAY
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    // Phone numbers and codes must stay strings
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Push channel configuration, deriving the endpoint when not set.
    pub fn channel_config(&self) -> Result<ChannelConfig, ChannelError> {
        let url = match &self.channel.url {
            Some(url) => url.clone(),
            None => push_endpoint(&self.server.base_url)?,
        };

        Ok(ChannelConfig::new(url)
            .with_reconnect_delay(self.channel.reconnect_delay)
            .with_open_delay(self.channel.open_delay))
    }
}

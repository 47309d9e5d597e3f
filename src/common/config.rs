//! Configuration file handling

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::paths::{self, config_path};
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Socket and connect settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Reconnection backoff
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Keep-alive probing
    #[serde(default)]
    pub keepalive: KeepAliveConfig,

    /// Buffer and queue bounds
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Request settings for one-off commands
    #[serde(default)]
    pub requests: RequestConfig,
}

/// Socket and connect settings
#[derive(Debug, Deserialize)]
pub struct ConnectionConfig {
    /// Override for the control socket location
    #[serde(default)]
    pub socket_path: Option<PathBuf>,

    /// Upper bound for a single connect attempt
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// SO_SNDBUF / SO_RCVBUF requested for the socket
    #[serde(default = "default_socket_buffer")]
    pub socket_buffer_bytes: usize,

    /// Size of each read from the socket
    #[serde(default = "default_read_chunk")]
    pub read_chunk_bytes: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            connect_timeout_ms: default_connect_timeout(),
            socket_buffer_bytes: default_socket_buffer(),
            read_chunk_bytes: default_read_chunk(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    5_000
}
fn default_socket_buffer() -> usize {
    1024 * 1024
}
fn default_read_chunk() -> usize {
    64 * 1024
}

/// Reconnection backoff settings
#[derive(Debug, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Factor applied to the delay after every failed attempt
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            multiplier: default_multiplier(),
        }
    }
}

fn default_initial_delay() -> u64 {
    1_000
}
fn default_max_delay() -> u64 {
    30_000
}
fn default_multiplier() -> f64 {
    2.0
}

/// Keep-alive settings
#[derive(Debug, Deserialize)]
pub struct KeepAliveConfig {
    /// Seconds between pings; a link with no pong for twice this is dead
    #[serde(default = "default_keepalive_interval")]
    pub interval_secs: u64,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_keepalive_interval(),
        }
    }
}

fn default_keepalive_interval() -> u64 {
    30
}

/// Buffer and queue bounds
#[derive(Debug, Deserialize)]
pub struct LimitsConfig {
    /// Receive buffer cap; a partial frame larger than this is discarded
    #[serde(default = "default_max_frame")]
    pub max_frame_bytes: usize,

    /// Frames held while disconnected before the oldest is dropped
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,

    /// Frames buffered between the receive loop and the router
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: default_max_frame(),
            max_pending: default_max_pending(),
            inbound_capacity: default_inbound_capacity(),
        }
    }
}

fn default_max_frame() -> usize {
    1024 * 1024
}
fn default_max_pending() -> usize {
    100
}
fn default_inbound_capacity() -> usize {
    256
}

/// Settings for requests issued from the command line
#[derive(Debug, Deserialize)]
pub struct RequestConfig {
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    10
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                let content =
                    std::fs::read_to_string(&path).map_err(|e| super::Error::FileRead {
                        path: path.display().to_string(),
                        error: e.to_string(),
                    })?;
                return Self::parse(&content);
            }
        }
        Ok(Self::default())
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(self.reconnect.multiplier.is_finite() && self.reconnect.multiplier >= 1.0) {
            return Err(super::Error::Config(format!(
                "reconnect.multiplier must be a finite number >= 1.0, got {}",
                self.reconnect.multiplier
            )));
        }
        if self.reconnect.initial_delay_ms > self.reconnect.max_delay_ms {
            return Err(super::Error::Config(
                "reconnect.initial_delay_ms exceeds reconnect.max_delay_ms".to_string(),
            ));
        }
        if self.keepalive.interval_secs == 0 {
            return Err(super::Error::Config(
                "keepalive.interval_secs must be positive".to_string(),
            ));
        }
        if self.limits.max_pending == 0 || self.limits.inbound_capacity == 0 {
            return Err(super::Error::Config(
                "limits.max_pending and limits.inbound_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the socket path: explicit override, then config, then default
    pub fn socket_path(&self, cli_override: Option<PathBuf>) -> PathBuf {
        cli_override
            .or_else(|| self.connection.socket_path.clone())
            .unwrap_or_else(paths::socket_path)
    }

    /// Timeout for requests issued from the command line
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.requests.timeout_secs)
    }
}

//! Client configuration.
//!
//! Configuration is loaded from, in order of precedence:
//! 1. Environment variables (highest)
//! 2. YAML file named by `RSTOMP_CONFIG`
//! 3. Defaults (lowest)

use rstomp_protocol::{StompCodec, DEFAULT_PORT, MAX_FRAME_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Smallest accepted frame size limit.
pub const MIN_FRAME_SIZE: usize = 64;

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Broker address (`host:port`).
    pub addr: String,
    /// Virtual host announced in CONNECT.
    pub host: String,
    /// Time allowed for the TCP connect and the STOMP handshake, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Time `send_and_wait` waits for a receipt, in milliseconds.
    pub receipt_timeout_ms: u64,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
    /// Largest frame accepted in either direction.
    pub max_frame_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            host: "localhost".to_string(),
            connect_timeout_ms: 10_000,
            receipt_timeout_ms: 30_000,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from file (if `RSTOMP_CONFIG` is set) and environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os("RSTOMP_CONFIG").map(PathBuf::from);
        Self::load_from(path.as_deref())
    }

    /// Loads configuration from an optional file, then applies environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let mut config: ClientConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        config.read_buffer_size = clamp_read_buffer(config.read_buffer_size);
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("RSTOMP_ADDR") {
            self.addr = addr;
        }

        if let Ok(host) = std::env::var("RSTOMP_HOST") {
            self.host = host;
        }

        if let Ok(timeout) = std::env::var("RSTOMP_CONNECT_TIMEOUT") {
            if let Ok(ms) = timeout.parse() {
                self.connect_timeout_ms = ms;
            }
        }

        if let Ok(timeout) = std::env::var("RSTOMP_RECEIPT_TIMEOUT") {
            if let Ok(ms) = timeout.parse() {
                self.receipt_timeout_ms = ms;
            }
        }

        if let Ok(size) = std::env::var("RSTOMP_MAX_FRAME_SIZE") {
            if let Ok(n) = size.parse() {
                self.max_frame_size = n;
            }
        }
    }

    /// Checks that the configuration can be used to connect.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.addr.is_empty() {
            return Err(ConfigError::ValidationError(
                "broker address must not be empty".to_string(),
            ));
        }
        if self.host.is_empty() || self.host.contains(['\n', '\r', '\0']) {
            return Err(ConfigError::ValidationError(format!(
                "invalid virtual host {:?}",
                self.host
            )));
        }
        if self.max_frame_size < MIN_FRAME_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "max_frame_size must be at least {} bytes",
                MIN_FRAME_SIZE
            )));
        }
        if !(MIN_READ_BUFFER_SIZE..=MAX_READ_BUFFER_SIZE).contains(&self.read_buffer_size) {
            return Err(ConfigError::ValidationError(format!(
                "read_buffer_size must be between {} and {} bytes",
                MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE
            )));
        }
        Ok(())
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = clamp_read_buffer(size);
        self
    }

    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Returns the connect timeout as Duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the receipt timeout as Duration.
    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_millis(self.receipt_timeout_ms)
    }

    /// Codec honoring the configured frame size limit.
    pub fn codec(&self) -> StompCodec {
        StompCodec::new().with_max_frame_size(self.max_frame_size)
    }
}

fn clamp_read_buffer(size: usize) -> usize {
    size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE)
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

//! TOML Configuration File Support
//!
//! Centralized configuration loading for the julelys daemon, from a TOML file
//! at `~/.config/julelys/julelys.toml`.
//!
//! # Configuration Priority
//!
//! Values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [matrix]
//! width = 8
//! height = 55
//!
//! [output]
//! mode = "real"
//! device = "/dev/spidev1.1"
//! baud_rate = 2500000
//! channel_order = "grbw"
//! fps = 30
//!
//! [control]
//! socket_path = "/tmp/julelys.sock"
//! max_request_size = 65536
//! preview_timeout_ms = 5000
//!
//! [runner]
//! commit_delay_ms = 10
//! idle_poll_ms = 50
//!
//! [storage]
//! enabled = true
//! directory = "/home/pi/.local/share/julelys"
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matrix::MatrixSize;
use crate::output::ChannelOrder;
use crate::protocol::DEFAULT_MAX_REQUEST_SIZE;
use crate::store::DirectoryStore;
use crate::transport::default_socket_path;

/// Highest accepted transmission rate
pub const MAX_FPS: u32 = 240;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// Output Mode
// =============================================================================

/// Where rendered frames go
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Stream to the SPI device
    #[default]
    Real,
    /// Render and discard; for development machines without LEDs
    Headless,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real => write!(f, "real"),
            Self::Headless => write!(f, "headless"),
        }
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "real" => Ok(Self::Real),
            "headless" => Ok(Self::Headless),
            other => Err(format!("unknown mode '{other}' (expected real or headless)")),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Matrix section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixToml {
    /// Number of strings
    pub width: Option<usize>,

    /// LEDs per string
    pub height: Option<usize>,
}

/// Output section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputToml {
    /// `real` or `headless`
    pub mode: Option<OutputMode>,

    /// SPI device node
    pub device: Option<String>,

    /// SPI clock in Hz
    pub baud_rate: Option<u32>,

    /// Byte order of one cell on the wire
    pub channel_order: Option<ChannelOrder>,

    /// Transmission cycles per second
    pub fps: Option<u32>,
}

/// Control section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlToml {
    /// Unix socket path for commands
    pub socket_path: Option<String>,

    /// Largest accepted request in bytes
    pub max_request_size: Option<usize>,

    /// Wall-clock limit for a preview render
    pub preview_timeout_ms: Option<u64>,
}

/// Runner section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerToml {
    /// Pause after every committed frame
    pub commit_delay_ms: Option<u64>,

    /// Shortest runner pass
    pub idle_poll_ms: Option<u64>,
}

/// Storage section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageToml {
    /// Persist custom sequences and the active set
    pub enabled: Option<bool>,

    /// Storage root
    pub directory: Option<String>,
}

/// The whole TOML file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JulelysToml {
    /// `[matrix]`
    pub matrix: MatrixToml,

    /// `[output]`
    pub output: OutputToml,

    /// `[control]`
    pub control: ControlToml,

    /// `[runner]`
    pub runner: RunnerToml,

    /// `[storage]`
    pub storage: StorageToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved daemon configuration
#[derive(Clone, Debug)]
pub struct JulelysConfig {
    /// Matrix dimensions
    pub matrix: MatrixSize,

    /// Output mode
    pub mode: OutputMode,

    /// SPI device node
    pub device: PathBuf,

    /// SPI clock in Hz
    pub baud_rate: u32,

    /// Byte order on the wire
    pub channel_order: ChannelOrder,

    /// Transmission cycles per second
    pub fps: u32,

    /// Control socket path
    pub socket_path: PathBuf,

    /// Largest accepted request in bytes
    pub max_request_size: usize,

    /// Wall-clock limit for preview renders
    pub preview_timeout: Duration,

    /// Pause after every committed frame
    pub commit_delay: Duration,

    /// Shortest runner pass
    pub idle_poll: Duration,

    /// Persist custom sequences and the active set
    pub storage_enabled: bool,

    /// Storage root
    pub storage_dir: PathBuf,

    /// File the configuration was read from, if any
    pub config_file_path: Option<PathBuf>,

    source: ConfigSource,
}

impl Default for JulelysConfig {
    fn default() -> Self {
        Self {
            matrix: MatrixSize::default(),
            mode: OutputMode::Real,
            device: PathBuf::from("/dev/spidev1.1"),
            baud_rate: 2_500_000,
            channel_order: ChannelOrder::Grbw,
            fps: 30,
            socket_path: default_socket_path(),
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            preview_timeout: Duration::from_millis(5000),
            commit_delay: Duration::from_millis(10),
            idle_poll: Duration::from_millis(50),
            storage_enabled: true,
            storage_dir: DirectoryStore::default_root(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl JulelysConfig {
    /// Default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest-priority source that contributed a value
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Record where the configuration came from
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for an empty matrix or an
    /// fps outside `1..=MAX_FPS`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.matrix.width == 0 || self.matrix.height == 0 {
            return Err(ConfigError::ValidationError(format!(
                "matrix must be at least 1x1, got {}",
                self.matrix
            )));
        }
        if self.fps == 0 || self.fps > MAX_FPS {
            return Err(ConfigError::ValidationError(format!(
                "fps must be between 1 and {MAX_FPS}, got {}",
                self.fps
            )));
        }
        if self.max_request_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_request_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Default location of the configuration file
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("julelys").join("julelys.toml"))
}

/// Load from the default path
///
/// # Errors
///
/// See [`load_config_from_path`].
pub fn load_config() -> Result<JulelysConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load defaults, then the file at `path` if it exists, then the environment
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed, or if
/// the resulting values are out of range.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<JulelysConfig, ConfigError> {
    let mut config = JulelysConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: JulelysToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config);
    config.validate()?;

    Ok(config)
}

fn apply_toml_config(config: &mut JulelysConfig, toml: &JulelysToml) {
    // Matrix
    if let Some(width) = toml.matrix.width {
        config.matrix.width = width;
    }
    if let Some(height) = toml.matrix.height {
        config.matrix.height = height;
    }

    // Output
    if let Some(mode) = toml.output.mode {
        config.mode = mode;
    }
    if let Some(ref device) = toml.output.device {
        config.device = PathBuf::from(device);
    }
    if let Some(baud) = toml.output.baud_rate {
        config.baud_rate = baud;
    }
    if let Some(order) = toml.output.channel_order {
        config.channel_order = order;
    }
    if let Some(fps) = toml.output.fps {
        config.fps = fps;
    }

    // Control
    if let Some(ref path) = toml.control.socket_path {
        config.socket_path = PathBuf::from(path);
    }
    if let Some(size) = toml.control.max_request_size {
        config.max_request_size = size;
    }
    if let Some(ms) = toml.control.preview_timeout_ms {
        config.preview_timeout = Duration::from_millis(ms);
    }

    // Runner
    if let Some(ms) = toml.runner.commit_delay_ms {
        config.commit_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.runner.idle_poll_ms {
        config.idle_poll = Duration::from_millis(ms);
    }

    // Storage
    if let Some(enabled) = toml.storage.enabled {
        config.storage_enabled = enabled;
    }
    if let Some(ref dir) = toml.storage.directory {
        config.storage_dir = PathBuf::from(dir);
    }
}

fn apply_env_config(config: &mut JulelysConfig) {
    apply_env_from(config, |key| std::env::var(key).ok());
}

fn apply_env_from(config: &mut JulelysConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(path) = lookup("JULELYS_SOCKET") {
        config.socket_path = PathBuf::from(path);
        config.source = ConfigSource::Env;
    }
    if let Some(width) = lookup("JULELYS_WIDTH").and_then(|v| v.parse::<usize>().ok()) {
        config.matrix.width = width;
        config.source = ConfigSource::Env;
    }
    if let Some(height) = lookup("JULELYS_HEIGHT").and_then(|v| v.parse::<usize>().ok()) {
        config.matrix.height = height;
        config.source = ConfigSource::Env;
    }
    if let Some(device) = lookup("JULELYS_DEVICE") {
        config.device = PathBuf::from(device);
        config.source = ConfigSource::Env;
    }
    if let Some(mode) = lookup("JULELYS_MODE") {
        match mode.parse::<OutputMode>() {
            Ok(mode) => {
                config.mode = mode;
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring JULELYS_MODE"),
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Command-line overrides, applied after [`load_config`]
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Socket path override
    pub socket_path: Option<PathBuf>,

    /// Matrix width override
    pub width: Option<usize>,

    /// Matrix height override
    pub height: Option<usize>,

    /// Output mode override
    pub mode: Option<OutputMode>,

    /// SPI device override
    pub device: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set socket path override
    #[must_use]
    pub fn with_socket_path(mut self, path: PathBuf) -> Self {
        self.socket_path = Some(path);
        self
    }

    /// Set matrix dimension overrides
    #[must_use]
    pub fn with_matrix(mut self, width: Option<usize>, height: Option<usize>) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set output mode override
    #[must_use]
    pub fn with_mode(mut self, mode: OutputMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Set device override
    #[must_use]
    pub fn with_device(mut self, device: PathBuf) -> Self {
        self.device = Some(device);
        self
    }

    /// Whether any override is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.socket_path.is_none()
            && self.width.is_none()
            && self.height.is_none()
            && self.mode.is_none()
            && self.device.is_none()
    }

    /// Apply overrides and re-validate
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if an override puts a value
    /// out of range.
    pub fn apply(&self, config: &mut JulelysConfig) -> Result<(), ConfigError> {
        if !self.is_empty() {
            config.source = ConfigSource::Cli;
        }
        if let Some(ref path) = self.socket_path {
            config.socket_path = path.clone();
        }
        if let Some(width) = self.width {
            config.matrix.width = width;
        }
        if let Some(height) = self.height {
            config.matrix.height = height;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(ref device) = self.device {
            config.device = device.clone();
        }
        config.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================

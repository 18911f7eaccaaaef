//! Configuration module for the relay server
//!
//! Handles configuration from .env files, YAML files and environment
//! variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use waav_relay::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config = ServerConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use zeroize::Zeroizing;

use crate::core::upstream::UpstreamConfig;
use crate::relay::RelayOptions;

mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 10000;
pub const DEFAULT_STREAM_PATH: &str = "/stream";
/// Largest accepted telephony WebSocket frame or message (1 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// OpenAI Realtime session settings shared by every call
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub url: String,
    pub model: String,
    pub voice: Option<String>,
    pub instructions: Option<String>,
    pub audio_format: Option<String>,
    /// Instructions for the first response; blank disables the greeting
    pub greeting: String,
    pub connect_timeout: Duration,
}

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// Host advertised in the TwiML stream URL; the request's Host header
    /// is used when unset
    pub public_host: Option<String>,
    /// Path on which media stream upgrades are accepted
    pub stream_path: String,

    // Upstream
    pub openai_api_key: Zeroizing<String>,
    pub realtime: RealtimeConfig,

    // Relay limits
    /// Maximum concurrent calls
    /// Default: None (unlimited)
    pub max_concurrent_calls: Option<usize>,
    pub pending_frame_limit: usize,
    pub max_frame_size: usize,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (same-origin only)
    pub cors_allowed_origins: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("public_host", &self.public_host)
            .field("stream_path", &self.stream_path)
            .field("openai_api_key", &"<redacted>")
            .field("realtime", &self.realtime)
            .field("max_concurrent_calls", &self.max_concurrent_calls)
            .field("pending_frame_limit", &self.pending_frame_limit)
            .field("max_frame_size", &self.max_frame_size)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// The .env file is loaded in main.rs before this is called.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = merge::merge_config(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if the YAML file cannot be read or is malformed, an
    /// environment variable has an invalid format, or validation fails.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the merged configuration.
    ///
    /// The OpenAI API key is required; a relay without one would accept
    /// calls it can never connect.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate_api_key(&self.openai_api_key)?;
        validation::validate_stream_path(&self.stream_path)?;
        validation::validate_non_zero("port", u64::from(self.port))?;
        validation::validate_non_zero("pending_frame_limit", self.pending_frame_limit as u64)?;
        validation::validate_non_zero("max_frame_size", self.max_frame_size as u64)?;
        validation::validate_non_zero(
            "connect_timeout_seconds",
            self.realtime.connect_timeout.as_secs(),
        )?;
        if let Some(max) = self.max_concurrent_calls {
            validation::validate_non_zero("max_concurrent_calls", max as u64)?;
        }
        Ok(())
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Settings for opening one upstream session
    pub fn upstream_config(&self) -> UpstreamConfig {
        let greeting = Some(self.realtime.greeting.trim())
            .filter(|g| !g.is_empty())
            .map(str::to_string);

        UpstreamConfig {
            api_key: self.openai_api_key.clone(),
            url: self.realtime.url.clone(),
            model: self.realtime.model.clone(),
            voice: self.realtime.voice.clone(),
            instructions: self.realtime.instructions.clone(),
            greeting,
            audio_format: self.realtime.audio_format.clone(),
            connect_timeout: self.realtime.connect_timeout,
        }
    }

    pub fn relay_options(&self) -> RelayOptions {
        RelayOptions {
            pending_frame_limit: self.pending_frame_limit,
            ..Default::default()
        }
    }
}

//! Environment variable loading.
//!
//! Reads every supported variable into an [`EnvConfig`] without applying
//! defaults, so YAML values can still take precedence during the merge.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use super::ConfigError;

pub(crate) const HOST: &str = "HOST";
pub(crate) const PORT: &str = "PORT";
pub(crate) const TLS_CERT_PATH: &str = "TLS_CERT_PATH";
pub(crate) const TLS_KEY_PATH: &str = "TLS_KEY_PATH";
pub(crate) const PUBLIC_HOST: &str = "PUBLIC_HOST";
pub(crate) const STREAM_PATH: &str = "STREAM_PATH";
pub(crate) const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub(crate) const OPENAI_REALTIME_URL: &str = "OPENAI_REALTIME_URL";
pub(crate) const OPENAI_REALTIME_MODEL: &str = "OPENAI_REALTIME_MODEL";
pub(crate) const OPENAI_REALTIME_VOICE: &str = "OPENAI_REALTIME_VOICE";
pub(crate) const OPENAI_REALTIME_INSTRUCTIONS: &str = "OPENAI_REALTIME_INSTRUCTIONS";
pub(crate) const OPENAI_REALTIME_AUDIO_FORMAT: &str = "OPENAI_REALTIME_AUDIO_FORMAT";
pub(crate) const GREETING_INSTRUCTIONS: &str = "GREETING_INSTRUCTIONS";
pub(crate) const UPSTREAM_CONNECT_TIMEOUT_SECONDS: &str = "UPSTREAM_CONNECT_TIMEOUT_SECONDS";
pub(crate) const MAX_CONCURRENT_CALLS: &str = "MAX_CONCURRENT_CALLS";
pub(crate) const PENDING_FRAME_LIMIT: &str = "PENDING_FRAME_LIMIT";
pub(crate) const MAX_FRAME_SIZE: &str = "MAX_FRAME_SIZE";
pub(crate) const CORS_ALLOWED_ORIGINS: &str = "CORS_ALLOWED_ORIGINS";

/// Raw values read from the environment.
#[derive(Debug, Default)]
pub(crate) struct EnvConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
    pub public_host: Option<String>,
    pub stream_path: Option<String>,
    pub openai_api_key: Option<String>,
    pub realtime_url: Option<String>,
    pub realtime_model: Option<String>,
    pub realtime_voice: Option<String>,
    pub realtime_instructions: Option<String>,
    pub realtime_audio_format: Option<String>,
    pub greeting: Option<String>,
    pub connect_timeout_seconds: Option<u64>,
    pub max_concurrent_calls: Option<usize>,
    pub pending_frame_limit: Option<usize>,
    pub max_frame_size: Option<usize>,
    pub cors_allowed_origins: Option<String>,
}

impl EnvConfig {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            host: string_var(HOST),
            port: parse_var(PORT)?,
            tls_cert_path: string_var(TLS_CERT_PATH),
            tls_key_path: string_var(TLS_KEY_PATH),
            public_host: string_var(PUBLIC_HOST),
            stream_path: string_var(STREAM_PATH),
            openai_api_key: string_var(OPENAI_API_KEY),
            realtime_url: string_var(OPENAI_REALTIME_URL),
            realtime_model: string_var(OPENAI_REALTIME_MODEL),
            realtime_voice: string_var(OPENAI_REALTIME_VOICE),
            realtime_instructions: string_var(OPENAI_REALTIME_INSTRUCTIONS),
            realtime_audio_format: string_var(OPENAI_REALTIME_AUDIO_FORMAT),
            greeting: string_var(GREETING_INSTRUCTIONS),
            connect_timeout_seconds: parse_var(UPSTREAM_CONNECT_TIMEOUT_SECONDS)?,
            max_concurrent_calls: parse_var(MAX_CONCURRENT_CALLS)?,
            pending_frame_limit: parse_var(PENDING_FRAME_LIMIT)?,
            max_frame_size: parse_var(MAX_FRAME_SIZE)?,
            cors_allowed_origins: string_var(CORS_ALLOWED_ORIGINS),
        })
    }
}

/// Trimmed value of `name`; unset and blank are the same.
fn string_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    string_var(name)
        .map(|value| {
            value.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                name,
                reason: format!("'{value}': {e}"),
            })
        })
        .transpose()
}

//! Configuration validation.

use std::path::PathBuf;

use super::{ConfigError, TlsConfig};

/// Paths the relay serves itself; the stream path must not shadow them.
const RESERVED_PATHS: [&str; 3] = ["/", "/voice", "/health"];

pub(crate) fn validate_api_key(key: &str) -> Result<(), ConfigError> {
    if key.trim().is_empty() {
        return Err(ConfigError::Missing("OPENAI_API_KEY"));
    }
    Ok(())
}

pub(crate) fn validate_stream_path(path: &str) -> Result<(), ConfigError> {
    if !path.starts_with('/') {
        return Err(ConfigError::InvalidValue {
            name: "stream_path",
            reason: format!("'{path}' must start with '/'"),
        });
    }
    if RESERVED_PATHS.contains(&path) {
        return Err(ConfigError::InvalidValue {
            name: "stream_path",
            reason: format!("'{path}' is reserved"),
        });
    }
    Ok(())
}

/// TLS is enabled only when both paths are given.
pub(crate) fn validate_tls(
    cert_path: Option<String>,
    key_path: Option<String>,
) -> Result<Option<TlsConfig>, ConfigError> {
    match (cert_path, key_path) {
        (Some(cert), Some(key)) => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(ConfigError::Invalid(
            "TLS certificate path given without a key path".to_string(),
        )),
        (None, Some(_)) => Err(ConfigError::Invalid(
            "TLS key path given without a certificate path".to_string(),
        )),
    }
}

pub(crate) fn validate_non_zero(name: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

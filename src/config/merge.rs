//! Merging of YAML and environment configuration.

use std::time::Duration;

use zeroize::Zeroizing;

use super::env::EnvConfig;
use super::validation::validate_tls;
use super::yaml::YamlConfig;
use super::{
    ConfigError, DEFAULT_HOST, DEFAULT_MAX_FRAME_SIZE, DEFAULT_PORT, DEFAULT_STREAM_PATH,
    RealtimeConfig, ServerConfig,
};
use crate::core::upstream::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_GREETING, DEFAULT_REALTIME_MODEL, OPENAI_REALTIME_URL,
};
use crate::relay::RelayOptions;

/// Build the final configuration: YAML values win over environment values,
/// which win over defaults.
pub(crate) fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, ConfigError> {
    let env = EnvConfig::load()?;
    let yaml = yaml.unwrap_or_default();

    let server = yaml.server.unwrap_or_default();
    let openai = yaml.openai.unwrap_or_default();
    let relay = yaml.relay.unwrap_or_default();
    let security = yaml.security.unwrap_or_default();

    let tls = match server.tls {
        Some(tls) if tls.enabled == Some(false) => None,
        Some(tls) => validate_tls(
            tls.cert_path.or(env.tls_cert_path),
            tls.key_path.or(env.tls_key_path),
        )?,
        None => validate_tls(env.tls_cert_path, env.tls_key_path)?,
    };

    let connect_timeout = openai
        .connect_timeout_seconds
        .or(env.connect_timeout_seconds)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT);

    let realtime = RealtimeConfig {
        url: openai
            .url
            .or(env.realtime_url)
            .unwrap_or_else(|| OPENAI_REALTIME_URL.to_string()),
        model: openai
            .model
            .or(env.realtime_model)
            .unwrap_or_else(|| DEFAULT_REALTIME_MODEL.to_string()),
        voice: openai.voice.or(env.realtime_voice),
        instructions: openai.instructions.or(env.realtime_instructions),
        audio_format: openai.audio_format.or(env.realtime_audio_format),
        greeting: openai
            .greeting
            .or(env.greeting)
            .unwrap_or_else(|| DEFAULT_GREETING.to_string()),
        connect_timeout,
    };

    let defaults = RelayOptions::default();

    Ok(ServerConfig {
        host: server
            .host
            .or(env.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: server.port.or(env.port).unwrap_or(DEFAULT_PORT),
        tls,
        public_host: server.public_host.or(env.public_host),
        stream_path: server
            .stream_path
            .or(env.stream_path)
            .unwrap_or_else(|| DEFAULT_STREAM_PATH.to_string()),
        openai_api_key: Zeroizing::new(openai.api_key.or(env.openai_api_key).unwrap_or_default()),
        realtime,
        max_concurrent_calls: relay.max_concurrent_calls.or(env.max_concurrent_calls),
        pending_frame_limit: relay
            .pending_frame_limit
            .or(env.pending_frame_limit)
            .unwrap_or(defaults.pending_frame_limit),
        max_frame_size: relay
            .max_frame_size
            .or(env.max_frame_size)
            .unwrap_or(DEFAULT_MAX_FRAME_SIZE),
        cors_allowed_origins: security.cors_allowed_origins.or(env.cors_allowed_origins),
    })
}

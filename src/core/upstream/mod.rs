//! Upstream Session Client.
//!
//! An [`UpstreamConnector`] opens one realtime conversation with the AI
//! provider per call and returns an [`UpstreamSession`]: the provider's
//! session metadata, the duplex frame connection, and the one-shot greeting
//! command that starts the conversation.
//!
//! Connectors are injected into the application state, which lets the call
//! relay run against in-memory fakes in tests.

use std::time::Duration;

use async_trait::async_trait;
use zeroize::Zeroizing;

use super::connection::MediaConnection;
use super::frame::MediaFrame;
use crate::errors::RelayResult;

pub mod openai;
mod socket;

pub use openai::{
    DEFAULT_REALTIME_MODEL, OPENAI_REALTIME_URL, OpenAIRealtimeAudioFormat,
    OpenAIRealtimeConnector, OpenAIRealtimeVoice,
};

/// Greeting the agent speaks as soon as the call is connected.
pub const DEFAULT_GREETING: &str = "Say: 'Hi, you're through to Tradesmen AI. How can I help?'";

/// Default time allowed for connecting and completing the session handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for one upstream realtime session.
#[derive(Clone)]
pub struct UpstreamConfig {
    /// Provider API key
    pub api_key: Zeroizing<String>,
    /// Realtime WebSocket endpoint, without the model query parameter
    pub url: String,
    /// Model identifier
    pub model: String,
    /// Voice used for generated speech (provider default when `None`)
    pub voice: Option<String>,
    /// Session-wide behavioral instructions
    pub instructions: Option<String>,
    /// Instructions for the first response of the call
    pub greeting: Option<String>,
    /// Audio format for both input and output (provider default when `None`)
    pub audio_format: Option<String>,
    /// Upper bound for connect plus handshake
    pub connect_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: Zeroizing::new(String::new()),
            url: OPENAI_REALTIME_URL.to_string(),
            model: DEFAULT_REALTIME_MODEL.to_string(),
            voice: None,
            instructions: None,
            greeting: Some(DEFAULT_GREETING.to_string()),
            audio_format: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("api_key", &"<redacted>")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("instructions", &self.instructions)
            .field("greeting", &self.greeting)
            .field("audio_format", &self.audio_format)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Provider-side description of an open session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    /// Remote session identifier, when the provider reports one
    pub session_id: Option<String>,
    /// Model echoed from the configuration
    pub model: String,
    /// Voice echoed from the configuration
    pub voice: Option<String>,
}

/// Handle to one upstream realtime conversation.
///
/// Owned by exactly one call relay and closed when that relay tears down.
pub struct UpstreamSession {
    info: SessionInfo,
    greeting: Option<MediaFrame>,
    connection: MediaConnection,
}

impl UpstreamSession {
    pub fn new(info: SessionInfo, connection: MediaConnection) -> Self {
        Self {
            info,
            greeting: None,
            connection,
        }
    }

    /// Attach the provider command that makes the agent greet the caller.
    pub fn with_greeting(mut self, command: MediaFrame) -> Self {
        self.greeting = Some(command);
        self
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn session_id(&self) -> Option<&str> {
        self.info.session_id.as_deref()
    }

    /// Whether the greeting command is still waiting to be sent.
    pub fn has_pending_greeting(&self) -> bool {
        self.greeting.is_some()
    }

    /// Send the greeting command directly on the upstream connection.
    ///
    /// One-shot: returns `Ok(true)` the first time a greeting is sent and
    /// `Ok(false)` when there is nothing (left) to send.
    pub async fn send_greeting(&mut self) -> RelayResult<bool> {
        match self.greeting.take() {
            Some(command) => {
                self.connection.send(command).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The frame connection used for relaying.
    pub fn connection_mut(&mut self) -> &mut MediaConnection {
        &mut self.connection
    }

    pub async fn close(&mut self) -> RelayResult<()> {
        self.connection.close().await
    }
}

impl std::fmt::Debug for UpstreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamSession")
            .field("info", &self.info)
            .field("greeting_pending", &self.greeting.is_some())
            .finish_non_exhaustive()
    }
}

/// Opens upstream realtime sessions.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    /// Establish a session with the given configuration.
    ///
    /// Fails with `RelayError::UpstreamUnavailable` when the provider cannot
    /// be reached or authenticated, and with
    /// `RelayError::UpstreamConfigInvalid` when it rejects the configuration.
    async fn open(&self, config: &UpstreamConfig) -> RelayResult<UpstreamSession>;
}

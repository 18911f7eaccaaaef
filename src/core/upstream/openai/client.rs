//! OpenAI Realtime API connector.
//!
//! # API Reference
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//!
//! Opening a session connects, waits for `session.created`, applies the
//! optional `session.update`, and prepares the greeting `response.create`.
//! From then on every event in either direction is an opaque frame.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use http::{HeaderName, HeaderValue, StatusCode, header::AUTHORIZATION};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message, client::IntoClientRequest};
use url::Url;
use zeroize::Zeroizing;

use super::config::{OpenAIRealtimeAudioFormat, OpenAIRealtimeVoice};
use super::messages::{ClientEvent, ServerEvent, Session, SessionConfig};
use crate::core::frame::MediaFrame;
use crate::core::upstream::{
    SessionInfo, UpstreamConfig, UpstreamConnector, UpstreamSession, socket,
};
use crate::errors::{RelayError, RelayResult};

/// Opens realtime sessions against the OpenAI Realtime API.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAIRealtimeConnector;

impl OpenAIRealtimeConnector {
    pub fn new() -> Self {
        Self
    }

    /// Build the WebSocket URL with model parameter.
    fn build_ws_url(config: &UpstreamConfig) -> RelayResult<Url> {
        if config.model.trim().is_empty() {
            return Err(RelayError::UpstreamConfigInvalid(
                "model is required".to_string(),
            ));
        }

        let mut url = Url::parse(&config.url).map_err(|e| {
            RelayError::UpstreamConfigInvalid(format!("invalid realtime URL '{}': {}", config.url, e))
        })?;
        url.query_pairs_mut().append_pair("model", config.model.trim());
        Ok(url)
    }

    /// Build the handshake request with authentication headers.
    fn build_request(config: &UpstreamConfig) -> RelayResult<http::Request<()>> {
        if config.api_key.trim().is_empty() {
            return Err(RelayError::UpstreamUnavailable(
                "API key is required".to_string(),
            ));
        }

        let url = Self::build_ws_url(config)?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RelayError::UpstreamConfigInvalid(e.to_string()))?;

        let bearer = Zeroizing::new(format!("Bearer {}", config.api_key.trim()));
        let auth_value = HeaderValue::from_str(&bearer).map_err(|_| {
            RelayError::UpstreamConfigInvalid("API key contains invalid characters".to_string())
        })?;

        let headers = request.headers_mut();
        headers.insert(AUTHORIZATION, auth_value);
        headers.insert(
            HeaderName::from_static("openai-beta"),
            HeaderValue::from_static("realtime=v1"),
        );

        Ok(request)
    }

    /// Build the `session.update` payload, validating voice and audio format.
    fn build_session_config(config: &UpstreamConfig) -> RelayResult<SessionConfig> {
        let voice = match config.voice.as_deref() {
            Some(v) => Some(
                OpenAIRealtimeVoice::parse(v)
                    .ok_or_else(|| {
                        RelayError::UpstreamConfigInvalid(format!("unsupported voice '{}'", v))
                    })?
                    .as_str()
                    .to_string(),
            ),
            None => None,
        };

        let audio_format = match config.audio_format.as_deref() {
            Some(f) => Some(
                OpenAIRealtimeAudioFormat::parse(f)
                    .ok_or_else(|| {
                        RelayError::UpstreamConfigInvalid(format!("unsupported audio format '{}'", f))
                    })?
                    .as_str()
                    .to_string(),
            ),
            None => None,
        };

        Ok(SessionConfig {
            instructions: config
                .instructions
                .as_ref()
                .filter(|i| !i.trim().is_empty())
                .cloned(),
            voice,
            input_audio_format: audio_format.clone(),
            output_audio_format: audio_format,
        })
    }

    /// Serialize the greeting command, if one is configured.
    fn build_greeting(config: &UpstreamConfig) -> RelayResult<Option<MediaFrame>> {
        let Some(instructions) = config.greeting.as_ref().filter(|g| !g.trim().is_empty()) else {
            return Ok(None);
        };

        let json = serde_json::to_string(&ClientEvent::greeting(instructions.clone()))
            .map_err(|e| RelayError::UpstreamConfigInvalid(e.to_string()))?;
        Ok(Some(MediaFrame::Text(json)))
    }

    async fn establish(&self, config: &UpstreamConfig) -> RelayResult<UpstreamSession> {
        // Validate everything we can before touching the network
        let session_config = Self::build_session_config(config)?;
        let greeting = Self::build_greeting(config)?;
        let request = Self::build_request(config)?;

        let (mut ws, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(classify_connect_error)?;

        tracing::debug!(model = %config.model, "Connected to OpenAI Realtime API");

        let session = match handshake(&mut ws, &session_config).await {
            Ok(session) => session,
            Err(e) => {
                let _ = ws.close(None).await;
                return Err(e);
            }
        };

        tracing::info!(
            session_id = %session.id,
            model = %config.model,
            "OpenAI Realtime session created"
        );

        let info = SessionInfo {
            session_id: Some(session.id),
            model: config.model.clone(),
            voice: config.voice.clone(),
        };

        let upstream = UpstreamSession::new(info, socket::into_connection(ws));
        Ok(match greeting {
            Some(command) => upstream.with_greeting(command),
            None => upstream,
        })
    }
}

#[async_trait]
impl UpstreamConnector for OpenAIRealtimeConnector {
    async fn open(&self, config: &UpstreamConfig) -> RelayResult<UpstreamSession> {
        match tokio::time::timeout(config.connect_timeout, self.establish(config)).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::UpstreamUnavailable(format!(
                "session not established within {}ms",
                config.connect_timeout.as_millis()
            ))),
        }
    }
}

/// Wait for `session.created`, then apply the session configuration.
///
/// The handshake events are consumed here and never reach the caller.
async fn handshake<S>(
    ws: &mut WebSocketStream<S>,
    session_config: &SessionConfig,
) -> RelayResult<Session>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let session = await_session_created(ws).await?;

    if !session_config.is_empty() {
        let event = ClientEvent::SessionUpdate {
            session: session_config.clone(),
        };
        let json = serde_json::to_string(&event)
            .map_err(|e| RelayError::UpstreamConfigInvalid(e.to_string()))?;
        ws.send(Message::Text(json.into()))
            .await
            .map_err(|e| RelayError::UpstreamUnavailable(e.to_string()))?;
    }

    Ok(session)
}

async fn await_session_created<S>(ws: &mut WebSocketStream<S>) -> RelayResult<Session>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(message) = ws.next().await {
        match message.map_err(|e| RelayError::UpstreamUnavailable(e.to_string()))? {
            Message::Text(text) => match serde_json::from_str::<ServerEvent>(text.as_str()) {
                Ok(ServerEvent::SessionCreated { session }) => return Ok(session),
                Ok(ServerEvent::Error { error }) => {
                    return Err(RelayError::UpstreamConfigInvalid(format!(
                        "{}: {}",
                        error.error_type, error.message
                    )));
                }
                Ok(ServerEvent::Other) => {
                    tracing::trace!("Ignoring server event before session.created");
                }
                Err(e) => {
                    tracing::warn!("Failed to parse server event: {} - {}", e, text.as_str());
                }
            },
            Message::Close(frame) => {
                return Err(RelayError::UpstreamUnavailable(format!(
                    "connection closed during handshake: {:?}",
                    frame
                )));
            }
            _ => {}
        }
    }

    Err(RelayError::UpstreamUnavailable(
        "connection closed before session.created".to_string(),
    ))
}

/// Map a failed WebSocket connect onto the relay's error kinds.
fn classify_connect_error(error: tungstenite::Error) -> RelayError {
    match error {
        tungstenite::Error::Http(response) => {
            let status = response.status();
            match status {
                StatusCode::BAD_REQUEST
                | StatusCode::NOT_FOUND
                | StatusCode::UNPROCESSABLE_ENTITY => RelayError::UpstreamConfigInvalid(format!(
                    "handshake rejected with HTTP {}",
                    status
                )),
                _ => RelayError::UpstreamUnavailable(format!(
                    "handshake rejected with HTTP {}",
                    status
                )),
            }
        }
        tungstenite::Error::Url(e) => RelayError::UpstreamConfigInvalid(e.to_string()),
        other => RelayError::UpstreamUnavailable(other.to_string()),
    }
}

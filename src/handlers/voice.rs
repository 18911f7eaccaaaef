//! Telephony voice webhook
//!
//! Twilio calls `POST /voice` when a call comes in. The TwiML answer tells
//! it to open a bidirectional media stream back to this server.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::state::AppState;

const TWIML_CONTENT_TYPE: &str = "text/xml";

/// Answer an incoming call with a `<Connect><Stream>` instruction.
///
/// The stream URL uses the configured public host, falling back to the
/// request's `Host` header.
pub async fn voice_webhook(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let host = state.config.public_host.clone().or_else(|| {
        headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });

    let Some(host) = host else {
        warn!("Voice webhook without Host header and no public host configured");
        return (StatusCode::BAD_REQUEST, "Missing Host header").into_response();
    };

    debug!(host = %host, "Answering voice webhook");

    (
        [(header::CONTENT_TYPE, TWIML_CONTENT_TYPE)],
        stream_twiml(&host, &state.config.stream_path),
    )
        .into_response()
}

/// TwiML that connects the call to `wss://{host}{path}`.
pub fn stream_twiml(host: &str, stream_path: &str) -> String {
    let url = format!("wss://{host}{stream_path}");
    format!(
        "<Response>\n  <Connect>\n    <Stream url=\"{}\" />\n  </Connect>\n</Response>\n",
        escape_xml(&url)
    )
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

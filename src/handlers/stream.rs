//! Media stream WebSocket handler
//!
//! Completes the telephony provider's upgrade on the stream path and runs
//! one call relay per accepted socket.

use axum::{
    extract::{State, ws::WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::telephony;
use crate::relay::CallRelay;
use crate::state::AppState;

/// Media stream upgrade handler
///
/// Reserves a call slot before upgrading, so a full server answers with
/// 503 instead of accepting a stream it cannot serve. The slot is held
/// until the relay has closed both connections.
pub async fn stream_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let guard = match state.registry.try_register() {
        Ok(guard) => guard,
        Err(e) => {
            warn!("Rejecting media stream: {}", e);
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "Server at capacity. Please try again later.",
            )
                .into_response();
        }
    };

    let call_id = guard.call_id();
    info!(
        call_id = %call_id,
        active_calls = state.registry.active_calls(),
        total_calls = state.registry.total_calls(),
        "Media stream upgrade requested"
    );

    let max_frame_size = state.config.max_frame_size;
    ws.max_frame_size(max_frame_size)
        .max_message_size(max_frame_size)
        .on_failed_upgrade(move |e| {
            warn!(call_id = %call_id, "Media stream upgrade failed: {}", e);
        })
        .on_upgrade(move |socket| async move {
            let relay = CallRelay::new(call_id, state.connector.clone(), state.upstream_config())
                .with_options(state.config.relay_options())
                .with_shutdown(state.shutdown.child_token());

            relay.run(telephony::accept(socket)).await;
            drop(guard);
        })
}

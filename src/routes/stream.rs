//! Media stream WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::stream::stream_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the media stream router
///
/// # Endpoint
///
/// `GET {stream_path}` - WebSocket upgrade for a telephony media stream
///
/// # Protocol
///
/// Frames are relayed verbatim between the telephony provider and the
/// upstream realtime session; the server neither parses nor answers them.
pub fn create_stream_router(stream_path: &str) -> Router<Arc<AppState>> {
    Router::new()
        .route(stream_path, get(stream_handler))
        .layer(TraceLayer::new_for_http())
}

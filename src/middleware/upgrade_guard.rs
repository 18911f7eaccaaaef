//! Upgrade guard for WebSocket requests
//!
//! Only the configured stream path may upgrade. Any other upgrade request is
//! refused before routing: the peer gets a `404 Not Found` status line with
//! an empty body and `Connection: close`, then the server closes the socket.
//! No upgrade ever happens on such a connection.
//!
//! # Example
//!
//! ```ignore
//! let app = router.layer(axum::middleware::from_fn_with_state(
//!     state.clone(),
//!     upgrade_guard_middleware,
//! ));
//! ```

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::errors::RelayError;
use crate::state::AppState;

/// Whether the request asks for a WebSocket upgrade.
pub fn is_websocket_upgrade<B>(request: &Request<B>) -> bool {
    request
        .headers()
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}

/// Middleware that rejects WebSocket upgrades outside the stream path.
///
/// Plain HTTP requests pass through untouched.
pub async fn upgrade_guard_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !is_websocket_upgrade(&request) || request.uri().path() == state.config.stream_path {
        return next.run(request).await;
    }

    let rejection = RelayError::UpgradeRejected(request.uri().path().to_string());
    tracing::debug!("{}", rejection);

    reject()
}

/// `404` status line, `Connection: close`, empty body.
fn reject() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONNECTION, HeaderValue::from_static("close"))],
        Body::empty(),
    )
        .into_response()
}

//! Health check endpoint

/// Liveness probe for load balancers and hosting platforms.
pub async fn health_check() -> &'static str {
    "OK"
}

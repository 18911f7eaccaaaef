//! Error types for the call relay.
//!
//! Every error here is scoped to a single call: none of them is allowed to
//! escape the session task that produced it.

use thiserror::Error;

/// Errors raised while establishing or running a call relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The AI provider could not be reached or refused our credentials
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The AI provider rejected the session configuration
    #[error("Upstream configuration invalid: {0}")]
    UpstreamConfigInvalid(String),

    /// A send or receive was attempted after the connection closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// A WebSocket upgrade was requested on a path other than the stream path
    #[error("Upgrade rejected for path {0}")]
    UpgradeRejected(String),

    /// Unexpected I/O error on either connection
    #[error("Transport failure: {0}")]
    TransportFailure(String),
}

impl RelayError {
    /// Whether the error is part of an ordinary hangup rather than a fault.
    ///
    /// Closed connections are the expected way for a call to end and are
    /// logged at debug level only.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, RelayError::ConnectionClosed)
    }

    /// Whether the error came from upstream session establishment.
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            RelayError::UpstreamUnavailable(_) | RelayError::UpstreamConfigInvalid(_)
        )
    }
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

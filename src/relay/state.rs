//! Call lifecycle state machine.

use std::fmt;

/// Lifecycle of one call relay.
///
/// ```text
/// Init -> UpstreamConnecting -> Relaying -> Closing -> Closed
///   |             |                 |
///   `-------------`-----------------`-> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallState {
    /// Telephony connection accepted, nothing else done yet
    Init,
    /// Waiting for the upstream session to open
    UpstreamConnecting,
    /// Forwarding frames in both directions
    Relaying,
    /// Closing whichever connections are still open
    Closing,
    /// Both connections released
    Closed,
    /// The call could not be set up
    Failed,
}

impl CallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Init => "init",
            CallState::UpstreamConnecting => "upstream_connecting",
            CallState::Relaying => "relaying",
            CallState::Closing => "closing",
            CallState::Closed => "closed",
            CallState::Failed => "failed",
        }
    }

    /// Terminal states accept no further transitions.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Closed | CallState::Failed)
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: CallState) -> bool {
        use CallState::*;
        matches!(
            (self, next),
            (Init, UpstreamConnecting)
                | (Init, Failed)
                | (UpstreamConnecting, Relaying)
                | (UpstreamConnecting, Failed)
                | (Relaying, Closing)
                | (Relaying, Failed)
                | (Closing, Closed)
        )
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two connections of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Telephony,
    Upstream,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Telephony => Side::Upstream,
            Side::Upstream => Side::Telephony,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Telephony => "telephony",
            Side::Upstream => "upstream",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The given side closed its connection
    Hangup(Side),
    /// Receiving from the given side failed
    TransportFailure { side: Side, error: String },
    /// Sending to the given side failed
    SendFailed { side: Side, error: String },
    /// The upstream session could not be opened
    UpstreamFailed(String),
    /// The process is shutting down
    Shutdown,
}

impl CloseReason {
    /// Ordinary end of a call, as opposed to a fault.
    pub fn is_normal(&self) -> bool {
        matches!(self, CloseReason::Hangup(_) | CloseReason::Shutdown)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Hangup(side) => write!(f, "{} hung up", side),
            CloseReason::TransportFailure { side, error } => {
                write!(f, "{} transport failure: {}", side, error)
            }
            CloseReason::SendFailed { side, error } => write!(f, "send to {} failed: {}", side, error),
            CloseReason::UpstreamFailed(error) => write!(f, "upstream failed: {}", error),
            CloseReason::Shutdown => f.write_str("server shutting down"),
        }
    }
}

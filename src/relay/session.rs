//! Call Relay Session.
//!
//! One [`CallRelay`] per accepted telephony stream. It opens an upstream
//! session, speaks the greeting, then forwards frames in both directions
//! until either side goes away, and finally closes both connections.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::state::{CallState, CloseReason, Side};
use crate::core::connection::{FrameSink, FrameSource, MediaConnection};
use crate::core::frame::MediaFrame;
use crate::core::upstream::{UpstreamConfig, UpstreamConnector, UpstreamSession};
use crate::errors::{RelayError, RelayResult};

/// Default number of telephony frames held while the upstream session opens.
pub const DEFAULT_PENDING_FRAME_LIMIT: usize = 256;

/// Default bound for closing one connection during teardown.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Identifier of one call, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Tunables for a single relay.
#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Telephony frames buffered while the upstream session is opening.
    /// Reading from telephony pauses when the buffer is full.
    pub pending_frame_limit: usize,
    /// Upper bound for each connection's close during teardown
    pub close_timeout: Duration,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            pending_frame_limit: DEFAULT_PENDING_FRAME_LIMIT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

/// What happened during a call, returned once both connections are closed.
#[derive(Debug, Clone)]
pub struct CallSummary {
    pub call_id: CallId,
    /// Terminal state, `Closed` or `Failed`
    pub state: CallState,
    /// Every state the call went through, in order
    pub transitions: Vec<CallState>,
    pub reason: CloseReason,
    pub upstream_session_id: Option<String>,
    pub frames_to_upstream: u64,
    pub frames_to_telephony: u64,
    pub started_at: OffsetDateTime,
    pub ended_at: OffsetDateTime,
}

impl CallSummary {
    pub fn duration(&self) -> time::Duration {
        self.ended_at - self.started_at
    }
}

enum ConnectOutcome {
    Ready {
        session: UpstreamSession,
        pending: VecDeque<MediaFrame>,
        /// Set when telephony ended while the session was opening
        telephony_ended: Option<CloseReason>,
    },
    Failed(RelayError),
    Shutdown,
}

/// Pairs one telephony connection with one upstream session.
pub struct CallRelay {
    call_id: CallId,
    connector: Arc<dyn UpstreamConnector>,
    config: Arc<UpstreamConfig>,
    options: RelayOptions,
    shutdown: CancellationToken,
    state: CallState,
    transitions: Vec<CallState>,
    started_at: OffsetDateTime,
    frames_to_upstream: u64,
    frames_to_telephony: u64,
}

impl CallRelay {
    pub fn new(
        call_id: CallId,
        connector: Arc<dyn UpstreamConnector>,
        config: Arc<UpstreamConfig>,
    ) -> Self {
        Self {
            call_id,
            connector,
            config,
            options: RelayOptions::default(),
            shutdown: CancellationToken::new(),
            state: CallState::Init,
            transitions: vec![CallState::Init],
            started_at: OffsetDateTime::now_utc(),
            frames_to_upstream: 0,
            frames_to_telephony: 0,
        }
    }

    pub fn with_options(mut self, options: RelayOptions) -> Self {
        self.options = options;
        self
    }

    /// Tear the call down when `token` is cancelled.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Drive the call to completion.
    ///
    /// Never fails: every outcome, including an upstream that cannot be
    /// opened, ends with the telephony connection closed and is reported in
    /// the returned summary.
    pub async fn run(mut self, mut telephony: MediaConnection) -> CallSummary {
        info!(call_id = %self.call_id, "Telephony stream accepted");
        self.transition(CallState::UpstreamConnecting);

        let (mut upstream, pending, telephony_ended) = match self.connect_upstream(&mut telephony).await {
            ConnectOutcome::Ready {
                session,
                pending,
                telephony_ended,
            } => (session, pending, telephony_ended),
            ConnectOutcome::Failed(e) => {
                if e.is_upstream_failure() {
                    error!(call_id = %self.call_id, "Failed to open upstream session: {}", e);
                } else {
                    warn!(call_id = %self.call_id, "Upstream open aborted: {}", e);
                }
                self.transition(CallState::Failed);
                self.close_side(Side::Telephony, telephony.close()).await;
                return self.finish(CloseReason::UpstreamFailed(e.to_string()), None);
            }
            ConnectOutcome::Shutdown => {
                info!(call_id = %self.call_id, "Upstream open abandoned for shutdown");
                self.transition(CallState::Failed);
                self.close_side(Side::Telephony, telephony.close()).await;
                return self.finish(CloseReason::Shutdown, None);
            }
        };

        let session_id = upstream.session_id().map(str::to_owned);
        info!(
            call_id = %self.call_id,
            session_id = session_id.as_deref().unwrap_or("unknown"),
            model = %upstream.info().model,
            greeting = upstream.has_pending_greeting(),
            "Upstream session ready"
        );
        self.transition(CallState::Relaying);

        let reason = match self.start_conversation(&mut upstream, pending).await {
            Err(reason) => reason,
            // Caller already gone: deliver what they said, then tear down
            Ok(()) => match telephony_ended {
                Some(reason) => reason,
                None => self.relay(&mut telephony, upstream.connection_mut()).await,
            },
        };
        self.log_close_reason(&reason);

        self.transition(CallState::Closing);
        self.close_side(Side::Upstream, upstream.close()).await;
        self.close_side(Side::Telephony, telephony.close()).await;
        self.transition(CallState::Closed);

        self.finish(reason, session_id)
    }

    /// Open the upstream session while holding early telephony frames.
    ///
    /// Telephony ending during the open stops the reads but not the open:
    /// the frames already held still reach upstream. Only shutdown abandons
    /// the open. The connector bounds the open with its connect timeout.
    async fn connect_upstream(&self, telephony: &mut MediaConnection) -> ConnectOutcome {
        let connector = Arc::clone(&self.connector);
        let config = Arc::clone(&self.config);
        let mut open = connector.open(&config);

        let limit = self.options.pending_frame_limit;
        let mut pending = VecDeque::new();
        let mut telephony_ended = None;

        loop {
            // A ready upstream wins over buffering more telephony frames
            tokio::select! {
                biased;

                result = &mut open => {
                    return match result {
                        Ok(session) => ConnectOutcome::Ready {
                            session,
                            pending,
                            telephony_ended,
                        },
                        Err(e) => ConnectOutcome::Failed(e),
                    };
                }
                _ = self.shutdown.cancelled() => return ConnectOutcome::Shutdown,
                inbound = telephony.recv(), if telephony_ended.is_none() && pending.len() < limit => match inbound {
                    Some(Ok(frame)) => {
                        pending.push_back(frame);
                        if pending.len() == limit {
                            debug!(call_id = %self.call_id, "Pending frame buffer full, pausing telephony reads");
                        }
                    }
                    Some(Err(e)) => {
                        debug!(call_id = %self.call_id, "Telephony failed while upstream opens: {}", e);
                        telephony_ended = Some(CloseReason::TransportFailure {
                            side: Side::Telephony,
                            error: e.to_string(),
                        });
                    }
                    None => {
                        debug!(call_id = %self.call_id, frames = pending.len(), "Caller hung up while upstream opens");
                        telephony_ended = Some(CloseReason::Hangup(Side::Telephony));
                    }
                },
            }
        }
    }

    /// Send the greeting, then everything telephony sent while connecting.
    async fn start_conversation(
        &mut self,
        upstream: &mut UpstreamSession,
        pending: VecDeque<MediaFrame>,
    ) -> Result<(), CloseReason> {
        match upstream.send_greeting().await {
            Ok(true) => debug!(call_id = %self.call_id, "Greeting sent"),
            Ok(false) => {}
            Err(e) => return Err(send_failure(Side::Upstream, e)),
        }

        if !pending.is_empty() {
            debug!(call_id = %self.call_id, frames = pending.len(), "Flushing pending telephony frames");
        }
        for frame in pending {
            upstream
                .connection_mut()
                .send(frame)
                .await
                .map_err(|e| send_failure(Side::Upstream, e))?;
            self.frames_to_upstream += 1;
        }
        Ok(())
    }

    /// Forward in both directions until one of them stops.
    async fn relay(
        &mut self,
        telephony: &mut MediaConnection,
        upstream: &mut MediaConnection,
    ) -> CloseReason {
        let to_upstream = forward(
            Side::Telephony,
            telephony.source.as_mut(),
            upstream.sink.as_mut(),
            &mut self.frames_to_upstream,
        );
        let to_telephony = forward(
            Side::Upstream,
            upstream.source.as_mut(),
            telephony.sink.as_mut(),
            &mut self.frames_to_telephony,
        );

        tokio::select! {
            reason = to_upstream => reason,
            reason = to_telephony => reason,
            _ = self.shutdown.cancelled() => CloseReason::Shutdown,
        }
    }

    async fn close_side(&self, side: Side, close: impl Future<Output = RelayResult<()>>) {
        match tokio::time::timeout(self.options.close_timeout, close).await {
            Ok(Ok(())) => debug!(call_id = %self.call_id, side = %side, "Connection closed"),
            Ok(Err(e)) => debug!(call_id = %self.call_id, side = %side, "Close failed: {}", e),
            Err(_) => warn!(call_id = %self.call_id, side = %side, "Close timed out"),
        }
    }

    fn transition(&mut self, next: CallState) {
        if self.state.is_terminal() || !self.state.can_transition_to(next) {
            warn!(
                call_id = %self.call_id,
                from = %self.state,
                to = %next,
                "Ignoring invalid call state transition"
            );
            return;
        }
        debug!(call_id = %self.call_id, from = %self.state, to = %next, "Call state changed");
        self.state = next;
        self.transitions.push(next);
    }

    fn log_close_reason(&self, reason: &CloseReason) {
        if reason.is_normal() {
            info!(call_id = %self.call_id, reason = %reason, "Closing call");
            return;
        }
        match reason {
            CloseReason::TransportFailure { side, error } => {
                warn!(call_id = %self.call_id, side = %side, "Transport failure: {}", error)
            }
            CloseReason::SendFailed { side, error } => {
                debug!(call_id = %self.call_id, side = %side, "Send failed: {}", error)
            }
            CloseReason::UpstreamFailed(error) => {
                error!(call_id = %self.call_id, "Upstream failed: {}", error)
            }
            CloseReason::Hangup(_) | CloseReason::Shutdown => {}
        }
    }

    fn finish(self, reason: CloseReason, upstream_session_id: Option<String>) -> CallSummary {
        let summary = CallSummary {
            call_id: self.call_id,
            state: self.state,
            transitions: self.transitions,
            reason,
            upstream_session_id,
            frames_to_upstream: self.frames_to_upstream,
            frames_to_telephony: self.frames_to_telephony,
            started_at: self.started_at,
            ended_at: OffsetDateTime::now_utc(),
        };

        info!(
            call_id = %summary.call_id,
            state = %summary.state,
            reason = %summary.reason,
            frames_to_upstream = summary.frames_to_upstream,
            frames_to_telephony = summary.frames_to_telephony,
            duration_ms = summary.duration().whole_milliseconds() as u64,
            "Call ended"
        );
        summary
    }
}

/// Copy frames from `source` to `sink` in arrival order until either fails.
async fn forward(
    from: Side,
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    forwarded: &mut u64,
) -> CloseReason {
    loop {
        let frame = match source.recv().await {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                return CloseReason::TransportFailure {
                    side: from,
                    error: e.to_string(),
                };
            }
            None => return CloseReason::Hangup(from),
        };

        if let Err(e) = sink.send(frame).await {
            return send_failure(from.opposite(), e);
        }
        *forwarded += 1;
    }
}

/// A closed destination is an ordinary end of call; anything else is a fault.
fn send_failure(side: Side, error: RelayError) -> CloseReason {
    if error.is_connection_closed() {
        CloseReason::SendFailed {
            side,
            error: error.to_string(),
        }
    } else {
        CloseReason::TransportFailure {
            side,
            error: error.to_string(),
        }
    }
}

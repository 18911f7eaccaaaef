//! Duplex connection abstraction shared by both sides of a call.
//!
//! A connection is split into a [`FrameSink`] and a [`FrameSource`] so that
//! the two forwarding directions of a relay can borrow them independently.

use async_trait::async_trait;

use super::frame::MediaFrame;
use crate::errors::RelayResult;

/// Outbound half of a connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one frame, suspending while the transport applies backpressure.
    ///
    /// Fails with `RelayError::ConnectionClosed` once the connection is closed.
    async fn send(&mut self, frame: MediaFrame) -> RelayResult<()>;

    /// Close the connection.
    ///
    /// Must be idempotent: calls after the first return `Ok(())` without
    /// touching the transport again.
    async fn close(&mut self) -> RelayResult<()>;
}

/// Inbound half of a connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Wait for the next frame.
    ///
    /// Returns `None` once the peer has closed the connection. Transport
    /// errors are reported as `Some(Err(RelayError::TransportFailure(..)))`.
    async fn recv(&mut self) -> Option<RelayResult<MediaFrame>>;
}

/// A duplex frame connection owned by exactly one call.
pub struct MediaConnection {
    pub sink: Box<dyn FrameSink>,
    pub source: Box<dyn FrameSource>,
}

impl MediaConnection {
    pub fn new(sink: Box<dyn FrameSink>, source: Box<dyn FrameSource>) -> Self {
        Self { sink, source }
    }

    pub async fn send(&mut self, frame: MediaFrame) -> RelayResult<()> {
        self.sink.send(frame).await
    }

    pub async fn recv(&mut self) -> Option<RelayResult<MediaFrame>> {
        self.source.recv().await
    }

    pub async fn close(&mut self) -> RelayResult<()> {
        self.sink.close().await
    }
}

impl std::fmt::Debug for MediaConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaConnection").finish_non_exhaustive()
    }
}

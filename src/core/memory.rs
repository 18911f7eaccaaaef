//! In-process transport.
//!
//! [`duplex`] returns a [`MediaConnection`] for the relay together with a
//! [`MemoryPeer`] that plays the remote party. Both directions run over
//! bounded channels, so a peer that stops reading applies backpressure to
//! the relay exactly like a slow socket would.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::connection::{FrameSink, FrameSource, MediaConnection};
use super::frame::MediaFrame;
use crate::errors::{RelayError, RelayResult};

/// Create a connected pair with `capacity` frames of buffering per direction.
pub fn duplex(capacity: usize) -> (MediaConnection, MemoryPeer) {
    let capacity = capacity.max(1);
    let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
    let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
    let closes = Arc::new(AtomicUsize::new(0));

    let connection = MediaConnection::new(
        Box::new(MemorySink {
            tx: Some(outbound_tx),
            closes: closes.clone(),
        }),
        Box::new(MemorySource { rx: inbound_rx }),
    );

    let peer = MemoryPeer {
        tx: Some(inbound_tx),
        rx: outbound_rx,
        closes,
    };

    (connection, peer)
}

struct MemorySink {
    tx: Option<mpsc::Sender<MediaFrame>>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, frame: MediaFrame) -> RelayResult<()> {
        let tx = self.tx.as_ref().ok_or(RelayError::ConnectionClosed)?;
        tx.send(frame)
            .await
            .map_err(|_| RelayError::ConnectionClosed)
    }

    async fn close(&mut self) -> RelayResult<()> {
        if self.tx.take().is_some() {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct MemorySource {
    rx: mpsc::Receiver<RelayResult<MediaFrame>>,
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn recv(&mut self) -> Option<RelayResult<MediaFrame>> {
        self.rx.recv().await
    }
}

/// The remote end of an in-process connection.
pub struct MemoryPeer {
    tx: Option<mpsc::Sender<RelayResult<MediaFrame>>>,
    rx: mpsc::Receiver<MediaFrame>,
    closes: Arc<AtomicUsize>,
}

impl MemoryPeer {
    /// Deliver a frame to the relay.
    pub async fn send(&self, frame: MediaFrame) -> RelayResult<()> {
        let tx = self.tx.as_ref().ok_or(RelayError::ConnectionClosed)?;
        tx.send(Ok(frame))
            .await
            .map_err(|_| RelayError::ConnectionClosed)
    }

    /// Surface a transport error on the relay's receive side.
    pub async fn fail(&self, error: RelayError) -> RelayResult<()> {
        let tx = self.tx.as_ref().ok_or(RelayError::ConnectionClosed)?;
        tx.send(Err(error))
            .await
            .map_err(|_| RelayError::ConnectionClosed)
    }

    /// Next frame sent by the relay, or `None` once the relay closed its side.
    pub async fn recv(&mut self) -> Option<MediaFrame> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`MemoryPeer::recv`].
    pub fn try_recv(&mut self) -> Option<MediaFrame> {
        self.rx.try_recv().ok()
    }

    /// Drain every frame until the relay closes its side.
    pub async fn collect(&mut self) -> Vec<MediaFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.rx.recv().await {
            frames.push(frame);
        }
        frames
    }

    /// Close the peer's sending side; the relay sees end-of-stream after
    /// draining what was already sent.
    pub fn hang_up(&mut self) {
        self.tx = None;
    }

    /// How many times the relay actually closed its side (0 or 1).
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Whether the relay closed its side of the connection.
    pub fn is_closed(&self) -> bool {
        self.close_count() > 0
    }
}

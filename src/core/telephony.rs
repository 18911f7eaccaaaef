//! Telephony Stream Endpoint.
//!
//! Wraps one upgraded media WebSocket from the telephony provider as a
//! [`MediaConnection`]. No authentication happens here: the upgrade router
//! only hands over connections that arrived on the stream path.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};

use super::connection::{FrameSink, FrameSource, MediaConnection};
use super::frame::MediaFrame;
use crate::errors::{RelayError, RelayResult};

/// Accept an upgraded telephony socket.
pub fn accept(socket: WebSocket) -> MediaConnection {
    let (sink, stream) = socket.split();
    MediaConnection::new(
        Box::new(TelephonySink { sink, closed: false }),
        Box::new(TelephonySource { stream }),
    )
}

struct TelephonySink {
    sink: SplitSink<WebSocket, Message>,
    closed: bool,
}

#[async_trait]
impl FrameSink for TelephonySink {
    async fn send(&mut self, frame: MediaFrame) -> RelayResult<()> {
        if self.closed {
            return Err(RelayError::ConnectionClosed);
        }

        let message = match frame {
            MediaFrame::Text(text) => Message::Text(text.into()),
            MediaFrame::Binary(data) => Message::Binary(data),
        };

        // axum reports a vanished peer as an error on send; by the time we
        // get here the call is over either way
        self.sink.send(message).await.map_err(|e| {
            tracing::debug!("Telephony send failed: {}", e);
            RelayError::ConnectionClosed
        })
    }

    async fn close(&mut self) -> RelayResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Err(e) = self.sink.close().await {
            tracing::debug!("Telephony close handshake failed: {}", e);
        }
        Ok(())
    }
}

struct TelephonySource {
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl FrameSource for TelephonySource {
    async fn recv(&mut self) -> Option<RelayResult<MediaFrame>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => {
                    return Some(Ok(MediaFrame::Text(text.as_str().to_owned())));
                }
                Ok(Message::Binary(data)) => return Some(Ok(MediaFrame::Binary(data))),
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "Telephony sent close frame");
                    return None;
                }
                // axum answers pings itself
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Err(e) => return Some(Err(RelayError::TransportFailure(e.to_string()))),
            }
        }
    }
}

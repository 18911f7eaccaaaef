//! Frame adapters over a client-side `tokio-tungstenite` WebSocket.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::core::connection::{FrameSink, FrameSource, MediaConnection};
use crate::core::frame::MediaFrame;
use crate::errors::{RelayError, RelayResult};

/// Wrap an established WebSocket as a [`MediaConnection`].
pub(crate) fn into_connection<S>(ws: WebSocketStream<S>) -> MediaConnection
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, stream) = ws.split();
    MediaConnection::new(
        Box::new(WsSink { sink, closed: false }),
        Box::new(WsSource { stream }),
    )
}

struct WsSink<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
    closed: bool,
}

#[async_trait]
impl<S> FrameSink for WsSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&mut self, frame: MediaFrame) -> RelayResult<()> {
        if self.closed {
            return Err(RelayError::ConnectionClosed);
        }

        let message = match frame {
            MediaFrame::Text(text) => Message::Text(text.into()),
            MediaFrame::Binary(data) => Message::Binary(data),
        };

        self.sink.send(message).await.map_err(map_send_error)
    }

    async fn close(&mut self) -> RelayResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Err(e) = self.sink.close().await {
            tracing::debug!("Upstream close handshake failed: {}", e);
        }
        Ok(())
    }
}

struct WsSource<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

#[async_trait]
impl<S> FrameSource for WsSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn recv(&mut self) -> Option<RelayResult<MediaFrame>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => {
                    return Some(Ok(MediaFrame::Text(text.as_str().to_owned())));
                }
                Ok(Message::Binary(data)) => return Some(Ok(MediaFrame::Binary(data))),
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "Upstream sent close frame");
                    return None;
                }
                // tungstenite queues pongs on its own
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                    return None;
                }
                Err(e) => return Some(Err(RelayError::TransportFailure(e.to_string()))),
            }
        }
    }
}

fn map_send_error(error: tungstenite::Error) -> RelayError {
    match error {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            RelayError::ConnectionClosed
        }
        tungstenite::Error::Io(e)
            if matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset
            ) =>
        {
            RelayError::ConnectionClosed
        }
        other => RelayError::TransportFailure(other.to_string()),
    }
}

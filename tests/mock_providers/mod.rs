//! Mock upstream providers
//!
//! - [`ScriptedConnector`]: in-memory upstream connector whose sessions are
//!   driven by the test through [`MemoryPeer`]s
//! - [`realtime_mock`]: WebSocket server speaking the OpenAI Realtime
//!   handshake
//!
//! Failure modes: unreachable provider, rejected configuration, slow or
//! never-completing session establishment.

// Not every test binary uses every helper
#![allow(dead_code)]

pub mod realtime_mock;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{Mutex, mpsc};

use waav_relay::core::memory::{MemoryPeer, duplex};
use waav_relay::{
    MediaFrame, RelayError, RelayResult, SessionInfo, UpstreamConfig, UpstreamConnector,
    UpstreamSession,
};

/// How [`ScriptedConnector::open`] behaves.
#[derive(Clone, Debug)]
pub enum ConnectBehavior {
    /// Open a session after the given delay
    Accept { delay: Duration },
    /// Fail as an unreachable provider
    Unavailable,
    /// Fail as a provider rejecting the configuration
    ConfigInvalid,
    /// Never finish opening
    Hang,
}

/// Upstream connector backed by in-memory connections.
///
/// Every opened session's remote end is delivered on the channel returned
/// by [`ScriptedConnector::new`].
pub struct ScriptedConnector {
    behavior: ConnectBehavior,
    peers: mpsc::UnboundedSender<MemoryPeer>,
    opens: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(behavior: ConnectBehavior) -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let connector = Self {
            behavior,
            peers,
            opens: AtomicUsize::new(0),
        };
        (connector, rx)
    }

    pub fn accepting() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        Self::new(ConnectBehavior::Accept {
            delay: Duration::ZERO,
        })
    }

    /// Number of `open` calls so far.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamConnector for ScriptedConnector {
    async fn open(&self, config: &UpstreamConfig) -> RelayResult<UpstreamSession> {
        let n = self.opens.fetch_add(1, Ordering::SeqCst) + 1;

        match &self.behavior {
            ConnectBehavior::Accept { delay } => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
            }
            ConnectBehavior::Unavailable => {
                return Err(RelayError::UpstreamUnavailable(
                    "connection refused".to_string(),
                ));
            }
            ConnectBehavior::ConfigInvalid => {
                return Err(RelayError::UpstreamConfigInvalid(
                    "invalid_request_error: unknown model".to_string(),
                ));
            }
            ConnectBehavior::Hang => std::future::pending::<()>().await,
        }

        let (connection, peer) = duplex(64);
        self.peers
            .send(peer)
            .map_err(|_| RelayError::UpstreamUnavailable("test dropped receiver".to_string()))?;

        let info = SessionInfo {
            session_id: Some(format!("sess_mock_{n}")),
            model: config.model.clone(),
            voice: config.voice.clone(),
        };
        let session = UpstreamSession::new(info, connection);
        Ok(match config.greeting.as_deref() {
            Some(greeting) => session.with_greeting(greeting_frame(greeting)),
            None => session,
        })
    }
}

/// The `response.create` command a session sends for `instructions`.
pub fn greeting_frame(instructions: &str) -> MediaFrame {
    MediaFrame::text(
        json!({
            "type": "response.create",
            "response": { "instructions": instructions }
        })
        .to_string(),
    )
}

/// Config with a test key and a recognizable greeting.
pub fn test_upstream_config() -> UpstreamConfig {
    UpstreamConfig {
        api_key: zeroize::Zeroizing::new("sk-test".to_string()),
        greeting: Some("Say: 'Hello caller'".to_string()),
        ..Default::default()
    }
}

/// Next upstream peer, failing the test if none shows up in time.
pub async fn next_peer(rx: &mut mpsc::UnboundedReceiver<MemoryPeer>) -> MemoryPeer {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("upstream session was not opened in time")
        .expect("connector dropped")
}

/// Shared slot for values captured inside mock servers.
pub type Captured<T> = std::sync::Arc<Mutex<Vec<T>>>;

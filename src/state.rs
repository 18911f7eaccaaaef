//! Shared application state.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::core::upstream::{OpenAIRealtimeConnector, UpstreamConfig, UpstreamConnector};
use crate::relay::SessionRegistry;

/// State shared by every request handler.
///
/// Everything here is either immutable or internally synchronized; calls
/// never reach each other's connections through it.
pub struct AppState {
    pub config: ServerConfig,
    /// Opens upstream sessions; replaced by in-memory fakes in tests
    pub connector: Arc<dyn UpstreamConnector>,
    pub registry: Arc<SessionRegistry>,
    /// Cancelled on process shutdown; each call runs under a child token
    pub shutdown: CancellationToken,
    upstream: Arc<UpstreamConfig>,
}

impl AppState {
    /// State backed by the OpenAI Realtime connector.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Self::with_connector(config, Arc::new(OpenAIRealtimeConnector::new()))
    }

    pub fn with_connector(config: ServerConfig, connector: Arc<dyn UpstreamConnector>) -> Arc<Self> {
        let registry = Arc::new(SessionRegistry::new(config.max_concurrent_calls));
        let upstream = Arc::new(config.upstream_config());

        Arc::new(Self {
            config,
            connector,
            registry,
            shutdown: CancellationToken::new(),
            upstream,
        })
    }

    /// Upstream settings shared by every call.
    pub fn upstream_config(&self) -> Arc<UpstreamConfig> {
        Arc::clone(&self.upstream)
    }

    pub fn active_calls(&self) -> usize {
        self.registry.active_calls()
    }
}

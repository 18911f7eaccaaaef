//! OpenAI Realtime API upstream.

mod client;
mod config;
mod messages;

pub use client::OpenAIRealtimeConnector;
pub use config::{
    DEFAULT_REALTIME_MODEL, OPENAI_REALTIME_URL, OpenAIRealtimeAudioFormat, OpenAIRealtimeVoice,
};
pub use messages::{ApiError, ClientEvent, ResponseConfig, ServerEvent, Session, SessionConfig};

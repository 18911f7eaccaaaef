pub mod connection;
pub mod frame;
pub mod memory;
pub mod telephony;
pub mod upstream;

// Re-export commonly used types for convenience
pub use connection::{FrameSink, FrameSource, MediaConnection};
pub use frame::MediaFrame;
pub use upstream::{
    OpenAIRealtimeConnector, SessionInfo, UpstreamConfig, UpstreamConnector, UpstreamSession,
};

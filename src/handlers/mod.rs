//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `voice` - Telephony voice webhook answering with TwiML
//! - `stream` - Media stream WebSocket upgrade

pub mod api;
pub mod stream;
pub mod voice;

// Re-export commonly used handlers for convenient access
pub use api::health_check;
pub use stream::stream_handler;
pub use voice::voice_webhook;

pub mod config;
pub mod core;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod relay;
pub mod routes;
pub mod state;

// Re-export commonly used items for convenience
pub use config::ServerConfig;
pub use crate::core::*;
pub use errors::{RelayError, RelayResult};
pub use relay::{CallRelay, CallState, CallSummary, SessionRegistry};
pub use state::AppState;

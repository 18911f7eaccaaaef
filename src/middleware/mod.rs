pub mod upgrade_guard;

// Re-export middleware functions
pub use upgrade_guard::{is_websocket_upgrade, upgrade_guard_middleware};

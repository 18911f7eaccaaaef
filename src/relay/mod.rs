//! Call Relay Session and the registry of live calls.
//!
//! A [`CallRelay`] pairs one telephony connection with one upstream session
//! and forwards frames between them until either side goes away. The
//! [`SessionRegistry`] only counts calls; relays never share state.

mod registry;
mod session;
mod state;

pub use registry::{CallGuard, RegistryError, SessionRegistry};
pub use session::{CallId, CallRelay, CallSummary, RelayOptions};
pub use state::{CallState, CloseReason, Side};

//! Bookkeeping for live calls.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use thiserror::Error;

use super::session::CallId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Call capacity reached: {active} of {max} calls active")]
    CapacityReached { active: usize, max: usize },
}

/// Counts live calls and enforces the optional concurrency cap.
///
/// Calls are independent; the registry never hands out access to another
/// call's connections.
#[derive(Debug)]
pub struct SessionRegistry {
    active: AtomicUsize,
    total: AtomicU64,
    max_calls: Option<usize>,
}

impl SessionRegistry {
    pub fn new(max_calls: Option<usize>) -> Self {
        Self {
            active: AtomicUsize::new(0),
            total: AtomicU64::new(0),
            max_calls,
        }
    }

    /// Reserve a slot for a new call.
    ///
    /// The slot is released when the returned guard is dropped.
    pub fn try_register(self: &Arc<Self>) -> Result<CallGuard, RegistryError> {
        let mut current = self.active.load(Ordering::SeqCst);
        loop {
            if let Some(max) = self.max_calls
                && current >= max
            {
                return Err(RegistryError::CapacityReached {
                    active: current,
                    max,
                });
            }

            match self.active.compare_exchange_weak(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        self.total.fetch_add(1, Ordering::Relaxed);
        Ok(CallGuard {
            call_id: CallId::new(),
            registry: Arc::clone(self),
        })
    }

    pub fn active_calls(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Calls registered since startup.
    pub fn total_calls(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn max_calls(&self) -> Option<usize> {
        self.max_calls
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

/// A registered call. Dropping it releases the slot.
#[derive(Debug)]
pub struct CallGuard {
    call_id: CallId,
    registry: Arc<SessionRegistry>,
}

impl CallGuard {
    pub fn call_id(&self) -> CallId {
        self.call_id
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.registry.active.fetch_sub(1, Ordering::SeqCst);
    }
}

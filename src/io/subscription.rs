//! Cancellable subscription handle shared by the geolocation and
//! realtime channels
//!
//! Delivery tasks check liveness immediately before invoking the
//! callback, so no callback fires after `cancel` returns even for
//! events that were already queued.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Liveness flag shared between a subscription handle and its delivery
/// task
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_live(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn kill(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Handle to a running subscription. Dropping the handle does not
/// cancel delivery; call `cancel` explicitly.
pub struct Subscription {
    liveness: Liveness,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Subscription {
    pub fn new(liveness: Liveness, handle: JoinHandle<()>) -> Self {
        Self { liveness, handle: Mutex::new(Some(handle)) }
    }

    /// Stop delivery immediately. Idempotent: calling twice has the same
    /// observable effect as calling once.
    pub fn cancel(&self) {
        self.liveness.kill();
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }

    /// Whether the subscription is still delivering
    pub fn is_live(&self) -> bool {
        self.liveness.is_live()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("live", &self.is_live()).finish()
    }
}

//! Admission-gate shutdown coordination.
//!
//! A [`ShutdownGate`] shared across sweep tasks lets a Ctrl+C handler stop the
//! engine from issuing *new* quota admissions while the in-flight provider
//! call is allowed to complete, so its (already paid for) outcome still
//! reaches the result store.

use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Shared handle to a shutdown gate.
pub type SharedShutdown = Arc<ShutdownGate>;

static GLOBAL_SHUTDOWN: OnceCell<SharedShutdown> = OnceCell::new();

/// Register a global shutdown handle so executors can discover it lazily.
pub fn set_global_shutdown(handle: SharedShutdown) {
    let _ = GLOBAL_SHUTDOWN.set(handle);
}

/// Retrieve the registered global shutdown handle, if available.
pub fn get_global_shutdown() -> Option<SharedShutdown> {
    GLOBAL_SHUTDOWN.get().cloned()
}

/// Gates new admissions during shutdown.
///
/// Requesting a stop never cancels work already past admission; it only
/// prevents the dispatch loop from starting the next task or re-admitting a
/// throttled one.
#[derive(Debug, Default)]
pub struct ShutdownGate {
    stop_requested: AtomicBool,
    notify: Notify,
}

impl ShutdownGate {
    /// Create a new gate.
    pub fn new() -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Create a new shared gate wrapped in [`Arc`].
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Request a stop. Notifies all waiters exactly once.
    pub fn request_stop(&self) {
        if !self.stop_requested.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Wait until a stop is requested. Returns immediately if already set.
    pub async fn wait_for_stop(&self) {
        if self.is_stop_requested() {
            return;
        }
        self.notify.notified().await;
    }
}

//! Job control for cancel/restart: abort tokens and the control socket path.
//!
//! Each running object job owns an [`AbortToken`]. `stop()` trips the token;
//! the job observes it at its next suspension point and unwinds.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Cooperative cancellation flag shared between a job task and its controller.
#[derive(Clone, Default)]
pub struct AbortToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    aborted: AtomicBool,
    notify: Notify,
}

impl AbortToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request abort. Wakes every task waiting in [`AbortToken::aborted`].
    pub fn request_abort(&self) {
        self.inner.aborted.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// Resolves once abort has been requested.
    pub async fn aborted(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }
}

/// Default path for the control socket (same XDG state dir as the DB).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("seedpin")?.get_state_home();
    Ok(dir.join("control.sock"))
}

//! Cooperative cancellation with parent/child linking.
//!
//! A [`CancellationToken`] is a shared flag that asynchronous work checks at
//! well-defined checkpoints. Nothing is interrupted preemptively: a task that
//! is already past its last checkpoint runs to completion, and its caller is
//! responsible for discarding the result.
//!
//! Tokens form a tree. [`CancellationToken::child_token`] creates a token
//! that is cancelled whenever its parent is, but which can also be cancelled
//! on its own without affecting the parent. The fetch coordinator uses this to
//! link a per-request token to the lifetime token of the UI that issued it.
//!
//! # Example
//!
//! ```
//! use exhibit_core::CancellationToken;
//!
//! let lifetime = CancellationToken::new();
//! let request = lifetime.child_token();
//!
//! request.cancel();
//! assert!(!lifetime.is_cancelled());
//!
//! let next_request = lifetime.child_token();
//! lifetime.cancel();
//! assert!(next_request.is_cancelled());
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::logging::targets;

struct CancellationState {
    cancelled: AtomicBool,
    notify: Notify,
    children: Mutex<Vec<Weak<CancellationState>>>,
}

impl CancellationState {
    fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
            children: Mutex::new(Vec::new()),
        }
    }

    fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.notify.notify_waiters();

        let children = std::mem::take(&mut *self.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
        true
    }
}

/// A token for cooperative cancellation of asynchronous work.
///
/// Cloning a token yields a handle to the same flag.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationState>,
}

impl CancellationToken {
    /// Create a new, uncancelled root token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancellationState::new()),
        }
    }

    /// Create a token linked to this one.
    ///
    /// The child is cancelled when this token is cancelled (immediately, if it
    /// already is). Cancelling the child leaves this token untouched.
    pub fn child_token(&self) -> CancellationToken {
        let child = Arc::new(CancellationState::new());
        {
            let mut children = self.inner.children.lock();
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(&child));
        }
        // Checked after registering so a concurrent cancel() cannot slip
        // between the check and the push.
        if self.is_cancelled() {
            child.cancel();
        }
        CancellationToken { inner: child }
    }

    /// Check if cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Request cancellation of this token and all of its descendants.
    ///
    /// Cancelling an already-cancelled token is a no-op.
    pub fn cancel(&self) {
        if self.inner.cancel() {
            tracing::trace!(target: targets::CANCEL, "token cancelled");
        }
    }

    /// Wait until this token is cancelled.
    ///
    /// Completes immediately if it already is.
    pub async fn cancelled(&self) {
        loop {
            let mut notified = std::pin::pin!(self.inner.notify.notified());
            notified.as_mut().enable();

            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

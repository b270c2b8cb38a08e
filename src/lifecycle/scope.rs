//! Execution-context scope for a running instance.

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Cancellable lifetime boundary handed to a runtime instance.
///
/// Clones share the same signal. The controller keeps one clone and the
/// runtime keeps the others; cancelling any of them cancels all.
#[derive(Debug, Clone, Default)]
pub struct RunScope {
    token: CancellationToken,
}

impl RunScope {
    /// Create a fresh, uncancelled scope.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Signal cancellation. Repeated calls have no further effect.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the scope is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

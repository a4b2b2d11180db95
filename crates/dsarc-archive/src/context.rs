//! Per-operation context: cancellation plus progress reporting

use crate::cancel::CancellationToken;
use crate::error::{ArchiveError, ArchiveResult};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

/// Receiver of `(completed, total)` progress updates
///
/// Called synchronously from the worker running the operation.
pub trait Progress: Send + Sync {
    /// Report that `completed` of `total` units are done
    fn report(&self, completed: usize, total: usize);
}

impl<F> Progress for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn report(&self, completed: usize, total: usize) {
        self(completed, total);
    }
}

/// Progress sink that discards every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn report(&self, _completed: usize, _total: usize) {}
}

/// Cancellation token and progress sink threaded through every engine call
#[derive(Clone)]
pub struct OpContext {
    token: CancellationToken,
    progress: Arc<dyn Progress>,
}

impl fmt::Debug for OpContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpContext")
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Default for OpContext {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

impl OpContext {
    /// Create a context governed by `token` with no progress sink
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            progress: Arc::new(NoProgress),
        }
    }

    /// Attach a progress sink
    #[must_use]
    pub fn with_progress<P: Progress + 'static>(mut self, progress: P) -> Self {
        self.progress = Arc::new(progress);
        self
    }

    /// Attach a shared progress sink
    #[must_use]
    pub fn with_shared_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    /// Token governing this operation
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fail with [`ArchiveError::Cancelled`] once cancellation is requested
    pub fn checkpoint(&self) -> ArchiveResult<()> {
        if self.token.is_cancelled() {
            return Err(ArchiveError::Cancelled);
        }
        Ok(())
    }

    /// Forward a progress update
    pub fn report(&self, completed: usize, total: usize) {
        self.progress.report(completed, total);
    }

    /// Record observer for the codec loops
    ///
    /// Breaks as soon as the token is cancelled.
    pub fn observer(&self) -> impl FnMut(usize, usize) -> ControlFlow<()> + '_ {
        move |_, _| {
            if self.token.is_cancelled() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        }
    }
}

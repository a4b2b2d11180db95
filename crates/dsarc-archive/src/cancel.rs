//! Cooperative cancellation and operation outcomes

use crate::error::{ArchiveError, ArchiveResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cancellation token for long-running archive operations
///
/// Clones share the same flag. Engines poll it at every entry, record and
/// directory checkpoint.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    /// Create a new cancellation token
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel the operation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Check if the operation has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Wait until the operation is cancelled
    pub async fn cancelled(&self) {
        // Simple polling approach - check every 10ms
        while !self.is_cancelled() {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }
}

/// Terminal result of an operation that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The operation ran to completion
    Completed(T),
    /// The operation observed its cancellation token and stopped
    Cancelled,
}

impl<T> Outcome<T> {
    /// Settle an engine result against the token that governed it
    ///
    /// A cancelled token wins over any error raised after the cancellation
    /// point, and cancellation errors never surface as `Err`.
    pub fn settle(token: &CancellationToken, result: ArchiveResult<T>) -> ArchiveResult<Self> {
        if token.is_cancelled() {
            return Ok(Self::Cancelled);
        }
        match result {
            Ok(value) => Ok(Self::Completed(value)),
            Err(err) if err.is_cancelled() => Ok(Self::Cancelled),
            Err(err) => Err(err),
        }
    }

    /// Whether the operation was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The completed value, if any
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Cancelled => None,
        }
    }

    /// Map the completed value
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Completed(value) => Outcome::Completed(f(value)),
            Self::Cancelled => Outcome::Cancelled,
        }
    }

    /// Convert into a plain result, treating cancellation as an error
    pub fn into_result(self) -> ArchiveResult<T> {
        self.completed().ok_or(ArchiveError::Cancelled)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_settle_completed() {
        let token = CancellationToken::new();
        let outcome = Outcome::settle(&token, Ok(5)).expect("not an error");
        assert_eq!(outcome, Outcome::Completed(5));
    }

    #[test]
    fn test_settle_cancelled_wins_over_error() {
        let token = CancellationToken::new();
        token.cancel();
        let outcome: Outcome<()> =
            Outcome::settle(&token, Err(ArchiveError::MissingSource("x".into())))
                .expect("cancellation is not an error");
        assert!(outcome.is_cancelled());
    }

    #[test]
    fn test_settle_propagates_real_errors() {
        let token = CancellationToken::new();
        let result: ArchiveResult<Outcome<()>> =
            Outcome::settle(&token, Err(ArchiveError::NoEntries));
        assert!(matches!(result, Err(ArchiveError::NoEntries)));
    }

    #[test]
    fn test_settle_maps_cancel_error() {
        let token = CancellationToken::new();
        let outcome: Outcome<()> =
            Outcome::settle(&token, Err(ArchiveError::Cancelled)).expect("not an error");
        assert_eq!(outcome, Outcome::Cancelled);
        assert!(matches!(
            outcome.into_result(),
            Err(ArchiveError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let token = CancellationToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        token.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("should resolve")
            .expect("task should not panic");
    }
}

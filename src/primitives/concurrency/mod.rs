#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::types::{GraphError, Result};

/// Default budget for a long-running read.
pub const DEFAULT_ALGORITHM_TIMEOUT: Duration = Duration::from_secs(60);
/// Hard ceiling on any budget.
pub const MAX_ALGORITHM_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Shared flag a caller flips to abandon in-flight work.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Point in time after which a long-running read gives up with
/// [`GraphError::Timeout`], optionally tied to a [`CancelToken`].
#[derive(Clone, Debug)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
    cancel: Option<CancelToken>,
}

impl Deadline {
    /// Deadline `budget` from now, clamped to [`MAX_ALGORITHM_TIMEOUT`].
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget: budget.min(MAX_ALGORITHM_TIMEOUT),
            cancel: None,
        }
    }

    /// Deadline with the default 60 second budget.
    pub fn default_budget() -> Self {
        Self::after(DEFAULT_ALGORITHM_TIMEOUT)
    }

    /// Attaches a cancellation token.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Budget this deadline was created with.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    /// Whether the deadline passed or the token was cancelled.
    pub fn is_expired(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
            || self.started.elapsed() >= self.budget
    }

    /// Returns `Timeout` once expired or cancelled. Call at loop boundaries.
    pub fn check(&self) -> Result<()> {
        if self.is_expired() {
            return Err(GraphError::Timeout(self.budget));
        }
        Ok(())
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::default_budget()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorKind;

    #[test]
    fn budget_is_clamped() {
        let deadline = Deadline::after(Duration::from_secs(3600));
        assert_eq!(deadline.budget(), MAX_ALGORITHM_TIMEOUT);
        assert!(deadline.check().is_ok());
        assert!(deadline.remaining() > Duration::from_secs(290));
    }

    #[test]
    fn zero_budget_times_out() {
        let deadline = Deadline::after(Duration::ZERO);
        let err = deadline.check().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn cancel_is_seen_by_clones() {
        let token = CancelToken::new();
        let deadline = Deadline::default().with_cancel(token.clone());
        assert!(deadline.check().is_ok());
        token.cancel();
        assert!(matches!(deadline.check(), Err(GraphError::Timeout(_))));
    }
}

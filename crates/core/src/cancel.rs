//! Cooperative cancellation for long-running aggregations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{AnalyticsError, AnalyticsResult};

/// Stop flag plus optional deadline, shared between a caller and the engine.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    stopped: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that also expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            stopped: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Token that never fires.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Returns `Cancelled` once the flag is set or the deadline passed.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Cancelled` when the token has fired.
    pub fn check(&self) -> AnalyticsResult<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(AnalyticsError::Cancelled("cancelled by caller".to_string()));
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(AnalyticsError::Cancelled("deadline exceeded".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancellationToken::new();
        let handle = token.clone();
        assert!(token.check().is_ok());

        handle.cancel();
        assert!(token.is_cancelled());
        assert_eq!(
            token.check(),
            Err(AnalyticsError::Cancelled("cancelled by caller".to_string()))
        );
    }

    #[test]
    fn expired_deadline_cancels() {
        let token = CancellationToken::with_timeout(Duration::ZERO);
        assert_eq!(
            token.check(),
            Err(AnalyticsError::Cancelled("deadline exceeded".to_string()))
        );
        assert!(CancellationToken::with_timeout(Duration::from_secs(3600)).check().is_ok());
    }
}

//! Recovery strategy definition.

use std::sync::Arc;
use std::time::Duration;

use crate::error::DataTableError;
use crate::model::Value;

/// What a pipeline stage should do in place of the failed operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Fallback {
    /// Treat the row as passing the failed check (fail open).
    Include,
    /// Treat the row as failing the failed check.
    Exclude,
    /// Treat the compared pair as equal.
    Equal,
    /// Use this value instead of the failed result.
    Value(Value),
    /// Render the cell as the plain text of its value.
    PlainText,
    /// Disable virtualization and materialize every row for this pass.
    RenderAll,
    /// Restore the original value of the failed edit.
    Rollback,
    /// Keep the data currently held by the table.
    KeepCurrent,
    /// Give up; the error is returned to the caller.
    Abort,
}

type RecoverFn = Arc<dyn Fn(&DataTableError) -> bool + Send + Sync>;
type FallbackFn = Arc<dyn Fn(&DataTableError) -> Fallback + Send + Sync>;

/// How a single error code is recovered.
///
/// `recover` gets the first word: returning `true` means the error healed
/// itself and needs no fallback or reporting. Otherwise `fallback` decides
/// what the stage does instead. `max_attempts` and `retry_delay` govern
/// retried operations (remote fetches and edit commits).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tabula_lib::recovery::{Fallback, RecoveryStrategy};
///
/// // Fail closed instead of open, no retries.
/// let strict_filters = RecoveryStrategy::new(Fallback::Exclude);
///
/// // Retry fetches five times, 200ms apart.
/// let patient_fetch = RecoveryStrategy::new(Fallback::KeepCurrent)
///     .max_attempts(5)
///     .retry_delay(Duration::from_millis(200));
/// ```
#[derive(Clone)]
pub struct RecoveryStrategy {
    /// Self-heal check.
    pub recover: RecoverFn,
    /// Fallback selection.
    pub fallback: FallbackFn,
    /// Total attempts for retried operations (at least one).
    pub max_attempts: u32,
    /// Delay between attempts.
    pub retry_delay: Duration,
}

impl RecoveryStrategy {
    /// Creates a strategy that never self-heals and always falls back to
    /// `fallback`, with a single attempt.
    pub fn new(fallback: Fallback) -> Self {
        Self {
            recover: Arc::new(|_: &DataTableError| false),
            fallback: Arc::new(move |_: &DataTableError| fallback.clone()),
            max_attempts: 1,
            retry_delay: Duration::ZERO,
        }
    }

    /// Sets the self-heal check.
    pub fn with_recover(
        mut self,
        recover: impl Fn(&DataTableError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.recover = Arc::new(recover);
        self
    }

    /// Sets a computed fallback.
    pub fn with_fallback(
        mut self,
        fallback: impl Fn(&DataTableError) -> Fallback + Send + Sync + 'static,
    ) -> Self {
        self.fallback = Arc::new(fallback);
        self
    }

    /// Sets the number of attempts for retried operations.
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    /// Sets the delay between attempts.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

impl std::fmt::Debug for RecoveryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryStrategy")
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

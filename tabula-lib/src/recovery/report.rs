//! Error reporting to the host.

use std::collections::HashMap;

use super::Fallback;
use super::Recovery;
use super::RecoveryRegistry;
use crate::error::DataTableError;
use crate::error::ErrorCode;

/// The host's error channel.
///
/// Receives every error that was not self-healed, once per operation.
/// Closures implement this trait directly.
pub trait ErrorSink: Send + Sync {
    /// Called with each reported error.
    fn report(&self, error: &DataTableError);
}

impl<F> ErrorSink for F
where
    F: Fn(&DataTableError) + Send + Sync,
{
    fn report(&self, error: &DataTableError) {
        self(error)
    }
}

/// Collects the errors of one operation (a pipeline pass, an export, a
/// commit), keeping only the first occurrence of each code.
///
/// Repeated occurrences are counted into the kept error's `occurrences`
/// context entry instead of being reported again.
#[derive(Debug)]
pub(crate) struct Incidents<'a> {
    registry: &'a RecoveryRegistry,
    operation: &'static str,
    first: Vec<DataTableError>,
    counts: HashMap<ErrorCode, usize>,
    aborted: Option<DataTableError>,
}

impl<'a> Incidents<'a> {
    pub(crate) fn new(registry: &'a RecoveryRegistry, operation: &'static str) -> Self {
        Self {
            registry,
            operation,
            first: Vec::new(),
            counts: HashMap::new(),
            aborted: None,
        }
    }

    /// Consults the registry and records the error unless it healed.
    ///
    /// `healed` is what the stage does when the strategy reports the error
    /// as self-healed.
    pub(crate) fn handle(&mut self, error: DataTableError, healed: Fallback) -> Fallback {
        match self.registry.handle(&error) {
            Recovery::Healed => {
                log::debug!("[{}] self-healed {}", self.operation, error);
                healed
            }
            Recovery::Fallback(fallback) => {
                if fallback == Fallback::Abort && self.aborted.is_none() {
                    self.aborted = Some(error.clone());
                }
                let count = self.counts.entry(error.code).or_insert(0);
                *count += 1;
                if *count == 1 {
                    self.first.push(error);
                }
                fallback
            }
        }
    }

    /// Returns `true` if nothing was recorded.
    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.first.is_empty()
    }

    /// The first error whose strategy chose [`Fallback::Abort`].
    ///
    /// Stages keep going with their neutral behavior; the operation as a
    /// whole then fails with this error.
    pub(crate) fn aborted(&self) -> Option<DataTableError> {
        self.aborted.clone()
    }

    /// Finalizes the operation, returning one error per code.
    pub(crate) fn finish(self) -> Vec<DataTableError> {
        let Self {
            operation,
            first,
            counts,
            ..
        } = self;
        first
            .into_iter()
            .map(|error| {
                let occurrences = counts.get(&error.code).copied().unwrap_or(1);
                log::warn!("[{operation}] {error} ({occurrences} occurrence(s))");
                error
                    .with_context("operation", operation)
                    .with_context("occurrences", occurrences)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::RecoveryStrategy;

    #[test]
    fn test_reports_once_per_code() {
        let registry = RecoveryRegistry::default();
        let mut incidents = Incidents::new(&registry, "filter");
        for row in 0..5 {
            let fallback = incidents.handle(
                DataTableError::new(ErrorCode::FilterFailed, "boom").with_context("row_id", row),
                Fallback::Include,
            );
            assert_eq!(fallback, Fallback::Include);
        }
        incidents.handle(DataTableError::new(ErrorCode::SortFailed, "tie"), Fallback::Equal);

        let reported = incidents.finish();
        assert_eq!(reported.len(), 2);
        assert_eq!(reported[0].code, ErrorCode::FilterFailed);
        assert_eq!(reported[0].context_value("occurrences"), Some(&serde_json::json!(5)));
        assert_eq!(reported[0].context_value("row_id"), Some(&serde_json::json!(0)));
    }

    #[test]
    fn test_healed_errors_are_not_reported() {
        let registry = RecoveryRegistry::default().with_strategy(
            ErrorCode::FilterFailed,
            RecoveryStrategy::new(Fallback::Include).with_recover(|_| true),
        );
        let mut incidents = Incidents::new(&registry, "filter");
        let fallback =
            incidents.handle(DataTableError::new(ErrorCode::FilterFailed, "boom"), Fallback::Include);
        assert_eq!(fallback, Fallback::Include);
        assert!(incidents.is_empty());
        assert!(incidents.finish().is_empty());
    }

    #[test]
    fn test_abort_is_remembered() {
        let registry = RecoveryRegistry::default()
            .with_strategy(ErrorCode::SortFailed, RecoveryStrategy::new(Fallback::Abort));
        let mut incidents = Incidents::new(&registry, "sort");
        let fallback =
            incidents.handle(DataTableError::new(ErrorCode::SortFailed, "cmp"), Fallback::Equal);
        assert_eq!(fallback, Fallback::Abort);
        assert_eq!(incidents.aborted().map(|e| e.code), Some(ErrorCode::SortFailed));
        assert_eq!(incidents.finish().len(), 1);
    }
}

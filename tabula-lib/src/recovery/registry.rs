//! Registry mapping error codes to recovery strategies.

use std::collections::HashMap;
use std::time::Duration;

use super::Fallback;
use super::RecoveryStrategy;
use crate::error::DataTableError;
use crate::error::ErrorCode;
use crate::error::guard;

/// Outcome of consulting the registry about an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Recovery {
    /// The strategy's `recover` check returned `true`.
    Healed,
    /// The stage should apply this fallback and report the error.
    Fallback(Fallback),
}

/// Recovery strategies keyed by strategy id.
///
/// A strategy id is the string id of the [`ErrorCode`] it handles
/// (`"FILTER_ERROR"`, `"EDIT_FAILED"`, ...). Each table instance owns its
/// registry; there is no process-wide default to mutate.
///
/// # Example
///
/// ```
/// use tabula_lib::error::ErrorCode;
/// use tabula_lib::recovery::{Fallback, RecoveryRegistry, RecoveryStrategy};
///
/// let registry = RecoveryRegistry::default()
///     .with_strategy(ErrorCode::FilterFailed, RecoveryStrategy::new(Fallback::Exclude));
///
/// assert_eq!(registry.fallback_for(ErrorCode::FilterFailed), Fallback::Exclude);
/// assert_eq!(registry.fallback_for(ErrorCode::SortFailed), Fallback::Equal);
/// ```
#[derive(Debug, Clone)]
pub struct RecoveryRegistry {
    strategies: HashMap<String, RecoveryStrategy>,
}

impl Default for RecoveryRegistry {
    fn default() -> Self {
        let mut strategies = HashMap::new();
        for code in ErrorCode::ALL {
            strategies.insert(code.as_str().to_string(), Self::builtin(code));
        }
        Self { strategies }
    }
}

impl RecoveryRegistry {
    /// Creates a registry holding the built-in strategies.
    pub fn new() -> Self {
        Self::default()
    }

    fn builtin(code: ErrorCode) -> RecoveryStrategy {
        match code {
            ErrorCode::FilterFailed => RecoveryStrategy::new(Fallback::Include),
            ErrorCode::SortFailed => RecoveryStrategy::new(Fallback::Equal),
            ErrorCode::AggregationFailed => RecoveryStrategy::new(Fallback::Value(crate::model::Value::Null)),
            ErrorCode::RenderFailed => RecoveryStrategy::new(Fallback::PlainText),
            ErrorCode::VirtualizationFailed => RecoveryStrategy::new(Fallback::RenderAll),
            ErrorCode::EditFailed => RecoveryStrategy::new(Fallback::Rollback),
            ErrorCode::DataFetchFailed => RecoveryStrategy::new(Fallback::KeepCurrent)
                .max_attempts(3)
                .retry_delay(Duration::from_secs(1)),
            _ => RecoveryStrategy::new(Fallback::Abort),
        }
    }

    /// Overrides the strategy for `code`.
    pub fn with_strategy(mut self, code: ErrorCode, strategy: RecoveryStrategy) -> Self {
        self.strategies.insert(code.as_str().to_string(), strategy);
        self
    }

    /// Merges `overrides` over this registry; entries in `overrides` win.
    pub fn merge(mut self, overrides: HashMap<String, RecoveryStrategy>) -> Self {
        self.strategies.extend(overrides);
        self
    }

    /// Returns the strategy for `code`.
    pub fn strategy(&self, code: ErrorCode) -> RecoveryStrategy {
        self.strategies
            .get(code.as_str())
            .cloned()
            .unwrap_or_else(|| Self::builtin(code))
    }

    /// Returns the fallback `code` resolves to for a bare error of that code.
    pub fn fallback_for(&self, code: ErrorCode) -> Fallback {
        let strategy = self.strategy(code);
        let error = DataTableError::new(code, "");
        guard(|| Ok((strategy.fallback)(&error))).unwrap_or(Fallback::Abort)
    }

    /// Consults the strategy for `error`.
    ///
    /// A strategy callback that panics is treated as "not healed" and, for the
    /// fallback, as `Abort`.
    pub fn handle(&self, error: &DataTableError) -> Recovery {
        let strategy = self.strategy(error.code);
        let healed = guard(|| Ok((strategy.recover)(error))).unwrap_or(false);
        if healed {
            return Recovery::Healed;
        }
        let fallback = guard(|| Ok((strategy.fallback)(error))).unwrap_or(Fallback::Abort);
        Recovery::Fallback(fallback)
    }
}

impl Recovery {
    /// The fallback to apply, using `healed` when the error healed itself.
    pub fn or_healed(self, healed: Fallback) -> Fallback {
        match self {
            Recovery::Healed => healed,
            Recovery::Fallback(fallback) => fallback,
        }
    }
}

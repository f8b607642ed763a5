//! Select-all-filtered id enumeration.

use async_trait::async_trait;

use crate::error::CallbackResult;
use crate::model::RowId;

/// Enumerates every row id matching the current filters, including rows
/// that are not held locally. Used to turn the select-all-filtered marker
/// into concrete bulk-action targets.
#[async_trait]
pub trait SelectAllResolver: Send + Sync {
    /// Returns all matching ids.
    async fn resolve(&self) -> CallbackResult<Vec<RowId>>;
}

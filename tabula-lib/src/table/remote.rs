//! Remote mode: page requests, responses and retries.

use super::DataTable;
use crate::config::DataMode;
use crate::error::CallbackError;
use crate::error::DataTableError;
use crate::error::ErrorCode;
use crate::error::Result;
use crate::error::guard_async;
use crate::pagination::PageRequest;
use crate::pagination::Paginator;
use crate::pagination::RemotePage;
use crate::recovery::Fallback;
use crate::recovery::Recovery;

/// What became of a page fetch.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The page replaced the held rows.
    Applied {
        /// Rows received.
        rows: usize,
    },
    /// A newer request was issued meanwhile; the response was dropped.
    Stale,
    /// The fetch failed and the held rows were kept.
    Failed {
        /// The failure, or `None` if it healed itself.
        error: Option<DataTableError>,
    },
    /// The table was torn down while the fetch ran.
    Cancelled,
}

impl DataTable {
    /// Describes the page to fetch for the current filters, search, sort
    /// and cursor, under a fresh sequence number. Any request issued
    /// earlier becomes stale.
    ///
    /// # Errors
    ///
    /// `IncompatibleConfig` in local mode.
    pub fn page_request(&mut self) -> Result<PageRequest> {
        if self.config.mode != DataMode::Remote {
            return Err(DataTableError::new(
                ErrorCode::IncompatibleConfig,
                "page requests need remote mode",
            )
            .with_context("fields", serde_json::json!(["mode"])));
        }
        let (cursor, limit) = match &self.paginator {
            Paginator::Cursor(cursor) => (cursor.cursor().map(str::to_string), Some(cursor.limit())),
            Paginator::Offset(offset) => (None, Some(offset.page_size())),
            Paginator::None => (None, None),
        };
        Ok(PageRequest {
            sequence: self.sequencer.issue(),
            filters: self
                .filters
                .active()
                .map(|(key, filter)| (key.clone(), filter.clone()))
                .collect(),
            search: self.filters.search().value.clone(),
            sort: self.sort.keys().to_vec(),
            cursor,
            limit,
        })
    }

    /// Applies the response to request `sequence`.
    ///
    /// Responses to stale requests are dropped without touching state.
    ///
    /// # Errors
    ///
    /// `DuplicateRowId` when two rows in the page share an id.
    pub fn apply_page(&mut self, sequence: u64, page: RemotePage) -> Result<FetchOutcome> {
        if !self.sequencer.is_current(sequence) {
            log::debug!(
                "dropping stale page for request #{sequence} (latest #{})",
                self.sequencer.latest()
            );
            return Ok(FetchOutcome::Stale);
        }
        let (rows, next, prev, total) = page.into_parts();
        let count = rows.len();
        self.set_rows(rows)?;
        if let Paginator::Cursor(cursor) = &mut self.paginator {
            cursor.receive(next, prev);
        }
        self.remote_total = total;
        log::debug!("applied page for request #{sequence}: {count} rows, total {total:?}");
        Ok(FetchOutcome::Applied { rows: count })
    }

    /// Applies a failed response to request `sequence`, through the
    /// DATA_FETCH strategy. The held rows are kept.
    ///
    /// # Errors
    ///
    /// The fetch error, when the strategy chose `Abort`.
    pub fn fail_page(&mut self, sequence: u64, cause: CallbackError) -> Result<FetchOutcome> {
        if !self.sequencer.is_current(sequence) {
            log::debug!("dropping stale failure for request #{sequence}: {cause}");
            return Ok(FetchOutcome::Stale);
        }
        let error = DataTableError::new(
            ErrorCode::DataFetchFailed,
            format!("fetching page for request #{sequence} failed: {cause}"),
        )
        .with_context("sequence", sequence)
        .with_cause(cause);

        match self.registry.handle(&error) {
            Recovery::Healed => {
                log::debug!("self-healed {error}");
                Ok(FetchOutcome::Failed { error: None })
            }
            Recovery::Fallback(Fallback::Abort) => {
                log::warn!("{error}");
                self.report(std::slice::from_ref(&error));
                Err(error)
            }
            Recovery::Fallback(_) => {
                log::warn!("{error}; keeping current rows");
                self.report(std::slice::from_ref(&error));
                Ok(FetchOutcome::Failed { error: Some(error) })
            }
        }
    }

    /// Fetches the current page from the bound [`RemoteDataSource`] and
    /// applies it.
    ///
    /// Failed attempts are retried up to the DATA_FETCH strategy's
    /// `max_attempts`, `retry_delay` apart. Teardown cancels the fetch.
    ///
    /// [`RemoteDataSource`]: crate::pagination::RemoteDataSource
    ///
    /// # Errors
    ///
    /// - `ContextMissing` without a source, or after teardown.
    /// - `IncompatibleConfig` in local mode.
    /// - Errors from [`apply_page`](Self::apply_page) and
    ///   [`fail_page`](Self::fail_page).
    pub async fn fetch(&mut self) -> Result<FetchOutcome> {
        let source = self.require(self.collaborators.remote.clone(), "remote data source")?;
        let request = self.page_request()?;
        let sequence = request.sequence;
        let strategy = self.registry.strategy(ErrorCode::DataFetchFailed);
        let cancel = self.cancel.clone();

        let mut attempt = 1;
        let cause = loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => return Ok(FetchOutcome::Cancelled),
                result = guard_async(source.fetch_page(request.clone())) => result,
            };
            match result {
                Ok(page) => return self.apply_page(sequence, page),
                Err(cause) if attempt < strategy.max_attempts => {
                    log::debug!(
                        "fetch #{sequence} attempt {attempt}/{} failed: {cause}; retrying",
                        strategy.max_attempts
                    );
                    attempt += 1;
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(FetchOutcome::Cancelled),
                        _ = tokio::time::sleep(strategy.retry_delay) => {}
                    }
                }
                Err(cause) => break cause,
            }
        };
        self.fail_page(sequence, cause)
    }
}

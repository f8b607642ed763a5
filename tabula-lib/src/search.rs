//! Debounced search input.

use std::time::Duration;

use tokio::time::Instant;

/// Default quiet period before a search value is committed.
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// A search value that has settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCommit {
    /// The committed search text.
    pub value: String,
    /// Increases with every commit.
    pub sequence: u64,
}

/// Holds back search input until typing pauses.
///
/// Each [`input`](Self::input) restarts the quiet period. Once it elapses,
/// [`poll`](Self::poll) hands out the value exactly once. A value equal to
/// the last committed one is dropped.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tokio::time::Instant;
/// use tabula_lib::search::SearchDebouncer;
///
/// let mut debouncer = SearchDebouncer::new(Duration::from_millis(300));
/// let start = Instant::now();
/// debouncer.input("ali", start);
/// debouncer.input("alic", start + Duration::from_millis(100));
///
/// assert!(debouncer.poll(start + Duration::from_millis(350)).is_none());
/// let commit = debouncer.poll(start + Duration::from_millis(400)).unwrap();
/// assert_eq!(commit.value, "alic");
/// ```
#[derive(Debug, Clone)]
pub struct SearchDebouncer {
    delay: Duration,
    pending: Option<(String, Instant)>,
    committed: String,
    sequence: u64,
}

impl Default for SearchDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_DEBOUNCE)
    }
}

impl SearchDebouncer {
    /// Creates a debouncer with the given quiet period.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
            committed: String::new(),
            sequence: 0,
        }
    }

    /// The quiet period.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// The last committed value.
    pub fn committed(&self) -> &str {
        &self.committed
    }

    /// The value waiting to be committed, if any.
    pub fn pending(&self) -> Option<&str> {
        self.pending.as_ref().map(|(value, _)| value.as_str())
    }

    /// Records new input at `now`, restarting the quiet period.
    pub fn input(&mut self, value: impl Into<String>, now: Instant) {
        self.pending = Some((value.into(), now + self.delay));
    }

    /// When the pending value becomes due.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, due)| *due)
    }

    /// Commits the pending value if its quiet period has elapsed by `now`.
    pub fn poll(&mut self, now: Instant) -> Option<SearchCommit> {
        match self.deadline() {
            Some(due) if due <= now => self.flush(),
            _ => None,
        }
    }

    /// Commits the pending value immediately.
    pub fn flush(&mut self) -> Option<SearchCommit> {
        let (value, _) = self.pending.take()?;
        if value == self.committed {
            log::trace!("search value {value:?} unchanged, not committing");
            return None;
        }
        self.sequence += 1;
        self.committed = value.clone();
        Some(SearchCommit {
            value,
            sequence: self.sequence,
        })
    }

    /// Waits until the pending value is due, then commits it.
    ///
    /// Returns `None` at once when nothing is pending.
    pub async fn settled(&mut self) -> Option<SearchCommit> {
        let due = self.deadline()?;
        tokio::time::sleep_until(due).await;
        self.flush()
    }

    /// Drops pending input without committing it.
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_commits_after_quiet_period() {
        let mut debouncer = SearchDebouncer::default();
        let t0 = Instant::now();
        debouncer.input("bob", t0);
        assert!(debouncer.poll(t0 + ms(299)).is_none());
        let commit = debouncer.poll(t0 + ms(300)).unwrap();
        assert_eq!(commit, SearchCommit { value: "bob".into(), sequence: 1 });
        assert!(debouncer.poll(t0 + ms(1000)).is_none());
        assert_eq!(debouncer.committed(), "bob");
    }

    #[test]
    fn test_input_restarts_timer() {
        let mut debouncer = SearchDebouncer::new(ms(100));
        let t0 = Instant::now();
        debouncer.input("a", t0);
        debouncer.input("ab", t0 + ms(80));
        assert!(debouncer.poll(t0 + ms(120)).is_none());
        assert_eq!(debouncer.poll(t0 + ms(180)).unwrap().value, "ab");
    }

    #[test]
    fn test_unchanged_value_not_recommitted() {
        let mut debouncer = SearchDebouncer::new(ms(10));
        let t0 = Instant::now();
        debouncer.input("x", t0);
        assert!(debouncer.flush().is_some());
        debouncer.input("x", t0 + ms(20));
        assert!(debouncer.poll(t0 + ms(40)).is_none());
        debouncer.input("", t0 + ms(50));
        assert_eq!(debouncer.flush().unwrap().sequence, 2);
    }

    #[test]
    fn test_cancel_drops_pending() {
        let mut debouncer = SearchDebouncer::new(ms(10));
        debouncer.input("gone", Instant::now());
        debouncer.cancel();
        assert!(debouncer.pending().is_none());
        assert!(debouncer.flush().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_waits_for_deadline() {
        let mut debouncer = SearchDebouncer::new(ms(300));
        let start = Instant::now();
        debouncer.input("carol", start);
        let commit = debouncer.settled().await.unwrap();
        assert_eq!(commit.value, "carol");
        assert!(Instant::now() >= start + ms(300));
        assert!(debouncer.settled().await.is_none());
    }
}

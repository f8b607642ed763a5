//! Sort state: the ordered list of sort keys.

use serde::Deserialize;
use serde::Serialize;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ascending order (A-Z, 0-9).
    #[default]
    Asc,
    /// Descending order (Z-A, 9-0).
    Desc,
}

/// One entry of a [`SortState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    /// Column key.
    pub key: String,
    /// Direction for this key.
    pub direction: Direction,
}

impl SortKey {
    /// Ascending sort on `key`.
    pub fn asc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: Direction::Asc,
        }
    }

    /// Descending sort on `key`.
    pub fn desc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: Direction::Desc,
        }
    }
}

/// Ordered sort keys. Earlier keys take precedence; later keys only break
/// ties.
///
/// # Example
///
/// ```
/// use tabula_lib::sort::{Direction, SortKey, SortState};
///
/// let mut sort = SortState::new(3);
/// sort.toggle("amt", true);
/// sort.toggle("id", true);
/// assert_eq!(sort.keys(), &[SortKey::asc("amt"), SortKey::asc("id")]);
///
/// // A second click flips the direction, a third removes the key.
/// sort.toggle("amt", true);
/// assert_eq!(sort.keys()[0].direction, Direction::Desc);
/// sort.toggle("amt", true);
/// assert_eq!(sort.keys(), &[SortKey::asc("id")]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortState {
    keys: Vec<SortKey>,
    max_keys: usize,
}

impl Default for SortState {
    fn default() -> Self {
        Self::new(3)
    }
}

impl SortState {
    /// Creates an empty sort state holding at most `max_keys` keys.
    pub fn new(max_keys: usize) -> Self {
        Self {
            keys: Vec::new(),
            max_keys: max_keys.max(1),
        }
    }

    /// The keys, in precedence order.
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// Maximum number of keys.
    pub fn max_keys(&self) -> usize {
        self.max_keys
    }

    /// Returns `true` if no sort is applied.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Removes every key.
    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Replaces the keys. Keys beyond the maximum are dropped from the end.
    pub fn set(&mut self, keys: Vec<SortKey>) {
        self.keys = keys;
        self.keys.truncate(self.max_keys);
    }

    /// Cycles `key` through ascending, descending and unsorted.
    ///
    /// With `multi` set, a newly added key is appended as the lowest
    /// precedence key and the oldest keys are dropped once the maximum is
    /// exceeded. Without it, the new key replaces the whole state.
    pub fn toggle(&mut self, key: &str, multi: bool) {
        if let Some(pos) = self.keys.iter().position(|k| k.key == key) {
            match self.keys[pos].direction {
                Direction::Asc => self.keys[pos].direction = Direction::Desc,
                Direction::Desc => {
                    self.keys.remove(pos);
                }
            }
            if !multi {
                self.keys.retain(|k| k.key == key);
            }
            return;
        }

        if !multi {
            self.keys.clear();
        }
        self.keys.push(SortKey::asc(key));
        let excess = self.keys.len().saturating_sub(self.max_keys);
        self.keys.drain(..excess);
    }

    /// Returns the direction `key` is sorted in, if it is sorted.
    pub fn direction(&self, key: &str) -> Option<Direction> {
        self.keys.iter().find(|k| k.key == key).map(|k| k.direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_cycle() {
        let mut sort = SortState::default();
        sort.toggle("a", false);
        assert_eq!(sort.direction("a"), Some(Direction::Asc));
        sort.toggle("a", false);
        assert_eq!(sort.direction("a"), Some(Direction::Desc));
        sort.toggle("a", false);
        assert!(sort.is_empty());
    }

    #[test]
    fn test_single_sort_replaces() {
        let mut sort = SortState::default();
        sort.toggle("a", false);
        sort.toggle("b", false);
        assert_eq!(sort.keys(), &[SortKey::asc("b")]);
    }

    #[test]
    fn test_multi_sort_drops_oldest() {
        let mut sort = SortState::new(2);
        sort.toggle("a", true);
        sort.toggle("b", true);
        sort.toggle("c", true);
        assert_eq!(sort.keys(), &[SortKey::asc("b"), SortKey::asc("c")]);
    }

    #[test]
    fn test_set_truncates() {
        let mut sort = SortState::new(1);
        sort.set(vec![SortKey::desc("a"), SortKey::asc("b")]);
        assert_eq!(sort.keys(), &[SortKey::desc("a")]);
    }
}

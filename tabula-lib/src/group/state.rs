//! Grouping state.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::CallbackResult;
use crate::model::Value;

/// Orders sibling buckets by their key values.
pub type BucketComparator = Arc<dyn Fn(&Value, &Value) -> CallbackResult<Ordering> + Send + Sync>;

/// Path of a bucket: one opaque segment per grouping level, outermost first.
pub type BucketPath = Vec<String>;

/// Ordered grouping keys plus which buckets are collapsed.
#[derive(Clone, Default)]
pub struct GroupState {
    keys: Vec<String>,
    bucket_order: Option<BucketComparator>,
    collapsed: HashSet<BucketPath>,
}

impl GroupState {
    /// Creates an empty (ungrouped) state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grouping keys, outermost level first.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Returns `true` if at least one grouping key is set.
    pub fn is_active(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Replaces the grouping keys. Collapsed paths are forgotten since they
    /// no longer address the same buckets.
    pub fn set_keys(&mut self, keys: Vec<String>) {
        if keys != self.keys {
            self.collapsed.clear();
        }
        self.keys = keys;
    }

    /// Sets the comparator ordering sibling buckets. Without one, buckets
    /// appear in the order their key is first encountered.
    pub fn set_bucket_order(&mut self, comparator: Option<BucketComparator>) {
        self.bucket_order = comparator;
    }

    pub(crate) fn bucket_order(&self) -> Option<&BucketComparator> {
        self.bucket_order.as_ref()
    }

    /// Collapses or expands the bucket at `path`.
    pub fn set_collapsed(&mut self, path: BucketPath, collapsed: bool) {
        if collapsed {
            self.collapsed.insert(path);
        } else {
            self.collapsed.remove(&path);
        }
    }

    /// Flips the collapsed flag of the bucket at `path`; returns the new flag.
    pub fn toggle_collapsed(&mut self, path: BucketPath) -> bool {
        let collapsed = !self.collapsed.contains(&path);
        self.set_collapsed(path, collapsed);
        collapsed
    }

    /// Returns `true` if the bucket at `path` is collapsed.
    pub fn is_collapsed(&self, path: &[String]) -> bool {
        self.collapsed.contains(path)
    }
}

impl std::fmt::Debug for GroupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupState")
            .field("keys", &self.keys)
            .field("has_bucket_order", &self.bucket_order.is_some())
            .field("collapsed", &self.collapsed)
            .finish()
    }
}

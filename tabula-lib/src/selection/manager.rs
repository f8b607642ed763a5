//! Row selection state and its reducer.

use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;

use crate::error::DataTableError;
use crate::error::ErrorCode;
use crate::error::Result;
use crate::model::RowId;

/// Selection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// No selection allowed.
    None,
    /// At most one row.
    Single,
    /// Any number of rows.
    #[default]
    Multi,
}

/// Everything that can change a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionAction {
    /// Selects a row and makes it the range anchor.
    Select(RowId),
    /// Deselects a row.
    Deselect(RowId),
    /// Flips a row; selecting makes it the anchor.
    Toggle(RowId),
    /// Selects the rows between the anchor and `target` in the current
    /// filtered order. With `extend`, the range is added to the selection;
    /// otherwise it replaces it.
    Range {
        /// Far end of the range.
        target: RowId,
        /// Add to the selection instead of replacing it.
        extend: bool,
    },
    /// Selects every currently filtered row.
    SelectAllVisible,
    /// Selects every row matching the current filters, including rows that
    /// are not held locally.
    SelectAllFiltered,
    /// Deselects everything.
    Clear,
}

/// Marker for "every filtered row", with explicit exceptions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct AllFiltered {
    excluded: HashSet<RowId>,
    resolved: Option<Vec<RowId>>,
}

/// Selected row ids, the range anchor and the select-all-filtered marker.
///
/// All changes go through [`dispatch`](Self::dispatch). The filtered order
/// passed in is the table's current post-filter, post-sort row order.
///
/// Ids that are filtered out stay selected; they are just not bulk targets
/// until they are visible again.
#[derive(Debug, Clone, Default)]
pub struct SelectionManager {
    mode: SelectionMode,
    selected: HashSet<RowId>,
    anchor: Option<RowId>,
    all_filtered: Option<AllFiltered>,
}

impl SelectionManager {
    /// Creates an empty selection.
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// The mode.
    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Applies `action` against the current `filtered` order. Returns
    /// whether the selection changed.
    ///
    /// # Errors
    ///
    /// `SelectionFailed` when the mode forbids the action.
    pub fn dispatch(&mut self, action: SelectionAction, filtered: &[RowId]) -> Result<bool> {
        if let SelectionAction::Clear = action {
            return Ok(self.clear());
        }
        match self.mode {
            SelectionMode::None => Err(forbidden("selection is disabled", &action)),
            SelectionMode::Single => self.dispatch_single(action),
            SelectionMode::Multi => Ok(self.dispatch_multi(action, filtered)),
        }
    }

    fn dispatch_single(&mut self, action: SelectionAction) -> Result<bool> {
        let target = match action {
            SelectionAction::Select(id) | SelectionAction::Range { target: id, .. } => id,
            SelectionAction::Toggle(id) if self.selected.contains(&id) => return Ok(self.clear()),
            SelectionAction::Toggle(id) => id,
            SelectionAction::Deselect(id) => return Ok(self.remove(&id)),
            other => return Err(forbidden("single selection cannot select all", &other)),
        };
        let changed = !(self.selected.len() == 1 && self.selected.contains(&target));
        self.selected.clear();
        self.selected.insert(target.clone());
        self.anchor = Some(target);
        Ok(changed)
    }

    fn dispatch_multi(&mut self, action: SelectionAction, filtered: &[RowId]) -> bool {
        match action {
            SelectionAction::Select(id) => {
                self.anchor = Some(id.clone());
                self.insert(id)
            }
            SelectionAction::Deselect(id) => self.remove(&id),
            SelectionAction::Toggle(id) => {
                if self.is_selected(&id) {
                    self.remove(&id)
                } else {
                    self.anchor = Some(id.clone());
                    self.insert(id)
                }
            }
            SelectionAction::Range { target, extend } => {
                let anchor = self.anchor.clone().unwrap_or_else(|| target.clone());
                let anchor_pos = filtered.iter().position(|id| *id == anchor);
                let target_pos = filtered.iter().position(|id| *id == target);
                let (Some(a), Some(t)) = (anchor_pos, target_pos) else {
                    // Anchor not visible: degrade to selecting the target.
                    self.anchor = Some(target.clone());
                    return self.insert(target);
                };
                let (lo, hi) = if a <= t { (a, t) } else { (t, a) };
                let before = self.selected.clone();
                if !extend {
                    self.selected.clear();
                    self.all_filtered = None;
                }
                for id in &filtered[lo..=hi] {
                    self.insert(id.clone());
                }
                self.anchor = Some(anchor);
                before != self.selected
            }
            SelectionAction::SelectAllVisible => {
                let mut changed = false;
                for id in filtered {
                    changed |= self.insert(id.clone());
                }
                changed
            }
            SelectionAction::SelectAllFiltered => {
                let changed = self.all_filtered.as_ref().is_none_or(|m| !m.excluded.is_empty());
                self.all_filtered = Some(AllFiltered::default());
                changed
            }
            SelectionAction::Clear => self.clear(),
        }
    }

    fn insert(&mut self, id: RowId) -> bool {
        let unexcluded = self
            .all_filtered
            .as_mut()
            .is_some_and(|m| m.excluded.remove(&id));
        self.selected.insert(id) || unexcluded
    }

    fn remove(&mut self, id: &RowId) -> bool {
        let excluded = self
            .all_filtered
            .as_mut()
            .is_some_and(|m| m.excluded.insert(id.clone()));
        let removed = self.selected.remove(id);
        if self.anchor.as_ref() == Some(id) {
            self.anchor = None;
        }
        removed || excluded
    }

    fn clear(&mut self) -> bool {
        let changed = !self.selected.is_empty() || self.all_filtered.is_some();
        self.selected.clear();
        self.anchor = None;
        self.all_filtered = None;
        changed
    }

    /// Returns `true` if `id` is selected, explicitly or through the
    /// select-all-filtered marker.
    pub fn is_selected(&self, id: &RowId) -> bool {
        match &self.all_filtered {
            Some(marker) if !marker.excluded.contains(id) => true,
            _ => self.selected.contains(id),
        }
    }

    /// Explicitly selected ids, in id order.
    pub fn selected_ids(&self) -> Vec<RowId> {
        let mut ids: Vec<RowId> = self.selected.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// The range anchor.
    pub fn anchor(&self) -> Option<&RowId> {
        self.anchor.as_ref()
    }

    /// Returns `true` while the select-all-filtered marker is set.
    pub fn is_all_filtered(&self) -> bool {
        self.all_filtered.is_some()
    }

    /// Ids explicitly deselected since select-all-filtered.
    pub fn excluded_ids(&self) -> Vec<RowId> {
        let mut ids: Vec<RowId> = self
            .all_filtered
            .iter()
            .flat_map(|m| m.excluded.iter().cloned())
            .collect();
        ids.sort();
        ids
    }

    /// Number of selected rows, given the total number of filtered rows
    /// (which may exceed what is held locally).
    pub fn count(&self, filtered_total: usize) -> usize {
        match &self.all_filtered {
            Some(AllFiltered {
                resolved: Some(ids),
                excluded,
            }) => ids.iter().filter(|id| !excluded.contains(*id)).count(),
            Some(marker) => filtered_total.saturating_sub(marker.excluded.len()),
            None => self.selected.len(),
        }
    }

    /// Stores the full id list for select-all-filtered, as produced by a
    /// [`SelectAllResolver`](super::SelectAllResolver). Ignored when the
    /// marker is not set.
    pub fn apply_resolved(&mut self, ids: Vec<RowId>) {
        if let Some(marker) = self.all_filtered.as_mut() {
            marker.resolved = Some(ids);
        }
    }

    /// Ids bulk actions should target, in filtered order.
    ///
    /// Selected ids that are filtered out are left out. With the marker set,
    /// the resolved id list is used when available, otherwise every filtered
    /// id; explicit exclusions are honored either way.
    pub fn bulk_targets(&self, filtered: &[RowId]) -> Vec<RowId> {
        match &self.all_filtered {
            Some(AllFiltered {
                resolved: Some(ids),
                excluded,
            }) => ids.iter().filter(|id| !excluded.contains(*id)).cloned().collect(),
            Some(marker) => filtered
                .iter()
                .filter(|id| !marker.excluded.contains(*id))
                .cloned()
                .collect(),
            None => filtered
                .iter()
                .filter(|id| self.selected.contains(*id))
                .cloned()
                .collect(),
        }
    }

    /// Drops ids that left the dataset. Returns how many were dropped.
    pub fn retain_existing(&mut self, exists: impl Fn(&RowId) -> bool) -> usize {
        let before = self.selected.len();
        self.selected.retain(|id| exists(id));
        if self.anchor.as_ref().is_some_and(|a| !exists(a)) {
            self.anchor = None;
        }
        if let Some(marker) = self.all_filtered.as_mut() {
            marker.excluded.retain(|id| exists(id));
        }
        before - self.selected.len()
    }
}

fn forbidden(reason: &str, action: &SelectionAction) -> DataTableError {
    DataTableError::new(ErrorCode::SelectionFailed, reason)
        .with_context("action", format!("{action:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[i64]) -> Vec<RowId> {
        v.iter().map(|&i| RowId::from(i)).collect()
    }

    fn set(manager: &SelectionManager) -> Vec<RowId> {
        manager.selected_ids()
    }

    #[test]
    fn test_toggle_and_deselect() {
        let mut sel = SelectionManager::new(SelectionMode::Multi);
        let visible = ids(&[1, 2, 3]);
        assert!(sel.dispatch(SelectionAction::Toggle(1.into()), &visible).unwrap());
        assert!(sel.dispatch(SelectionAction::Toggle(2.into()), &visible).unwrap());
        assert!(sel.dispatch(SelectionAction::Toggle(1.into()), &visible).unwrap());
        assert_eq!(set(&sel), ids(&[2]));
        assert!(!sel.dispatch(SelectionAction::Deselect(9.into()), &visible).unwrap());
    }

    #[test]
    fn test_range_follows_filtered_order() {
        let mut sel = SelectionManager::new(SelectionMode::Multi);
        let order = ids(&[5, 3, 1, 4, 2]);
        sel.dispatch(SelectionAction::Select(3.into()), &order).unwrap();
        sel.dispatch(
            SelectionAction::Range {
                target: 4.into(),
                extend: false,
            },
            &order,
        )
        .unwrap();
        assert_eq!(set(&sel), ids(&[1, 3, 4]));
        assert_eq!(sel.anchor(), Some(&RowId::from(3)));

        sel.dispatch(
            SelectionAction::Range {
                target: 5.into(),
                extend: true,
            },
            &order,
        )
        .unwrap();
        assert_eq!(set(&sel), ids(&[1, 3, 4, 5]));
    }

    #[test]
    fn test_single_mode() {
        let mut sel = SelectionManager::new(SelectionMode::Single);
        let visible = ids(&[1, 2]);
        sel.dispatch(SelectionAction::Select(1.into()), &visible).unwrap();
        sel.dispatch(SelectionAction::Select(2.into()), &visible).unwrap();
        assert_eq!(set(&sel), ids(&[2]));
        let err = sel.dispatch(SelectionAction::SelectAllVisible, &visible).unwrap_err();
        assert_eq!(err.code, ErrorCode::SelectionFailed);
    }

    #[test]
    fn test_none_mode_rejects() {
        let mut sel = SelectionManager::new(SelectionMode::None);
        assert!(sel.dispatch(SelectionAction::Select(1.into()), &[]).is_err());
        assert!(!sel.dispatch(SelectionAction::Clear, &[]).unwrap());
    }

    #[test]
    fn test_filtered_out_ids_persist_but_are_not_targets() {
        let mut sel = SelectionManager::new(SelectionMode::Multi);
        let all = ids(&[1, 2, 3]);
        sel.dispatch(SelectionAction::Select(1.into()), &all).unwrap();
        sel.dispatch(SelectionAction::Select(2.into()), &all).unwrap();
        let filtered = ids(&[2, 3]);
        assert_eq!(sel.bulk_targets(&filtered), ids(&[2]));
        assert!(sel.is_selected(&1.into()));
        assert_eq!(sel.bulk_targets(&all), ids(&[1, 2]));
    }

    #[test]
    fn test_select_all_filtered_with_exclusions() {
        let mut sel = SelectionManager::new(SelectionMode::Multi);
        let page = ids(&[1, 2, 3]);
        sel.dispatch(SelectionAction::SelectAllFiltered, &page).unwrap();
        sel.dispatch(SelectionAction::Toggle(2.into()), &page).unwrap();
        assert!(!sel.is_selected(&2.into()));
        assert!(sel.is_selected(&99.into()));
        assert_eq!(sel.count(1_000), 999);
        assert_eq!(sel.bulk_targets(&page), ids(&[1, 3]));

        sel.apply_resolved(ids(&[1, 2, 3, 4]));
        assert_eq!(sel.bulk_targets(&page), ids(&[1, 3, 4]));
        assert_eq!(sel.count(1_000), 3);
    }

    #[test]
    fn test_removed_rows_dropped() {
        let mut sel = SelectionManager::new(SelectionMode::Multi);
        let all = ids(&[1, 2]);
        sel.dispatch(SelectionAction::Select(1.into()), &all).unwrap();
        sel.dispatch(SelectionAction::Select(2.into()), &all).unwrap();
        let dropped = sel.retain_existing(|id| id.as_str() != "2");
        assert_eq!(dropped, 1);
        assert_eq!(set(&sel), ids(&[1]));
    }
}

//! Visible-range computation.

use std::collections::HashMap;
use std::ops::Range;

use serde::Deserialize;
use serde::Serialize;

use super::Viewport;
use crate::error::CallbackResult;
use crate::error::DataTableError;
use crate::error::ErrorCode;
use crate::error::guard;
use crate::group::BucketPath;
use crate::model::Row;
use crate::model::RowId;
use crate::recovery::Fallback;
use crate::recovery::Incidents;

/// When the windower is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VirtualizeMode {
    /// Window once the row count exceeds the threshold.
    #[default]
    Auto,
    /// Always window.
    On,
    /// Never window.
    Off,
}

/// Host-supplied row height measurement, in pixels.
///
/// Called for materialized rows whose height is not cached yet. Closures
/// implement this trait directly.
pub trait RowMeasure: Send + Sync {
    /// Measures the rendered height of `row`.
    fn measure(&self, row: &Row) -> CallbackResult<f64>;
}

impl<F> RowMeasure for F
where
    F: Fn(&Row) -> CallbackResult<f64> + Send + Sync,
{
    fn measure(&self, row: &Row) -> CallbackResult<f64> {
        self(row)
    }
}

/// Identity of one line in the display sequence, for the size cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemKey {
    /// A data row.
    Row(RowId),
    /// A group header.
    Group(BucketPath),
}

/// The rows to materialize and the geometry to place them.
///
/// `offsets` has one entry per row plus a final entry equal to
/// `total_size`, so `offsets[i]..offsets[i + 1]` is row `i`'s pixel span.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirtualWindow {
    /// Half-open range of materialized indices.
    pub range: Range<usize>,
    /// Cumulative top offsets.
    pub offsets: Vec<f64>,
    /// Height of the whole sequence.
    pub total_size: f64,
    /// Whether windowing was applied. When `false`, every row is in range.
    pub enabled: bool,
}

impl VirtualWindow {
    fn all(offsets: Vec<f64>) -> Self {
        let n = offsets.len().saturating_sub(1);
        Self {
            range: 0..n,
            total_size: offsets.last().copied().unwrap_or(0.0),
            offsets,
            enabled: false,
        }
    }

    /// First materialized index.
    pub fn start_index(&self) -> usize {
        self.range.start
    }

    /// Last materialized index (inclusive), or `None` for an empty window.
    pub fn end_index(&self) -> Option<usize> {
        self.range.end.checked_sub(1).filter(|&e| e >= self.range.start)
    }

    /// Number of materialized rows.
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// Returns `true` if nothing is materialized.
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Spacer height above the materialized rows.
    pub fn padding_before(&self) -> f64 {
        self.offsets.get(self.range.start).copied().unwrap_or(0.0)
    }

    /// Spacer height below the materialized rows.
    pub fn padding_after(&self) -> f64 {
        let end = self.offsets.get(self.range.end).copied().unwrap_or(self.total_size);
        (self.total_size - end).max(0.0)
    }
}

/// Computes virtualization windows from a viewport and row sizes.
///
/// Sizes come from the measurement cache when a row was measured, from the
/// estimate otherwise. The cache is keyed by row identity, so it survives
/// re-sorting and filtering.
#[derive(Debug, Clone)]
pub struct Windower {
    mode: VirtualizeMode,
    threshold: usize,
    estimate: f64,
    overscan: usize,
    sizes: HashMap<ItemKey, f64>,
}

impl Windower {
    /// Creates a windower.
    pub fn new(mode: VirtualizeMode, threshold: usize, estimate: f64, overscan: usize) -> Self {
        Self {
            mode,
            threshold,
            estimate: if estimate.is_finite() && estimate > 0.0 { estimate } else { 40.0 },
            overscan,
            sizes: HashMap::new(),
        }
    }

    /// Returns `true` if windowing applies to `count` rows.
    pub fn is_active(&self, count: usize) -> bool {
        match self.mode {
            VirtualizeMode::Auto => count > self.threshold,
            VirtualizeMode::On => true,
            VirtualizeMode::Off => false,
        }
    }

    /// Records a measured height. Non-finite or negative heights are
    /// rejected.
    pub fn record_size(&mut self, key: ItemKey, height: f64) -> bool {
        if height.is_finite() && height >= 0.0 {
            self.sizes.insert(key, height);
            true
        } else {
            false
        }
    }

    /// Drops cached sizes for which `keep` returns `false`.
    pub fn retain_sizes(&mut self, keep: impl Fn(&ItemKey) -> bool) {
        self.sizes.retain(|k, _| keep(k));
    }

    /// Size used for `key`.
    pub fn size_of(&self, key: &ItemKey) -> f64 {
        self.sizes.get(key).copied().unwrap_or(self.estimate)
    }

    /// Cumulative offsets for `keys`, with the total as the last entry.
    pub fn offsets(&self, keys: &[ItemKey]) -> Vec<f64> {
        let mut offsets = Vec::with_capacity(keys.len() + 1);
        let mut top = 0.0;
        offsets.push(top);
        for key in keys {
            top += self.size_of(key);
            offsets.push(top);
        }
        offsets
    }

    /// Window for `keys` in `viewport`: every row whose span intersects
    /// `[scroll, scroll + height)`, widened by the overscan on both sides.
    pub fn window(&self, keys: &[ItemKey], viewport: Viewport) -> VirtualWindow {
        let offsets = self.offsets(keys);
        let n = keys.len();
        let total = offsets[n];
        let scroll = viewport.scroll_offset.clamp(0.0, (total - viewport.height).max(0.0));
        let bottom = scroll + viewport.height;

        // First row ending below the scroll offset, first row starting at or
        // below the viewport bottom.
        let first = offsets[1..].partition_point(|&o| o <= scroll);
        let last = offsets[..n].partition_point(|&o| o < bottom).max(first);

        let start = first.saturating_sub(self.overscan);
        let end = (last + self.overscan).min(n);
        log::trace!("window {start}..{end} of {n} (scroll {scroll}, height {})", viewport.height);
        VirtualWindow {
            range: start..end,
            offsets,
            total_size: total,
            enabled: true,
        }
    }

    /// Scroll offset that brings row `index` fully into view, moving as
    /// little as possible. `None` if the index is out of range.
    pub fn scroll_to_index(&self, keys: &[ItemKey], index: usize, viewport: Viewport) -> Option<f64> {
        if index >= keys.len() {
            return None;
        }
        let offsets = self.offsets(keys);
        let (top, bottom) = (offsets[index], offsets[index + 1]);
        let scroll = viewport.scroll_offset;
        Some(if top < scroll {
            top
        } else if bottom > scroll + viewport.height {
            (bottom - viewport.height).max(0.0)
        } else {
            scroll
        })
    }

    /// Computes the window for one refresh pass, measuring materialized
    /// rows that have no cached size.
    ///
    /// Without a viewport, or below the activation threshold, every row is
    /// materialized. A measurement failure goes through the
    /// VIRTUALIZATION_ERROR strategy, which by default disables windowing
    /// for the pass.
    pub(crate) fn compute(
        &mut self,
        items: &[(ItemKey, Option<&Row>)],
        viewport: Option<Viewport>,
        measure: Option<&dyn RowMeasure>,
        incidents: &mut Incidents<'_>,
    ) -> VirtualWindow {
        let keys: Vec<ItemKey> = items.iter().map(|(k, _)| k.clone()).collect();
        let Some(viewport) = viewport.filter(|_| self.is_active(keys.len())) else {
            return VirtualWindow::all(self.offsets(&keys));
        };

        let window = self.window(&keys, viewport);
        let Some(measure) = measure else {
            return window;
        };

        let mut measured = false;
        for index in window.range.clone() {
            let (key, row) = &items[index];
            let Some(row) = row else { continue };
            if self.sizes.contains_key(key) {
                continue;
            }
            let failure = match guard(|| measure.measure(row)) {
                Ok(height) if self.record_size(key.clone(), height) => {
                    measured = true;
                    continue;
                }
                Ok(height) => DataTableError::new(
                    ErrorCode::VirtualizationFailed,
                    format!("row '{}' measured an invalid height {height}", row.id()),
                ),
                Err(cause) => DataTableError::new(
                    ErrorCode::VirtualizationFailed,
                    format!("measuring row '{}' failed: {cause}", row.id()),
                )
                .with_cause(cause),
            };
            let error = failure.with_context("row_id", row.id().as_str());
            match incidents.handle(error, Fallback::KeepCurrent) {
                Fallback::RenderAll | Fallback::Abort => {
                    return VirtualWindow::all(self.offsets(&keys));
                }
                // Anything else keeps the estimate for this row.
                _ => {}
            }
        }

        if measured {
            self.window(&keys, viewport)
        } else {
            window
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::recovery::RecoveryRegistry;

    fn keys(n: usize) -> Vec<ItemKey> {
        (0..n).map(|i| ItemKey::Row(RowId::from(i as i64))).collect()
    }

    fn viewport(height: f64, scroll_offset: f64) -> Viewport {
        Viewport {
            height,
            scroll_offset,
        }
    }

    #[test]
    fn test_activation() {
        let auto = Windower::new(VirtualizeMode::Auto, 50, 40.0, 0);
        assert!(!auto.is_active(50));
        assert!(auto.is_active(51));
        assert!(Windower::new(VirtualizeMode::On, 50, 40.0, 0).is_active(1));
        assert!(!Windower::new(VirtualizeMode::Off, 50, 40.0, 0).is_active(10_000));
    }

    #[test]
    fn test_window_with_estimate() {
        let w = Windower::new(VirtualizeMode::On, 0, 40.0, 0);
        let window = w.window(&keys(100), viewport(200.0, 400.0));
        assert_eq!(window.range, 10..15);
        assert_eq!(window.start_index(), 10);
        assert_eq!(window.end_index(), Some(14));
        assert_eq!(window.total_size, 4000.0);
        assert_eq!(window.padding_before(), 400.0);
        assert_eq!(window.padding_after(), 4000.0 - 600.0);
    }

    #[test]
    fn test_partial_rows_and_overscan() {
        let w = Windower::new(VirtualizeMode::On, 0, 40.0, 2);
        let window = w.window(&keys(100), viewport(100.0, 30.0));
        // Rows 0..4 intersect [30, 130); two extra on the trailing side only.
        assert_eq!(window.range, 0..6);
    }

    #[test]
    fn test_scroll_clamped_to_content() {
        let w = Windower::new(VirtualizeMode::On, 0, 40.0, 0);
        let window = w.window(&keys(10), viewport(200.0, 10_000.0));
        assert_eq!(window.range, 5..10);
    }

    #[test]
    fn test_scroll_to_index() {
        let w = Windower::new(VirtualizeMode::On, 0, 40.0, 0);
        let k = keys(100);
        assert_eq!(w.scroll_to_index(&k, 50, viewport(200.0, 0.0)), Some(1840.0));
        assert_eq!(w.scroll_to_index(&k, 2, viewport(200.0, 400.0)), Some(80.0));
        assert_eq!(w.scroll_to_index(&k, 11, viewport(200.0, 400.0)), Some(400.0));
        assert_eq!(w.scroll_to_index(&k, 100, viewport(200.0, 0.0)), None);
    }

    #[test]
    fn test_measured_sizes_used() {
        let rows: Vec<Row> = (0..60).map(|i| Row::new(i as i64)).collect();
        let items: Vec<(ItemKey, Option<&Row>)> =
            rows.iter().map(|r| (ItemKey::Row(r.id().clone()), Some(r))).collect();
        let mut w = Windower::new(VirtualizeMode::Auto, 50, 40.0, 0);
        let measure: Arc<dyn RowMeasure> = Arc::new(|_: &Row| -> CallbackResult<f64> { Ok(20.0) });
        let registry = RecoveryRegistry::default();
        let mut incidents = Incidents::new(&registry, "window");
        let window = w.compute(&items, Some(viewport(100.0, 0.0)), Some(measure.as_ref()), &mut incidents);
        assert!(window.enabled);
        assert_eq!(w.size_of(&items[0].0), 20.0);
        assert_eq!(window.offsets[1], 20.0);
        assert!(incidents.is_empty());
    }

    #[test]
    fn test_measure_failure_renders_all() {
        let rows: Vec<Row> = (0..60).map(|i| Row::new(i as i64)).collect();
        let items: Vec<(ItemKey, Option<&Row>)> =
            rows.iter().map(|r| (ItemKey::Row(r.id().clone()), Some(r))).collect();
        let mut w = Windower::new(VirtualizeMode::Auto, 50, 40.0, 0);
        let measure = |_: &Row| -> CallbackResult<f64> { Ok(f64::NAN) };
        let registry = RecoveryRegistry::default();
        let mut incidents = Incidents::new(&registry, "window");
        let window = w.compute(&items, Some(viewport(100.0, 0.0)), Some(&measure), &mut incidents);
        assert!(!window.enabled);
        assert_eq!(window.range, 0..60);
        let errors = incidents.finish();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::VirtualizationFailed);
    }

    #[test]
    fn test_no_viewport_materializes_everything() {
        let rows: Vec<Row> = (0..60).map(|i| Row::new(i as i64)).collect();
        let items: Vec<(ItemKey, Option<&Row>)> =
            rows.iter().map(|r| (ItemKey::Row(r.id().clone()), Some(r))).collect();
        let mut w = Windower::new(VirtualizeMode::On, 50, 40.0, 0);
        let registry = RecoveryRegistry::default();
        let mut incidents = Incidents::new(&registry, "window");
        let window = w.compute(&items, None, None, &mut incidents);
        assert_eq!(window.range, 0..60);
        assert!(!window.enabled);
    }
}

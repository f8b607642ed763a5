//! Viewport attachment.

use std::sync::Arc;
use std::sync::RwLock;

/// Size and scroll position of the scroll container.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    /// Visible height in pixels.
    pub height: f64,
    /// Distance scrolled from the top, in pixels.
    pub scroll_offset: f64,
}

#[derive(Debug, Default)]
struct Slot {
    viewport: Viewport,
    generation: u64,
    attached: bool,
}

/// The table's side of the viewport: shared with at most one live
/// [`ViewportAttachment`].
#[derive(Debug, Clone, Default)]
pub(crate) struct ViewportSlot {
    inner: Arc<RwLock<Slot>>,
}

impl ViewportSlot {
    /// Attaches a viewport of `height`, replacing any previous attachment.
    pub(crate) fn attach(&self, height: f64) -> ViewportAttachment {
        let mut generation = 0;
        if let Ok(mut guard) = self.inner.write() {
            guard.generation += 1;
            guard.attached = true;
            guard.viewport = Viewport {
                height: sanitize(height),
                scroll_offset: 0.0,
            };
            generation = guard.generation;
        }
        ViewportAttachment {
            inner: self.inner.clone(),
            generation,
        }
    }

    /// The attached viewport, if any.
    pub(crate) fn current(&self) -> Option<Viewport> {
        self.inner
            .read()
            .ok()
            .filter(|g| g.attached)
            .map(|g| g.viewport)
    }

    /// Sets the scroll offset of the attached viewport.
    pub(crate) fn set_scroll(&self, offset: f64) {
        if let Ok(mut guard) = self.inner.write() {
            guard.viewport.scroll_offset = sanitize(offset);
        }
    }

    /// Detaches whatever is attached.
    pub(crate) fn detach(&self) {
        if let Ok(mut guard) = self.inner.write() {
            guard.attached = false;
            guard.generation += 1;
        }
    }
}

fn sanitize(v: f64) -> f64 {
    if v.is_finite() { v.max(0.0) } else { 0.0 }
}

/// Scoped handle to the table's viewport.
///
/// The host keeps it alive for as long as the scroll container exists and
/// feeds it size and scroll changes. Dropping it detaches the viewport;
/// the table then stops windowing and reports every row as materialized.
/// Attaching again invalidates the previous handle, so a stale handle can
/// neither move nor detach the new viewport.
#[derive(Debug)]
pub struct ViewportAttachment {
    inner: Arc<RwLock<Slot>>,
    generation: u64,
}

impl ViewportAttachment {
    fn with_slot(&self, f: impl FnOnce(&mut Slot)) {
        if let Ok(mut guard) = self.inner.write() {
            if guard.generation == self.generation && guard.attached {
                f(&mut guard);
            }
        }
    }

    /// Reports a new viewport height.
    pub fn resize(&self, height: f64) {
        self.with_slot(|slot| slot.viewport.height = sanitize(height));
    }

    /// Reports a new scroll offset.
    pub fn scroll_to(&self, offset: f64) {
        self.with_slot(|slot| slot.viewport.scroll_offset = sanitize(offset));
    }

    /// Returns `true` while this handle is the table's live attachment.
    pub fn is_attached(&self) -> bool {
        self.inner
            .read()
            .map(|g| g.attached && g.generation == self.generation)
            .unwrap_or(false)
    }

    /// Current viewport as seen through this handle.
    pub fn viewport(&self) -> Option<Viewport> {
        self.inner
            .read()
            .ok()
            .filter(|g| g.attached && g.generation == self.generation)
            .map(|g| g.viewport)
    }
}

impl Drop for ViewportAttachment {
    fn drop(&mut self) {
        self.with_slot(|slot| slot.attached = false);
    }
}

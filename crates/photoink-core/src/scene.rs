//! Overlay store keyed by id, ordered by the view state.

use crate::fonts::FontProvider;
use crate::overlay::{Overlay, OverlayId};
use crate::view_state::{ViewHandle, ViewState};
use kurbo::Point;
use std::collections::HashMap;

/// All live overlays and the view log that orders them.
///
/// Overlays referenced only from the redo stack are kept so they can be
/// restored; [`Scene::collect_garbage`] drops the rest.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    overlays: HashMap<OverlayId, Overlay>,
    view: ViewState,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewState {
        &mut self.view
    }

    /// Store an overlay and put it on top of the view log.
    pub fn insert(&mut self, overlay: Overlay) -> OverlayId {
        let id = overlay.id();
        self.overlays.insert(id, overlay);
        if let Err(err) = self.view.append(ViewHandle::Overlay(id)) {
            log::warn!("overlay inserted twice: {err}");
        }
        id
    }

    pub fn get(&self, id: OverlayId) -> Option<&Overlay> {
        self.overlays.get(&id)
    }

    pub fn get_mut(&mut self, id: OverlayId) -> Option<&mut Overlay> {
        self.overlays.get_mut(&id)
    }

    /// Overlays currently visible, back to front.
    pub fn visible(&self) -> impl Iterator<Item = &Overlay> {
        self.view
            .iter()
            .filter_map(|h| h.overlay_id())
            .filter_map(|id| self.overlays.get(&id))
    }

    pub fn is_visible(&self, id: OverlayId) -> bool {
        self.view.contains(ViewHandle::Overlay(id))
    }

    /// Topmost visible overlay under `point`.
    pub fn overlay_at(&self, point: Point, fonts: &dyn FontProvider) -> Option<OverlayId> {
        // Front to back for selection priority
        self.view
            .iter()
            .rev()
            .filter_map(|h| h.overlay_id())
            .find(|id| {
                self.overlays
                    .get(id)
                    .is_some_and(|o| o.hit_test(point, fonts))
            })
    }

    /// Select `id` and show its helper box, hiding every other one.
    pub fn select(&mut self, id: OverlayId) -> bool {
        if !self.view.select(id) {
            return false;
        }
        for overlay in self.overlays.values_mut() {
            overlay.helper_box = overlay.id == id;
        }
        true
    }

    /// Make `id` the current selection without showing its helper box.
    pub fn focus(&mut self, id: OverlayId) -> bool {
        self.view.select(id)
    }

    pub fn selected(&self) -> Option<OverlayId> {
        self.view.current_selection()
    }

    /// Hide every helper box and clear the selection.
    pub fn clear_helper_box(&mut self) {
        for overlay in self.overlays.values_mut() {
            overlay.helper_box = false;
        }
        self.view.clear_selection();
    }

    /// Move the topmost handle onto the redo stack.
    pub fn remove_last(&mut self) -> Option<ViewHandle> {
        let handle = self.view.remove_last()?;
        self.hide_helper(handle);
        Some(handle)
    }

    /// Move a specific handle onto the redo stack.
    pub fn remove(&mut self, handle: ViewHandle) -> bool {
        if !self.view.remove_at(handle) {
            return false;
        }
        self.hide_helper(handle);
        true
    }

    /// Re-append a handle popped from the redo stack.
    ///
    /// Overlay handles whose data has been collected are ignored.
    pub fn restore(&mut self, handle: ViewHandle) -> bool {
        if let ViewHandle::Overlay(id) = handle {
            if !self.overlays.contains_key(&id) {
                return false;
            }
        }
        self.view.append(handle).is_ok()
    }

    /// Drop the redo stack and every overlay no longer reachable.
    pub fn clear_redo(&mut self) {
        self.view.clear_redo();
        self.collect_garbage();
    }

    /// Drop overlays referenced neither by `added` nor by `redo`.
    pub fn collect_garbage(&mut self) {
        let view = &self.view;
        self.overlays.retain(|id, _| {
            let handle = ViewHandle::Overlay(*id);
            view.contains(handle) || view.redo_iter().any(|h| h == handle)
        });
    }

    /// Forget everything, including the redo stack.
    pub fn clear(&mut self) {
        self.overlays.clear();
        self.view.clear_added();
        self.view.clear_redo();
    }

    fn hide_helper(&mut self, handle: ViewHandle) {
        if let Some(overlay) = handle.overlay_id().and_then(|id| self.overlays.get_mut(&id)) {
            overlay.helper_box = false;
        }
    }
}

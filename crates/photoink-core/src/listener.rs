//! Callbacks from the editor to the host.

use crate::color::Rgba;
use crate::overlay::{OverlayId, OverlayKind};

/// Optional notifications, all invoked on the UI thread after the view
/// state has been updated.
pub trait EditorListener {
    /// `count` is the number of entries in the view log after the add.
    fn on_add_view(&mut self, _kind: OverlayKind, _count: usize) {}

    fn on_remove_view(&mut self, _kind: OverlayKind, _count: usize) {}

    fn on_start_view_change(&mut self, _kind: OverlayKind) {}

    fn on_stop_view_change(&mut self, _kind: OverlayKind) {}

    /// A text overlay was long-pressed.
    fn on_edit_text_requested(&mut self, _id: OverlayId, _text: &str, _color: Rgba) {}
}

//! Host drawing surface used for live preview.

use crate::overlay::Overlay;

/// Visual nodes mirrored per overlay. Never consulted for export.
pub trait DrawSurface {
    fn add_node(&mut self, overlay: &Overlay);

    fn remove_node(&mut self, overlay: &Overlay);

    /// The overlay's transform or content changed.
    fn update_layout(&mut self, overlay: &Overlay);
}

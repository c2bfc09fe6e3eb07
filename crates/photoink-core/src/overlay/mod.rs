//! Overlays stacked on top of the base image.

mod emoji;
mod sticker;
mod text;
mod transform;

pub use emoji::EmojiLabel;
pub use sticker::Sticker;
pub use text::{Gravity, TextLabel, TextStyle};
pub use transform::{OverlayTransform, normalize_angle};

use crate::Bitmap;
use crate::color::Rgba;
use crate::fonts::{FontProvider, GlyphMask};
use crate::raster;
use kurbo::{Affine, Point, Rect, Size};
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for overlays.
pub type OverlayId = Uuid;

/// Padding around text content, on each side, in pixels.
pub const TEXT_PADDING: f64 = 8.0;

/// Kind tag reported to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayKind {
    BrushStroke,
    Sticker,
    Text,
    Emoji,
}

/// Kind-specific content of an overlay.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayPayload {
    Sticker(Sticker),
    Text(TextLabel),
    Emoji(EmojiLabel),
}

/// A transformable object on the canvas.
///
/// Brush strokes are not overlays; they live in the stroke buffer and are
/// represented in the view state by the strokes sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub(crate) id: OverlayId,
    pub transform: OverlayTransform,
    pub payload: OverlayPayload,
    /// Helper box (selection border and close button) is shown.
    pub helper_box: bool,
    /// Pinch gestures may change the scale.
    pub scalable: bool,
}

impl Overlay {
    pub fn new(payload: OverlayPayload, transform: OverlayTransform) -> Self {
        Self {
            id: Uuid::new_v4(),
            transform,
            payload,
            helper_box: false,
            scalable: true,
        }
    }

    pub fn with_scalable(mut self, scalable: bool) -> Self {
        self.scalable = scalable;
        self
    }

    pub fn id(&self) -> OverlayId {
        self.id
    }

    pub fn kind(&self) -> OverlayKind {
        match &self.payload {
            OverlayPayload::Sticker(_) => OverlayKind::Sticker,
            OverlayPayload::Text(_) => OverlayKind::Text,
            OverlayPayload::Emoji(_) => OverlayKind::Emoji,
        }
    }

    /// Unscaled size of the content in pixels.
    pub fn content_size(&self, fonts: &dyn FontProvider) -> Size {
        match &self.payload {
            OverlayPayload::Sticker(s) => Size::new(s.width() as f64, s.height() as f64),
            OverlayPayload::Text(t) => {
                let glyphs = fonts.measure(&t.request());
                Size::new(
                    glyphs.width + 2.0 * TEXT_PADDING,
                    glyphs.height + 2.0 * TEXT_PADDING,
                )
            }
            OverlayPayload::Emoji(e) => fonts.measure(&e.request()),
        }
    }

    /// Content rectangle in the overlay's local frame, centred on the origin.
    pub fn local_rect(&self, fonts: &dyn FontProvider) -> Rect {
        Rect::from_center_size(Point::ZERO, self.content_size(fonts))
    }

    pub fn affine(&self) -> Affine {
        self.transform.to_affine()
    }

    /// Axis-aligned bounding box on the canvas.
    pub fn bounds(&self, fonts: &dyn FontProvider) -> Rect {
        self.affine().transform_rect_bbox(self.local_rect(fonts))
    }

    /// Corners of the transformed content rectangle, clockwise from top-left.
    pub fn corners(&self, fonts: &dyn FontProvider) -> [Point; 4] {
        let r = self.local_rect(fonts);
        let a = self.affine();
        [
            a * Point::new(r.x0, r.y0),
            a * Point::new(r.x1, r.y0),
            a * Point::new(r.x1, r.y1),
            a * Point::new(r.x0, r.y1),
        ]
    }

    /// Check if a canvas point falls on the transformed content rectangle.
    pub fn hit_test(&self, point: Point, fonts: &dyn FontProvider) -> bool {
        let size = self.content_size(fonts);
        let local = self.affine().inverse() * point;
        local.x.abs() <= size.width / 2.0 && local.y.abs() <= size.height / 2.0
    }

    /// Rasterise the untransformed content.
    pub fn content_bitmap(&self, fonts: &dyn FontProvider) -> Arc<Bitmap> {
        match &self.payload {
            OverlayPayload::Sticker(s) => Arc::clone(&s.bitmap),
            OverlayPayload::Text(t) => {
                let glyphs = fonts.rasterize(&t.request());
                let pad = TEXT_PADDING as u32;
                let mut content = Bitmap::new(glyphs.width + 2 * pad, glyphs.height + 2 * pad);
                if let Some(background) = t.background {
                    raster::fill(&mut content, background);
                }
                raster::blend_mask(&mut content, &glyphs, pad, pad, t.color);
                Arc::new(content)
            }
            OverlayPayload::Emoji(e) => {
                let glyphs = fonts.rasterize(&e.request());
                Arc::new(mask_to_bitmap(&glyphs, Rgba::BLACK))
            }
        }
    }

    pub fn as_text(&self) -> Option<&TextLabel> {
        match &self.payload {
            OverlayPayload::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut TextLabel> {
        match &mut self.payload {
            OverlayPayload::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_sticker(&self) -> Option<&Sticker> {
        match &self.payload {
            OverlayPayload::Sticker(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_emoji(&self) -> Option<&EmojiLabel> {
        match &self.payload {
            OverlayPayload::Emoji(e) => Some(e),
            _ => None,
        }
    }
}

fn mask_to_bitmap(mask: &GlyphMask, color: Rgba) -> Bitmap {
    let mut bitmap = Bitmap::new(mask.width, mask.height);
    raster::blend_mask(&mut bitmap, mask, 0, 0, color);
    bitmap
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::BlockFont;
    use std::f64::consts::FRAC_PI_2;

    fn sticker(w: u32, h: u32) -> Overlay {
        let bitmap = Bitmap::from_pixel(w, h, image::Rgba([255, 0, 0, 255]));
        Overlay::new(
            OverlayPayload::Sticker(Sticker::new(bitmap)),
            OverlayTransform::at(Point::new(50.0, 50.0)),
        )
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(sticker(2, 2).id(), sticker(2, 2).id());
    }

    #[test]
    fn test_hit_test_respects_rotation() {
        let mut overlay = sticker(40, 10);
        assert!(overlay.hit_test(Point::new(68.0, 50.0), &BlockFont));
        assert!(!overlay.hit_test(Point::new(50.0, 62.0), &BlockFont));

        overlay.transform.rotation = FRAC_PI_2;
        assert!(!overlay.hit_test(Point::new(68.0, 50.0), &BlockFont));
        assert!(overlay.hit_test(Point::new(50.0, 68.0), &BlockFont));
    }

    #[test]
    fn test_bounds_scale() {
        let mut overlay = sticker(20, 10);
        overlay.transform.scale = 2.0;
        let bounds = overlay.bounds(&BlockFont);
        assert!((bounds.width() - 40.0).abs() < 1e-9);
        assert!((bounds.height() - 20.0).abs() < 1e-9);
        assert!((bounds.center().x - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_text_content_is_padded() {
        let overlay = Overlay::new(
            OverlayPayload::Text(TextLabel::new("hi")),
            OverlayTransform::default(),
        );
        // "hi" at 30px: 36 x 36 glyph box plus 8px on each side.
        assert_eq!(overlay.content_size(&BlockFont), Size::new(52.0, 52.0));
        let content = overlay.content_bitmap(&BlockFont);
        assert_eq!(content.dimensions(), (52, 52));
        assert_eq!(content.get_pixel(0, 0).0[3], 0);
        assert_eq!(overlay.kind(), OverlayKind::Text);
    }

    #[test]
    fn test_text_background_fills_padding() {
        let mut label = TextLabel::new("x");
        label.background = Some(Rgba::WHITE);
        let overlay = Overlay::new(OverlayPayload::Text(label), OverlayTransform::default());
        let content = overlay.content_bitmap(&BlockFont);
        assert_eq!(content.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }
}

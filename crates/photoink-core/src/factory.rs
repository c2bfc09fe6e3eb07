//! Construction of overlays with their initial placement and style.

use crate::Bitmap;
use crate::fonts::FontId;
use crate::overlay::{
    EmojiLabel, Overlay, OverlayPayload, OverlayTransform, Sticker, TextLabel, TextStyle,
};
use kurbo::{Point, Size};
use std::sync::Arc;

/// Builds overlays centred on the canvas at unit scale.
#[derive(Debug, Clone)]
pub struct OverlayFactory {
    canvas: Size,
    text_pinch_scalable: bool,
    default_text_font: Option<FontId>,
    default_emoji_font: Option<FontId>,
}

impl OverlayFactory {
    pub fn new(canvas: Size) -> Self {
        Self {
            canvas,
            text_pinch_scalable: true,
            default_text_font: None,
            default_emoji_font: None,
        }
    }

    pub fn with_text_pinch_scalable(mut self, scalable: bool) -> Self {
        self.text_pinch_scalable = scalable;
        self
    }

    pub fn with_default_text_font(mut self, font: Option<FontId>) -> Self {
        self.default_text_font = font;
        self
    }

    pub fn with_default_emoji_font(mut self, font: Option<FontId>) -> Self {
        self.default_emoji_font = font;
        self
    }

    pub fn canvas_size(&self) -> Size {
        self.canvas
    }

    fn centred(&self) -> OverlayTransform {
        OverlayTransform::at(Point::new(self.canvas.width / 2.0, self.canvas.height / 2.0))
    }

    pub fn sticker(&self, bitmap: impl Into<Arc<Bitmap>>) -> Overlay {
        Overlay::new(OverlayPayload::Sticker(Sticker::new(bitmap)), self.centred())
    }

    pub fn text(&self, text: &str, style: &TextStyle) -> Overlay {
        let mut label = TextLabel::new(text);
        label.font = self.default_text_font.clone();
        label.apply_style(style);
        Overlay::new(OverlayPayload::Text(label), self.centred())
            .with_scalable(self.text_pinch_scalable)
    }

    /// Emoji at 56 pt in `font`, falling back to the configured emoji font.
    pub fn emoji(&self, glyph: &str, font: Option<FontId>) -> Overlay {
        let font = font.or_else(|| self.default_emoji_font.clone());
        Overlay::new(
            OverlayPayload::Emoji(EmojiLabel::new(glyph, font)),
            self.centred(),
        )
    }
}

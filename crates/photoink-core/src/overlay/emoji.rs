//! Emoji / glyph overlay.

use crate::fonts::{FontId, TextRequest};
use crate::overlay::Gravity;

#[derive(Debug, Clone, PartialEq)]
pub struct EmojiLabel {
    pub glyph: String,
    pub font: Option<FontId>,
    pub size_pt: f64,
}

impl EmojiLabel {
    pub const DEFAULT_SIZE_PT: f64 = 56.0;

    pub fn new(glyph: impl Into<String>, font: Option<FontId>) -> Self {
        Self {
            glyph: glyph.into(),
            font,
            size_pt: Self::DEFAULT_SIZE_PT,
        }
    }

    pub fn request(&self) -> TextRequest<'_> {
        TextRequest {
            font: self.font.as_ref(),
            text: &self.glyph,
            size_px: self.size_pt,
            gravity: Gravity::Center,
            appearance: None,
        }
    }
}

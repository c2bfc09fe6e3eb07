//! Pasted bitmap overlay.

use crate::Bitmap;
use std::sync::Arc;

/// Immutable bitmap payload; shared cheaply with in-flight saves.
#[derive(Debug, Clone, PartialEq)]
pub struct Sticker {
    pub bitmap: Arc<Bitmap>,
}

impl Sticker {
    pub fn new(bitmap: impl Into<Arc<Bitmap>>) -> Self {
        Self {
            bitmap: bitmap.into(),
        }
    }

    pub fn width(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn height(&self) -> u32 {
        self.bitmap.height()
    }
}

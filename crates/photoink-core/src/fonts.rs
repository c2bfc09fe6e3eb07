//! Font provider interface and the built-in block font.

use crate::overlay::Gravity;
use kurbo::Size;
use serde::{Deserialize, Serialize};

/// Opaque font identifier resolved by the host's [`FontProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FontId(pub String);

impl FontId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FontId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Everything a provider needs to shape one label.
#[derive(Debug, Clone, Copy)]
pub struct TextRequest<'a> {
    pub font: Option<&'a FontId>,
    pub text: &'a str,
    /// Font size in canvas pixels.
    pub size_px: f64,
    pub gravity: Gravity,
    pub appearance: Option<&'a str>,
}

/// 8-bit coverage mask produced by a rasteriser, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphMask {
    pub width: u32,
    pub height: u32,
    pub coverage: Vec<u8>,
}

impl GlyphMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            coverage: vec![0; width as usize * height as usize],
        }
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.coverage[y as usize * self.width as usize + x as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        if x < self.width && y < self.height {
            self.coverage[y as usize * self.width as usize + x as usize] = value;
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width as f64, self.height as f64)
    }

    /// True if no pixel has any coverage.
    pub fn is_blank(&self) -> bool {
        self.coverage.iter().all(|&c| c == 0)
    }
}

/// Host font renderer.
///
/// Shared with the background save worker, hence `Send + Sync`.
/// Implementations must be deterministic for identical requests.
pub trait FontProvider: Send + Sync {
    /// Rasterise the text of `request` into a coverage mask.
    fn rasterize(&self, request: &TextRequest<'_>) -> GlyphMask;

    /// Pixel size of the mask `rasterize` would produce.
    fn measure(&self, request: &TextRequest<'_>) -> Size {
        self.rasterize(request).size()
    }
}

/// Fallback provider that draws every visible character as a solid block.
///
/// Metrics: advance `0.6 * size`, line height `1.2 * size`, blocks span
/// `0.2 * size ..= 1.0 * size` of each line vertically.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockFont;

impl BlockFont {
    const ADVANCE: f64 = 0.6;
    const LINE_HEIGHT: f64 = 1.2;
    const BLOCK_TOP: f64 = 0.2;
    const BLOCK_BOTTOM: f64 = 1.0;
    const INSET: f64 = 0.05;

    fn lines(text: &str) -> Vec<&str> {
        text.split('\n').collect()
    }

    fn dimensions(request: &TextRequest<'_>) -> (u32, u32) {
        let size = request.size_px.max(0.0);
        let lines = Self::lines(request.text);
        let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let width = ceil_px(widest as f64 * size * Self::ADVANCE);
        let height = ceil_px(lines.len() as f64 * size * Self::LINE_HEIGHT);
        (width, height)
    }
}

// Absorb float noise so that e.g. 3 * 10 * 0.6 lands on 18, not 19.
fn ceil_px(value: f64) -> u32 {
    (value - 1e-6).ceil().max(0.0) as u32
}

impl FontProvider for BlockFont {
    fn rasterize(&self, request: &TextRequest<'_>) -> GlyphMask {
        let (width, height) = Self::dimensions(request);
        let mut mask = GlyphMask::new(width, height);
        let size = request.size_px.max(0.0);
        let advance = size * Self::ADVANCE;
        let line_height = size * Self::LINE_HEIGHT;

        for (row, line) in Self::lines(request.text).iter().enumerate() {
            let line_width = line.chars().count() as f64 * advance;
            let offset = match request.gravity {
                Gravity::Left => 0.0,
                Gravity::Center => (width as f64 - line_width) / 2.0,
                Gravity::Right => width as f64 - line_width,
            };
            let top = row as f64 * line_height + size * Self::BLOCK_TOP;
            let bottom = row as f64 * line_height + size * Self::BLOCK_BOTTOM;

            for (col, ch) in line.chars().enumerate() {
                if ch.is_whitespace() {
                    continue;
                }
                let left = offset + col as f64 * advance + size * Self::INSET;
                let right = offset + (col + 1) as f64 * advance - size * Self::INSET;
                for y in 0..height {
                    let cy = y as f64 + 0.5;
                    if cy < top || cy > bottom {
                        continue;
                    }
                    for x in 0..width {
                        let cx = x as f64 + 0.5;
                        if cx >= left && cx <= right {
                            mask.set(x, y, 255);
                        }
                    }
                }
            }
        }
        mask
    }

    fn measure(&self, request: &TextRequest<'_>) -> Size {
        let (width, height) = Self::dimensions(request);
        Size::new(width as f64, height as f64)
    }
}

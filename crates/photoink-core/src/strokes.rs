//! Brush and eraser stroke accumulator.

use crate::Bitmap;
use crate::color::Rgba;
use crate::raster::{self, StrokeMask};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Points closer than this to the last accepted point are skipped.
pub const TOUCH_TOLERANCE: f64 = 4.0;

/// Active brush tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BrushMode {
    #[default]
    Paint,
    Erase,
}

/// Defaults applied to strokes started after the change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushConfig {
    pub mode: BrushMode,
    pub color: Rgba,
    /// Paint stroke width in pixels.
    pub width: f64,
    /// 0 (invisible) to 255 (opaque).
    pub opacity: u8,
    pub eraser_width: f64,
    /// Colour of the live eraser trail; erasing itself always clears.
    pub eraser_color: Rgba,
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self {
            mode: BrushMode::Paint,
            color: Rgba::BLACK,
            width: 25.0,
            opacity: 255,
            eraser_width: 50.0,
            eraser_color: Rgba::WHITE,
        }
    }
}

impl BrushConfig {
    pub fn with_mode(mut self, mode: BrushMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_color(mut self, color: Rgba) -> Self {
        self.color = color;
        self
    }

    pub fn with_width(mut self, width: f64) -> Self {
        self.width = width;
        self
    }

    pub fn with_opacity(mut self, opacity: u8) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_eraser_width(mut self, width: f64) -> Self {
        self.eraser_width = width;
        self
    }

    pub fn with_eraser_color(mut self, color: Rgba) -> Self {
        self.eraser_color = color;
        self
    }
}

/// A finished or in-progress stroke, in canvas coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub mode: BrushMode,
    pub color: Rgba,
    pub width: f64,
    pub opacity: u8,
    pub points: Vec<Point>,
}

impl Stroke {
    fn start(config: &BrushConfig, mode: BrushMode, origin: Point) -> Self {
        let (color, width, opacity) = match mode {
            BrushMode::Paint => (config.color, config.width, config.opacity),
            BrushMode::Erase => (config.eraser_color, config.eraser_width, 255),
        };
        Self {
            mode,
            color,
            width,
            opacity,
            points: vec![origin],
        }
    }

    /// Composite this stroke onto `target`.
    pub fn apply(&self, target: &mut Bitmap) {
        let Some(mask) = StrokeMask::build(&self.points, self.width, target.width(), target.height())
        else {
            return;
        };
        match self.mode {
            BrushMode::Paint => mask.paint(target, self.color.scale_alpha(self.opacity)),
            BrushMode::Erase => mask.erase(target),
        }
    }

    /// Draw the stroke for live preview: erasers show their trail colour.
    fn apply_preview(&self, target: &mut Bitmap) {
        match self.mode {
            BrushMode::Paint => self.apply(target),
            BrushMode::Erase => {
                if let Some(mask) =
                    StrokeMask::build(&self.points, self.width, target.width(), target.height())
                {
                    mask.paint(target, self.color);
                }
            }
        }
    }
}

/// Finished strokes, their private redo stack and the rasterised layer.
///
/// The bitmap always equals the in-order composition of `strokes` onto a
/// transparent canvas, whatever undo/redo history led there.
#[derive(Debug, Clone)]
pub struct StrokeBuffer {
    config: BrushConfig,
    strokes: Vec<Stroke>,
    redo: Vec<Stroke>,
    provisional: Option<Stroke>,
    last_seen: Option<Point>,
    bitmap: Bitmap,
    drawing_mode: bool,
}

impl StrokeBuffer {
    pub fn new(width: u32, height: u32, config: BrushConfig) -> Self {
        Self {
            config,
            strokes: Vec::new(),
            redo: Vec::new(),
            provisional: None,
            last_seen: None,
            bitmap: Bitmap::new(width, height),
            drawing_mode: false,
        }
    }

    pub fn config(&self) -> &BrushConfig {
        &self.config
    }

    /// Replace the defaults for subsequent strokes, including the tool.
    pub fn configure(&mut self, config: BrushConfig) {
        self.config = config;
    }

    pub fn config_mut(&mut self) -> &mut BrushConfig {
        &mut self.config
    }

    pub fn mode(&self) -> BrushMode {
        self.config.mode
    }

    pub fn set_mode(&mut self, mode: BrushMode) {
        self.config.mode = mode;
    }

    pub fn drawing_mode(&self) -> bool {
        self.drawing_mode
    }

    /// Enabling drawing returns the tool to paint; disabling drops any live stroke.
    pub fn set_drawing_mode(&mut self, enabled: bool) {
        self.drawing_mode = enabled;
        if enabled {
            self.config.mode = BrushMode::Paint;
        } else {
            self.cancel_stroke();
        }
    }

    pub fn begin_stroke(&mut self, origin: Point) {
        self.provisional = Some(Stroke::start(&self.config, self.config.mode, origin));
        self.last_seen = Some(origin);
    }

    /// Add a point to the live stroke. Returns false if it was skipped.
    pub fn extend(&mut self, point: Point) -> bool {
        let Some(stroke) = self.provisional.as_mut() else {
            return false;
        };
        self.last_seen = Some(point);
        let accept = stroke
            .points
            .last()
            .is_none_or(|last| last.distance(point) >= TOUCH_TOLERANCE);
        if accept {
            stroke.points.push(point);
        }
        accept
    }

    /// Commit the live stroke. Returns false if no stroke was in progress.
    pub fn end_stroke(&mut self) -> bool {
        let Some(mut stroke) = self.provisional.take() else {
            return false;
        };
        if let Some(last_seen) = self.last_seen.take() {
            if stroke.points.last() != Some(&last_seen) {
                stroke.points.push(last_seen);
            }
        }
        stroke.apply(&mut self.bitmap);
        self.strokes.push(stroke);
        self.redo.clear();
        log::debug!("stroke committed ({} total)", self.strokes.len());
        true
    }

    /// Discard the live stroke without committing it.
    pub fn cancel_stroke(&mut self) {
        self.provisional = None;
        self.last_seen = None;
    }

    pub fn is_drawing(&self) -> bool {
        self.provisional.is_some()
    }

    pub fn undo(&mut self) -> bool {
        let Some(stroke) = self.strokes.pop() else {
            return false;
        };
        self.redo.push(stroke);
        self.repaint();
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(stroke) = self.redo.pop() else {
            return false;
        };
        stroke.apply(&mut self.bitmap);
        self.strokes.push(stroke);
        true
    }

    /// Discard every stroke and the sub-redo stack.
    pub fn clear_all(&mut self) {
        self.strokes.clear();
        self.redo.clear();
        self.cancel_stroke();
        raster::fill(&mut self.bitmap, Rgba::TRANSPARENT);
    }

    /// Forget undone strokes, after a non-undo edit elsewhere.
    pub fn clear_redo(&mut self) {
        self.redo.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.strokes.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn stroke_count(&self) -> usize {
        self.strokes.len()
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    /// Blit the finished-stroke layer onto `target`.
    pub fn render(&self, target: &mut Bitmap, opacity: u8) {
        raster::composite(target, &self.bitmap, 0, 0, opacity);
    }

    /// Finished strokes plus the live one, for on-screen feedback.
    pub fn preview_bitmap(&self) -> Bitmap {
        let mut layer = self.bitmap.clone();
        if let Some(stroke) = &self.provisional {
            stroke.apply_preview(&mut layer);
        }
        layer
    }

    fn repaint(&mut self) {
        raster::fill(&mut self.bitmap, Rgba::TRANSPARENT);
        for stroke in &self.strokes {
            stroke.apply(&mut self.bitmap);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> StrokeBuffer {
        StrokeBuffer::new(100, 100, BrushConfig::default().with_width(4.0))
    }

    fn draw(buffer: &mut StrokeBuffer, from: (f64, f64), to: (f64, f64)) {
        buffer.begin_stroke(Point::new(from.0, from.1));
        let steps = 10;
        for i in 1..=steps {
            let t = i as f64 / steps as f64;
            buffer.extend(Point::new(
                from.0 + (to.0 - from.0) * t,
                from.1 + (to.1 - from.1) * t,
            ));
        }
        assert!(buffer.end_stroke());
    }

    fn replayed(strokes: &[Stroke]) -> Bitmap {
        let mut bitmap = Bitmap::new(100, 100);
        for s in strokes {
            s.apply(&mut bitmap);
        }
        bitmap
    }

    #[test]
    fn test_brush_then_erase() {
        let mut buf = buffer();
        buf.configure(
            BrushConfig::default()
                .with_color(Rgba::BLACK)
                .with_width(4.0)
                .with_opacity(255)
                .with_eraser_width(4.0),
        );
        draw(&mut buf, (10.0, 50.0), (90.0, 50.0));
        buf.set_mode(BrushMode::Erase);
        draw(&mut buf, (40.0, 50.0), (60.0, 50.0));

        assert_eq!(buf.bitmap().get_pixel(50, 50).0[3], 0);
        assert_eq!(buf.bitmap().get_pixel(20, 50).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_tolerance_skips_close_points_but_keeps_end() {
        let mut buf = buffer();
        buf.begin_stroke(Point::new(10.0, 10.0));
        assert!(!buf.extend(Point::new(11.0, 10.0)));
        assert!(buf.extend(Point::new(15.0, 10.0)));
        assert!(!buf.extend(Point::new(17.0, 10.0)));
        buf.end_stroke();
        let points = &buf.strokes()[0].points;
        assert_eq!(points.len(), 3);
        assert_eq!(points[2], Point::new(17.0, 10.0));
    }

    #[test]
    fn test_undo_redo_matches_replay() {
        let mut buf = buffer();
        draw(&mut buf, (10.0, 10.0), (90.0, 90.0));
        buf.configure(BrushConfig::default().with_color(Rgba::rgb(255, 0, 0)).with_width(6.0).with_opacity(128));
        draw(&mut buf, (10.0, 90.0), (90.0, 10.0));
        buf.set_mode(BrushMode::Erase);
        draw(&mut buf, (50.0, 0.0), (50.0, 100.0));

        let before = buf.bitmap().clone();
        assert!(buf.undo());
        assert!(buf.undo());
        assert_eq!(buf.bitmap(), &replayed(buf.strokes()));
        assert!(buf.redo());
        assert!(buf.redo());
        assert!(!buf.redo());
        assert_eq!(buf.bitmap(), &before);
        assert_eq!(buf.bitmap(), &replayed(buf.strokes()));
    }

    #[test]
    fn test_end_stroke_clears_redo() {
        let mut buf = buffer();
        draw(&mut buf, (10.0, 10.0), (20.0, 10.0));
        buf.undo();
        assert!(buf.can_redo());
        draw(&mut buf, (10.0, 30.0), (20.0, 30.0));
        assert!(!buf.can_redo());
    }

    #[test]
    fn test_opacity_applies_once_per_stroke() {
        let mut buf = StrokeBuffer::new(100, 100, BrushConfig::default().with_width(10.0).with_opacity(128));
        // Back-and-forth strokes overlap themselves.
        buf.begin_stroke(Point::new(10.0, 50.0));
        buf.extend(Point::new(50.0, 50.0));
        buf.extend(Point::new(20.0, 50.0));
        buf.end_stroke();
        assert_eq!(buf.bitmap().get_pixel(30, 50).0[3], 128);
    }

    #[test]
    fn test_drawing_mode_resets_tool_and_cancels() {
        let mut buf = buffer();
        buf.set_mode(BrushMode::Erase);
        buf.set_drawing_mode(true);
        assert_eq!(buf.mode(), BrushMode::Paint);
        buf.begin_stroke(Point::new(1.0, 1.0));
        buf.set_drawing_mode(false);
        assert!(!buf.is_drawing());
        assert!(!buf.end_stroke());
    }

    #[test]
    fn test_clear_all() {
        let mut buf = buffer();
        draw(&mut buf, (10.0, 10.0), (90.0, 10.0));
        buf.undo();
        draw(&mut buf, (10.0, 20.0), (90.0, 20.0));
        buf.clear_all();
        assert!(!buf.can_undo());
        assert!(!buf.can_redo());
        assert!(buf.bitmap().pixels().all(|p| p.0[3] == 0));
    }
}

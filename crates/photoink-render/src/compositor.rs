//! Scene flattening.

use kurbo::Point;
use peniko::Color;
use photoink_core::raster::{self, StrokeMask};
use photoink_core::{Bitmap, FontProvider, Overlay, Rgba, SaveSettings, Scene, StrokeBuffer, ViewHandle};
use std::sync::Arc;

/// One entry of the view log, frozen for compositing.
#[derive(Debug, Clone)]
pub enum Layer {
    Strokes(Arc<Bitmap>),
    Overlay(Overlay),
}

/// Immutable copy of everything `flatten` reads from the live scene.
///
/// Later edits to the scene or the stroke buffer do not affect it.
#[derive(Debug, Clone, Default)]
pub struct SceneSnapshot {
    pub layers: Vec<Layer>,
}

impl SceneSnapshot {
    pub fn capture(scene: &Scene, strokes: &StrokeBuffer) -> Self {
        let mut stroke_layer: Option<Arc<Bitmap>> = None;
        let layers = scene
            .view()
            .iter()
            .filter_map(|handle| match handle {
                ViewHandle::Strokes => {
                    let bitmap = stroke_layer
                        .get_or_insert_with(|| Arc::new(strokes.bitmap().clone()))
                        .clone();
                    Some(Layer::Strokes(bitmap))
                }
                ViewHandle::Overlay(id) => scene.get(id).cloned().map(Layer::Overlay),
            })
            .collect();
        Self { layers }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Renders scenes onto the base image.
#[derive(Clone)]
pub struct Compositor {
    fonts: Arc<dyn FontProvider>,
    selection_color: Color,
    selection_width: f64,
}

impl Compositor {
    pub fn new(fonts: Arc<dyn FontProvider>) -> Self {
        Self {
            fonts,
            selection_color: Color::from_rgba8(59, 130, 246, 255), // Blue
            selection_width: 2.0,
        }
    }

    pub fn with_selection_color(mut self, color: Color) -> Self {
        self.selection_color = color;
        self
    }

    pub fn with_selection_width(mut self, width: f64) -> Self {
        self.selection_width = width;
        self
    }

    pub fn fonts(&self) -> &Arc<dyn FontProvider> {
        &self.fonts
    }

    /// Base image, then every layer in insertion order; no helpers.
    pub fn flatten(&self, base: &Bitmap, snapshot: &SceneSnapshot, settings: &SaveSettings) -> Bitmap {
        let mut output = Bitmap::new(base.width(), base.height());
        raster::composite(&mut output, base, 0, 0, 255);
        for layer in &snapshot.layers {
            match layer {
                Layer::Strokes(bitmap) => raster::composite(&mut output, bitmap, 0, 0, 255),
                Layer::Overlay(overlay) => self.draw_overlay(&mut output, overlay),
            }
        }
        if settings.strip_transparent_borders {
            output = raster::crop_transparent(output);
        }
        output
    }

    /// What the user sees: includes the live stroke and visible helper boxes.
    pub fn render_preview(&self, base: &Bitmap, scene: &Scene, strokes: &StrokeBuffer) -> Bitmap {
        let mut output = Bitmap::new(base.width(), base.height());
        raster::composite(&mut output, base, 0, 0, 255);
        let mut strokes_drawn = false;
        for handle in scene.view().iter() {
            match handle {
                ViewHandle::Strokes => {
                    raster::composite(&mut output, &strokes.preview_bitmap(), 0, 0, 255);
                    strokes_drawn = true;
                }
                ViewHandle::Overlay(id) => {
                    if let Some(overlay) = scene.get(id) {
                        self.draw_overlay(&mut output, overlay);
                    }
                }
            }
        }
        // The first stroke is still live and has no sentinel yet.
        if !strokes_drawn && strokes.is_drawing() {
            raster::composite(&mut output, &strokes.preview_bitmap(), 0, 0, 255);
        }
        for overlay in scene.visible().filter(|o| o.helper_box) {
            self.draw_helper_box(&mut output, overlay);
        }
        output
    }

    fn draw_overlay(&self, output: &mut Bitmap, overlay: &Overlay) {
        let content = overlay.content_bitmap(self.fonts.as_ref());
        raster::draw_transformed(output, &content, overlay.affine());
    }

    fn draw_helper_box(&self, output: &mut Bitmap, overlay: &Overlay) {
        let corners = overlay.corners(self.fonts.as_ref());
        let outline: Vec<Point> = raster::closed_outline(&corners);
        if let Some(mask) = StrokeMask::build(&outline, self.selection_width, output.width(), output.height()) {
            mask.paint(output, Rgba::from(self.selection_color));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use photoink_core::{BlockFont, BrushConfig, OverlayFactory, TextStyle};
    use kurbo::Size;

    fn white(w: u32, h: u32) -> Bitmap {
        Bitmap::from_pixel(w, h, image::Rgba([255, 255, 255, 255]))
    }

    fn compositor() -> Compositor {
        Compositor::new(Arc::new(BlockFont))
    }

    fn red_square(size: u32) -> Bitmap {
        Bitmap::from_pixel(size, size, image::Rgba([255, 0, 0, 255]))
    }

    #[test]
    fn test_empty_scene_is_base() {
        let base = white(20, 10);
        let out = compositor().flatten(&base, &SceneSnapshot::default(), &SaveSettings::default());
        assert_eq!(out, base);
    }

    #[test]
    fn test_overlays_in_insertion_order() {
        let factory = OverlayFactory::new(Size::new(100.0, 100.0));
        let mut scene = Scene::new();
        scene.insert(factory.sticker(red_square(20)));
        scene.insert(factory.sticker(Bitmap::from_pixel(10, 10, image::Rgba([0, 0, 255, 255]))));
        let strokes = StrokeBuffer::new(100, 100, BrushConfig::default());

        let out = compositor().flatten(
            &white(100, 100),
            &SceneSnapshot::capture(&scene, &strokes),
            &SaveSettings::default(),
        );
        assert_eq!(out.get_pixel(50, 50).0, [0, 0, 255, 255]);
        assert_eq!(out.get_pixel(42, 42).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(10, 10).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_flatten_is_deterministic_and_never_draws_helpers() {
        let factory = OverlayFactory::new(Size::new(100.0, 100.0));
        let mut scene = Scene::new();
        let id = scene.insert(factory.text("hi", &TextStyle::new()));
        scene.get_mut(id).unwrap().transform.rotation = 0.3;
        scene.select(id);
        let strokes = StrokeBuffer::new(100, 100, BrushConfig::default());
        let snapshot = SceneSnapshot::capture(&scene, &strokes);

        let c = compositor();
        let a = c.flatten(&white(100, 100), &snapshot, &SaveSettings::default());
        let b = c.flatten(&white(100, 100), &snapshot, &SaveSettings::default());
        assert_eq!(a, b);

        let preview = c.render_preview(&white(100, 100), &scene, &strokes);
        assert_ne!(preview, a);
    }

    #[test]
    fn test_strip_transparent_borders() {
        let factory = OverlayFactory::new(Size::new(100.0, 100.0));
        let mut scene = Scene::new();
        scene.insert(factory.sticker(red_square(10)));
        let strokes = StrokeBuffer::new(100, 100, BrushConfig::default());
        let settings = SaveSettings::new().with_strip_transparent_borders(true);

        let out = compositor().flatten(
            &Bitmap::new(100, 100),
            &SceneSnapshot::capture(&scene, &strokes),
            &settings,
        );
        assert_eq!(out.dimensions(), (10, 10));
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_strokes() {
        let mut scene = Scene::new();
        let mut strokes = StrokeBuffer::new(50, 50, BrushConfig::default().with_width(4.0));
        strokes.begin_stroke(Point::new(5.0, 5.0));
        strokes.extend(Point::new(45.0, 5.0));
        strokes.end_stroke();
        scene.view_mut().append(ViewHandle::Strokes).unwrap();
        let snapshot = SceneSnapshot::capture(&scene, &strokes);

        strokes.begin_stroke(Point::new(5.0, 40.0));
        strokes.extend(Point::new(45.0, 40.0));
        strokes.end_stroke();

        let out = compositor().flatten(&white(50, 50), &snapshot, &SaveSettings::default());
        assert_eq!(out.get_pixel(20, 5).0, [0, 0, 0, 255]);
        assert_eq!(out.get_pixel(20, 40).0, [255, 255, 255, 255]);
    }
}

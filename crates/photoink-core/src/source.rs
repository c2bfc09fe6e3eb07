//! Source of the post-filter base image.

use crate::Bitmap;
use crate::error::SaveResult;
use image::imageops;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Receives the post-filter base bitmap, possibly from another thread.
pub type BitmapSink = Box<dyn FnOnce(SaveResult<Arc<Bitmap>>) + Send>;

/// Built-in photo filters of the host shader pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PhotoFilter {
    #[default]
    None,
    AutoFix,
    BlackWhite,
    Brightness,
    Contrast,
    CrossProcess,
    Documentary,
    DueTone,
    FillLight,
    FishEye,
    FlipVertical,
    FlipHorizontal,
    Grain,
    GrayScale,
    Lomish,
    Negative,
    Posterize,
    Rotate,
    Saturate,
    Sepia,
    Sharpen,
    Temperature,
    Tint,
    Vignette,
}

/// Host-defined effect with free-form numeric parameters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CustomEffect {
    pub name: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
}

impl CustomEffect {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: f64) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterEffect {
    Preset(PhotoFilter),
    Custom(CustomEffect),
}

impl Default for FilterEffect {
    fn default() -> Self {
        FilterEffect::Preset(PhotoFilter::None)
    }
}

impl From<PhotoFilter> for FilterEffect {
    fn from(filter: PhotoFilter) -> Self {
        FilterEffect::Preset(filter)
    }
}

/// The host view showing the base image through the filter pipeline.
pub trait FilteredSource {
    fn set_filter(&mut self, effect: FilterEffect);

    /// Deliver the post-filter bitmap to `sink`, now or later.
    fn request_bitmap(&mut self, sink: BitmapSink);

    /// Canvas size in pixels.
    fn size(&self) -> (u32, u32);
}

/// In-memory source that applies CPU approximations of the simple filters.
///
/// Filters that need the host shader pipeline pass the image through.
#[derive(Debug, Clone)]
pub struct StaticImageSource {
    original: Arc<Bitmap>,
    filtered: Arc<Bitmap>,
    effect: FilterEffect,
}

impl StaticImageSource {
    pub fn new(bitmap: Bitmap) -> Self {
        let original = Arc::new(bitmap);
        Self {
            filtered: Arc::clone(&original),
            original,
            effect: FilterEffect::default(),
        }
    }

    pub fn effect(&self) -> &FilterEffect {
        &self.effect
    }

    pub fn filtered(&self) -> &Arc<Bitmap> {
        &self.filtered
    }
}

impl FilteredSource for StaticImageSource {
    fn set_filter(&mut self, effect: FilterEffect) {
        self.filtered = match &effect {
            FilterEffect::Preset(PhotoFilter::None) => Arc::clone(&self.original),
            FilterEffect::Preset(filter) => Arc::new(apply_filter(&self.original, *filter)),
            FilterEffect::Custom(custom) => {
                log::debug!("custom effect '{}' has no CPU approximation", custom.name);
                Arc::clone(&self.original)
            }
        };
        self.effect = effect;
    }

    fn request_bitmap(&mut self, sink: BitmapSink) {
        sink(Ok(Arc::clone(&self.filtered)));
    }

    fn size(&self) -> (u32, u32) {
        self.original.dimensions()
    }
}

fn luma(px: [u8; 4]) -> u8 {
    ((px[0] as u32 * 299 + px[1] as u32 * 587 + px[2] as u32 * 114 + 500) / 1000) as u8
}

fn map_pixels(bitmap: &Bitmap, f: impl Fn([u8; 4]) -> [u8; 4]) -> Bitmap {
    let mut out = bitmap.clone();
    for px in out.pixels_mut() {
        px.0 = f(px.0);
    }
    out
}

/// CPU approximation of a preset filter.
pub fn apply_filter(bitmap: &Bitmap, filter: PhotoFilter) -> Bitmap {
    match filter {
        PhotoFilter::None => bitmap.clone(),
        PhotoFilter::BlackWhite => map_pixels(bitmap, |p| {
            let v = if luma(p) >= 128 { 255 } else { 0 };
            [v, v, v, p[3]]
        }),
        PhotoFilter::GrayScale => map_pixels(bitmap, |p| {
            let v = luma(p);
            [v, v, v, p[3]]
        }),
        PhotoFilter::Negative => map_pixels(bitmap, |p| [255 - p[0], 255 - p[1], 255 - p[2], p[3]]),
        PhotoFilter::Sepia => map_pixels(bitmap, |p| {
            let (r, g, b) = (p[0] as f64, p[1] as f64, p[2] as f64);
            let tone = |cr: f64, cg: f64, cb: f64| (r * cr + g * cg + b * cb).round().min(255.0) as u8;
            [
                tone(0.393, 0.769, 0.189),
                tone(0.349, 0.686, 0.168),
                tone(0.272, 0.534, 0.131),
                p[3],
            ]
        }),
        PhotoFilter::Brightness => imageops::brighten(bitmap, 40),
        PhotoFilter::Contrast => imageops::contrast(bitmap, 30.0),
        PhotoFilter::FlipHorizontal => imageops::flip_horizontal(bitmap),
        PhotoFilter::FlipVertical => imageops::flip_vertical(bitmap),
        other => {
            log::debug!("filter {:?} has no CPU approximation", other);
            bitmap.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn sample() -> Bitmap {
        let mut b = Bitmap::new(2, 1);
        b.put_pixel(0, 0, image::Rgba([200, 10, 10, 255]));
        b.put_pixel(1, 0, image::Rgba([10, 200, 10, 128]));
        b
    }

    fn fetch(source: &mut StaticImageSource) -> Arc<Bitmap> {
        let slot = Arc::new(Mutex::new(None));
        let inner = Arc::clone(&slot);
        source.request_bitmap(Box::new(move |result| {
            *inner.lock().unwrap() = Some(result);
        }));
        let result = slot.lock().unwrap().take().unwrap();
        result.unwrap()
    }

    #[test]
    fn test_none_passes_through() {
        let mut source = StaticImageSource::new(sample());
        assert_eq!(*fetch(&mut source), sample());
        assert_eq!(source.size(), (2, 1));
    }

    #[test]
    fn test_flip_horizontal() {
        let mut source = StaticImageSource::new(sample());
        source.set_filter(PhotoFilter::FlipHorizontal.into());
        let out = fetch(&mut source);
        assert_eq!(out.get_pixel(0, 0).0, [10, 200, 10, 128]);
    }

    #[test]
    fn test_negative_and_grayscale_keep_alpha() {
        let neg = apply_filter(&sample(), PhotoFilter::Negative);
        assert_eq!(neg.get_pixel(1, 0).0, [245, 55, 245, 128]);

        let gray = apply_filter(&sample(), PhotoFilter::GrayScale);
        let p = gray.get_pixel(0, 0).0;
        assert_eq!(p[0], p[1]);
        assert_eq!(p[3], 255);
    }

    #[test]
    fn test_shader_only_filters_pass_through() {
        let mut source = StaticImageSource::new(sample());
        source.set_filter(PhotoFilter::Vignette.into());
        assert_eq!(*fetch(&mut source), sample());
        source.set_filter(FilterEffect::Custom(CustomEffect::new("warm").with_parameter("k", 0.5)));
        assert_eq!(*fetch(&mut source), sample());
    }
}

//! CPU raster primitives on straight-alpha RGBA8 bitmaps.
//!
//! Everything here is integer arithmetic or f64 with a fixed evaluation
//! order, so identical inputs produce byte-identical pixels.

use crate::Bitmap;
use crate::color::Rgba;
use crate::fonts::GlyphMask;
use kurbo::{Affine, Point, Rect};

/// Source-over blend of one straight-alpha pixel onto another.
pub fn blend_pixel(dst: &mut [u8; 4], src: [u8; 4]) {
    let sa = src[3] as u32;
    if sa == 0 {
        return;
    }
    if sa == 255 {
        *dst = src;
        return;
    }
    let da = dst[3] as u32;
    let inv = 255 - sa;
    let out_a = sa + (da * inv + 127) / 255;
    if out_a == 0 {
        *dst = [0, 0, 0, 0];
        return;
    }
    let den = out_a * 255;
    for c in 0..3 {
        let num = src[c] as u32 * sa * 255 + dst[c] as u32 * da * inv;
        dst[c] = ((num + den / 2) / den).min(255) as u8;
    }
    dst[3] = out_a.min(255) as u8;
}

/// Fill every pixel with `color`, replacing what was there.
pub fn fill(dst: &mut Bitmap, color: Rgba) {
    let px = image::Rgba(color.to_array());
    for p in dst.pixels_mut() {
        *p = px;
    }
}

/// Blend `color` through a coverage mask placed at `(x, y)`.
pub fn blend_mask(dst: &mut Bitmap, mask: &GlyphMask, x: u32, y: u32, color: Rgba) {
    for my in 0..mask.height {
        for mx in 0..mask.width {
            let coverage = mask.get(mx, my);
            if coverage == 0 {
                continue;
            }
            let (tx, ty) = (x + mx, y + my);
            if tx >= dst.width() || ty >= dst.height() {
                continue;
            }
            let src = color.scale_alpha(coverage);
            blend_pixel(&mut dst.get_pixel_mut(tx, ty).0, src.to_array());
        }
    }
}

/// Source-over `src` onto `dst` at integer offset, scaling source alpha by `opacity`.
pub fn composite(dst: &mut Bitmap, src: &Bitmap, x: i64, y: i64, opacity: u8) {
    if opacity == 0 {
        return;
    }
    for (sx, sy, px) in src.enumerate_pixels() {
        let tx = x + sx as i64;
        let ty = y + sy as i64;
        if tx < 0 || ty < 0 || tx >= dst.width() as i64 || ty >= dst.height() as i64 {
            continue;
        }
        let mut src_px = px.0;
        if opacity < 255 {
            src_px[3] = ((src_px[3] as u32 * opacity as u32 + 127) / 255) as u8;
        }
        blend_pixel(&mut dst.get_pixel_mut(tx as u32, ty as u32).0, src_px);
    }
}

/// Integer pixel span `[x0, x1) x [y0, y1)` of `rect` clipped to a `width x height` raster.
fn clip_span(rect: Rect, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let x0 = rect.x0.floor().max(0.0);
    let y0 = rect.y0.floor().max(0.0);
    let x1 = rect.x1.ceil().min(width as f64);
    let y1 = rect.y1.ceil().min(height as f64);
    if x0 >= x1 || y0 >= y1 {
        return None;
    }
    Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
}

/// Draw `src`, centred on its local origin, through `affine` onto `dst`.
///
/// Each destination pixel centre is inverse-mapped into the source and
/// sampled nearest-neighbour.
pub fn draw_transformed(dst: &mut Bitmap, src: &Bitmap, affine: Affine) {
    let (w, h) = (src.width() as f64, src.height() as f64);
    if w == 0.0 || h == 0.0 || affine.determinant().abs() < f64::EPSILON {
        return;
    }
    let local = Rect::new(-w / 2.0, -h / 2.0, w / 2.0, h / 2.0);
    let Some((x0, y0, x1, y1)) = clip_span(affine.transform_rect_bbox(local), dst.width(), dst.height())
    else {
        return;
    };
    let inverse = affine.inverse();
    for y in y0..y1 {
        for x in x0..x1 {
            let p = inverse * Point::new(x as f64 + 0.5, y as f64 + 0.5);
            let u = (p.x + w / 2.0).floor();
            let v = (p.y + h / 2.0).floor();
            if u < 0.0 || v < 0.0 || u >= w || v >= h {
                continue;
            }
            let src_px = src.get_pixel(u as u32, v as u32).0;
            blend_pixel(&mut dst.get_pixel_mut(x, y).0, src_px);
        }
    }
}

/// Distance from a point to a line segment (a to b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    (pv - seg * t).hypot()
}

/// Hard-edged coverage of a thick polyline.
///
/// A pixel is covered when its centre lies within `width / 2` of the
/// polyline. Only the bounding box of the stroke is stored.
#[derive(Debug, Clone)]
pub struct StrokeMask {
    x0: u32,
    y0: u32,
    width: u32,
    height: u32,
    covered: Vec<bool>,
}

impl StrokeMask {
    pub fn build(points: &[Point], stroke_width: f64, canvas_width: u32, canvas_height: u32) -> Option<Self> {
        let first = *points.first()?;
        let radius = stroke_width / 2.0;
        if radius <= 0.0 {
            return None;
        }
        let bbox = points
            .iter()
            .fold(Rect::from_points(first, first), |r, p| r.union_pt(*p))
            .inflate(radius, radius);
        let (x0, y0, x1, y1) = clip_span(bbox, canvas_width, canvas_height)?;
        let mut mask = Self {
            x0,
            y0,
            width: x1 - x0,
            height: y1 - y0,
            covered: vec![false; ((x1 - x0) * (y1 - y0)) as usize],
        };

        let segments: Vec<(Point, Point)> = if points.len() == 1 {
            vec![(first, first)]
        } else {
            points.windows(2).map(|w| (w[0], w[1])).collect()
        };
        for (a, b) in segments {
            let seg_box = Rect::from_points(a, b).inflate(radius, radius);
            let Some((sx0, sy0, sx1, sy1)) = clip_span(seg_box, canvas_width, canvas_height) else {
                continue;
            };
            for y in sy0..sy1 {
                for x in sx0..sx1 {
                    let idx = ((y - y0) * mask.width + (x - x0)) as usize;
                    if mask.covered[idx] {
                        continue;
                    }
                    let centre = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                    if point_to_segment_dist(centre, a, b) <= radius {
                        mask.covered[idx] = true;
                    }
                }
            }
        }
        Some(mask)
    }

    fn for_each_covered(&self, mut f: impl FnMut(u32, u32)) {
        for y in 0..self.height {
            for x in 0..self.width {
                if self.covered[(y * self.width + x) as usize] {
                    f(self.x0 + x, self.y0 + y);
                }
            }
        }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        if x < self.x0 || y < self.y0 || x >= self.x0 + self.width || y >= self.y0 + self.height {
            return false;
        }
        self.covered[((y - self.y0) * self.width + (x - self.x0)) as usize]
    }

    /// Blend `color` once over every covered pixel.
    pub fn paint(&self, dst: &mut Bitmap, color: Rgba) {
        let src = color.to_array();
        self.for_each_covered(|x, y| blend_pixel(&mut dst.get_pixel_mut(x, y).0, src));
    }

    /// Clear every covered pixel to transparent.
    pub fn erase(&self, dst: &mut Bitmap) {
        self.for_each_covered(|x, y| dst.put_pixel(x, y, image::Rgba([0, 0, 0, 0])));
    }
}

/// Tight bounding box of pixels with non-zero alpha, as `(x, y, w, h)`.
pub fn opaque_bounds(bitmap: &Bitmap) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, px) in bitmap.enumerate_pixels() {
        if px.0[3] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    bounds.map(|(x0, y0, x1, y1)| (x0, y0, x1 - x0 + 1, y1 - y0 + 1))
}

/// Crop to the tight box of non-transparent pixels.
///
/// A fully transparent bitmap is returned unchanged.
pub fn crop_transparent(bitmap: Bitmap) -> Bitmap {
    match opaque_bounds(&bitmap) {
        Some((x, y, w, h)) if (w, h) != bitmap.dimensions() => {
            image::imageops::crop_imm(&bitmap, x, y, w, h).to_image()
        }
        _ => bitmap,
    }
}

/// Close a polygon by repeating its first corner.
pub fn closed_outline(corners: &[Point]) -> Vec<Point> {
    let mut outline = corners.to_vec();
    if let Some(first) = corners.first() {
        outline.push(*first);
    }
    outline
}

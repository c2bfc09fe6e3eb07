//! Placement of an overlay on the canvas.

use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};

/// Translation of the overlay centre, uniform scale and rotation (radians).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayTransform {
    /// Canvas position of the content centre.
    pub translation: Point,
    /// Uniform scale, always positive.
    pub scale: f64,
    /// Clockwise rotation in radians (canvas y axis points down).
    pub rotation: f64,
}

impl Default for OverlayTransform {
    fn default() -> Self {
        Self::at(Point::ZERO)
    }
}

impl OverlayTransform {
    /// Identity scale and rotation, centred at `translation`.
    pub fn at(translation: Point) -> Self {
        Self {
            translation,
            scale: 1.0,
            rotation: 0.0,
        }
    }

    /// Map from the centred local frame of the content to canvas space.
    pub fn to_affine(&self) -> Affine {
        Affine::translate(self.translation.to_vec2())
            * Affine::rotate(self.rotation)
            * Affine::scale(self.scale)
    }

    pub fn translated(mut self, delta: Vec2) -> Self {
        self.translation += delta;
        self
    }
}

/// Wrap an angle into `(-PI, PI]`.
pub fn normalize_angle(angle: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_affine_maps_origin_to_translation() {
        let t = OverlayTransform::at(Point::new(50.0, 40.0));
        let p = t.to_affine() * Point::ZERO;
        assert!((p.x - 50.0).abs() < 1e-9);
        assert!((p.y - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_rotation_then_scale() {
        let t = OverlayTransform {
            translation: Point::new(10.0, 10.0),
            scale: 2.0,
            rotation: FRAC_PI_2,
        };
        // Local +x axis ends up pointing down after a quarter turn.
        let p = t.to_affine() * Point::new(1.0, 0.0);
        assert!((p.x - 10.0).abs() < 1e-9);
        assert!((p.y - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_angle() {
        use std::f64::consts::PI;
        assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-9);
        assert!((normalize_angle(-PI) - PI).abs() < 1e-9);
        assert!((normalize_angle(0.5) - 0.5).abs() < 1e-12);
    }
}

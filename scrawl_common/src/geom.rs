//! Point types for the two coordinate spaces the system moves between.
//!
//! Local drawing happens in pixel space ([`Point`]); everything on the wire is
//! normalized to the unit square ([`NormPoint`]) so peers with differently
//! sized surfaces render proportionally correct geometry. The two types are
//! deliberately distinct and only convert through [`SurfaceSize`].

use serde::{Deserialize, Serialize};

/// A point (or free vector) in local pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn scale(self, s: f64) -> Point {
        Point::new(self.x * s, self.y * s)
    }

    pub fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }

    pub fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Point) -> f64 {
        self.sub(other).length()
    }

    /// Unit vector in the same direction. A zero-length vector is returned
    /// unchanged rather than erroring; callers treat the zero tangent as a
    /// degenerate-but-valid input.
    pub fn normalized(self) -> Point {
        let len = self.length();
        if len > 0.0 { self.scale(1.0 / len) } else { self }
    }

    /// Linear interpolation between `self` and `other` at parameter `t`.
    pub fn lerp(self, other: Point, t: f64) -> Point {
        Point::new(self.x + (other.x - self.x) * t, self.y + (other.y - self.y) * t)
    }

    pub fn to_norm(self, surface: SurfaceSize) -> NormPoint {
        NormPoint {
            x: self.x / surface.width,
            y: self.y / surface.height,
        }
    }
}

/// A point normalized to the unit square, as transmitted on the wire.
///
/// Serialized as a two-element `[x, y]` array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct NormPoint {
    pub x: f64,
    pub y: f64,
}

impl NormPoint {
    pub fn to_pixel(self, surface: SurfaceSize) -> Point {
        Point::new(self.x * surface.width, self.y * surface.height)
    }
}

impl From<(f64, f64)> for NormPoint {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<NormPoint> for (f64, f64) {
    fn from(p: NormPoint) -> Self {
        (p.x, p.y)
    }
}

/// Dimensions of the local drawing surface, in pixels. Conversions between
/// pixel and normalized space always go through one of these so the scale
/// factor is explicit at every call site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSize {
    pub width: f64,
    pub height: f64,
}

impl SurfaceSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_zero_vector_stays_zero() {
        let v = Point::new(0.0, 0.0).normalized();
        assert_eq!(v, Point::new(0.0, 0.0));
    }

    #[test]
    fn pixel_norm_round_trip() {
        let surface = SurfaceSize::new(1920.0, 1080.0);
        let p = Point::new(960.0, 270.0);
        let n = p.to_norm(surface);
        assert!((n.x - 0.5).abs() < 1e-12);
        assert!((n.y - 0.25).abs() < 1e-12);
        let back = n.to_pixel(surface);
        assert!(back.distance(p) < 1e-9);
    }

    #[test]
    fn norm_point_serializes_as_pair() {
        let n = NormPoint { x: 0.25, y: 0.75 };
        let json = serde_json::to_string(&n).unwrap();
        assert_eq!(json, "[0.25,0.75]");
        let back: NormPoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, n);
    }
}

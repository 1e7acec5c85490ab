use super::font::Font;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;

/// Affine transformation `[a b c d e f]`, applied to row vectors:
/// `[x' y' 1] = [x y 1] × M`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Matrix { a, b, c, d, e, f }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Matrix::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Builds a matrix from six numbers, e.g. `cm` operands or `/Matrix`.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [a, b, c, d, e, f] => Some(Matrix::new(*a, *b, *c, *d, *e, *f)),
            _ => None,
        }
    }

    /// Returns `self × other`: apply `self`, then `other`.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn transform_point(&self, x: f64, y: f64) -> Point {
        Point {
            x: self.a * x + self.c * y + self.e,
            y: self.b * x + self.d * y + self.f,
        }
    }

    /// Bounding box of a transformed rectangle.
    pub fn transform_rect(&self, rect: &Rect) -> Rect {
        let corners = [
            self.transform_point(rect.x0, rect.y0),
            self.transform_point(rect.x1, rect.y0),
            self.transform_point(rect.x0, rect.y1),
            self.transform_point(rect.x1, rect.y1),
        ];
        Rect::bounding(&corners)
    }

    /// Length of the transformed unit vector along y.
    ///
    /// This is the vertical scale a font size goes through.
    pub fn vertical_scale(&self) -> f64 {
        self.c.hypot(self.d)
    }

    pub fn is_finite(&self) -> bool {
        [self.a, self.b, self.c, self.d, self.e, self.f]
            .iter()
            .all(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Axis-aligned rectangle, normalized so `x0 <= x1` and `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Rect {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Reads a `[llx lly urx ury]` array.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [x0, y0, x1, y1] => Some(Rect::new(*x0, *y0, *x1, *y1)),
            _ => None,
        }
    }

    pub fn bounding(points: &[Point]) -> Rect {
        let mut rect = Rect {
            x0: f64::INFINITY,
            y0: f64::INFINITY,
            x1: f64::NEG_INFINITY,
            y1: f64::NEG_INFINITY,
        };
        for p in points {
            rect.x0 = rect.x0.min(p.x);
            rect.y0 = rect.y0.min(p.y);
            rect.x1 = rect.x1.max(p.x);
            rect.y1 = rect.y1.max(p.y);
        }
        if points.is_empty() { Rect::default() } else { rect }
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }
}

/// A color as set by `g`, `rg`, `k`, `sc`, `scn` and friends.
#[derive(Debug, Clone, PartialEq)]
pub struct Color {
    /// Color space name (`DeviceGray`, `DeviceRGB`, a resource name, …)
    pub space: String,
    pub components: SmallVec<[f64; 4]>,
}

impl Default for Color {
    fn default() -> Self {
        Color {
            space: "DeviceGray".to_string(),
            components: SmallVec::from_slice(&[0.0]),
        }
    }
}

/// State saved and restored by `q`/`Q`.
#[derive(Debug, Clone)]
pub struct GraphicsState {
    /// Current transformation matrix (user space → page space)
    pub ctm: Matrix,
    /// Text matrix (Tm)
    pub text_matrix: Matrix,
    /// Text line matrix (Tlm)
    pub text_line_matrix: Matrix,
    pub fill_color: Color,
    pub stroke_color: Color,
    pub font: Option<Arc<Font>>,
    /// Resource name of the font (`/F1`)
    pub font_name: Option<String>,
    pub font_size: f64,
    /// Tc
    pub char_spacing: f64,
    /// Tw
    pub word_spacing: f64,
    /// Tz / 100
    pub horizontal_scaling: f64,
    /// TL
    pub leading: f64,
    /// Tr
    pub render_mode: i64,
    /// Ts
    pub rise: f64,
}

impl GraphicsState {
    pub fn new(ctm: Matrix) -> Self {
        GraphicsState {
            ctm,
            ..Self::default()
        }
    }
}

impl Default for GraphicsState {
    fn default() -> Self {
        GraphicsState {
            ctm: Matrix::IDENTITY,
            text_matrix: Matrix::IDENTITY,
            text_line_matrix: Matrix::IDENTITY,
            fill_color: Color::default(),
            stroke_color: Color::default(),
            font: None,
            font_name: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            render_mode: 0,
            rise: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiply_applies_left_first() {
        let scale = Matrix::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        let shift = Matrix::translate(10.0, 5.0);

        // scale then shift
        let p = scale.multiply(&shift).transform_point(1.0, 1.0);
        assert_eq!((p.x, p.y), (12.0, 7.0));
        // shift then scale
        let p = shift.multiply(&scale).transform_point(1.0, 1.0);
        assert_eq!((p.x, p.y), (22.0, 12.0));
    }

    #[test]
    fn test_transform_rect_rotated() {
        // 90° rotation
        let rotate = Matrix::new(0.0, 1.0, -1.0, 0.0, 0.0, 0.0);
        let rect = rotate.transform_rect(&Rect::new(0.0, 0.0, 2.0, 1.0));
        assert_eq!(rect, Rect::new(-1.0, 0.0, 0.0, 2.0));
    }

    #[test]
    fn test_vertical_scale() {
        assert_eq!(Matrix::new(1.0, 0.0, 0.0, 3.0, 0.0, 0.0).vertical_scale(), 3.0);
        assert_eq!(Matrix::new(0.0, 1.0, -4.0, 0.0, 0.0, 0.0).vertical_scale(), 4.0);
    }

    #[test]
    fn test_rect_helpers() {
        let r = Rect::from_slice(&[10.0, 20.0, 0.0, 0.0]).unwrap();
        assert_eq!(r, Rect::new(0.0, 0.0, 10.0, 20.0));
        assert_eq!(r.width(), 10.0);
        assert_eq!(r.union(&Rect::new(5.0, 5.0, 15.0, 8.0)).x1, 15.0);
        assert!(Rect::from_slice(&[1.0, 2.0]).is_none());
    }
}

//! Affine transformation matrices.
//!
//! PDF writes a matrix as `[a b c d e f]` and transforms row vectors:
//!
//! ```text
//! [x' y' 1] = [x y 1] * | a b 0 |
//!                       | c d 0 |
//!                       | e f 1 |
//! ```

/// Affine matrix in PDF's `[a b c d e f]` form.
#[derive(Debug, Clone, Copy, PartialEq)]
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

    pub fn from_array(m: [f64; 6]) -> Self {
        Matrix::new(m[0], m[1], m[2], m[3], m[4], m[5])
    }

    pub fn to_array(self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Matrix::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Matrix::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Returns the matrix that applies `self` first, then `other`.
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

    /// Transforms a point.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Transforms a distance vector (ignores translation).
    pub fn apply_vector(&self, x: f64, y: f64) -> (f64, f64) {
        (self.a * x + self.c * y, self.b * x + self.d * y)
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    pub fn is_invertible(&self) -> bool {
        let det = self.determinant();
        det.is_finite() && det.abs() > f64::EPSILON
    }

    pub fn inverse(&self) -> Option<Matrix> {
        if !self.is_invertible() {
            return None;
        }
        let det = self.determinant();
        let a = self.d / det;
        let b = -self.b / det;
        let c = -self.c / det;
        let d = self.a / det;
        Some(Matrix {
            a,
            b,
            c,
            d,
            e: -(self.e * a + self.f * c),
            f: -(self.e * b + self.f * d),
        })
    }

    /// Geometric mean of the axis scale factors; used to size line widths.
    pub fn expansion(&self) -> f64 {
        self.determinant().abs().sqrt()
    }

    /// Bounding box of a transformed rectangle `[x0, y0, x1, y1]`.
    pub fn transform_rect(&self, rect: [f64; 4]) -> [f64; 4] {
        let corners = [
            self.apply(rect[0], rect[1]),
            self.apply(rect[2], rect[1]),
            self.apply(rect[2], rect[3]),
            self.apply(rect[0], rect[3]),
        ];
        let mut out = [f64::MAX, f64::MAX, f64::MIN, f64::MIN];
        for (x, y) in corners {
            out[0] = out[0].min(x);
            out[1] = out[1].min(y);
            out[2] = out[2].max(x);
            out[3] = out[3].max(y);
        }
        out
    }

    pub fn to_skia(&self) -> tiny_skia::Transform {
        tiny_skia::Transform::from_row(
            self.a as f32,
            self.b as f32,
            self.c as f32,
            self.d as f32,
            self.e as f32,
            self.f as f32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9
    }

    #[test]
    fn test_multiply_applies_left_first() {
        let scale = Matrix::scale(2.0, 2.0);
        let shift = Matrix::translate(10.0, 0.0);
        // scale then translate
        assert!(close(scale.multiply(&shift).apply(1.0, 1.0), (12.0, 2.0)));
        // translate then scale
        assert!(close(shift.multiply(&scale).apply(1.0, 1.0), (22.0, 2.0)));
    }

    #[test]
    fn test_flip_matrix() {
        let flip = Matrix::new(1.0, 0.0, 0.0, -1.0, 0.0, 792.0);
        assert!(close(flip.apply(0.0, 0.0), (0.0, 792.0)));
        assert!(close(flip.apply(0.0, 792.0), (0.0, 0.0)));
    }

    #[test]
    fn test_inverse() {
        let m = Matrix::new(2.0, 1.0, -1.0, 3.0, 5.0, 7.0);
        let inv = m.inverse().unwrap();
        let p = m.apply(4.0, -2.0);
        assert!(close(inv.apply(p.0, p.1), (4.0, -2.0)));
        assert!(Matrix::new(1.0, 2.0, 2.0, 4.0, 0.0, 0.0).inverse().is_none());
    }

    #[test]
    fn test_transform_rect() {
        let m = Matrix::new(0.0, 1.0, -1.0, 0.0, 0.0, 0.0);
        assert_eq!(m.transform_rect([0.0, 0.0, 2.0, 1.0]), [-1.0, 0.0, 0.0, 2.0]);
    }
}

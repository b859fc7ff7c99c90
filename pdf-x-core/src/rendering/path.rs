//! Path construction for PDF rendering.
//!
//! Paths are built incrementally by the path construction operators and
//! handed to the device in user space together with the CTM.

use super::matrix::Matrix;
use std::fmt;

/// A path element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathElement {
    /// Move to a new point (starts a new subpath)
    MoveTo(f64, f64),
    LineTo(f64, f64),
    /// Cubic Bézier curve (cp1x, cp1y, cp2x, cp2y, x, y)
    CurveTo(f64, f64, f64, f64, f64, f64),
    ClosePath,
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::MoveTo(x, y) => write!(f, "M {} {}", x, y),
            PathElement::LineTo(x, y) => write!(f, "L {} {}", x, y),
            PathElement::CurveTo(x1, y1, x2, y2, x, y) => {
                write!(f, "C {} {} {} {} {} {}", x1, y1, x2, y2, x, y)
            }
            PathElement::ClosePath => write!(f, "Z"),
        }
    }
}

/// A path under construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    elements: Vec<PathElement>,

    current_point: Option<(f64, f64)>,

    /// Start of the current subpath, where `h` returns to
    subpath_start: Option<(f64, f64)>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the path.
    pub fn clear(&mut self) {
        self.elements.clear();
        self.current_point = None;
        self.subpath_start = None;
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        // Consecutive moves collapse into the last one
        if let Some(PathElement::MoveTo(..)) = self.elements.last() {
            self.elements.pop();
        }
        self.elements.push(PathElement::MoveTo(x, y));
        self.current_point = Some((x, y));
        self.subpath_start = Some((x, y));
    }

    /// Appends a line; without a current point this acts as a move.
    pub fn line_to(&mut self, x: f64, y: f64) {
        if self.current_point.is_none() {
            self.move_to(x, y);
            return;
        }
        self.elements.push(PathElement::LineTo(x, y));
        self.current_point = Some((x, y));
    }

    pub fn curve_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x: f64, y: f64) {
        if self.current_point.is_none() {
            self.move_to(x1, y1);
        }
        self.elements.push(PathElement::CurveTo(x1, y1, x2, y2, x, y));
        self.current_point = Some((x, y));
    }

    /// `v`: the first control point is the current point.
    pub fn curve_to_v(&mut self, x2: f64, y2: f64, x: f64, y: f64) {
        let (x1, y1) = self.current_point.unwrap_or((x2, y2));
        self.curve_to(x1, y1, x2, y2, x, y);
    }

    /// Appends a closed rectangle subpath (`re`).
    pub fn rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.move_to(x, y);
        self.line_to(x + width, y);
        self.line_to(x + width, y + height);
        self.line_to(x, y + height);
        self.close_path();
    }

    pub fn close_path(&mut self) {
        let Some(start) = self.subpath_start else {
            return;
        };
        if !matches!(self.elements.last(), Some(PathElement::ClosePath) | None) {
            self.elements.push(PathElement::ClosePath);
        }
        self.current_point = Some(start);
    }

    /// Appends the subpaths of `other` with every point mapped through
    /// `matrix`.
    pub fn append_transformed(&mut self, other: &Path, matrix: &Matrix) {
        for element in other.elements() {
            match *element {
                PathElement::MoveTo(x, y) => {
                    let (x, y) = matrix.apply(x, y);
                    self.move_to(x, y);
                }
                PathElement::LineTo(x, y) => {
                    let (x, y) = matrix.apply(x, y);
                    self.line_to(x, y);
                }
                PathElement::CurveTo(x1, y1, x2, y2, x, y) => {
                    let (x1, y1) = matrix.apply(x1, y1);
                    let (x2, y2) = matrix.apply(x2, y2);
                    let (x, y) = matrix.apply(x, y);
                    self.curve_to(x1, y1, x2, y2, x, y);
                }
                PathElement::ClosePath => self.close_path(),
            }
        }
    }

    pub fn current_point(&self) -> Option<(f64, f64)> {
        self.current_point
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Control-point bounding box `(min_x, min_y, max_x, max_y)`.
    pub fn bounding_box(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points = self.elements.iter().flat_map(|el| match *el {
            PathElement::MoveTo(x, y) | PathElement::LineTo(x, y) => vec![(x, y)],
            PathElement::CurveTo(x1, y1, x2, y2, x, y) => vec![(x1, y1), (x2, y2), (x, y)],
            PathElement::ClosePath => Vec::new(),
        });
        let first = points.next()?;
        Some(points.fold(
            (first.0, first.1, first.0, first.1),
            |(x0, y0, x1, y1), (x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        ))
    }

    /// Converts to a tiny-skia path; `None` when nothing drawable remains.
    pub fn to_skia(&self) -> Option<tiny_skia::Path> {
        let mut builder = tiny_skia::PathBuilder::new();
        for el in &self.elements {
            match *el {
                PathElement::MoveTo(x, y) => builder.move_to(x as f32, y as f32),
                PathElement::LineTo(x, y) => builder.line_to(x as f32, y as f32),
                PathElement::CurveTo(x1, y1, x2, y2, x, y) => builder.cubic_to(
                    x1 as f32, y1 as f32, x2 as f32, y2 as f32, x as f32, y as f32,
                ),
                PathElement::ClosePath => builder.close(),
            }
        }
        builder.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_is_closed() {
        let mut path = Path::new();
        path.rect(10.0, 20.0, 30.0, 40.0);
        assert_eq!(path.len(), 5);
        assert_eq!(path.elements()[0], PathElement::MoveTo(10.0, 20.0));
        assert_eq!(path.elements()[4], PathElement::ClosePath);
        assert_eq!(path.current_point(), Some((10.0, 20.0)));
        assert_eq!(path.bounding_box(), Some((10.0, 20.0, 40.0, 60.0)));
    }

    #[test]
    fn test_line_without_current_point_moves() {
        let mut path = Path::new();
        path.line_to(5.0, 5.0);
        assert_eq!(path.elements(), &[PathElement::MoveTo(5.0, 5.0)]);
    }

    #[test]
    fn test_curve_v_uses_current_point() {
        let mut path = Path::new();
        path.move_to(1.0, 2.0);
        path.curve_to_v(3.0, 4.0, 5.0, 6.0);
        assert_eq!(
            path.elements()[1],
            PathElement::CurveTo(1.0, 2.0, 3.0, 4.0, 5.0, 6.0)
        );
    }

    #[test]
    fn test_append_transformed() {
        let mut glyph = Path::new();
        glyph.rect(0.0, 0.0, 500.0, 700.0);
        let mut text = Path::new();
        text.append_transformed(&glyph, &Matrix::new(0.01, 0.0, 0.0, 0.01, 20.0, 30.0));
        text.append_transformed(&glyph, &Matrix::new(0.01, 0.0, 0.0, 0.01, 25.0, 30.0));
        assert_eq!(text.len(), 10);
        assert_eq!(text.elements()[5], PathElement::MoveTo(25.0, 30.0));
        assert_eq!(text.bounding_box(), Some((20.0, 30.0, 30.0, 37.0)));
    }

    #[test]
    fn test_to_skia() {
        let mut path = Path::new();
        assert!(path.to_skia().is_none());
        path.rect(0.0, 0.0, 10.0, 10.0);
        let skia = path.to_skia().unwrap();
        assert_eq!(skia.bounds().width(), 10.0);
    }
}

//! Graphics state management for PDF rendering.
//!
//! This module holds the graphics state that `q`/`Q` save and restore, as
//! defined in the PDF specification (section 8.4).

use super::font::LoadedFont;
use super::matrix::Matrix;
use std::sync::Arc;

/// Line cap style (PDF spec 8.4.3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    ProjectingSquare,
}

impl LineCap {
    pub fn from_number(value: f64) -> Self {
        match value as i32 {
            1 => LineCap::Round,
            2 => LineCap::ProjectingSquare,
            _ => LineCap::Butt,
        }
    }
}

/// Line join style (PDF spec 8.4.3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

impl LineJoin {
    pub fn from_number(value: f64) -> Self {
        match value as i32 {
            1 => LineJoin::Round,
            2 => LineJoin::Bevel,
            _ => LineJoin::Miter,
        }
    }
}

/// Winding rule for fills and clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

/// Stroke properties for path rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeProps {
    /// Line width in user space units
    pub line_width: f64,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f64,

    /// Alternating on/off lengths; empty for a solid line
    pub dash_array: Vec<f64>,
    pub dash_offset: f64,
}

impl Default for StrokeProps {
    fn default() -> Self {
        StrokeProps {
            line_width: 1.0,
            line_cap: LineCap::default(),
            line_join: LineJoin::default(),
            miter_limit: 10.0,
            dash_array: Vec::new(),
            dash_offset: 0.0,
        }
    }
}

/// Color in a device color space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Color {
    /// 0.0 = black, 1.0 = white
    Gray(f64),
    RGB(f64, f64, f64),
    CMYK(f64, f64, f64, f64),
}

impl Default for Color {
    fn default() -> Self {
        Color::black()
    }
}

impl Color {
    pub fn black() -> Self {
        Color::Gray(0.0)
    }

    pub fn white() -> Self {
        Color::Gray(1.0)
    }

    /// RGB components in 0.0..=1.0. CMYK uses the naive complement
    /// conversion without a color profile.
    pub fn to_rgb(&self) -> (f64, f64, f64) {
        match *self {
            Color::Gray(g) => {
                let g = g.clamp(0.0, 1.0);
                (g, g, g)
            }
            Color::RGB(r, g, b) => (r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0)),
            Color::CMYK(c, m, y, k) => {
                let k = 1.0 - k.clamp(0.0, 1.0);
                (
                    (1.0 - c.clamp(0.0, 1.0)) * k,
                    (1.0 - m.clamp(0.0, 1.0)) * k,
                    (1.0 - y.clamp(0.0, 1.0)) * k,
                )
            }
        }
    }

    /// 8-bit RGB components.
    pub fn rgb8(&self) -> [u8; 3] {
        let (r, g, b) = self.to_rgb();
        [
            (r * 255.0).round() as u8,
            (g * 255.0).round() as u8,
            (b * 255.0).round() as u8,
        ]
    }
}

/// Color spaces the renderer understands.
///
/// ICC-based spaces are treated as the device space with the same number of
/// components; Separation and DeviceN tints are approximated as gray.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ColorSpace {
    #[default]
    DeviceGray,
    DeviceRGB,
    DeviceCMYK,
    Indexed {
        base: Box<ColorSpace>,
        hival: u8,
        lookup: Vec<u8>,
    },
    /// Tint spaces with `n` components rendered as gray
    Tint(usize),
    /// Pattern fills; painted with the pattern's fallback (black)
    Pattern,
}

impl ColorSpace {
    /// Number of color components per sample.
    pub fn components(&self) -> usize {
        match self {
            ColorSpace::DeviceGray | ColorSpace::Indexed { .. } | ColorSpace::Pattern => 1,
            ColorSpace::DeviceRGB => 3,
            ColorSpace::DeviceCMYK => 4,
            ColorSpace::Tint(n) => *n,
        }
    }

    /// Initial color after selecting the space with `CS`/`cs`.
    pub fn initial_color(&self) -> Color {
        match self {
            ColorSpace::DeviceCMYK => Color::CMYK(0.0, 0.0, 0.0, 1.0),
            ColorSpace::DeviceRGB => Color::RGB(0.0, 0.0, 0.0),
            ColorSpace::Indexed { .. } => self.color(&[0.0]),
            _ => Color::black(),
        }
    }

    /// Converts operand values (0..1, or an index for Indexed) to a color.
    pub fn color(&self, values: &[f64]) -> Color {
        let v = |i: usize| values.get(i).copied().unwrap_or(0.0);
        match self {
            ColorSpace::DeviceGray => Color::Gray(v(0)),
            ColorSpace::DeviceRGB => Color::RGB(v(0), v(1), v(2)),
            ColorSpace::DeviceCMYK => Color::CMYK(v(0), v(1), v(2), v(3)),
            ColorSpace::Indexed {
                base,
                hival,
                lookup,
            } => {
                let index = (v(0).round().max(0.0) as usize).min(*hival as usize);
                let n = base.components();
                let entry: Vec<f64> = (0..n)
                    .map(|c| lookup.get(index * n + c).copied().unwrap_or(0) as f64 / 255.0)
                    .collect();
                base.color(&entry)
            }
            ColorSpace::Tint(n) => {
                let total: f64 = (0..*n).map(v).sum::<f64>() / (*n).max(1) as f64;
                Color::Gray(1.0 - total.clamp(0.0, 1.0))
            }
            ColorSpace::Pattern => Color::black(),
        }
    }
}

/// Text rendering mode (PDF spec 9.3.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextRenderingMode {
    #[default]
    Fill,
    Stroke,
    FillStroke,
    Invisible,
    FillClip,
    StrokeClip,
    FillStrokeClip,
    Clip,
}

impl TextRenderingMode {
    pub fn from_number(value: f64) -> Self {
        match value as i32 {
            1 => TextRenderingMode::Stroke,
            2 => TextRenderingMode::FillStroke,
            3 => TextRenderingMode::Invisible,
            4 => TextRenderingMode::FillClip,
            5 => TextRenderingMode::StrokeClip,
            6 => TextRenderingMode::FillStrokeClip,
            7 => TextRenderingMode::Clip,
            _ => TextRenderingMode::Fill,
        }
    }

    pub fn fills(self) -> bool {
        matches!(
            self,
            TextRenderingMode::Fill
                | TextRenderingMode::FillStroke
                | TextRenderingMode::FillClip
                | TextRenderingMode::FillStrokeClip
        )
    }

    pub fn strokes(self) -> bool {
        matches!(
            self,
            TextRenderingMode::Stroke
                | TextRenderingMode::FillStroke
                | TextRenderingMode::StrokeClip
                | TextRenderingMode::FillStrokeClip
        )
    }
}

/// Text state parameters (PDF spec 9.3).
#[derive(Debug, Clone)]
pub struct TextState {
    pub char_spacing: f64,
    pub word_spacing: f64,

    /// `Tz` divided by 100
    pub horizontal_scaling: f64,
    pub leading: f64,
    pub font: Option<Arc<LoadedFont>>,
    pub font_size: f64,
    pub render_mode: TextRenderingMode,
    pub rise: f64,
    pub text_matrix: Matrix,
    pub line_matrix: Matrix,
}

impl Default for TextState {
    fn default() -> Self {
        TextState {
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            font: None,
            font_size: 1.0,
            render_mode: TextRenderingMode::default(),
            rise: 0.0,
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
        }
    }
}

/// The complete graphics state saved by `q` and restored by `Q`.
#[derive(Debug, Clone)]
pub struct GraphicsState {
    /// User space to device space
    pub ctm: Matrix,
    pub stroke_color: Color,
    pub fill_color: Color,
    pub stroke_space: ColorSpace,
    pub fill_space: ColorSpace,
    pub stroke: StrokeProps,
    pub stroke_alpha: f64,
    pub fill_alpha: f64,
    pub text: TextState,
}

impl GraphicsState {
    pub fn new(ctm: Matrix) -> Self {
        GraphicsState {
            ctm,
            stroke_color: Color::black(),
            fill_color: Color::black(),
            stroke_space: ColorSpace::DeviceGray,
            fill_space: ColorSpace::DeviceGray,
            stroke: StrokeProps::default(),
            stroke_alpha: 1.0,
            fill_alpha: 1.0,
            text: TextState::default(),
        }
    }
}

impl Default for GraphicsState {
    fn default() -> Self {
        GraphicsState::new(Matrix::IDENTITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmyk_conversion() {
        assert_eq!(Color::CMYK(0.0, 0.0, 0.0, 1.0).rgb8(), [0, 0, 0]);
        assert_eq!(Color::CMYK(1.0, 0.0, 0.0, 0.0).rgb8(), [0, 255, 255]);
        assert_eq!(Color::CMYK(0.0, 0.0, 0.0, 0.0).rgb8(), [255, 255, 255]);
    }

    #[test]
    fn test_indexed_lookup() {
        let space = ColorSpace::Indexed {
            base: Box::new(ColorSpace::DeviceRGB),
            hival: 1,
            lookup: vec![255, 0, 0, 0, 0, 255],
        };
        assert_eq!(space.color(&[1.0]).rgb8(), [0, 0, 255]);
        // Out-of-range indices clamp to hival
        assert_eq!(space.color(&[7.0]).rgb8(), [0, 0, 255]);
        assert_eq!(space.initial_color().rgb8(), [255, 0, 0]);
    }

    #[test]
    fn test_tint_is_inverted_gray() {
        assert_eq!(ColorSpace::Tint(1).color(&[1.0]), Color::Gray(0.0));
        assert_eq!(ColorSpace::Tint(1).color(&[0.0]), Color::Gray(1.0));
    }

    #[test]
    fn test_stroke_defaults() {
        let props = StrokeProps::default();
        assert_eq!(props.line_width, 1.0);
        assert_eq!(props.miter_limit, 10.0);
        assert_eq!(LineCap::from_number(2.0), LineCap::ProjectingSquare);
        assert_eq!(LineJoin::from_number(9.0), LineJoin::Miter);
    }
}

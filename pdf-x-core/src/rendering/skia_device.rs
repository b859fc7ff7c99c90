//! A tiny-skia based rendering device.

use super::bitmap::Bitmap;
use super::device::{Device, ImageData, Paint, PathDrawMode};
use super::graphics_state::{FillRule, LineCap, LineJoin, StrokeProps};
use super::matrix::Matrix;
use super::path::Path;
use crate::core::error::{PDFError, PDFResult};
use tiny_skia::{
    FillRule as SkiaFillRule, LineCap as SkiaLineCap, LineJoin as SkiaLineJoin, Mask,
    Paint as SkiaPaint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke, StrokeDash, Transform,
};

// --- Conversion helpers ---

fn to_skia_paint(paint: &Paint, anti_alias: bool) -> SkiaPaint<'static> {
    let [r, g, b, a] = paint.rgba8();
    let mut sk_paint = SkiaPaint::default();
    sk_paint.set_color_rgba8(r, g, b, a);
    sk_paint.anti_alias = anti_alias;
    sk_paint
}

fn to_skia_line_cap(line_cap: LineCap) -> SkiaLineCap {
    match line_cap {
        LineCap::Butt => SkiaLineCap::Butt,
        LineCap::Round => SkiaLineCap::Round,
        LineCap::ProjectingSquare => SkiaLineCap::Square,
    }
}

fn to_skia_line_join(line_join: LineJoin) -> SkiaLineJoin {
    match line_join {
        LineJoin::Miter => SkiaLineJoin::Miter,
        LineJoin::Round => SkiaLineJoin::Round,
        LineJoin::Bevel => SkiaLineJoin::Bevel,
    }
}

fn to_skia_fill_rule(fill_rule: FillRule) -> SkiaFillRule {
    match fill_rule {
        FillRule::NonZero => SkiaFillRule::Winding,
        FillRule::EvenOdd => SkiaFillRule::EvenOdd,
    }
}

fn to_skia_dash(props: &StrokeProps) -> Option<StrokeDash> {
    if props.dash_array.is_empty() || props.dash_array.iter().all(|d| *d <= 0.0) {
        return None;
    }
    let mut intervals: Vec<f32> = props.dash_array.iter().map(|d| d.max(0.0) as f32).collect();
    // An odd-length array repeats to form on/off pairs
    if intervals.len() % 2 == 1 {
        intervals.extend_from_within(..);
    }
    StrokeDash::new(intervals, props.dash_offset as f32)
}

fn to_skia_stroke(props: &StrokeProps) -> Stroke {
    Stroke {
        width: props.line_width.max(0.0) as f32,
        miter_limit: props.miter_limit.max(1.0) as f32,
        line_cap: to_skia_line_cap(props.line_cap),
        line_join: to_skia_line_join(props.line_join),
        dash: to_skia_dash(props),
    }
}

/// Converts straight RGBA into a premultiplied pixmap.
fn image_to_pixmap(image: &ImageData) -> PDFResult<Pixmap> {
    let mut pixmap = Pixmap::new(image.width, image.height).ok_or_else(|| {
        PDFError::Rendering(format!("invalid image size {}x{}", image.width, image.height))
    })?;
    let expected = image.width as usize * image.height as usize * 4;
    if image.rgba.len() < expected {
        return Err(PDFError::Rendering(format!(
            "image data has {} bytes, expected {}",
            image.rgba.len(),
            expected
        )));
    }
    for (dst, src) in pixmap
        .data_mut()
        .chunks_exact_mut(4)
        .zip(image.rgba.chunks_exact(4))
    {
        let a = src[3] as u16;
        let premul = |c: u8| ((c as u16 * a + 127) / 255) as u8;
        dst.copy_from_slice(&[premul(src[0]), premul(src[1]), premul(src[2]), src[3]]);
    }
    Ok(pixmap)
}

/// Rasterizes into a [`Bitmap`].
///
/// The bitmap is copied into a tiny-skia pixmap on attach and written back
/// when the device is dropped. Bitmaps hold B, G, R, A bytes; with
/// `reverse_byte_order` the buffer is taken to hold R, G, B, A instead.
pub struct SkiaDevice<'b, 'a> {
    bitmap: &'b mut Bitmap<'a>,
    reverse_byte_order: bool,
    pixmap: Pixmap,

    /// Current clip; `None` means unclipped
    clip: Option<Mask>,
    clip_stack: Vec<Option<Mask>>,
}

impl<'b, 'a> SkiaDevice<'b, 'a> {
    pub fn attach(bitmap: &'b mut Bitmap<'a>, reverse_byte_order: bool) -> PDFResult<Self> {
        let (width, height) = (bitmap.width(), bitmap.height());
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            PDFError::Rendering(format!("cannot attach to {}x{} bitmap", width, height))
        })?;

        let stride = bitmap.stride();
        let row_len = width as usize * 4;
        let src = bitmap.data();
        for (y, dst_row) in pixmap.data_mut().chunks_exact_mut(row_len).enumerate() {
            let src_row = &src[y * stride..y * stride + row_len];
            copy_row(src_row, dst_row, !reverse_byte_order);
        }

        Ok(SkiaDevice {
            bitmap,
            reverse_byte_order,
            pixmap,
            clip: None,
            clip_stack: Vec::new(),
        })
    }

    fn intersect_clip(&mut self, path: &tiny_skia::Path, rule: SkiaFillRule, transform: Transform) {
        match &mut self.clip {
            Some(mask) => mask.intersect_path(path, rule, true, transform),
            None => {
                let Some(mut mask) = Mask::new(self.pixmap.width(), self.pixmap.height()) else {
                    return;
                };
                mask.fill_path(path, rule, true, transform);
                self.clip = Some(mask);
            }
        }
    }

    /// Clips everything out.
    fn clip_all(&mut self) {
        self.clip = Mask::new(self.pixmap.width(), self.pixmap.height());
    }
}

/// Copies one row of pixels, swapping R and B when asked.
fn copy_row(src: &[u8], dst: &mut [u8], swap: bool) {
    if !swap {
        dst.copy_from_slice(src);
        return;
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        d.copy_from_slice(&[s[2], s[1], s[0], s[3]]);
    }
}

impl Drop for SkiaDevice<'_, '_> {
    fn drop(&mut self) {
        let stride = self.bitmap.stride();
        let row_len = self.pixmap.width() as usize * 4;
        let swap = !self.reverse_byte_order;
        let dst = self.bitmap.data_mut();
        for (y, src_row) in self.pixmap.data().chunks_exact(row_len).enumerate() {
            copy_row(src_row, &mut dst[y * stride..y * stride + row_len], swap);
        }
    }
}

impl Device for SkiaDevice<'_, '_> {
    fn width(&self) -> u32 {
        self.pixmap.width()
    }

    fn height(&self) -> u32 {
        self.pixmap.height()
    }

    fn save_state(&mut self) {
        self.clip_stack.push(self.clip.clone());
    }

    fn restore_state(&mut self) {
        if let Some(clip) = self.clip_stack.pop() {
            self.clip = clip;
        }
    }

    fn set_clip_rect(&mut self, rect: [f64; 4]) {
        let Some(rect) = Rect::from_ltrb(
            rect[0] as f32,
            rect[1] as f32,
            rect[2] as f32,
            rect[3] as f32,
        ) else {
            self.clip_all();
            return;
        };
        let path = PathBuilder::from_rect(rect);
        self.intersect_clip(&path, SkiaFillRule::Winding, Transform::identity());
    }

    fn set_clip_path(&mut self, path: &Path, matrix: &Matrix, rule: FillRule) -> PDFResult<()> {
        match path.to_skia() {
            Some(sk_path) => {
                self.intersect_clip(&sk_path, to_skia_fill_rule(rule), matrix.to_skia())
            }
            // An empty clip path leaves nothing visible
            None => self.clip_all(),
        }
        Ok(())
    }

    fn draw_path(
        &mut self,
        path: &Path,
        matrix: &Matrix,
        mode: PathDrawMode,
        fill: &Paint,
        stroke: &Paint,
        props: &StrokeProps,
        anti_alias: bool,
    ) -> PDFResult<()> {
        let Some(sk_path) = path.to_skia() else {
            return Ok(());
        };
        let transform = matrix.to_skia();
        let mask = self.clip.as_ref();

        if let PathDrawMode::Fill(rule) | PathDrawMode::FillStroke(rule) = mode {
            self.pixmap.fill_path(
                &sk_path,
                &to_skia_paint(fill, anti_alias),
                to_skia_fill_rule(rule),
                transform,
                mask,
            );
        }
        if mode.strokes() {
            self.pixmap.stroke_path(
                &sk_path,
                &to_skia_paint(stroke, anti_alias),
                &to_skia_stroke(props),
                transform,
                mask,
            );
        }
        Ok(())
    }

    fn draw_image(&mut self, image: &ImageData, matrix: &Matrix, alpha: f64) -> PDFResult<()> {
        if image.width == 0 || image.height == 0 {
            return Ok(());
        }
        let pixmap = image_to_pixmap(image)?;
        // Pixel rows run top-down; the unit square runs bottom-up
        let to_unit = Matrix::new(
            1.0 / image.width as f64,
            0.0,
            0.0,
            -1.0 / image.height as f64,
            0.0,
            1.0,
        );
        let paint = PixmapPaint {
            opacity: alpha.clamp(0.0, 1.0) as f32,
            quality: tiny_skia::FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        self.pixmap.draw_pixmap(
            0,
            0,
            pixmap.as_ref(),
            &paint,
            to_unit.multiply(matrix).to_skia(),
            self.clip.as_ref(),
        );
        Ok(())
    }
}

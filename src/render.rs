//! Rasterizing a page region into a caller's pixel buffer.
//!
//! Every call builds its own render context: the device attached to the
//! target, the render options with their optional content context and the
//! progressive renderer. Nothing outlives the call.

use crate::document::with_document;
use crate::error::{RendererError, Result};
use crate::handle::{DocumentHandle, PageHandle};
use crate::page::{self, PageEntry};
use crate::target::{BufferInfo, PixelBuffer, PixelFormat};
use pdf_x_core::core::{OCContext, PDFDocument, PDFError};
use pdf_x_core::rendering::options::{FPDF_LCD_TEXT, FPDF_PRINTING};
use pdf_x_core::rendering::{
    Bitmap, Device, DeviceStateGuard, Matrix, ProgressiveRenderer, RenderContext, RenderOptions,
    RenderProgress, SkiaDevice,
};

pub const RENDER_MODE_FOR_DISPLAY: i32 = 1;
pub const RENDER_MODE_FOR_PRINT: i32 = 2;

/// Engine render flags for a render mode. Unknown modes set no flag.
pub fn render_flags(mode: i32) -> u32 {
    match mode {
        RENDER_MODE_FOR_DISPLAY => FPDF_LCD_TEXT,
        RENDER_MODE_FOR_PRINT => FPDF_PRINTING,
        _ => 0,
    }
}

/// Destination rectangle in target pixels, right and bottom exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl DestRect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        DestRect {
            left,
            top,
            right,
            bottom,
        }
    }

    /// The whole of a `width` x `height` target.
    pub fn full(width: u32, height: u32) -> Self {
        let clamp = |extent: u32| i32::try_from(extent).unwrap_or(i32::MAX);
        DestRect::new(0, 0, clamp(width), clamp(height))
    }

    pub fn is_within(&self, width: u32, height: u32) -> bool {
        self.left >= 0
            && self.top >= 0
            && i64::from(self.right) <= i64::from(width)
            && i64::from(self.bottom) <= i64::from(height)
    }

    fn to_clip(self) -> [f64; 4] {
        [
            f64::from(self.left),
            f64::from(self.top),
            f64::from(self.right),
            f64::from(self.bottom),
        ]
    }
}

/// Maps page space (origin at the lower left) to raster space (origin at
/// the upper left).
pub fn flip_matrix(page_height: f64) -> Matrix {
    Matrix::new(1.0, 0.0, 0.0, -1.0, 0.0, page_height)
}

/// Renders `page` of `doc` into `target`, clipped to `dest`.
///
/// `transform`, when given, is applied after the page is flipped into
/// raster space.
pub fn render_page(
    doc: DocumentHandle,
    page: PageHandle,
    target: &mut dyn PixelBuffer,
    dest: DestRect,
    mode: i32,
    transform: Option<&Matrix>,
) -> Result<()> {
    let entry = page::lookup(page)?;
    if entry.document != doc {
        return Err(RendererError::InvalidArgument(format!(
            "{} does not belong to {}",
            page, doc
        )));
    }

    let info = target.info();
    if info.format != PixelFormat::Argb8888 {
        return Err(RendererError::RenderTarget(format!(
            "unsupported pixel format {:?}",
            info.format
        )));
    }

    let flags = render_flags(mode);
    let mut matrix = flip_matrix(entry.height);
    if let Some(transform) = transform {
        matrix = matrix.multiply(transform);
    }
    log::trace!("rendering {} with flags {:#x} at {:?}", page, flags, matrix.to_array());

    with_document(doc, |document| {
        let options = render_options(document, flags);
        let mut context = RenderContext::new();
        context.append_object_list(&entry.page, &matrix);

        let outcome = match target.lock_pixels() {
            Some(pixels) => rasterize(document, &entry, &context, &options, info, pixels, dest),
            None => return Err(RendererError::RenderTarget("cannot lock pixels".into())),
        };
        target.notify_pixels_changed();
        target.unlock_pixels();
        outcome
    })
}

fn render_options(document: &mut PDFDocument, flags: u32) -> RenderOptions {
    let options = RenderOptions::from_public_flags(flags);
    let usage = options.oc_usage();
    let context = OCContext::new(document, usage).unwrap_or_else(|e| {
        log::warn!("ignoring broken optional content configuration: {}", e);
        OCContext::all_visible(usage)
    });
    options.with_oc_context(context)
}

fn rasterize(
    document: &mut PDFDocument,
    entry: &PageEntry,
    context: &RenderContext,
    options: &RenderOptions,
    info: BufferInfo,
    pixels: &mut [u8],
    dest: DestRect,
) -> Result<()> {
    let target_error = |e: PDFError| RendererError::RenderTarget(e.to_string());
    let mut bitmap = Bitmap::from_external(info.width, info.height, info.stride, pixels)
        .map_err(target_error)?;
    // The target holds R, G, B, A; the device works in B, G, R, A
    let mut device = SkiaDevice::attach(&mut bitmap, true).map_err(target_error)?;

    let progress = {
        let mut guard = DeviceStateGuard::new(&mut device);
        guard.set_clip_rect(dest.to_clip());
        let mut renderer = ProgressiveRenderer::new(context, options);
        renderer.start(document.xref_mut(), &mut *guard, None)
    };

    match progress {
        RenderProgress::Done => Ok(()),
        other => Err(RendererError::Engine(PDFError::Rendering(format!(
            "page {} stopped in state {:?}",
            entry.page.index(),
            other
        )))),
    }
}

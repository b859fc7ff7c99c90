//! A safe, owned front end over the handle API.
//!
//! [`PdfRenderer`] owns one document; [`RendererPage`] borrows the renderer
//! mutably, so only one page can be open at a time and a page can never
//! outlive its document.

use crate::byte_source::ByteSource;
use crate::document;
use crate::error::{RendererError, Result};
use crate::handle::{DocumentHandle, PageHandle};
use crate::page;
use crate::render::{self, DestRect, RENDER_MODE_FOR_DISPLAY, RENDER_MODE_FOR_PRINT};
use crate::target::{PixelBuffer, PixelFormat};
use pdf_x_core::rendering::Matrix;
use std::marker::PhantomData;

const ALREADY_CLOSED: &str = "Already closed";

/// A 3x3 transform in row-major order, as graphics toolkits hand them out:
///
/// ```text
/// | scale_x  skew_x   trans_x |
/// | skew_y   scale_y  trans_y |
/// | persp_0  persp_1  persp_2 |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform(pub [f32; 9]);

impl Transform {
    pub const IDENTITY: Transform = Transform([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

    pub fn scale(sx: f32, sy: f32) -> Self {
        Transform([sx, 0.0, 0.0, 0.0, sy, 0.0, 0.0, 0.0, 1.0])
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Transform([1.0, 0.0, tx, 0.0, 1.0, ty, 0.0, 0.0, 1.0])
    }

    /// True when the bottom row is `[0 0 1]`.
    pub fn is_affine(&self) -> bool {
        let m = &self.0;
        m[6] == 0.0 && m[7] == 0.0 && m[8] == 1.0
    }

    /// The affine part as a PDF matrix.
    pub fn to_matrix(&self) -> Matrix {
        let m = self.0.map(f64::from);
        Matrix::new(m[0], m[3], m[1], m[4], m[2], m[5])
    }
}

impl Default for Transform {
    fn default() -> Self {
        Transform::IDENTITY
    }
}

pub struct PdfRenderer {
    document: Option<DocumentHandle>,
}

impl PdfRenderer {
    pub fn new<S: ByteSource + 'static>(source: S) -> Result<Self> {
        let document = document::open_document(source)?;
        Ok(PdfRenderer {
            document: Some(document),
        })
    }

    fn handle(&self) -> Result<DocumentHandle> {
        self.document
            .ok_or_else(|| RendererError::InvalidState(ALREADY_CLOSED.into()))
    }

    pub fn page_count(&self) -> Result<usize> {
        document::page_count(self.handle()?)
    }

    pub fn should_scale_for_printing(&self) -> Result<bool> {
        document::print_scaling(self.handle()?)
    }

    pub fn open_page(&mut self, index: usize) -> Result<RendererPage<'_>> {
        let document = self.handle()?;
        if index >= document::page_count(document)? {
            return Err(RendererError::InvalidArgument("Invalid page index".into()));
        }
        let (handle, size) = page::open_page(document, index)?;
        Ok(RendererPage {
            document,
            handle: Some(handle),
            index,
            width: size.width,
            height: size.height,
            _renderer: PhantomData,
        })
    }

    /// Closes the document. Closing twice is an error.
    pub fn close(&mut self) -> Result<()> {
        let document = self.handle()?;
        self.document = None;
        document::close_document(document)
    }

    pub fn is_closed(&self) -> bool {
        self.document.is_none()
    }
}

impl Drop for PdfRenderer {
    fn drop(&mut self) {
        if let Some(document) = self.document.take()
            && let Err(e) = document::close_document(document)
        {
            log::warn!("closing {} on drop: {}", document, e);
        }
    }
}

/// An open page of a [`PdfRenderer`].
pub struct RendererPage<'r> {
    document: DocumentHandle,
    handle: Option<PageHandle>,
    index: usize,
    width: i32,
    height: i32,
    _renderer: PhantomData<&'r mut PdfRenderer>,
}

impl RendererPage<'_> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Width in points.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Height in points.
    pub fn height(&self) -> i32 {
        self.height
    }

    fn handle(&self) -> Result<PageHandle> {
        self.handle
            .ok_or_else(|| RendererError::InvalidState(ALREADY_CLOSED.into()))
    }

    /// Renders the page into `target`.
    ///
    /// Without `dest_clip` the whole target is painted. Without `transform`
    /// one page point maps to one pixel, the page's upper left corner at the
    /// target's upper left.
    pub fn render(
        &mut self,
        target: &mut dyn PixelBuffer,
        dest_clip: Option<DestRect>,
        transform: Option<&Transform>,
        mode: i32,
    ) -> Result<()> {
        let page = self.handle()?;
        let info = target.info();
        if info.format != PixelFormat::Argb8888 {
            return Err(RendererError::InvalidArgument("Unsupported pixel format".into()));
        }
        let dest = match dest_clip {
            Some(clip) if !clip.is_within(info.width, info.height) => {
                return Err(RendererError::InvalidArgument(
                    "destBounds not in destination".into(),
                ));
            }
            Some(clip) => clip,
            None => DestRect::full(info.width, info.height),
        };
        if transform.is_some_and(|t| !t.is_affine()) {
            return Err(RendererError::InvalidArgument("transform not affine".into()));
        }
        if mode == RENDER_MODE_FOR_DISPLAY | RENDER_MODE_FOR_PRINT {
            return Err(RendererError::InvalidArgument(
                "Only single render mode supported".into(),
            ));
        }
        if mode != RENDER_MODE_FOR_DISPLAY && mode != RENDER_MODE_FOR_PRINT {
            return Err(RendererError::InvalidArgument("Unsupported render mode".into()));
        }

        let matrix = transform.map(Transform::to_matrix);
        render::render_page(self.document, page, target, dest, mode, matrix.as_ref())
    }

    pub fn close(mut self) -> Result<()> {
        let page = self.handle()?;
        self.handle = None;
        page::close_page(page)
    }
}

impl Drop for RendererPage<'_> {
    fn drop(&mut self) {
        if let Some(page) = self.handle.take()
            && let Err(e) = page::close_page(page)
        {
            log::warn!("closing {} on drop: {}", page, e);
        }
    }
}

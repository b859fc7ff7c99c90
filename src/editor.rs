//! Page removal with incremental save.

use crate::byte_source::{ByteSource, SourceAccess};
use crate::error::{RendererError, Result};
use crate::library::{EngineLibrary, LibraryRef, library};
use pdf_x_core::core::{PDFDocument, last_error};
use std::io::Write;

struct OpenDocument {
    // Dropped before the library claim
    document: PDFDocument,
    _library: LibraryRef<'static, EngineLibrary>,
}

/// Edits a document and writes the result as an incremental update.
pub struct PdfEditor {
    open: Option<OpenDocument>,
}

impl PdfEditor {
    pub fn open<S: ByteSource + 'static>(source: S) -> Result<Self> {
        let library = library().acquire();
        let document = PDFDocument::load(Box::new(SourceAccess::new(source))).map_err(|e| {
            let code = last_error().as_u32();
            log::debug!("editor failed to load document: {} (code {})", e, code);
            RendererError::DocumentLoad { code }
        })?;
        Ok(PdfEditor {
            open: Some(OpenDocument {
                document,
                _library: library,
            }),
        })
    }

    fn document(&mut self) -> Result<&mut PDFDocument> {
        self.open
            .as_mut()
            .map(|open| &mut open.document)
            .ok_or_else(|| RendererError::InvalidState("Already closed".into()))
    }

    pub fn page_count(&mut self) -> Result<usize> {
        Ok(self.document()?.page_count())
    }

    fn check_index(document: &PDFDocument, index: usize) -> Result<()> {
        if index >= document.page_count() {
            return Err(RendererError::InvalidArgument("Invalid page index".into()));
        }
        Ok(())
    }

    /// Width and height of a page in points.
    pub fn page_size(&mut self, index: usize) -> Result<(f64, f64)> {
        let document = self.document()?;
        Self::check_index(document, index)?;
        Ok(document.page_size_by_index(index)?)
    }

    pub fn should_scale_for_printing(&mut self) -> Result<bool> {
        Ok(self.document()?.viewer_pref_print_scaling())
    }

    /// Removes a page; returns the new page count.
    pub fn remove_page(&mut self, index: usize) -> Result<usize> {
        let document = self.document()?;
        Self::check_index(document, index)?;
        Ok(document.remove_page(index)?)
    }

    /// Writes the original bytes followed by the edits.
    pub fn write(&mut self, mut out: impl Write) -> Result<()> {
        let document = self.document()?;
        document.save_incremental(&mut out)?;
        out.flush()?;
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        self.open
            .take()
            .map(drop)
            .ok_or_else(|| RendererError::InvalidState("Already closed".into()))
    }
}

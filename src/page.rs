//! Page handles.

use crate::document::with_document;
use crate::error::{RendererError, Result};
use crate::handle::{DocumentHandle, HandleTable, PageHandle};
use pdf_x_core::core::Page;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub(crate) struct PageEntry {
    pub(crate) document: DocumentHandle,
    pub(crate) page: Page,
    pub(crate) width: f64,
    pub(crate) height: f64,
}

static PAGES: Mutex<HandleTable<Arc<PageEntry>>> = Mutex::new(HandleTable::new());

fn pages() -> MutexGuard<'static, HandleTable<Arc<PageEntry>>> {
    PAGES.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn lookup(page: PageHandle) -> Result<Arc<PageEntry>> {
    pages()
        .get(page.0)
        .cloned()
        .ok_or(RendererError::StaleHandle)
}

/// Page size reported at open: whole points for the caller, plus the exact
/// values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: i32,
    pub height: i32,
    pub width_points: f64,
    pub height_points: f64,
}

impl PageSize {
    fn from_points(width: f64, height: f64) -> Self {
        PageSize {
            width: width as i32,
            height: height as i32,
            width_points: width,
            height_points: height,
        }
    }
}

/// Loads page `index` of `doc` and reads its size.
pub fn open_page(doc: DocumentHandle, index: usize) -> Result<(PageHandle, PageSize)> {
    with_document(doc, |document| {
        let page = document.load_page(index).map_err(|e| {
            log::debug!("{}: page {} failed to load: {}", doc, index, e);
            RendererError::PageLoad
        })?;
        let (width, height) = match document.page_size_by_index(index) {
            Ok(size) => size,
            Err(e) => {
                log::debug!("{}: page {} has no size: {}", doc, index, e);
                drop(page);
                return Err(RendererError::PageSize);
            }
        };

        let entry = PageEntry {
            document: doc,
            page,
            width,
            height,
        };
        // Inserted under the document lock, see close_document
        let handle = PageHandle(pages().insert(Arc::new(entry)));
        log::trace!("opened {} ({} of {}): {}x{}", handle, index, doc, width, height);
        Ok((handle, PageSize::from_points(width, height)))
    })
}

pub fn close_page(page: PageHandle) -> Result<()> {
    pages()
        .remove(page.0)
        .map(drop)
        .ok_or(RendererError::StaleHandle)
}

/// Exact width and height in points.
pub fn page_dimensions(page: PageHandle) -> Result<(f64, f64)> {
    let entry = lookup(page)?;
    Ok((entry.width, entry.height))
}

/// Drops every page of `doc`; returns how many there were.
pub(crate) fn invalidate_pages_of(doc: DocumentHandle) -> usize {
    let removed = pages().retain(|entry| entry.document != doc);
    removed.len()
}

/// Number of open pages across all documents.
pub fn open_pages() -> usize {
    pages().len()
}

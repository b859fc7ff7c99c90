//! Document handles.
//!
//! An open document owns its engine document and a claim on the library.
//! Both live in a [`DocumentEntry`] behind its own mutex, so different
//! documents can be used from different threads at once while calls on the
//! same document are serialized.

use crate::byte_source::{ByteSource, SourceAccess};
use crate::error::{RendererError, Result};
use crate::handle::{DocumentHandle, HandleTable};
use crate::library::{EngineLibrary, LibraryRef, library};
use crate::page;
use pdf_x_core::core::{PDFDocument, last_error};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub(crate) struct DocumentEntry {
    // Declared first: the engine document must go before the library claim
    pub(crate) document: PDFDocument,
    _library: LibraryRef<'static, EngineLibrary>,
}

type SharedEntry = Arc<Mutex<DocumentEntry>>;

static DOCUMENTS: Mutex<HandleTable<SharedEntry>> = Mutex::new(HandleTable::new());

fn documents() -> MutexGuard<'static, HandleTable<SharedEntry>> {
    DOCUMENTS.lock().unwrap_or_else(PoisonError::into_inner)
}

fn lookup(doc: DocumentHandle) -> Result<SharedEntry> {
    documents()
        .get(doc.0)
        .cloned()
        .ok_or(RendererError::StaleHandle)
}

/// Runs `f` with exclusive access to the document.
pub(crate) fn with_document<R>(
    doc: DocumentHandle,
    f: impl FnOnce(&mut PDFDocument) -> Result<R>,
) -> Result<R> {
    let entry = lookup(doc)?;
    let mut entry = entry.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut entry.document)
}

/// Loads a document from `source`.
///
/// On failure the library claim taken for the load is released again and
/// the engine's error code is reported.
pub fn open_document<S: ByteSource + 'static>(source: S) -> Result<DocumentHandle> {
    let library = library().acquire();
    let len = source.len();
    let document = PDFDocument::load(Box::new(SourceAccess::new(source))).map_err(|e| {
        let code = last_error().as_u32();
        log::debug!("document of {} bytes failed to load: {} (code {})", len, e, code);
        RendererError::DocumentLoad { code }
    })?;

    let pages = document.page_count();
    let entry = DocumentEntry {
        document,
        _library: library,
    };
    let handle = DocumentHandle(documents().insert(Arc::new(Mutex::new(entry))));
    log::debug!("opened {} with {} pages", handle, pages);
    Ok(handle)
}

/// Closes a document and every page still open on it.
pub fn close_document(doc: DocumentHandle) -> Result<()> {
    let entry = documents()
        .remove(doc.0)
        .ok_or(RendererError::StaleHandle)?;

    // Holding the document lock keeps a concurrent open_page from slipping a
    // page in after the sweep
    let guard = entry.lock().unwrap_or_else(PoisonError::into_inner);
    let orphaned = page::invalidate_pages_of(doc);
    if orphaned > 0 {
        log::warn!("{} closed with {} pages still open", doc, orphaned);
    }
    drop(guard);
    log::debug!("closed {}", doc);
    Ok(())
}

pub fn page_count(doc: DocumentHandle) -> Result<usize> {
    with_document(doc, |document| Ok(document.page_count()))
}

/// Whether the document asks to be scaled to the paper when printed.
pub fn print_scaling(doc: DocumentHandle) -> Result<bool> {
    with_document(doc, |document| Ok(document.viewer_pref_print_scaling()))
}

/// Number of open documents.
pub fn open_documents() -> usize {
    documents().len()
}

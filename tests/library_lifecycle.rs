//! Engine lifetime as seen through the global library counter.
//!
//! Every test here inspects process-wide counts, so they run one at a time.


use pdf_x_renderer::byte_source::MemorySource;
use pdf_x_renderer::document::open_documents;
use pdf_x_renderer::library::library;
use pdf_x_renderer::page::open_pages;
use pdf_x_renderer::{
    PdfEditor, RendererError, close_document, close_page, open_document, open_page,
};
use std::sync::{Mutex, MutexGuard};
use test_utils::*;

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    init_logging();
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

#[test]
fn test_open_close_initializes_and_tears_down() {
    let _serial = serial();
    assert_eq!(library().active_clients(), 0);
    assert!(!pdf_x_core::library::is_initialized());

    let doc = open_document(MemorySource::new(blank_document(1, 100.0, 100.0))).unwrap();
    assert_eq!(library().active_clients(), 1);
    assert!(pdf_x_core::library::is_initialized());

    close_document(doc).unwrap();
    assert_eq!(library().active_clients(), 0);
    assert!(!pdf_x_core::library::is_initialized());
}

#[test]
fn test_closing_document_drops_its_pages() {
    let _serial = serial();
    let data = blank_document(3, 100.0, 100.0);
    let first = open_document(MemorySource::new(data.clone())).unwrap();
    let second = open_document(MemorySource::new(data)).unwrap();
    assert_eq!(open_documents(), 2);

    for index in 0..3 {
        open_page(first, index).unwrap();
    }
    let (kept, _) = open_page(second, 0).unwrap();
    assert_eq!(open_pages(), 4);

    close_document(first).unwrap();
    assert_eq!(open_documents(), 1);
    assert_eq!(open_pages(), 1);

    close_page(kept).unwrap();
    close_document(second).unwrap();
    assert_eq!((open_documents(), open_pages()), (0, 0));
}

#[test]
fn test_failed_open_is_net_zero() {
    let _serial = serial();
    let before = library().active_clients();

    let err = open_document(MemorySource::new(b"this is not a pdf".to_vec())).unwrap_err();
    assert!(matches!(err, RendererError::DocumentLoad { code: 3 }), "{:?}", err);
    assert_eq!(err.to_string(), "cannot create document. Error: 3");
    assert_eq!(library().active_clients(), before);

    let err = open_document(MemorySource::new(Vec::new())).unwrap_err();
    assert!(matches!(err, RendererError::DocumentLoad { .. }));
    assert_eq!(library().active_clients(), before);
    assert!(!pdf_x_core::library::is_initialized());
}

#[test]
fn test_each_document_holds_a_reference() {
    let _serial = serial();
    let data = blank_document(2, 200.0, 100.0);
    let first = open_document(MemorySource::new(data.clone())).unwrap();
    let second = open_document(MemorySource::new(data)).unwrap();
    assert_eq!(library().active_clients(), 2);

    close_document(first).unwrap();
    assert!(library().is_initialized());
    assert!(pdf_x_core::library::is_initialized());

    // A double close neither fails silently nor releases twice
    assert!(matches!(close_document(first), Err(RendererError::StaleHandle)));
    assert_eq!(library().active_clients(), 1);

    close_document(second).unwrap();
    assert_eq!(library().active_clients(), 0);
}

#[test]
fn test_editor_holds_a_reference() {
    let _serial = serial();
    let mut editor = PdfEditor::open(MemorySource::new(blank_document(3, 50.0, 50.0))).unwrap();
    assert_eq!(library().active_clients(), 1);

    editor.close().unwrap();
    assert_eq!(library().active_clients(), 0);

    let editor = PdfEditor::open(MemorySource::new(blank_document(1, 50.0, 50.0))).unwrap();
    drop(editor);
    assert_eq!(library().active_clients(), 0);
}

#[test]
fn test_guards_release_on_drop_in_any_order() {
    let _serial = serial();
    let a = library().acquire();
    let b = library().acquire();
    drop(a);
    assert_eq!(library().active_clients(), 1);
    drop(b);
    assert!(!library().is_initialized());
    assert!(!pdf_x_core::library::is_initialized());
}

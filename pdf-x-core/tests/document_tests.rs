//! Document loading, page geometry and editing.


use pdf_x_core::core::{ErrorCode, FileAccess, PDFDocument, PDFError, PDFObject, last_error};
use test_utils::*;

#[test]
fn test_page_count_round_trip() {
    init();
    let mut doc = PDFDocument::load_memory(blank_document(10, 612.0, 792.0)).unwrap();
    assert_eq!(doc.page_count(), 10);
    assert_eq!(doc.page_size_by_index(9).unwrap(), (612.0, 792.0));

    let err = doc.load_page(10).unwrap_err();
    assert!(matches!(err, PDFError::PageNotFound { index: 10 }));
    assert_eq!(last_error(), ErrorCode::Page);
}

#[test]
fn test_garbage_is_a_format_error() {
    init();
    let result = PDFDocument::load_memory(b"this is not a pdf at all".to_vec());
    assert!(result.is_err());
    assert_eq!(last_error(), ErrorCode::Format);
}

#[test]
fn test_empty_file_fails() {
    init();
    assert!(PDFDocument::load_memory(Vec::new()).is_err());
}

/// A source whose reads always fail.
struct FailingAccess(usize);

impl FileAccess for FailingAccess {
    fn file_len(&self) -> usize {
        self.0
    }

    fn get_block(&mut self, _position: usize, _buf: &mut [u8]) -> bool {
        false
    }
}

#[test]
fn test_read_failures_surface_as_load_errors() {
    init();
    let result = PDFDocument::load(Box::new(FailingAccess(4096)));
    assert!(result.is_err());
    assert_ne!(last_error(), ErrorCode::Success);
}

#[test]
fn test_damaged_xref_is_reconstructed() {
    init();
    let mut data = blank_document(3, 200.0, 100.0);
    // Point startxref at garbage
    let pos = data
        .windows(9)
        .rposition(|w| w == b"startxref")
        .expect("startxref present");
    data.truncate(pos);
    data.extend_from_slice(b"startxref\n5\n%%EOF\n");

    let mut doc = PDFDocument::load_memory(data).unwrap();
    assert!(doc.xref().is_reconstructed());
    assert_eq!(doc.page_count(), 3);
    assert_eq!(doc.page_size_by_index(0).unwrap(), (200.0, 100.0));
}

#[test]
fn test_inherited_media_box_and_rotation() {
    init();
    let mut builder = PdfBuilder::new();
    builder.add_page_with(
        [0.0, 0.0, 300.0, 500.0],
        b"",
        dict(&[("Rotate", num(90.0))]),
    );
    builder.add_page_with(
        [0.0, 0.0, 300.0, 500.0],
        b"",
        dict(&[("CropBox", numbers(&[50.0, 50.0, 250.0, 150.0]))]),
    );
    let mut doc = PDFDocument::load_memory(builder.build()).unwrap();

    assert_eq!(doc.page_size_by_index(0).unwrap(), (500.0, 300.0));
    let page = doc.load_page(0).unwrap();
    assert_eq!(page.rotation(), 90);
    assert_eq!((page.width(), page.height()), (500.0, 300.0));

    assert_eq!(doc.page_size_by_index(1).unwrap(), (200.0, 100.0));
}

#[test]
fn test_indirect_media_box() {
    init();
    let mut builder = PdfBuilder::new();
    let media_box = builder.add_object(numbers(&[0.0, 0.0, 144.0, 72.0]));
    builder.add_page_with(
        [0.0, 0.0, 10.0, 10.0],
        b"",
        dict(&[("MediaBox", PDFObject::Ref(media_box))]),
    );
    let mut doc = PDFDocument::load_memory(builder.build()).unwrap();
    assert_eq!(doc.page_size_by_index(0).unwrap(), (144.0, 72.0));
}

#[test]
fn test_degenerate_media_box_fails_size_query() {
    init();
    let mut builder = PdfBuilder::new();
    builder.add_page([0.0, 0.0, 0.0, 0.0], b"");
    let mut doc = PDFDocument::load_memory(builder.build()).unwrap();

    // The page itself still loads
    assert!(doc.load_page(0).is_ok());
    assert!(doc.page_size_by_index(0).is_err());
}

#[test]
fn test_print_scaling_preference() {
    init();
    let mut doc = PDFDocument::load_memory(blank_document(1, 100.0, 100.0)).unwrap();
    assert!(doc.viewer_pref_print_scaling());

    let mut builder = PdfBuilder::new();
    builder.add_page([0.0, 0.0, 100.0, 100.0], b"");
    builder.catalog_entry(
        "ViewerPreferences",
        PDFObject::Dictionary(dict(&[("PrintScaling", name("None"))])),
    );
    let mut doc = PDFDocument::load_memory(builder.build()).unwrap();
    assert!(!doc.viewer_pref_print_scaling());

    let mut builder = PdfBuilder::new();
    builder.add_page([0.0, 0.0, 100.0, 100.0], b"");
    builder.catalog_entry(
        "ViewerPreferences",
        PDFObject::Dictionary(dict(&[("PrintScaling", name("AppDefault"))])),
    );
    let mut doc = PDFDocument::load_memory(builder.build()).unwrap();
    assert!(doc.viewer_pref_print_scaling());
}

#[test]
fn test_remove_page_and_save_incremental() {
    init();
    let mut builder = PdfBuilder::new();
    builder.add_page([0.0, 0.0, 100.0, 100.0], b"");
    builder.add_page([0.0, 0.0, 200.0, 200.0], b"");
    builder.add_page([0.0, 0.0, 300.0, 300.0], b"");
    let original = builder.build();

    let mut doc = PDFDocument::load_memory(original.clone()).unwrap();
    assert_eq!(doc.remove_page(1).unwrap(), 2);
    assert!(doc.remove_page(5).is_err());

    let mut saved = Vec::new();
    doc.save_incremental(&mut saved).unwrap();
    assert!(saved.starts_with(&original));
    assert!(saved.len() > original.len());

    let mut reloaded = PDFDocument::load_memory(saved).unwrap();
    assert!(!reloaded.xref().is_reconstructed());
    assert_eq!(reloaded.page_count(), 2);
    assert_eq!(reloaded.page_size_by_index(0).unwrap(), (100.0, 100.0));
    assert_eq!(reloaded.page_size_by_index(1).unwrap(), (300.0, 300.0));
}

#[test]
fn test_page_content_is_parsed_once() {
    init();
    let data = single_page(100.0, 100.0, b"q 1 0 0 1 5 5 cm 0 0 10 10 re f Q", Default::default());
    let mut doc = PDFDocument::load_memory(data).unwrap();
    let page = doc.load_page(0).unwrap();
    assert_eq!(page.operations().len(), 5);
}

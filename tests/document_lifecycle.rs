//! Document and page handles.


use pdf_x_core::core::PDFObject;
use pdf_x_renderer::byte_source::{FileSource, MemorySource};
use pdf_x_renderer::page::page_dimensions;
use pdf_x_renderer::{
    RendererError, close_document, close_page, open_document, open_page, page_count,
    print_scaling,
};
use std::io::Write;
use test_utils::*;

#[test]
fn test_page_count_round_trip() {
    init_logging();
    let doc = open_document(MemorySource::new(blank_document(10, 612.0, 792.0))).unwrap();
    assert_eq!(page_count(doc).unwrap(), 10);

    let (page, size) = open_page(doc, 9).unwrap();
    assert_eq!((size.width, size.height), (612, 792));
    close_page(page).unwrap();

    assert!(matches!(open_page(doc, 10), Err(RendererError::PageLoad)));
    close_document(doc).unwrap();
}

#[test]
fn test_sizes_truncate_and_follow_rotation() {
    init_logging();
    let mut builder = PdfBuilder::new();
    builder.add_page([0.0, 0.0, 300.7, 200.2], b"");
    builder.add_page_with(
        [0.0, 0.0, 300.0, 200.0],
        b"",
        dict(&[("Rotate", PDFObject::Number(90.0))]),
    );
    let doc = open_document(MemorySource::new(builder.build())).unwrap();

    let (first, size) = open_page(doc, 0).unwrap();
    assert_eq!((size.width, size.height), (300, 200));
    let (w, h) = page_dimensions(first).unwrap();
    assert!((w - 300.7).abs() < 1e-9 && (h - 200.2).abs() < 1e-9);

    let (_, rotated) = open_page(doc, 1).unwrap();
    assert_eq!((rotated.width, rotated.height), (200, 300));
    close_document(doc).unwrap();
}

#[test]
fn test_size_failure_releases_page() {
    init_logging();
    let mut builder = PdfBuilder::new();
    builder.add_page([0.0, 0.0, 0.0, 0.0], b"0 0 10 10 re f");
    let doc = open_document(MemorySource::new(builder.build())).unwrap();

    let err = open_page(doc, 0).unwrap_err();
    assert!(matches!(err, RendererError::PageSize));
    assert_eq!(err.to_string(), "cannot get page size");
    // The document stays usable
    assert_eq!(page_count(doc).unwrap(), 1);
    close_document(doc).unwrap();
}

#[test]
fn test_closing_document_invalidates_pages() {
    init_logging();
    let doc = open_document(MemorySource::new(blank_document(3, 100.0, 100.0))).unwrap();
    let (p0, _) = open_page(doc, 0).unwrap();
    let (p1, _) = open_page(doc, 1).unwrap();

    close_document(doc).unwrap();
    assert!(matches!(close_page(p0), Err(RendererError::StaleHandle)));
    assert!(matches!(page_dimensions(p1), Err(RendererError::StaleHandle)));
    assert!(matches!(page_count(doc), Err(RendererError::StaleHandle)));
    assert!(matches!(open_page(doc, 0), Err(RendererError::StaleHandle)));
}

#[test]
fn test_double_page_close() {
    init_logging();
    let doc = open_document(MemorySource::new(blank_document(1, 100.0, 100.0))).unwrap();
    let (page, _) = open_page(doc, 0).unwrap();
    close_page(page).unwrap();
    assert!(matches!(close_page(page), Err(RendererError::StaleHandle)));
    close_document(doc).unwrap();
}

#[test]
fn test_print_scaling() {
    init_logging();
    let doc = open_document(MemorySource::new(blank_document(1, 100.0, 100.0))).unwrap();
    assert!(print_scaling(doc).unwrap());
    close_document(doc).unwrap();

    for (value, expected) in [("None", false), ("AppDefault", true)] {
        let mut builder = PdfBuilder::new();
        builder.add_page([0.0, 0.0, 100.0, 100.0], b"");
        builder.catalog_entry(
            "ViewerPreferences",
            PDFObject::Dictionary(dict(&[("PrintScaling", name(value))])),
        );
        let doc = open_document(MemorySource::new(builder.build())).unwrap();
        assert_eq!(print_scaling(doc).unwrap(), expected, "/PrintScaling /{}", value);
        close_document(doc).unwrap();
    }
}

#[test]
fn test_open_from_file() {
    init_logging();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&blank_document(4, 100.0, 100.0)).unwrap();
    file.flush().unwrap();

    let doc = open_document(FileSource::open(file.path()).unwrap()).unwrap();
    assert_eq!(page_count(doc).unwrap(), 4);
    close_document(doc).unwrap();
}

#[test]
fn test_documents_are_independent() {
    init_logging();
    let a = open_document(MemorySource::new(blank_document(2, 100.0, 100.0))).unwrap();
    let b = open_document(MemorySource::new(blank_document(5, 100.0, 100.0))).unwrap();
    let (page_a, _) = open_page(a, 1).unwrap();

    close_document(b).unwrap();
    assert_eq!(page_count(a).unwrap(), 2);
    assert!(page_dimensions(page_a).is_ok());
    close_document(a).unwrap();
}

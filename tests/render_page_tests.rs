//! Rendering through the handle API.


use pdf_x_core::core::PDFObject;
use pdf_x_core::rendering::Matrix;
use pdf_x_renderer::byte_source::MemorySource;
use pdf_x_renderer::render::{DestRect, RENDER_MODE_FOR_DISPLAY, RENDER_MODE_FOR_PRINT};
use pdf_x_renderer::target::{PixelBuffer, PixelFormat, RenderTarget};
use pdf_x_renderer::{
    DocumentHandle, PageHandle, RendererError, close_document, close_page, open_document,
    open_page, render_page,
};
use std::thread;
use test_utils::*;

/// A 100x100 page with a red 10x10 square at the PDF origin.
const CORNER_SQUARE: &[u8] = b"1 0 0 rg 0 0 10 10 re f";

fn open_single(content: &[u8]) -> (DocumentHandle, PageHandle) {
    init_logging();
    let doc = open_document(MemorySource::new(single_page(100.0, 100.0, content))).unwrap();
    let (page, _) = open_page(doc, 0).unwrap();
    (doc, page)
}

fn render_full(doc: DocumentHandle, page: PageHandle, mode: i32) -> RenderTarget {
    let mut target = RenderTarget::new(100, 100);
    render_page(doc, page, &mut target, DestRect::full(100, 100), mode, None).unwrap();
    target
}

#[test]
fn test_bottom_left_lands_on_bottom_rows() {
    let (doc, page) = open_single(CORNER_SQUARE);
    let target = render_full(doc, page, RENDER_MODE_FOR_DISPLAY);

    assert!(is_color(target.pixel(5, 95).unwrap(), [255, 0, 0]));
    assert_eq!(target.pixel(5, 5).unwrap()[3], 0);
    assert_eq!(target.pixel(95, 95).unwrap()[3], 0);
    close_document(doc).unwrap();
}

#[test]
fn test_clip_to_dest_rect() {
    let (doc, page) = open_single(b"0 0 1 rg 0 0 100 100 re f");
    let mut target = RenderTarget::new(100, 100);
    let dest = DestRect::new(0, 0, 50, 100);
    render_page(doc, page, &mut target, dest, RENDER_MODE_FOR_DISPLAY, None).unwrap();

    assert!(is_color(target.pixel(25, 50).unwrap(), [0, 0, 255]));
    assert_eq!(target.pixel(75, 50).unwrap()[3], 0);
    close_document(doc).unwrap();
}

#[test]
fn test_transform_applies_after_flip() {
    let (doc, page) = open_single(CORNER_SQUARE);
    let mut target = RenderTarget::new(200, 200);
    let scale = Matrix::scale(2.0, 2.0);
    let dest = DestRect::full(200, 200);
    render_page(doc, page, &mut target, dest, RENDER_MODE_FOR_DISPLAY, Some(&scale)).unwrap();

    assert!(is_color(target.pixel(10, 190).unwrap(), [255, 0, 0]));
    assert_eq!(target.pixel(30, 170).unwrap()[3], 0);
    close_document(doc).unwrap();
}

#[test]
fn test_existing_pixels_are_kept_outside_content() {
    let (doc, page) = open_single(CORNER_SQUARE);
    let mut target = RenderTarget::new(100, 100);
    target.fill([255, 255, 255]);
    render_page(doc, page, &mut target, DestRect::full(100, 100), 1, None).unwrap();

    assert!(is_color(target.pixel(50, 50).unwrap(), [255, 255, 255]));
    assert!(is_color(target.pixel(5, 95).unwrap(), [255, 0, 0]));
    assert_eq!(target.generation(), 1);
    close_document(doc).unwrap();
}

#[test]
fn test_letter_document_renders_content() {
    init_logging();
    let mut builder = PdfBuilder::new();
    builder.add_page(
        [0.0, 0.0, 612.0, 792.0],
        b"0.2 g 72 72 468 648 re f 1 0 0 RG 4 w 100 100 m 500 700 l S",
    );
    for _ in 1..10 {
        builder.add_page([0.0, 0.0, 612.0, 792.0], b"");
    }
    let doc = open_document(MemorySource::new(builder.build())).unwrap();
    let (page, size) = open_page(doc, 0).unwrap();
    assert_eq!((size.width, size.height), (612, 792));

    let mut target = RenderTarget::new(612, 792);
    target.fill([255, 255, 255]);
    let dest = DestRect::full(612, 792);
    render_page(doc, page, &mut target, dest, RENDER_MODE_FOR_DISPLAY, None).unwrap();

    let first = target.pixel(0, 0).unwrap();
    assert!(
        (0..792).step_by(8).any(|y| (0..612)
            .step_by(8)
            .any(|x| target.pixel(x, y).unwrap() != first)),
        "rendered page is uniform"
    );
    assert!(is_color(target.pixel(300, 100).unwrap(), [51, 51, 51]));
    close_document(doc).unwrap();
}

#[test]
fn test_print_mode_shows_print_layers() {
    init_logging();
    let mut builder = PdfBuilder::new();
    let layer = builder.add_object(PDFObject::Dictionary(dict(&[
        ("Type", name("OCG")),
        ("Name", PDFObject::String(b"print only".to_vec())),
        (
            "Usage",
            PDFObject::Dictionary(dict(&[(
                "Print",
                PDFObject::Dictionary(dict(&[("PrintState", name("ON"))])),
            )])),
        ),
    ])));
    let resources = dict(&[(
        "Properties",
        PDFObject::Dictionary(dict(&[("L", PDFObject::Ref(layer))])),
    )]);
    builder.add_page_with(
        [0.0, 0.0, 100.0, 100.0],
        b"/OC /L BDC 0 0 1 rg 0 0 100 100 re f EMC",
        dict(&[("Resources", PDFObject::Dictionary(resources))]),
    );
    let config = dict(&[
        ("OFF", PDFObject::array([PDFObject::Ref(layer)])),
        (
            "AS",
            PDFObject::array([PDFObject::Dictionary(dict(&[
                ("Event", name("Print")),
                ("Category", PDFObject::array([name("Print")])),
                ("OCGs", PDFObject::array([PDFObject::Ref(layer)])),
            ]))]),
        ),
    ]);
    builder.catalog_entry(
        "OCProperties",
        PDFObject::Dictionary(dict(&[
            ("OCGs", PDFObject::array([PDFObject::Ref(layer)])),
            ("D", PDFObject::Dictionary(config)),
        ])),
    );
    let doc = open_document(MemorySource::new(builder.build())).unwrap();
    let (page, _) = open_page(doc, 0).unwrap();

    let display = render_full(doc, page, RENDER_MODE_FOR_DISPLAY);
    assert_eq!(display.pixel(50, 50).unwrap()[3], 0);

    let print = render_full(doc, page, RENDER_MODE_FOR_PRINT);
    assert!(is_color(print.pixel(50, 50).unwrap(), [0, 0, 255]));
    close_document(doc).unwrap();
}

#[test]
fn test_render_after_close_is_stale() {
    let (doc, page) = open_single(CORNER_SQUARE);
    close_page(page).unwrap();
    let mut target = RenderTarget::new(100, 100);
    let dest = DestRect::full(100, 100);
    let err = render_page(doc, page, &mut target, dest, 1, None).unwrap_err();
    assert!(matches!(err, RendererError::StaleHandle));

    let (page, _) = open_page(doc, 0).unwrap();
    close_document(doc).unwrap();
    let err = render_page(doc, page, &mut target, dest, 1, None).unwrap_err();
    assert!(matches!(err, RendererError::StaleHandle));
    assert_eq!(target.generation(), 0);
}

#[test]
fn test_page_of_other_document_is_rejected() {
    let (doc_a, _) = open_single(CORNER_SQUARE);
    let (doc_b, page_b) = open_single(CORNER_SQUARE);
    let mut target = RenderTarget::new(100, 100);
    let err = render_page(doc_a, page_b, &mut target, DestRect::full(100, 100), 1, None)
        .unwrap_err();
    assert!(matches!(err, RendererError::InvalidArgument(_)));
    close_document(doc_a).unwrap();
    close_document(doc_b).unwrap();
}

#[test]
fn test_target_failures_are_reported() {
    let (doc, page) = open_single(CORNER_SQUARE);
    let dest = DestRect::full(100, 100);

    let mut rgb565 = RenderTarget::with_format(100, 100, PixelFormat::Rgb565);
    let err = render_page(doc, page, &mut rgb565, dest, 1, None).unwrap_err();
    assert!(matches!(err, RendererError::RenderTarget(_)));

    // Already locked by someone else
    let mut locked = RenderTarget::new(100, 100);
    assert!(locked.lock_pixels().is_some());
    let err = render_page(doc, page, &mut locked, dest, 1, None).unwrap_err();
    assert!(matches!(err, RendererError::RenderTarget(_)));

    let mut empty = RenderTarget::new(0, 0);
    let err = render_page(doc, page, &mut empty, dest, 1, None).unwrap_err();
    assert!(matches!(err, RendererError::RenderTarget(_)));
    close_document(doc).unwrap();
}

#[test]
fn test_documents_render_concurrently() {
    init_logging();
    let workers: Vec<_> = (0..4u8)
        .map(|i| {
            thread::spawn(move || {
                let gray = f64::from(i) / 4.0;
                let content = format!("{} g 0 0 100 100 re f", gray);
                let doc =
                    open_document(MemorySource::new(single_page(100.0, 100.0, content.as_bytes())))
                        .unwrap();
                let (page, _) = open_page(doc, 0).unwrap();
                let mut target = RenderTarget::new(100, 100);
                for _ in 0..3 {
                    let dest = DestRect::full(100, 100);
                    render_page(doc, page, &mut target, dest, 1, None).unwrap();
                }
                close_document(doc).unwrap();
                (i, target.pixel(50, 50).unwrap())
            })
        })
        .collect();

    for worker in workers {
        let (i, pixel) = worker.join().unwrap();
        let level = (f64::from(i) / 4.0 * 255.0).round() as u8;
        assert!(is_color(pixel, [level, level, level]), "worker {}: {:?}", i, pixel);
    }
}

#[test]
fn test_standard_font_text_is_inked() {
    init_logging();
    let font = PDFObject::Dictionary(dict(&[
        ("Type", name("Font")),
        ("Subtype", name("Type1")),
        ("BaseFont", name("Helvetica")),
    ]));
    let resources = dict(&[("Font", PDFObject::Dictionary(dict(&[("F1", font)])))]);
    let mut builder = PdfBuilder::new();
    builder.add_page_with(
        [0.0, 0.0, 200.0, 100.0],
        b"BT /F1 48 Tf 10 30 Td (HELLO) Tj ET",
        dict(&[("Resources", PDFObject::Dictionary(resources))]),
    );
    let doc = open_document(MemorySource::new(builder.build())).unwrap();
    let (page, _) = open_page(doc, 0).unwrap();

    let mut target = RenderTarget::new(200, 100);
    target.fill([255, 255, 255]);
    let dest = DestRect::full(200, 100);
    render_page(doc, page, &mut target, dest, RENDER_MODE_FOR_DISPLAY, None).unwrap();

    let inked = (0..100)
        .flat_map(|y| (0..200).map(move |x| (x, y)))
        .filter(|&(x, y)| !is_color(target.pixel(x, y).unwrap(), [255, 255, 255]))
        .count();
    assert!(inked > 100, "only {} inked pixels", inked);
    // Nothing lands above the cap height
    assert!((0..200).all(|x| is_color(target.pixel(x, 5).unwrap(), [255, 255, 255])));
    close_document(doc).unwrap();
}

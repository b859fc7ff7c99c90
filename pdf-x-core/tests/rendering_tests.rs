//! End-to-end rasterization through `SkiaDevice`.


use pdf_x_core::core::{Dict, PDFDocument, PDFObject, Ref};
use pdf_x_core::rendering::{RenderOptions, RenderProgress};
use test_utils::*;

fn resources(category: &str, entries: &[(&str, PDFObject)]) -> Dict {
    dict(&[(category, PDFObject::Dictionary(dict(entries)))])
}

fn render_single(content: &[u8], resources: Dict) -> pdf_x_core::rendering::Bitmap<'static> {
    init();
    let data = single_page(100.0, 100.0, content, resources);
    let mut doc = PDFDocument::load_memory(data).unwrap();
    let (bitmap, progress) = render_page(&mut doc, 0, &RenderOptions::default());
    assert_eq!(progress, RenderProgress::Done);
    bitmap
}

#[test]
fn test_origin_maps_to_bottom_rows() {
    let bitmap = render_single(b"1 0 0 rg 0 0 20 20 re f", Dict::default());
    assert!(is_color(bitmap.pixel(5, 95).unwrap(), [255, 0, 0]));
    assert_eq!(bitmap.pixel(5, 5).unwrap(), [0, 0, 0, 0]);
}

#[test]
fn test_clip_path_limits_painting() {
    let bitmap = render_single(
        b"0 0 50 100 re W n 0 0 1 rg 0 0 100 100 re f",
        Dict::default(),
    );
    assert!(is_color(bitmap.pixel(25, 50).unwrap(), [0, 0, 255]));
    assert_eq!(bitmap.pixel(75, 50).unwrap()[3], 0);
}

#[test]
fn test_unknown_resources_are_skipped() {
    let bitmap = render_single(b"/Missing Do 0 1 0 rg 0 0 100 100 re f", Dict::default());
    assert!(is_color(bitmap.pixel(50, 50).unwrap(), [0, 255, 0]));
}

#[test]
fn test_fill_alpha_from_ext_gstate() {
    let gstate = resources("ExtGState", &[("GS0", PDFObject::Dictionary(dict(&[("ca", num(0.5))])))]);
    let bitmap = render_single(b"/GS0 gs 0 0 0 rg 0 0 100 100 re f", gstate);
    let alpha = bitmap.pixel(50, 50).unwrap()[3];
    assert!((120..=136).contains(&alpha), "alpha {}", alpha);
}

#[test]
fn test_rotated_page() {
    init();
    let mut builder = PdfBuilder::new();
    builder.add_page_with(
        [0.0, 0.0, 100.0, 50.0],
        b"1 0 0 rg 0 0 10 10 re f",
        dict(&[("Rotate", num(90.0))]),
    );
    let mut doc = PDFDocument::load_memory(builder.build()).unwrap();
    let (bitmap, progress) = render_page(&mut doc, 0, &RenderOptions::default());
    assert_eq!(progress, RenderProgress::Done);
    assert_eq!((bitmap.width(), bitmap.height()), (50, 100));
    // Turning the page clockwise brings its lower left corner to the top left
    assert!(is_color(bitmap.pixel(5, 5).unwrap(), [255, 0, 0]));
    assert_eq!(bitmap.pixel(5, 95).unwrap()[3], 0);
}

#[test]
fn test_form_xobject_matrix_and_bbox() {
    init();
    let mut builder = PdfBuilder::new();
    let form = builder.add_object(stream(
        dict(&[
            ("Type", name("XObject")),
            ("Subtype", name("Form")),
            ("BBox", numbers(&[0.0, 0.0, 20.0, 20.0])),
            ("Matrix", numbers(&[1.0, 0.0, 0.0, 1.0, 50.0, 50.0])),
        ]),
        b"0 0 1 rg 0 0 100 100 re f",
    ));
    builder.add_page_with(
        [0.0, 0.0, 100.0, 100.0],
        b"/Fm0 Do",
        dict(&[(
            "Resources",
            PDFObject::Dictionary(resources("XObject", &[("Fm0", PDFObject::Ref(form))])),
        )]),
    );
    let mut doc = PDFDocument::load_memory(builder.build()).unwrap();
    let (bitmap, progress) = render_page(&mut doc, 0, &RenderOptions::default());
    assert_eq!(progress, RenderProgress::Done);

    assert!(is_color(bitmap.pixel(60, 40).unwrap(), [0, 0, 255]));
    assert_eq!(bitmap.pixel(80, 20).unwrap()[3], 0);
    assert_eq!(bitmap.pixel(40, 60).unwrap()[3], 0);
}

#[test]
fn test_self_referencing_form_terminates() {
    init();
    let mut builder = PdfBuilder::new();
    // The first object added gets number 3
    let form_ref = Ref::new(3, 0);
    let form = builder.add_object(stream(
        dict(&[
            ("Subtype", name("Form")),
            ("BBox", numbers(&[0.0, 0.0, 100.0, 100.0])),
            (
                "Resources",
                PDFObject::Dictionary(resources("XObject", &[("Fm0", PDFObject::Ref(form_ref))])),
            ),
        ]),
        b"1 0 0 rg 0 0 10 10 re f /Fm0 Do",
    ));
    assert_eq!(form, form_ref);
    builder.add_page_with(
        [0.0, 0.0, 100.0, 100.0],
        b"/Fm0 Do",
        dict(&[(
            "Resources",
            PDFObject::Dictionary(resources("XObject", &[("Fm0", PDFObject::Ref(form))])),
        )]),
    );
    let mut doc = PDFDocument::load_memory(builder.build()).unwrap();
    let (bitmap, progress) = render_page(&mut doc, 0, &RenderOptions::default());
    assert_eq!(progress, RenderProgress::Done);
    assert!(is_color(bitmap.pixel(5, 95).unwrap(), [255, 0, 0]));
}

#[test]
fn test_image_xobject() {
    init();
    let mut builder = PdfBuilder::new();
    let image = builder.add_object(stream(
        dict(&[
            ("Type", name("XObject")),
            ("Subtype", name("Image")),
            ("Width", num(2.0)),
            ("Height", num(1.0)),
            ("BitsPerComponent", num(8.0)),
            ("ColorSpace", name("DeviceRGB")),
        ]),
        &[255, 0, 0, 0, 0, 255],
    ));
    builder.add_page_with(
        [0.0, 0.0, 100.0, 100.0],
        b"q 100 0 0 100 0 0 cm /Im0 Do Q",
        dict(&[(
            "Resources",
            PDFObject::Dictionary(resources("XObject", &[("Im0", PDFObject::Ref(image))])),
        )]),
    );
    let mut doc = PDFDocument::load_memory(builder.build()).unwrap();
    let (bitmap, _) = render_page(&mut doc, 0, &RenderOptions::default());

    assert!(is_color(bitmap.pixel(10, 50).unwrap(), [255, 0, 0]));
    assert!(is_color(bitmap.pixel(90, 50).unwrap(), [0, 0, 255]));
}

#[test]
fn test_inline_gray_image() {
    let bitmap = render_single(
        b"q 100 0 0 100 0 0 cm BI /W 1 /H 2 /BPC 8 /CS /G ID \x00\xff EI Q",
        Dict::default(),
    );
    // First row at the top
    assert!(is_color(bitmap.pixel(50, 10).unwrap(), [0, 0, 0]));
    assert!(is_color(bitmap.pixel(50, 90).unwrap(), [255, 255, 255]));
}

#[test]
fn test_stencil_mask_uses_fill_color() {
    init();
    let mut builder = PdfBuilder::new();
    let mask = builder.add_object(stream(
        dict(&[
            ("Subtype", name("Image")),
            ("Width", num(8.0)),
            ("Height", num(1.0)),
            ("ImageMask", PDFObject::Boolean(true)),
        ]),
        &[0x0F],
    ));
    builder.add_page_with(
        [0.0, 0.0, 100.0, 100.0],
        b"0 1 0 rg q 80 0 0 80 0 0 cm /Im0 Do Q",
        dict(&[(
            "Resources",
            PDFObject::Dictionary(resources("XObject", &[("Im0", PDFObject::Ref(mask))])),
        )]),
    );
    let mut doc = PDFDocument::load_memory(builder.build()).unwrap();
    let (bitmap, _) = render_page(&mut doc, 0, &RenderOptions::default());

    // Zero bits are painted
    assert!(is_color(bitmap.pixel(15, 60).unwrap(), [0, 255, 0]));
    assert_eq!(bitmap.pixel(65, 60).unwrap()[3], 0);
}

#[test]
fn test_type3_glyph_uses_fill_color() {
    init();
    let mut builder = PdfBuilder::new();
    let glyph = builder.add_object(stream(
        Dict::default(),
        b"1000 0 0 0 1000 1000 d1 1 0 0 rg 0 0 1000 1000 re f",
    ));
    let font = PDFObject::Dictionary(dict(&[
        ("Type", name("Font")),
        ("Subtype", name("Type3")),
        ("FontMatrix", numbers(&[0.001, 0.0, 0.0, 0.001, 0.0, 0.0])),
        ("FontBBox", numbers(&[0.0, 0.0, 1000.0, 1000.0])),
        ("FirstChar", num(65.0)),
        ("LastChar", num(65.0)),
        ("Widths", numbers(&[1000.0])),
        (
            "Encoding",
            PDFObject::Dictionary(dict(&[(
                "Differences",
                PDFObject::array([num(65.0), name("square")]),
            )])),
        ),
        (
            "CharProcs",
            PDFObject::Dictionary(dict(&[("square", PDFObject::Ref(glyph))])),
        ),
    ]));
    builder.add_page_with(
        [0.0, 0.0, 100.0, 100.0],
        b"0 1 0 rg BT /F1 20 Tf 10 10 Td (AA) Tj ET",
        dict(&[(
            "Resources",
            PDFObject::Dictionary(resources("Font", &[("F1", font)])),
        )]),
    );
    let mut doc = PDFDocument::load_memory(builder.build()).unwrap();
    let (bitmap, progress) = render_page(&mut doc, 0, &RenderOptions::default());
    assert_eq!(progress, RenderProgress::Done);

    // Two glyphs side by side, painted green despite the glyph's own `rg`
    assert!(is_color(bitmap.pixel(20, 80).unwrap(), [0, 255, 0]));
    assert!(is_color(bitmap.pixel(40, 80).unwrap(), [0, 255, 0]));
    assert_eq!(bitmap.pixel(60, 80).unwrap()[3], 0);
}

#[test]
fn test_standard_font_text_is_painted() {
    init();
    let font = PDFObject::Dictionary(dict(&[
        ("Type", name("Font")),
        ("Subtype", name("Type1")),
        ("BaseFont", name("Helvetica")),
    ]));
    let data = single_page(
        200.0,
        100.0,
        b"BT /F1 48 Tf 10 30 Td (HELLO) Tj ET",
        resources("Font", &[("F1", font)]),
    );
    let mut doc = PDFDocument::load_memory(data).unwrap();
    let (bitmap, progress) = render_page(&mut doc, 0, &RenderOptions::default());
    assert_eq!(progress, RenderProgress::Done);

    let painted = (0..100)
        .flat_map(|y| (0..200).map(move |x| (x, y)))
        .filter(|&(x, y)| bitmap.pixel(x, y).unwrap()[3] > 0)
        .count();
    assert!(painted > 100, "only {} painted pixels", painted);
    // Ink between the baseline and the cap height, none above it
    assert!((0..200).any(|x| bitmap.pixel(x, 50).unwrap()[3] > 128));
    assert!((0..200).all(|x| bitmap.pixel(x, 5).unwrap()[3] == 0));
}

//! The runtime-facing entry points.


use pdf_x_renderer::bridge::{self, ErrorKind, INVALID_HANDLE};
use pdf_x_renderer::byte_source::MemorySource;
use pdf_x_renderer::render::RENDER_MODE_FOR_DISPLAY;
use pdf_x_renderer::target::{PixelFormat, RenderTarget};
use std::io::Write;
use test_utils::*;

fn loaded() -> RecordingRuntime {
    init_logging();
    bridge::on_load(&mut PointResolver).unwrap();
    RecordingRuntime::default()
}

#[cfg(unix)]
#[test]
fn test_create_from_descriptor() {
    use std::os::fd::AsRawFd;

    let mut rt = loaded();
    let data = blank_document(3, 612.0, 792.0);
    let mut file = tempfile::tempfile().unwrap();
    file.write_all(&data).unwrap();

    let doc = bridge::native_create(&mut rt, file.as_raw_fd(), data.len() as i64);
    assert!(doc > 0, "{:?}", rt.errors);
    assert_eq!(bridge::native_get_page_count(&mut rt, doc), 3);

    let mut size = Point::default();
    let page = bridge::native_open_page_and_get_size(&mut rt, doc, 2, &mut size);
    assert!(page > 0);
    assert_eq!((size.x, size.y), (612, 792));

    bridge::native_close_page(&mut rt, page);
    bridge::native_close(&mut rt, doc);
    assert!(rt.errors.is_empty(), "{:?}", rt.errors);

    // The caller's descriptor survives the document
    file.write_all(b"%").unwrap();
}

#[cfg(unix)]
#[test]
fn test_create_failures_signal_io() {
    use std::os::fd::AsRawFd;

    let mut rt = loaded();
    let mut file = tempfile::tempfile().unwrap();
    file.write_all(b"definitely not a pdf").unwrap();

    let doc = bridge::native_create(&mut rt, file.as_raw_fd(), 20);
    assert_eq!(doc, INVALID_HANDLE);
    assert_eq!(
        rt.last(),
        Some((ErrorKind::Io, "cannot create document. Error: 3"))
    );

    assert_eq!(bridge::native_create(&mut rt, -1, 20), INVALID_HANDLE);
    assert_eq!(rt.last().map(|(kind, _)| kind), Some(ErrorKind::Io));
    assert_eq!(rt.errors.len(), 2);
}

#[test]
fn test_page_failures_signal_illegal_state() {
    let mut rt = loaded();
    let mut builder = PdfBuilder::new();
    builder.add_page([0.0, 0.0, 100.0, 100.0], b"");
    builder.add_page([0.0, 0.0, 0.0, 0.0], b"");
    let doc = bridge::native_create_from_source(&mut rt, MemorySource::new(builder.build()));
    assert!(doc > 0);

    let mut size = Point::default();
    let page = bridge::native_open_page_and_get_size(&mut rt, doc, 5, &mut size);
    assert_eq!(page, INVALID_HANDLE);
    assert_eq!(rt.last(), Some((ErrorKind::IllegalState, "cannot load page")));

    let page = bridge::native_open_page_and_get_size(&mut rt, doc, -1, &mut size);
    assert_eq!(page, INVALID_HANDLE);
    assert_eq!(rt.last(), Some((ErrorKind::IllegalState, "cannot load page")));

    let page = bridge::native_open_page_and_get_size(&mut rt, doc, 1, &mut size);
    assert_eq!(page, INVALID_HANDLE);
    assert_eq!(rt.last(), Some((ErrorKind::IllegalState, "cannot get page size")));
    assert_eq!((size.x, size.y), (0, 0));

    bridge::native_close(&mut rt, doc);
    assert_eq!(rt.errors.len(), 3);
}

#[test]
fn test_stale_handles_signal_and_return_defaults() {
    let mut rt = loaded();
    let doc =
        bridge::native_create_from_source(&mut rt, MemorySource::new(blank_document(1, 10.0, 10.0)));
    let mut size = Point::default();
    let page = bridge::native_open_page_and_get_size(&mut rt, doc, 0, &mut size);
    bridge::native_close(&mut rt, doc);
    assert!(rt.errors.is_empty());

    assert_eq!(bridge::native_get_page_count(&mut rt, doc), 0);
    assert!(!bridge::native_scale_for_printing(&mut rt, doc));
    bridge::native_close_page(&mut rt, page);
    bridge::native_close(&mut rt, doc);
    bridge::native_close(&mut rt, 0);
    assert_eq!(rt.errors.len(), 5);
    assert!(rt.errors.iter().all(|(kind, _)| *kind == ErrorKind::IllegalState));
}

#[test]
fn test_scale_for_printing() {
    let mut rt = loaded();
    let doc =
        bridge::native_create_from_source(&mut rt, MemorySource::new(blank_document(1, 10.0, 10.0)));
    assert!(bridge::native_scale_for_printing(&mut rt, doc));
    bridge::native_close(&mut rt, doc);
    assert!(rt.errors.is_empty());
}

#[test]
fn test_render_page() {
    let mut rt = loaded();
    let data = single_page(100.0, 100.0, b"0 1 0 rg 0 0 10 10 re f");
    let doc = bridge::native_create_from_source(&mut rt, MemorySource::new(data));
    let mut size = Point::default();
    let page = bridge::native_open_page_and_get_size(&mut rt, doc, 0, &mut size);

    let mut bitmap = RenderTarget::new(size.x as u32, size.y as u32);
    bridge::native_render_page(&mut rt, doc, page, &mut bitmap, 0, 0, 100, 100, RENDER_MODE_FOR_DISPLAY);
    assert!(rt.errors.is_empty(), "{:?}", rt.errors);
    assert!(is_color(bitmap.pixel(5, 95).unwrap(), [0, 255, 0]));

    let mut alpha = RenderTarget::with_format(100, 100, PixelFormat::Alpha8);
    bridge::native_render_page(&mut rt, doc, page, &mut alpha, 0, 0, 100, 100, RENDER_MODE_FOR_DISPLAY);
    assert_eq!(rt.last().map(|(kind, _)| kind), Some(ErrorKind::IllegalState));

    bridge::native_close_page(&mut rt, page);
    bridge::native_close(&mut rt, doc);
    assert_eq!(rt.errors.len(), 1);
}

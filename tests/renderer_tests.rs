//! The owned renderer front end.


use pdf_x_renderer::byte_source::MemorySource;
use pdf_x_renderer::render::{DestRect, RENDER_MODE_FOR_DISPLAY, RENDER_MODE_FOR_PRINT};
use pdf_x_renderer::target::{PixelFormat, RenderTarget};
use pdf_x_renderer::{PdfRenderer, RendererError, Transform};
use test_utils::*;

fn renderer() -> PdfRenderer {
    init_logging();
    let mut builder = PdfBuilder::new();
    builder.add_page([0.0, 0.0, 100.0, 50.0], b"1 0 0 rg 0 0 10 10 re f");
    builder.add_page([0.0, 0.0, 40.0, 40.0], b"");
    PdfRenderer::new(MemorySource::new(builder.build())).unwrap()
}

fn invalid_argument(err: RendererError) -> String {
    match err {
        RendererError::InvalidArgument(message) => message,
        other => panic!("expected InvalidArgument, got {:?}", other),
    }
}

#[test]
fn test_pages_and_sizes() {
    let mut renderer = renderer();
    assert_eq!(renderer.page_count().unwrap(), 2);
    assert!(renderer.should_scale_for_printing().unwrap());

    let page = renderer.open_page(0).unwrap();
    assert_eq!((page.index(), page.width(), page.height()), (0, 100, 50));
    page.close().unwrap();

    let page = renderer.open_page(1).unwrap();
    assert_eq!((page.width(), page.height()), (40, 40));
}

#[test]
fn test_invalid_page_index() {
    let mut renderer = renderer();
    let err = renderer.open_page(2).err().unwrap();
    assert_eq!(invalid_argument(err), "Invalid page index");
}

#[test]
fn test_render_defaults_to_full_target() {
    let mut renderer = renderer();
    let mut page = renderer.open_page(0).unwrap();
    let mut target = RenderTarget::new(100, 50);
    page.render(&mut target, None, None, RENDER_MODE_FOR_DISPLAY).unwrap();
    assert!(is_color(target.pixel(5, 45).unwrap(), [255, 0, 0]));
    assert_eq!(target.pixel(50, 25).unwrap()[3], 0);
}

#[test]
fn test_render_with_scale_transform() {
    let mut renderer = renderer();
    let mut page = renderer.open_page(0).unwrap();
    let mut target = RenderTarget::new(300, 150);
    let transform = Transform::scale(3.0, 3.0);
    page.render(&mut target, None, Some(&transform), RENDER_MODE_FOR_PRINT)
        .unwrap();
    assert!(is_color(target.pixel(25, 140).unwrap(), [255, 0, 0]));
    assert_eq!(target.pixel(40, 100).unwrap()[3], 0);
}

#[test]
fn test_render_argument_checks() {
    let mut renderer = renderer();
    let mut page = renderer.open_page(0).unwrap();
    let mut target = RenderTarget::new(100, 50);

    let mut rgb565 = RenderTarget::with_format(100, 50, PixelFormat::Rgb565);
    let err = page.render(&mut rgb565, None, None, 1).unwrap_err();
    assert_eq!(invalid_argument(err), "Unsupported pixel format");

    let outside = DestRect::new(0, 0, 101, 50);
    let err = page.render(&mut target, Some(outside), None, 1).unwrap_err();
    assert_eq!(invalid_argument(err), "destBounds not in destination");

    let mut perspective = Transform::IDENTITY;
    perspective.0[7] = 0.5;
    let err = page.render(&mut target, None, Some(&perspective), 1).unwrap_err();
    assert_eq!(invalid_argument(err), "transform not affine");

    let err = page
        .render(&mut target, None, None, RENDER_MODE_FOR_DISPLAY | RENDER_MODE_FOR_PRINT)
        .unwrap_err();
    assert_eq!(invalid_argument(err), "Only single render mode supported");

    for mode in [0, 4, -1] {
        let err = page.render(&mut target, None, None, mode).unwrap_err();
        assert_eq!(invalid_argument(err), "Unsupported render mode");
    }
    assert_eq!(target.generation(), 0);
}

#[test]
fn test_close_is_explicit_and_final() {
    let mut renderer = renderer();
    renderer.close().unwrap();
    assert!(renderer.is_closed());
    for err in [
        renderer.page_count().unwrap_err(),
        renderer.open_page(0).err().unwrap(),
        renderer.close().unwrap_err(),
    ] {
        assert!(matches!(err, RendererError::InvalidState(ref m) if m == "Already closed"));
    }
}

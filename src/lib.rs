//! # pdf-x-renderer
//!
//! Opaque document, page and bitmap handles over the `pdf-x-core` engine, for
//! callers that live in a managed runtime and can only hold integers.
//!
//! The engine's process-wide state is reference counted ([`library`]): the
//! first open document initializes it, closing the last tears it down. Each
//! render call builds its own render context, flips PDF's bottom-up
//! coordinates into raster order, clips to the destination rectangle and
//! drops everything again before returning.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_x_renderer::byte_source::FileSource;
//! use pdf_x_renderer::render::RENDER_MODE_FOR_DISPLAY;
//! use pdf_x_renderer::renderer::PdfRenderer;
//! use pdf_x_renderer::target::RenderTarget;
//!
//! let mut renderer = PdfRenderer::new(FileSource::open("document.pdf")?)?;
//! let mut page = renderer.open_page(0)?;
//! let mut target = RenderTarget::new(page.width() as u32, page.height() as u32);
//! target.fill([255, 255, 255]);
//! page.render(&mut target, None, None, RENDER_MODE_FOR_DISPLAY)?;
//! std::fs::write("page.png", target.to_png()?)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Layers
//!
//! 1. [`bridge`]: `native_*` entry points that signal errors to the runtime.
//! 2. [`document`], [`page`], [`render`]: the handle API.
//! 3. [`renderer`], [`editor`]: safe owned wrappers for Rust callers.

pub mod bridge;
pub mod byte_source;
pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod handle;
pub mod library;
pub mod page;
pub mod render;
pub mod renderer;
pub mod target;

pub use byte_source::{ByteSource, FileSource, MemorySource};
pub use document::{close_document, open_document, page_count, print_scaling};
pub use editor::PdfEditor;
pub use error::{RendererError, Result};
pub use handle::{DocumentHandle, PageHandle};
pub use page::{PageSize, close_page, open_page};
pub use render::{DestRect, RENDER_MODE_FOR_DISPLAY, RENDER_MODE_FOR_PRINT, render_page};
pub use renderer::{PdfRenderer, RendererPage, Transform};
pub use target::{PixelBuffer, PixelFormat, RenderTarget};

//! # pdf-x-core
//!
//! The PDF engine behind `pdf-x-renderer`: it reads documents through a
//! block-oriented [`FileAccess`](core::FileAccess) adapter, resolves pages and
//! their geometry, and rasterizes page content into caller-owned pixel
//! buffers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_x_core::core::PDFDocument;
//! use pdf_x_core::library::{self, EngineConfig};
//! use pdf_x_core::rendering::{Bitmap, Matrix, RenderContext, RenderOptions, SkiaDevice};
//! use pdf_x_core::rendering::progressive::ProgressiveRenderer;
//!
//! library::init_library(EngineConfig::default());
//! let data = std::fs::read("document.pdf")?;
//! let mut doc = PDFDocument::load_memory(data)?;
//! let page = doc.load_page(0)?;
//! let (width, height) = page.geometry().size()?;
//!
//! let mut bitmap = Bitmap::new(width as u32, height as u32)?;
//! let mut context = RenderContext::new();
//! context.append_object_list(&page, &Matrix::new(1.0, 0.0, 0.0, -1.0, 0.0, height));
//! {
//!     let mut device = SkiaDevice::attach(&mut bitmap, false)?;
//!     let options = RenderOptions::default();
//!     let mut renderer = ProgressiveRenderer::new(&context, &options);
//!     renderer.start(doc.xref_mut(), &mut device, None);
//! }
//! library::destroy_library();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Layers
//!
//! 1. **Data access**: [`FileAccess`](core::FileAccess) adapters feed a
//!    chunked, LRU-cached byte stream.
//! 2. **Parsing**: lexer, object parser and cross-reference table, with
//!    reconstruction of damaged tables.
//! 3. **Document**: page tree, inherited page attributes, optional content,
//!    page removal and incremental save.
//! 4. **Rendering**: content stream interpretation against a
//!    [`Device`](rendering::Device).

pub mod core;
pub mod library;
pub mod rendering;

pub use core::{
    FileAccess, OCContext, OCUsage, PDFDocument, PDFError, PDFObject, PDFResult, Page,
    PageGeometry, XRef,
};
pub use library::{EngineConfig, destroy_library, init_library};
pub use rendering::{
    Bitmap, Device, Matrix, ProgressiveRenderer, RenderContext, RenderOptions, RenderProgress,
    SkiaDevice,
};

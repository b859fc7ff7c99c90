//! Error type of the bridge.

use pdf_x_core::core::PDFError;
use std::io;
use thiserror::Error;

/// Errors reported by bridge operations.
///
/// Every variant maps to one managed-runtime exception kind, see
/// [`crate::bridge::ErrorKind::of`].
#[derive(Debug, Error)]
pub enum RendererError {
    /// The engine rejected the byte source; `code` is its last error code
    #[error("cannot create document. Error: {code}")]
    DocumentLoad { code: u32 },

    #[error("cannot load page")]
    PageLoad,

    #[error("cannot get page size")]
    PageSize,

    /// The target buffer could not be locked, wrapped or attached
    #[error("cannot render into target: {0}")]
    RenderTarget(String),

    /// A handle that was never issued, or whose object was already closed
    #[error("stale or invalid handle")]
    StaleHandle,

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("engine error: {0}")]
    Engine(#[from] PDFError),
}

pub type Result<T> = std::result::Result<T, RendererError>;

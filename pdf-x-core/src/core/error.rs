use std::cell::Cell;
use thiserror::Error;

/// Universal error type for engine operations.
///
/// Covers every failure that can occur while reading the byte source,
/// parsing the file structure, loading pages and rasterizing content.
#[derive(Debug, Clone, Error)]
pub enum PDFError {
    /// End of stream reached unexpectedly
    #[error("Unexpected end of stream")]
    UnexpectedEndOfStream,

    /// Invalid byte range requested
    #[error("Invalid byte range: {begin}..{end}")]
    InvalidByteRange { begin: usize, end: usize },

    /// Data not yet loaded for a chunk
    #[error("Data not loaded for chunk {chunk}")]
    DataNotLoaded { chunk: usize },

    /// Invalid stream position
    #[error("Invalid position {pos} for stream of length {length}")]
    InvalidPosition { pos: usize, length: usize },

    /// Stream operation failed
    #[error("Stream error: {0}")]
    StreamError(String),

    /// The file access adapter could not supply the requested block
    #[error("Read failed: {0}")]
    Io(String),

    /// The file is not a well-formed PDF
    #[error("Format error: {0}")]
    Format(String),

    /// The document is encrypted and no usable password was supplied
    #[error("Password required: {0}")]
    Password(String),

    /// Page index outside the page tree
    #[error("Page {index} not found")]
    PageNotFound { index: usize },

    /// The engine is used before `init_library`
    #[error("Engine library not initialized")]
    NotInitialized,

    /// Malformed operator or operand in a content stream
    #[error("Content stream error: {0}")]
    ContentStream(String),

    /// Rasterization failed
    #[error("Rendering error: {0}")]
    Rendering(String),

    /// Feature present in the file but not handled by the engine
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

impl PDFError {
    /// Creates a content stream error for an operator with bad operands.
    pub fn content_stream_error(operator: &str, detail: impl Into<String>) -> Self {
        PDFError::ContentStream(format!("{}: {}", operator, detail.into()))
    }

    /// Classifies the error into the engine's numeric error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            PDFError::Io(_) | PDFError::DataNotLoaded { .. } => ErrorCode::File,
            PDFError::Password(_) => ErrorCode::Password,
            PDFError::PageNotFound { .. } => ErrorCode::Page,
            PDFError::NotInitialized | PDFError::Generic(_) => ErrorCode::Unknown,
            PDFError::UnexpectedEndOfStream
            | PDFError::InvalidByteRange { .. }
            | PDFError::InvalidPosition { .. }
            | PDFError::StreamError(_)
            | PDFError::Format(_)
            | PDFError::ContentStream(_)
            | PDFError::Unsupported(_)
            | PDFError::Rendering(_) => ErrorCode::Format,
        }
    }
}

/// Numeric error classification exposed through [`last_error`].
///
/// The values are stable and are embedded in caller-facing diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Unknown = 1,
    File = 2,
    Format = 3,
    Password = 4,
    Security = 5,
    Page = 6,
}

impl ErrorCode {
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

thread_local! {
    static LAST_ERROR: Cell<ErrorCode> = const { Cell::new(ErrorCode::Success) };
}

/// Returns the code of the last failed engine call on this thread.
pub fn last_error() -> ErrorCode {
    LAST_ERROR.with(|e| e.get())
}

pub(crate) fn set_last_error(code: ErrorCode) {
    LAST_ERROR.with(|e| e.set(code));
}

/// Records the outcome of an engine entry point in the per-thread last error.
pub(crate) fn track<T>(result: PDFResult<T>) -> PDFResult<T> {
    match &result {
        Ok(_) => set_last_error(ErrorCode::Success),
        Err(e) => set_last_error(e.code()),
    }
    result
}

/// Result type alias for PDF operations
pub type PDFResult<T> = Result<T, PDFError>;

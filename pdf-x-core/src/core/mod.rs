pub mod base_stream;
pub mod chunk_manager;
pub mod chunked_stream;
pub mod content_stream;
pub mod decode;
pub mod document;
pub mod error;
pub mod file_access;
pub mod lexer;
pub mod optional_content;
pub mod page;
pub mod parser;
pub mod stream;
pub mod writer;
pub mod xref;

pub use base_stream::BaseStream;
pub use chunk_manager::ChunkManager;
pub use chunked_stream::ChunkedStream;
pub use content_stream::{OpCode, Operation};
pub use document::PDFDocument;
pub use error::{ErrorCode, PDFError, PDFResult, last_error};
pub use file_access::{FileAccess, MemoryAccess};
pub use lexer::{Lexer, Token};
pub use optional_content::{OCContext, OCUsage};
pub use page::{Page, PageGeometry};
pub use parser::{Dict, DictExt, PDFObject, PDFStream, Parser, Ref};
pub use stream::Stream;
pub use writer::PDFWriter;
pub use xref::{XRef, XRefEntry};

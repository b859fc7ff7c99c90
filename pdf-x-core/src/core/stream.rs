use super::base_stream::BaseStream;
use super::error::{PDFError, PDFResult};
use std::sync::Arc;

/// A simple in-memory stream.
///
/// Used for decoded stream data (content streams, object streams, xref
/// streams) and for tests. The bytes are shared through an `Arc` so sub-streams
/// never copy.
#[derive(Clone)]
pub struct Stream {
    bytes: Arc<[u8]>,
    pos: usize,
    start: usize,
    length: usize,
}

impl Stream {
    /// Creates a stream over the whole buffer.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        let length = bytes.len();
        Stream {
            bytes,
            pos: 0,
            start: 0,
            length,
        }
    }

    /// Creates a window over `start..start + length` of a shared buffer.
    pub fn sub_stream(bytes: Arc<[u8]>, start: usize, length: usize) -> PDFResult<Self> {
        if start + length > bytes.len() {
            return Err(PDFError::InvalidByteRange {
                begin: start,
                end: start + length,
            });
        }
        Ok(Stream {
            bytes,
            pos: 0,
            start,
            length,
        })
    }

    /// Returns the visible bytes of the stream.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[self.start..self.start + self.length]
    }
}

impl BaseStream for Stream {
    fn length(&self) -> usize {
        self.length
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn set_pos(&mut self, pos: usize) -> PDFResult<()> {
        if pos > self.length {
            return Err(PDFError::InvalidPosition {
                pos,
                length: self.length,
            });
        }
        self.pos = pos;
        Ok(())
    }

    fn get_byte(&mut self) -> PDFResult<u8> {
        if self.pos >= self.length {
            return Err(PDFError::UnexpectedEndOfStream);
        }
        let byte = self.bytes[self.start + self.pos];
        self.pos += 1;
        Ok(byte)
    }

    fn peek_byte(&mut self) -> PDFResult<u8> {
        if self.pos >= self.length {
            return Err(PDFError::UnexpectedEndOfStream);
        }
        Ok(self.bytes[self.start + self.pos])
    }

    fn get_byte_range(&mut self, begin: usize, end: usize) -> PDFResult<Vec<u8>> {
        let end = end.min(self.length);
        if begin > end {
            return Err(PDFError::InvalidByteRange { begin, end });
        }
        Ok(self.bytes[self.start + begin..self.start + end].to_vec())
    }
}

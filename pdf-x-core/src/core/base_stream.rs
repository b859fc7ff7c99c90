use super::error::PDFResult;

/// Base trait for all PDF stream types.
///
/// Provides a uniform cursor-style interface over the byte source, whether the
/// bytes live in memory or are pulled block by block from a [`FileAccess`]
/// adapter. The lexer and parser only ever talk to this trait.
///
/// [`FileAccess`]: super::file_access::FileAccess
pub trait BaseStream {
    // ============================================================================
    // Required methods
    // ============================================================================

    /// Returns the total length of the stream in bytes.
    fn length(&self) -> usize;

    /// Returns the current position in the stream.
    fn pos(&self) -> usize;

    /// Sets the current position in the stream.
    fn set_pos(&mut self, pos: usize) -> PDFResult<()>;

    /// Reads and returns a single byte from the stream, advancing the position.
    ///
    /// Returns [`PDFError::UnexpectedEndOfStream`] at the end of the data.
    ///
    /// [`PDFError::UnexpectedEndOfStream`]: super::error::PDFError::UnexpectedEndOfStream
    fn get_byte(&mut self) -> PDFResult<u8>;

    /// Returns the bytes in `begin..end` without changing the current position.
    ///
    /// The range is clamped to the stream length.
    fn get_byte_range(&mut self, begin: usize, end: usize) -> PDFResult<Vec<u8>>;

    // ============================================================================
    // Provided methods
    // ============================================================================

    /// Returns true if the stream contains no data.
    fn is_empty(&self) -> bool {
        self.length() == 0
    }

    /// Reads a single byte without advancing the position.
    fn peek_byte(&mut self) -> PDFResult<u8> {
        let current_pos = self.pos();
        let byte = self.get_byte()?;
        self.set_pos(current_pos)?;
        Ok(byte)
    }

    /// Reads up to `length` bytes, advancing the position past them.
    fn get_bytes(&mut self, length: usize) -> PDFResult<Vec<u8>> {
        let begin = self.pos();
        let end = begin.saturating_add(length).min(self.length());
        let bytes = self.get_byte_range(begin, end)?;
        self.set_pos(end)?;
        Ok(bytes)
    }

    /// Skips `n` bytes.
    fn skip(&mut self, n: usize) -> PDFResult<()> {
        let target = (self.pos() + n).min(self.length());
        self.set_pos(target)
    }
}

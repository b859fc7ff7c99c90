use super::base_stream::BaseStream;
use super::chunk_manager::ChunkManager;
use super::error::{PDFError, PDFResult};
use super::file_access::FileAccess;

/// A stream that reads the document on demand through a [`FileAccess`].
///
/// Reads are served from a [`ChunkManager`]; a missing chunk is fetched with a
/// single `get_block` call covering the whole chunk. A failed block read is
/// reported as [`PDFError::Io`].
pub struct ChunkedStream {
    access: Box<dyn FileAccess>,
    manager: ChunkManager,
    pos: usize,
}

impl ChunkedStream {
    pub fn new(
        access: Box<dyn FileAccess>,
        chunk_size: Option<usize>,
        max_cached_chunks: Option<usize>,
    ) -> Self {
        let length = access.file_len();
        ChunkedStream {
            access,
            manager: ChunkManager::new(length, chunk_size, max_cached_chunks),
            pos: 0,
        }
    }

    /// Number of distinct chunks requested from the byte source so far.
    pub fn num_chunks_loaded(&self) -> usize {
        self.manager.num_chunks_loaded()
    }

    fn ensure_chunk(&mut self, chunk_num: usize) -> PDFResult<()> {
        if self.manager.is_cached(chunk_num) {
            return Ok(());
        }
        let (begin, end) = self.manager.chunk_range(chunk_num);
        let mut data = vec![0u8; end - begin];
        if !self.access.get_block(begin, &mut data) {
            return Err(PDFError::Io(format!(
                "cannot read {} bytes at offset {}",
                end - begin,
                begin
            )));
        }
        self.manager.on_receive_data(chunk_num, data)
    }

    fn byte_at(&mut self, pos: usize) -> PDFResult<u8> {
        let chunk_num = self.manager.get_chunk_number(pos);
        self.ensure_chunk(chunk_num)?;
        let offset = pos - chunk_num * self.manager.chunk_size();
        self.manager
            .get_chunk(chunk_num)
            .and_then(|chunk| chunk.get(offset).copied())
            .ok_or(PDFError::UnexpectedEndOfStream)
    }
}

impl BaseStream for ChunkedStream {
    fn length(&self) -> usize {
        self.manager.length()
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn set_pos(&mut self, pos: usize) -> PDFResult<()> {
        if pos > self.length() {
            return Err(PDFError::InvalidPosition {
                pos,
                length: self.length(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    fn get_byte(&mut self) -> PDFResult<u8> {
        if self.pos >= self.length() {
            return Err(PDFError::UnexpectedEndOfStream);
        }
        let byte = self.byte_at(self.pos)?;
        self.pos += 1;
        Ok(byte)
    }

    fn peek_byte(&mut self) -> PDFResult<u8> {
        if self.pos >= self.length() {
            return Err(PDFError::UnexpectedEndOfStream);
        }
        self.byte_at(self.pos)
    }

    fn get_byte_range(&mut self, begin: usize, end: usize) -> PDFResult<Vec<u8>> {
        let end = end.min(self.length());
        if begin > end {
            return Err(PDFError::InvalidByteRange { begin, end });
        }

        let mut out = Vec::with_capacity(end - begin);
        let mut pos = begin;
        while pos < end {
            let chunk_num = self.manager.get_chunk_number(pos);
            self.ensure_chunk(chunk_num)?;
            let chunk_start = chunk_num * self.manager.chunk_size();
            let chunk = self
                .manager
                .get_chunk(chunk_num)
                .ok_or(PDFError::DataNotLoaded { chunk: chunk_num })?;
            let from = pos - chunk_start;
            let to = (end - chunk_start).min(chunk.len());
            out.extend_from_slice(&chunk[from..to]);
            pos = chunk_start + to;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::file_access::MemoryAccess;

    struct FailingAccess {
        len: usize,
    }

    impl FileAccess for FailingAccess {
        fn file_len(&self) -> usize {
            self.len
        }

        fn get_block(&mut self, _position: usize, _buf: &mut [u8]) -> bool {
            false
        }
    }

    fn numbered(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_reads_across_chunk_boundaries() {
        let data = numbered(1000);
        let mut stream =
            ChunkedStream::new(Box::new(MemoryAccess::new(data.clone())), Some(64), Some(2));

        assert_eq!(stream.length(), 1000);
        assert_eq!(stream.get_byte_range(60, 200).unwrap(), data[60..200].to_vec());

        stream.set_pos(999).unwrap();
        assert_eq!(stream.get_byte().unwrap(), data[999]);
        assert!(matches!(
            stream.get_byte(),
            Err(PDFError::UnexpectedEndOfStream)
        ));
        assert!(stream.num_chunks_loaded() >= 3);
    }

    #[test]
    fn test_evicted_chunks_are_reloaded() {
        let data = numbered(640);
        let mut stream =
            ChunkedStream::new(Box::new(MemoryAccess::new(data.clone())), Some(64), Some(1));
        for pos in [0usize, 300, 10, 639, 5] {
            stream.set_pos(pos).unwrap();
            assert_eq!(stream.get_byte().unwrap(), data[pos]);
        }
    }

    #[test]
    fn test_failed_block_read_is_io_error() {
        let mut stream = ChunkedStream::new(Box::new(FailingAccess { len: 100 }), None, None);
        let err = stream.get_byte().unwrap_err();
        assert!(matches!(err, PDFError::Io(_)));
    }
}

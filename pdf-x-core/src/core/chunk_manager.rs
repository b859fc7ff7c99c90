use super::error::{PDFError, PDFResult};
use lru::LruCache;
use rustc_hash::FxHashSet;
use std::num::NonZeroUsize;

/// Default chunk size: 64KB
pub const DEFAULT_CHUNK_SIZE: usize = 65536;

/// Default maximum number of chunks to keep in memory cache
pub const DEFAULT_MAX_CACHED_CHUNKS: usize = 10;

/// Manages chunk data storage and tracks which chunks have been loaded.
///
/// Chunks are kept in an LRU cache bounded by `max_cached_chunks`; evicted
/// chunks are simply requested again from the byte source when needed.
/// The manager does not perform I/O itself, the owning stream feeds it.
pub struct ChunkManager {
    /// Total length of the data in bytes
    total_length: usize,
    /// Size of each chunk in bytes
    chunk_size: usize,
    /// Total number of chunks
    num_chunks: usize,

    /// Cache of loaded chunks (chunk_number -> data)
    chunk_cache: LruCache<usize, Vec<u8>>,

    /// Set of all chunks that have been loaded at some point
    loaded_chunks: FxHashSet<usize>,
}

impl ChunkManager {
    /// Creates a new ChunkManager.
    ///
    /// # Arguments
    /// * `total_length` - Total length of the data
    /// * `chunk_size` - Size of each chunk (default: 64KB)
    /// * `max_cached_chunks` - Maximum chunks to keep in memory (default: 10)
    pub fn new(
        total_length: usize,
        chunk_size: Option<usize>,
        max_cached_chunks: Option<usize>,
    ) -> Self {
        let chunk_size = chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE).max(1);
        let capacity = NonZeroUsize::new(max_cached_chunks.unwrap_or(DEFAULT_MAX_CACHED_CHUNKS))
            .unwrap_or(NonZeroUsize::MIN);
        let num_chunks = total_length.div_ceil(chunk_size);

        ChunkManager {
            total_length,
            chunk_size,
            num_chunks,
            chunk_cache: LruCache::new(capacity),
            loaded_chunks: FxHashSet::default(),
        }
    }

    /// Returns the total length of the data.
    pub fn length(&self) -> usize {
        self.total_length
    }

    /// Returns the chunk size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns the total number of chunks.
    pub fn num_chunks(&self) -> usize {
        self.num_chunks
    }

    /// Gets the chunk number for a given byte position.
    pub fn get_chunk_number(&self, pos: usize) -> usize {
        pos / self.chunk_size
    }

    /// Returns the byte range `(begin, end)` covered by a chunk.
    pub fn chunk_range(&self, chunk_num: usize) -> (usize, usize) {
        let begin = chunk_num * self.chunk_size;
        let end = (begin + self.chunk_size).min(self.total_length);
        (begin, end)
    }

    /// Stores the data of a freshly read chunk.
    pub fn on_receive_data(&mut self, chunk_num: usize, chunk: Vec<u8>) -> PDFResult<()> {
        if chunk_num >= self.num_chunks {
            return Err(PDFError::InvalidByteRange {
                begin: chunk_num * self.chunk_size,
                end: (chunk_num + 1) * self.chunk_size,
            });
        }

        let (begin, end) = self.chunk_range(chunk_num);
        if chunk.len() != end - begin {
            return Err(PDFError::StreamError(format!(
                "chunk {} has {} bytes, expected {}",
                chunk_num,
                chunk.len(),
                end - begin
            )));
        }

        self.loaded_chunks.insert(chunk_num);
        self.chunk_cache.put(chunk_num, chunk);
        Ok(())
    }

    /// Checks if a specific chunk is currently cached.
    pub fn is_cached(&self, chunk_num: usize) -> bool {
        self.chunk_cache.contains(&chunk_num)
    }

    /// Checks if a specific chunk has been loaded at least once.
    pub fn has_chunk(&self, chunk_num: usize) -> bool {
        self.loaded_chunks.contains(&chunk_num)
    }

    /// Returns the cached data for a chunk, marking it most recently used.
    pub fn get_chunk(&mut self, chunk_num: usize) -> Option<&[u8]> {
        self.chunk_cache.get(&chunk_num).map(Vec::as_slice)
    }

    /// Returns the number of chunks loaded so far (ever loaded, not just cached).
    pub fn num_chunks_loaded(&self) -> usize {
        self.loaded_chunks.len()
    }

    /// Returns the number of chunks currently held in memory.
    pub fn num_chunks_cached(&self) -> usize {
        self.chunk_cache.len()
    }
}

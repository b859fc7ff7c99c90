//! Random-access byte provider contract.
//!
//! The engine never opens files itself. Callers hand it a [`FileAccess`]
//! implementation and the engine pulls fixed-size blocks on demand.

/// Block reader used by the engine to load a document.
///
/// `get_block` fills `buf` entirely from `position` and reports success. A
/// `false` return means no bytes are available for that block; the engine
/// treats it as a read failure of the document, not as a panic.
pub trait FileAccess: Send {
    /// Total length of the file in bytes.
    fn file_len(&self) -> usize;

    /// Reads `buf.len()` bytes starting at `position`.
    fn get_block(&mut self, position: usize, buf: &mut [u8]) -> bool;
}

/// A [`FileAccess`] over bytes already in memory.
pub struct MemoryAccess {
    data: Vec<u8>,
}

impl MemoryAccess {
    pub fn new(data: Vec<u8>) -> Self {
        MemoryAccess { data }
    }
}

impl FileAccess for MemoryAccess {
    fn file_len(&self) -> usize {
        self.data.len()
    }

    fn get_block(&mut self, position: usize, buf: &mut [u8]) -> bool {
        let Some(end) = position.checked_add(buf.len()) else {
            return false;
        };
        match self.data.get(position..end) {
            Some(src) => {
                buf.copy_from_slice(src);
                true
            }
            None => false,
        }
    }
}

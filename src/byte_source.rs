//! Seekable byte sources documents are opened from.
//!
//! The engine pulls blocks through its `FileAccess` contract;
//! [`SourceAccess`] adapts any [`ByteSource`] to it.

use pdf_x_core::core::FileAccess;
use std::fs::File;
use std::io;
use std::path::Path;

/// Random-access bytes owned by the caller.
pub trait ByteSource: Send {
    /// Total length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads up to `buf.len()` bytes at `offset`. Returns the number of bytes
    /// read; 0 means end of data.
    fn read_block(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;
}

/// A byte source over a descriptor borrowed from the caller.
///
/// The descriptor is duplicated on construction; the caller's descriptor is
/// never closed or moved.
#[cfg(unix)]
pub struct FdSource {
    file: File,
    len: u64,
}

#[cfg(unix)]
impl FdSource {
    /// `len` is the size the caller reported for the descriptor.
    pub fn new(fd: std::os::fd::BorrowedFd<'_>, len: u64) -> io::Result<Self> {
        let file = File::from(fd.try_clone_to_owned()?);
        Ok(FdSource { file, len })
    }
}

#[cfg(unix)]
impl ByteSource for FdSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_block(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        use std::os::unix::fs::FileExt;

        // Positional reads leave the shared file offset alone
        self.file.read_at(buf, offset)
    }
}

/// A byte source over a file opened by path.
pub struct FileSource {
    file: File,
    len: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(FileSource { file, len })
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_block(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        use std::io::{Read, Seek, SeekFrom};

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read(buf)
    }
}

/// A byte source over bytes in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        MemorySource { data: data.into() }
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_block(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        let Some(src) = self.data.get(start..) else {
            return Ok(0);
        };
        let n = src.len().min(buf.len());
        buf[..n].copy_from_slice(&src[..n]);
        Ok(n)
    }
}

/// Adapts a [`ByteSource`] to the engine's block reader.
///
/// Read failures and short reads are logged and reported to the engine as
/// "no bytes available"; they surface only through the engine's load error.
pub struct SourceAccess<S> {
    source: S,
}

impl<S: ByteSource> SourceAccess<S> {
    pub fn new(source: S) -> Self {
        SourceAccess { source }
    }
}

impl<S: ByteSource> FileAccess for SourceAccess<S> {
    fn file_len(&self) -> usize {
        usize::try_from(self.source.len()).unwrap_or(usize::MAX)
    }

    fn get_block(&mut self, position: usize, buf: &mut [u8]) -> bool {
        let mut filled = 0;
        while filled < buf.len() {
            let offset = (position + filled) as u64;
            match self.source.read_block(offset, &mut buf[filled..]) {
                Ok(0) => {
                    log::error!(
                        "short read at {}: wanted {} bytes, got {}",
                        position,
                        buf.len(),
                        filled
                    );
                    return false;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::error!("read of {} bytes at {} failed: {}", buf.len(), position, e);
                    return false;
                }
            }
        }
        true
    }
}

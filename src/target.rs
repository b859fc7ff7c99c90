//! Pixel buffers pages are rendered into.

use crate::error::{RendererError, Result};
use tiny_skia::{IntSize, Pixmap};

/// Pixel layouts a caller's buffer can have. Only [`PixelFormat::Argb8888`]
/// can be rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 4 bytes per pixel, R, G, B, A in memory, premultiplied alpha
    Argb8888,
    Rgb565,
    Alpha8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Argb8888 => 4,
            PixelFormat::Rgb565 => 2,
            PixelFormat::Alpha8 => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    pub width: u32,
    pub height: u32,
    /// Bytes per row
    pub stride: usize,
    pub format: PixelFormat,
}

/// A caller-owned pixel buffer.
///
/// Rendering locks the pixels, writes them, then notifies and unlocks, in
/// that order.
pub trait PixelBuffer {
    fn info(&self) -> BufferInfo;

    /// Exposes the pixel memory; `None` if it cannot be locked right now.
    fn lock_pixels(&mut self) -> Option<&mut [u8]>;

    fn unlock_pixels(&mut self) {}

    /// Called after the pixels were written.
    fn notify_pixels_changed(&mut self) {}
}

/// An owned pixel buffer.
#[derive(Debug, Clone)]
pub struct RenderTarget {
    info: BufferInfo,
    data: Vec<u8>,
    locked: bool,
    generation: u64,
}

impl RenderTarget {
    /// A transparent ARGB_8888 buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_format(width, height, PixelFormat::Argb8888)
    }

    pub fn with_format(width: u32, height: u32, format: PixelFormat) -> Self {
        let stride = width as usize * format.bytes_per_pixel();
        RenderTarget {
            info: BufferInfo {
                width,
                height,
                stride,
                format,
            },
            data: vec![0; stride * height as usize],
            locked: false,
            generation: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.info.width
    }

    pub fn height(&self) -> u32 {
        self.info.height
    }

    pub fn format(&self) -> PixelFormat {
        self.info.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// How many times the pixels were reported changed.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Sets every pixel of an ARGB_8888 buffer to an opaque color.
    pub fn fill(&mut self, rgb: [u8; 3]) {
        if self.info.format != PixelFormat::Argb8888 {
            return;
        }
        let [r, g, b] = rgb;
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&[r, g, b, 255]);
        }
    }

    /// The R, G, B, A bytes at `(x, y)` of an ARGB_8888 buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if self.info.format != PixelFormat::Argb8888 || x >= self.info.width || y >= self.info.height
        {
            return None;
        }
        let offset = y as usize * self.info.stride + x as usize * 4;
        let px = self.data.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Encodes the buffer as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        if self.info.format != PixelFormat::Argb8888 {
            return Err(RendererError::InvalidState(format!(
                "cannot encode {:?} pixels",
                self.info.format
            )));
        }
        let size = IntSize::from_wh(self.info.width, self.info.height)
            .ok_or_else(|| RendererError::RenderTarget("empty target".into()))?;
        let pixmap = Pixmap::from_vec(self.data.clone(), size)
            .ok_or_else(|| RendererError::RenderTarget("malformed pixel data".into()))?;
        pixmap
            .encode_png()
            .map_err(|e| RendererError::RenderTarget(e.to_string()))
    }
}

impl PixelBuffer for RenderTarget {
    fn info(&self) -> BufferInfo {
        self.info
    }

    fn lock_pixels(&mut self) -> Option<&mut [u8]> {
        if self.locked || self.data.is_empty() {
            return None;
        }
        self.locked = true;
        Some(&mut self.data)
    }

    fn unlock_pixels(&mut self) {
        self.locked = false;
    }

    fn notify_pixels_changed(&mut self) {
        self.generation += 1;
    }
}

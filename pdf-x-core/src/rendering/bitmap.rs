//! Pixel buffers the renderer draws into.

use crate::core::error::{PDFError, PDFResult};

/// Pixel layout of a [`Bitmap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmapFormat {
    /// 4 bytes per pixel, B, G, R, A in memory, premultiplied alpha
    Bgra,
}

impl BitmapFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            BitmapFormat::Bgra => 4,
        }
    }
}

enum Buffer<'a> {
    Owned(Vec<u8>),
    External(&'a mut [u8]),
}

/// A bitmap over an owned or caller-provided buffer.
pub struct Bitmap<'a> {
    width: u32,
    height: u32,
    stride: usize,
    format: BitmapFormat,
    buffer: Buffer<'a>,
}

impl Bitmap<'static> {
    /// Allocates a zeroed (transparent) bitmap.
    pub fn new(width: u32, height: u32) -> PDFResult<Self> {
        let stride = width as usize * BitmapFormat::Bgra.bytes_per_pixel();
        let len = stride
            .checked_mul(height as usize)
            .ok_or_else(|| PDFError::Rendering(format!("bitmap {}x{} too large", width, height)))?;
        Ok(Bitmap {
            width,
            height,
            stride,
            format: BitmapFormat::Bgra,
            buffer: Buffer::Owned(vec![0; len]),
        })
    }
}

impl<'a> Bitmap<'a> {
    /// Wraps an external buffer of at least `stride * height` bytes.
    pub fn from_external(
        width: u32,
        height: u32,
        stride: usize,
        data: &'a mut [u8],
    ) -> PDFResult<Self> {
        let format = BitmapFormat::Bgra;
        if width == 0 || height == 0 {
            return Err(PDFError::Rendering("empty bitmap".into()));
        }
        if stride < width as usize * format.bytes_per_pixel() {
            return Err(PDFError::Rendering(format!(
                "stride {} too small for width {}",
                stride, width
            )));
        }
        let needed = stride * (height as usize - 1) + width as usize * format.bytes_per_pixel();
        if data.len() < needed {
            return Err(PDFError::Rendering(format!(
                "buffer of {} bytes too small, need {}",
                data.len(),
                needed
            )));
        }
        Ok(Bitmap {
            width,
            height,
            stride,
            format,
            buffer: Buffer::External(data),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> BitmapFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        match &self.buffer {
            Buffer::Owned(v) => v,
            Buffer::External(s) => s,
        }
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        match &mut self.buffer {
            Buffer::Owned(v) => v,
            Buffer::External(s) => s,
        }
    }

    /// Fills a rectangle with `0xAARRGGBB`, clipped to the bitmap.
    pub fn fill_rect(&mut self, left: i32, top: i32, width: i32, height: i32, argb: u32) {
        let x0 = left.clamp(0, self.width as i32) as usize;
        let y0 = top.clamp(0, self.height as i32) as usize;
        let x1 = left.saturating_add(width).clamp(0, self.width as i32) as usize;
        let y1 = top.saturating_add(height).clamp(0, self.height as i32) as usize;

        let [a, r, g, b] = argb.to_be_bytes();
        let premul = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
        let pixel = [premul(b), premul(g), premul(r), a];

        let stride = self.stride;
        let data = self.data_mut();
        for y in y0..y1 {
            let row = &mut data[y * stride..];
            for x in x0..x1 {
                row[x * 4..x * 4 + 4].copy_from_slice(&pixel);
            }
        }
    }

    /// The B, G, R, A bytes of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = y as usize * self.stride + x as usize * 4;
        let p = self.data().get(i..i + 4)?;
        Some([p[0], p[1], p[2], p[3]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_rect_is_clipped() {
        let mut bitmap = Bitmap::new(4, 4).unwrap();
        bitmap.fill_rect(-2, 2, 4, 10, 0xFF102030);
        assert_eq!(bitmap.pixel(0, 3), Some([0x30, 0x20, 0x10, 0xFF]));
        assert_eq!(bitmap.pixel(1, 2), Some([0x30, 0x20, 0x10, 0xFF]));
        assert_eq!(bitmap.pixel(2, 2), Some([0, 0, 0, 0]));
        assert_eq!(bitmap.pixel(0, 1), Some([0, 0, 0, 0]));
        assert_eq!(bitmap.pixel(4, 0), None);
    }

    #[test]
    fn test_external_buffer_checks() {
        let mut small = vec![0u8; 10];
        assert!(Bitmap::from_external(2, 2, 8, &mut small).is_err());
        let mut buf = vec![0u8; 16];
        let mut bitmap = Bitmap::from_external(2, 2, 8, &mut buf).unwrap();
        bitmap.fill_rect(0, 0, 2, 2, 0xFFFFFFFF);
        drop(bitmap);
        assert!(buf.iter().all(|b| *b == 0xFF));
    }
}

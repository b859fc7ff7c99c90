//! Image XObject and inline image decoding.
//!
//! Produces straight RGBA for the device. Supported sample layouts are 1, 2,
//! 4, 8 and 16 bits per component in the device, ICC-based, indexed and tint
//! spaces, stencil masks painted with the fill color, soft masks, stencil and
//! color-key masks, and DCT (JPEG) data when the `jpeg-decoding` feature is on.

use super::color_space::resolve_color_space;
use super::device::{ImageData, Paint};
use super::graphics_state::ColorSpace;
use crate::core::decode::Filter;
use crate::core::error::{PDFError, PDFResult};
use crate::core::parser::{Dict, DictExt, PDFObject, PDFStream};
use crate::core::xref::XRef;

/// Images with more pixels than this are rejected.
const MAX_PIXELS: usize = 1 << 26;

/// Decodes an image stream. `fill` paints stencil masks.
pub fn decode_image(
    xref: &mut XRef,
    stream: &PDFStream,
    resources: &Dict,
    fill: &Paint,
) -> PDFResult<ImageData> {
    let dict = &stream.dict;
    let width = dimension(dict, "Width", "W")?;
    let height = dimension(dict, "Height", "H")?;
    let pixels = width as usize * height as usize;
    if pixels > MAX_PIXELS {
        return Err(PDFError::Unsupported(format!(
            "image of {}x{} pixels",
            width, height
        )));
    }

    let is_stencil = dict
        .get("ImageMask")
        .or_else(|| dict.get("IM"))
        .and_then(PDFObject::as_boolean)
        .unwrap_or(false);
    let decode = dict
        .get("Decode")
        .or_else(|| dict.get("D"))
        .and_then(PDFObject::as_number_array);

    let decoded = xref.decode_stream(stream)?;
    let mut rgba = match decoded.image_codec {
        None if is_stencil => stencil_to_rgba(&decoded.data, width, height, decode.as_deref(), fill),
        None => {
            let bpc = dict
                .get_number("BitsPerComponent")
                .or_else(|| dict.get_number("BPC"))
                .unwrap_or(8.0) as u32;
            let space_obj = dict
                .get("ColorSpace")
                .or_else(|| dict.get("CS"))
                .cloned()
                .unwrap_or(PDFObject::Name("DeviceGray".into()));
            let space = resolve_color_space(xref, &space_obj, resources)?;
            let layout = SampleLayout::new(width, height, space.components(), bpc)?;
            let mut rgba = samples_to_rgba(&decoded.data, &layout, &space, decode.as_deref());
            if let Some(ranges) = dict.get("Mask").and_then(PDFObject::as_number_array) {
                apply_color_key(&mut rgba, &decoded.data, &layout, &ranges);
            }
            rgba
        }
        Some((Filter::Dct, _)) => decode_jpeg(&decoded.data, width, height)?,
        Some((codec, _)) => {
            return Err(PDFError::Unsupported(format!("{:?} image data", codec)));
        }
    };

    if !is_stencil {
        apply_mask_streams(xref, dict, resources, &mut rgba, width, height)?;
    }

    Ok(ImageData {
        width,
        height,
        rgba,
    })
}

fn dimension(dict: &Dict, key: &str, short: &str) -> PDFResult<u32> {
    dict.get_number(key)
        .or_else(|| dict.get_number(short))
        .filter(|v| *v >= 1.0)
        .map(|v| v as u32)
        .ok_or_else(|| PDFError::Format(format!("image without a valid /{}", key)))
}

/// Bit layout of raw image samples.
struct SampleLayout {
    width: usize,
    height: usize,
    components: usize,
    bpc: u32,
    row_bytes: usize,
}

impl SampleLayout {
    fn new(width: u32, height: u32, components: usize, bpc: u32) -> PDFResult<Self> {
        if !matches!(bpc, 1 | 2 | 4 | 8 | 16) {
            return Err(PDFError::Format(format!("{} bits per component", bpc)));
        }
        let bits = width as usize * components * bpc as usize;
        Ok(SampleLayout {
            width: width as usize,
            height: height as usize,
            components,
            bpc,
            row_bytes: bits.div_ceil(8),
        })
    }

    fn max_value(&self) -> f64 {
        ((1u32 << self.bpc) - 1) as f64
    }

    /// Raw value of component `c` of pixel `x` in row `y`; missing data reads
    /// as 0.
    fn sample(&self, data: &[u8], x: usize, y: usize, c: usize) -> u32 {
        let row = y * self.row_bytes;
        let index = x * self.components + c;
        let byte_at = |i: usize| data.get(row + i).copied().unwrap_or(0) as u32;
        match self.bpc {
            8 => byte_at(index),
            16 => (byte_at(index * 2) << 8) | byte_at(index * 2 + 1),
            bpc => {
                let bit = index * bpc as usize;
                let shift = 8 - bpc as usize - bit % 8;
                (byte_at(bit / 8) >> shift) & ((1 << bpc) - 1)
            }
        }
    }
}

fn samples_to_rgba(
    data: &[u8],
    layout: &SampleLayout,
    space: &ColorSpace,
    decode: Option<&[f64]>,
) -> Vec<u8> {
    let needed = layout.row_bytes * layout.height;
    if data.len() < needed {
        log::warn!("image data truncated: {} of {} bytes", data.len(), needed);
    }

    let mut rgba = Vec::with_capacity(layout.width * layout.height * 4);

    // Plain 8-bit device samples skip the per-pixel color conversion
    if layout.bpc == 8 && decode.is_none() && data.len() >= needed {
        match space {
            ColorSpace::DeviceRGB => {
                for row in data.chunks_exact(layout.row_bytes).take(layout.height) {
                    for px in row.chunks_exact(3) {
                        rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
                    }
                }
                return rgba;
            }
            ColorSpace::DeviceGray => {
                for row in data.chunks_exact(layout.row_bytes).take(layout.height) {
                    for g in row {
                        rgba.extend_from_slice(&[*g, *g, *g, 255]);
                    }
                }
                return rgba;
            }
            _ => {}
        }
    }

    let max = layout.max_value();
    let indexed = matches!(space, ColorSpace::Indexed { .. });
    let ranges: Vec<(f64, f64)> = (0..layout.components)
        .map(|c| match decode {
            Some(d) if d.len() >= 2 * (c + 1) => (d[2 * c], d[2 * c + 1]),
            _ if indexed => (0.0, max),
            _ => (0.0, 1.0),
        })
        .collect();

    let mut values = vec![0.0; layout.components];
    for y in 0..layout.height {
        for x in 0..layout.width {
            for (c, (dmin, dmax)) in ranges.iter().enumerate() {
                let raw = layout.sample(data, x, y, c) as f64;
                values[c] = dmin + raw * (dmax - dmin) / max;
            }
            let [r, g, b] = space.color(&values).rgb8();
            rgba.extend_from_slice(&[r, g, b, 255]);
        }
    }
    rgba
}

/// A stencil mask: sample 0 paints unless `/Decode [1 0]` inverts it.
fn stencil_to_rgba(
    data: &[u8],
    width: u32,
    height: u32,
    decode: Option<&[f64]>,
    fill: &Paint,
) -> Vec<u8> {
    let layout = SampleLayout {
        width: width as usize,
        height: height as usize,
        components: 1,
        bpc: 1,
        row_bytes: (width as usize).div_ceil(8),
    };
    let paint_value = match decode {
        Some([first, ..]) if *first >= 0.5 => 1,
        _ => 0,
    };
    let [r, g, b] = fill.color.rgb8();
    let mut rgba = Vec::with_capacity(layout.width * layout.height * 4);
    for y in 0..layout.height {
        for x in 0..layout.width {
            let painted = layout.sample(data, x, y, 0) == paint_value;
            rgba.extend_from_slice(&[r, g, b, if painted { 255 } else { 0 }]);
        }
    }
    rgba
}

/// `/Mask [min0 max0 ...]`: pixels whose raw samples all fall in range are
/// transparent.
fn apply_color_key(rgba: &mut [u8], data: &[u8], layout: &SampleLayout, ranges: &[f64]) {
    if ranges.len() < layout.components * 2 {
        return;
    }
    for y in 0..layout.height {
        for x in 0..layout.width {
            let masked = (0..layout.components).all(|c| {
                let v = layout.sample(data, x, y, c) as f64;
                v >= ranges[2 * c] && v <= ranges[2 * c + 1]
            });
            if masked {
                rgba[(y * layout.width + x) * 4 + 3] = 0;
            }
        }
    }
}

/// Applies `/SMask` (a grayscale alpha image) or a stencil `/Mask` stream.
fn apply_mask_streams(
    xref: &mut XRef,
    dict: &Dict,
    resources: &Dict,
    rgba: &mut [u8],
    width: u32,
    height: u32,
) -> PDFResult<()> {
    if let Some(smask) = xref.get_resolved(dict, "SMask")? {
        if let Some(stream) = smask.as_stream() {
            let mut mask_dict = stream.dict.clone();
            mask_dict.insert("ColorSpace".into(), PDFObject::Name("DeviceGray".into()));
            mask_dict.remove("SMask");
            let mask_stream = PDFStream {
                dict: mask_dict,
                data: stream.data.clone(),
            };
            let mask = decode_image(xref, &mask_stream, resources, &Paint::default())?;
            // Gray level of the mask is the alpha
            multiply_alpha(rgba, width, height, &mask, 0);
        }
        return Ok(());
    }

    if let Some(mask) = xref.get_resolved(dict, "Mask")? {
        if let Some(stream) = mask.as_stream() {
            let mask = decode_image(xref, stream, resources, &Paint::default())?;
            multiply_alpha(rgba, width, height, &mask, 3);
        }
    }
    Ok(())
}

/// Multiplies the alpha of `rgba` by channel `channel` of `mask`, sampling the
/// mask with nearest neighbour when the sizes differ.
fn multiply_alpha(rgba: &mut [u8], width: u32, height: u32, mask: &ImageData, channel: usize) {
    let (w, h) = (width as usize, height as usize);
    let (mw, mh) = (mask.width as usize, mask.height as usize);
    for y in 0..h {
        let my = y * mh / h;
        for x in 0..w {
            let mx = x * mw / w;
            let m = mask.rgba[(my * mw + mx) * 4 + channel] as u16;
            let a = &mut rgba[(y * w + x) * 4 + 3];
            *a = ((*a as u16 * m + 127) / 255) as u8;
        }
    }
}

#[cfg(feature = "jpeg-decoding")]
fn decode_jpeg(data: &[u8], width: u32, height: u32) -> PDFResult<Vec<u8>> {
    use std::io::Cursor;
    use zune_jpeg::zune_core::colorspace::ColorSpace as JpegColorSpace;
    use zune_jpeg::zune_core::options::DecoderOptions;

    let options = DecoderOptions::default()
        .set_max_width(u16::MAX as usize)
        .set_max_height(u16::MAX as usize)
        .jpeg_set_out_colorspace(JpegColorSpace::RGB);
    let mut decoder = zune_jpeg::JpegDecoder::new_with_options(Cursor::new(data), options);
    let pixels = decoder
        .decode()
        .map_err(|e| PDFError::Format(format!("JPEG decode error: {:?}", e)))?;
    let info = decoder
        .info()
        .ok_or_else(|| PDFError::Format("JPEG without image info".into()))?;
    let (jw, jh) = (info.width as usize, info.height as usize);
    if jw == 0 || jh == 0 {
        return Err(PDFError::Format("empty JPEG image".into()));
    }
    let channels = pixels.len() / (jw * jh);

    let mut source = Vec::with_capacity(jw * jh * 4);
    for px in pixels.chunks_exact(channels.max(1)) {
        match px {
            [g] => source.extend_from_slice(&[*g, *g, *g, 255]),
            [r, g, b] => source.extend_from_slice(&[*r, *g, *b, 255]),
            [r, g, b, a] => source.extend_from_slice(&[*r, *g, *b, *a]),
            _ => source.extend_from_slice(&[0, 0, 0, 255]),
        }
    }
    if (jw, jh) == (width as usize, height as usize) {
        return Ok(source);
    }

    log::warn!(
        "JPEG is {}x{} but the image dictionary says {}x{}",
        jw,
        jh,
        width,
        height
    );
    let (w, h) = (width as usize, height as usize);
    let mut rgba = Vec::with_capacity(w * h * 4);
    for y in 0..h {
        for x in 0..w {
            let i = ((y * jh / h) * jw + x * jw / w) * 4;
            rgba.extend_from_slice(&source[i..i + 4]);
        }
    }
    Ok(rgba)
}

#[cfg(not(feature = "jpeg-decoding"))]
fn decode_jpeg(_data: &[u8], _width: u32, _height: u32) -> PDFResult<Vec<u8>> {
    Err(PDFError::Unsupported(
        "JPEG decoding not enabled. Enable the 'jpeg-decoding' feature.".into(),
    ))
}

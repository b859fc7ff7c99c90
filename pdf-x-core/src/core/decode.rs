//! Stream filters.
//!
//! Decodes the general-purpose filters in a stream's `/Filter` chain. Image
//! codecs (`DCTDecode`) are not applied here: decoding stops in front of them
//! and the remaining encoded bytes are handed to the image decoder.

use super::error::{PDFError, PDFResult};
use super::parser::{Dict, DictExt};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// A stream filter, recognised by its full or abbreviated name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Flate,
    AsciiHex,
    Ascii85,
    RunLength,
    Dct,
    Lzw,
    Jpx,
    Jbig2,
    CcittFax,
}

impl Filter {
    pub fn from_name(name: &str) -> Option<Filter> {
        Some(match name {
            "FlateDecode" | "Fl" => Filter::Flate,
            "ASCIIHexDecode" | "AHx" => Filter::AsciiHex,
            "ASCII85Decode" | "A85" => Filter::Ascii85,
            "RunLengthDecode" | "RL" => Filter::RunLength,
            "DCTDecode" | "DCT" => Filter::Dct,
            "LZWDecode" | "LZW" => Filter::Lzw,
            "JPXDecode" => Filter::Jpx,
            "JBIG2Decode" => Filter::Jbig2,
            "CCITTFaxDecode" | "CCF" => Filter::CcittFax,
            _ => return None,
        })
    }

    /// Image codecs are decoded by the image pipeline, not here.
    pub fn is_image_codec(self) -> bool {
        matches!(self, Filter::Dct | Filter::Jpx | Filter::Jbig2 | Filter::CcittFax)
    }
}

/// Output of [`decode_filters`].
#[derive(Debug)]
pub struct Decoded {
    pub data: Vec<u8>,

    /// Image codec still to be applied to `data`, if the chain ended in one
    pub image_codec: Option<(Filter, Option<Dict>)>,
}

/// Applies a filter chain. Each entry carries the filter name and its
/// (already resolved) `DecodeParms` dictionary.
pub fn decode_filters(data: &[u8], chain: &[(String, Option<Dict>)]) -> PDFResult<Decoded> {
    let mut current = data.to_vec();
    for (name, params) in chain {
        let filter = Filter::from_name(name)
            .ok_or_else(|| PDFError::Unsupported(format!("filter /{}", name)))?;
        if filter.is_image_codec() {
            return Ok(Decoded {
                data: current,
                image_codec: Some((filter, params.clone())),
            });
        }
        current = match filter {
            Filter::Flate => {
                let inflated = decode_flate(&current)?;
                match params {
                    Some(params) => apply_predictor(inflated, params)?,
                    None => inflated,
                }
            }
            Filter::AsciiHex => decode_ascii_hex(&current),
            Filter::Ascii85 => decode_ascii85(&current)?,
            Filter::RunLength => decode_run_length(&current),
            _ => return Err(PDFError::Unsupported(format!("filter /{}", name))),
        };
    }
    Ok(Decoded {
        data: current,
        image_codec: None,
    })
}

/// Decodes FlateDecode data.
///
/// Tries the zlib wrapper first and falls back to raw deflate. A truncated
/// stream that still produced output is accepted with a warning, matching what
/// viewers do with damaged files.
pub fn decode_flate(compressed: &[u8]) -> PDFResult<Vec<u8>> {
    let mut out = Vec::new();
    let zlib_err = match ZlibDecoder::new(compressed).read_to_end(&mut out) {
        Ok(_) => return Ok(out),
        Err(e) => e,
    };
    if !out.is_empty() {
        log::warn!("FlateDecode: truncated stream ({}), keeping {} bytes", zlib_err, out.len());
        return Ok(out);
    }

    out.clear();
    match DeflateDecoder::new(compressed).read_to_end(&mut out) {
        Ok(_) => Ok(out),
        Err(_) if !out.is_empty() => Ok(out),
        Err(deflate_err) => Err(PDFError::Format(format!(
            "FlateDecode failed: zlib ({}), raw deflate ({}), {} input bytes",
            zlib_err,
            deflate_err,
            compressed.len()
        ))),
    }
}

/// Reverses the `/Predictor` from a `DecodeParms` dictionary.
pub fn apply_predictor(data: Vec<u8>, params: &Dict) -> PDFResult<Vec<u8>> {
    let predictor = params.get_number("Predictor").unwrap_or(1.0) as u32;
    if predictor <= 1 {
        return Ok(data);
    }
    let colors = params.get_number("Colors").unwrap_or(1.0).max(1.0) as usize;
    let bits = params.get_number("BitsPerComponent").unwrap_or(8.0).max(1.0) as usize;
    let columns = params.get_number("Columns").unwrap_or(1.0).max(1.0) as usize;

    if predictor == 2 {
        return Ok(decode_tiff_predictor(data, colors, bits, columns));
    }
    decode_png_predictor(&data, colors, bits, columns)
}

/// Reverses PNG row filters (predictors 10-15). A short final row is padded.
pub fn decode_png_predictor(
    data: &[u8],
    colors: usize,
    bits_per_component: usize,
    columns: usize,
) -> PDFResult<Vec<u8>> {
    let pix_bytes = (colors * bits_per_component).div_ceil(8);
    let row_bytes = (columns * colors * bits_per_component).div_ceil(8);
    let stride = row_bytes + 1;

    let mut output = Vec::with_capacity(data.len() / stride * row_bytes + row_bytes);
    let mut prev = vec![0u8; row_bytes];
    let mut row = vec![0u8; row_bytes];

    for chunk in data.chunks(stride) {
        let filter = chunk[0];
        let raw = &chunk[1..];
        row.fill(0);
        row[..raw.len()].copy_from_slice(raw);

        for i in 0..row_bytes {
            let left = if i >= pix_bytes { row[i - pix_bytes] } else { 0 };
            let up = prev[i];
            let up_left = if i >= pix_bytes { prev[i - pix_bytes] } else { 0 };
            let predicted = match filter {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((left as u16 + up as u16) / 2) as u8,
                4 => paeth(left, up, up_left),
                other => {
                    return Err(PDFError::Format(format!("unknown PNG predictor {}", other)));
                }
            };
            row[i] = row[i].wrapping_add(predicted);
        }

        output.extend_from_slice(&row);
        std::mem::swap(&mut prev, &mut row);
    }

    Ok(output)
}

fn paeth(left: u8, up: u8, up_left: u8) -> u8 {
    let p = left as i16 + up as i16 - up_left as i16;
    let pa = (p - left as i16).abs();
    let pb = (p - up as i16).abs();
    let pc = (p - up_left as i16).abs();
    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        up
    } else {
        up_left
    }
}

/// TIFF predictor 2, 8-bit components only; other depths pass through.
fn decode_tiff_predictor(mut data: Vec<u8>, colors: usize, bits: usize, columns: usize) -> Vec<u8> {
    if bits != 8 {
        log::warn!("TIFF predictor with {} bits per component not supported", bits);
        return data;
    }
    let row_bytes = columns * colors;
    for row in data.chunks_mut(row_bytes) {
        for i in colors..row.len() {
            row[i] = row[i].wrapping_add(row[i - colors]);
        }
    }
    data
}

/// Decodes ASCIIHexDecode data up to the `>` terminator.
pub fn decode_ascii_hex(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut pending: Option<u8> = None;
    for &ch in data {
        if ch == b'>' {
            break;
        }
        let digit = match ch {
            b'0'..=b'9' => ch - b'0',
            b'a'..=b'f' => ch - b'a' + 10,
            b'A'..=b'F' => ch - b'A' + 10,
            _ => continue,
        };
        match pending.take() {
            Some(high) => out.push((high << 4) | digit),
            None => pending = Some(digit),
        }
    }
    if let Some(high) = pending {
        out.push(high << 4);
    }
    out
}

/// Decodes ASCII85Decode data up to the `~>` terminator.
pub fn decode_ascii85(data: &[u8]) -> PDFResult<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut count = 0;

    for &ch in data {
        match ch {
            b'~' => break,
            b'z' if count == 0 => out.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[count] = ch - b'!';
                count += 1;
                if count == 5 {
                    out.extend_from_slice(&ascii85_group(&group)?);
                    count = 0;
                }
            }
            c if c.is_ascii_whitespace() || c == 0 => {}
            other => {
                return Err(PDFError::Format(format!(
                    "invalid ASCII85 character 0x{:02x}",
                    other
                )));
            }
        }
    }

    if count > 1 {
        for slot in group.iter_mut().skip(count) {
            *slot = b'u' - b'!';
        }
        let bytes = ascii85_group(&group)?;
        out.extend_from_slice(&bytes[..count - 1]);
    }
    Ok(out)
}

fn ascii85_group(group: &[u8; 5]) -> PDFResult<[u8; 4]> {
    let value = group
        .iter()
        .try_fold(0u64, |acc, &digit| Some(acc * 85 + digit as u64))
        .filter(|v| *v <= u32::MAX as u64)
        .ok_or_else(|| PDFError::Format("ASCII85 group overflow".into()))?;
    Ok((value as u32).to_be_bytes())
}

/// Decodes RunLengthDecode data.
pub fn decode_run_length(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let length = data[i];
        i += 1;
        match length {
            128 => break,
            0..=127 => {
                let end = (i + length as usize + 1).min(data.len());
                out.extend_from_slice(&data[i..end]);
                i = end;
            }
            _ => {
                if let Some(&byte) = data.get(i) {
                    out.extend(std::iter::repeat_n(byte, 257 - length as usize));
                }
                i += 1;
            }
        }
    }
    out
}

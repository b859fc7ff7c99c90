//! PDF serialization.
//!
//! Two entry points share one object serializer:
//!
//! - [`PDFWriter::write_document`] produces a complete file from a list of
//!   objects (used to build documents from scratch);
//! - [`PDFWriter::write_incremental_update`] appends changed objects, a new
//!   xref section and a trailer to the original bytes, following the
//!   incremental update format:
//!
//! ```text
//! [Original PDF Data]
//! [Changed Objects]
//! [New XRef Section]
//! [New Trailer with /Prev]
//! %%EOF
//! ```

use super::error::{PDFError, PDFResult};
use super::parser::{Dict, PDFObject, Ref};
use std::io::Write;
use std::sync::Arc;

fn io_error(e: std::io::Error) -> PDFError {
    PDFError::Io(format!("write failed: {}", e))
}

/// Stateless PDF serializer.
pub struct PDFWriter;

impl PDFWriter {
    /// Serializes one object into a byte vector.
    pub fn serialize(obj: &PDFObject) -> Vec<u8> {
        let mut out = Vec::new();
        Self::write_into(&mut out, obj);
        out
    }

    /// Writes one object. Dictionary keys are emitted in sorted order so the
    /// output is deterministic.
    pub fn write_object<W: Write>(out: &mut W, obj: &PDFObject) -> PDFResult<()> {
        out.write_all(&Self::serialize(obj)).map_err(io_error)
    }

    fn write_into(out: &mut Vec<u8>, obj: &PDFObject) {
        match obj {
            PDFObject::Null | PDFObject::EOF => out.extend_from_slice(b"null"),
            PDFObject::Boolean(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
            PDFObject::Number(n) => Self::write_number(out, *n),
            PDFObject::String(s) => {
                out.push(b'(');
                for &byte in s {
                    match byte {
                        b'(' | b')' | b'\\' => out.extend_from_slice(&[b'\\', byte]),
                        b'\r' => out.extend_from_slice(b"\\r"),
                        b'\n' => out.extend_from_slice(b"\\n"),
                        _ => out.push(byte),
                    }
                }
                out.push(b')');
            }
            PDFObject::HexString(s) => {
                out.push(b'<');
                for byte in s {
                    out.extend_from_slice(format!("{:02X}", byte).as_bytes());
                }
                out.push(b'>');
            }
            PDFObject::Name(name) => Self::write_name(out, name),
            PDFObject::Array(items) => {
                out.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(b' ');
                    }
                    Self::write_into(out, item);
                }
                out.push(b']');
            }
            PDFObject::Dictionary(dict) => Self::write_dict(out, dict),
            PDFObject::Stream(stream) => {
                let mut dict = stream.dict.clone();
                dict.insert("Length".into(), PDFObject::Number(stream.data.len() as f64));
                Self::write_dict(out, &dict);
                out.extend_from_slice(b"\nstream\n");
                out.extend_from_slice(&stream.data);
                out.extend_from_slice(b"\nendstream");
            }
            PDFObject::Ref(r) => out.extend_from_slice(r.to_string().as_bytes()),
            PDFObject::Command(cmd) => out.extend_from_slice(cmd.as_bytes()),
        }
    }

    fn write_number(out: &mut Vec<u8>, n: f64) {
        let text = if n.fract() == 0.0 && n.abs() < 1e15 {
            format!("{}", n as i64)
        } else {
            let fixed = format!("{:.6}", n);
            fixed.trim_end_matches('0').trim_end_matches('.').to_string()
        };
        out.extend_from_slice(text.as_bytes());
    }

    fn write_name(out: &mut Vec<u8>, name: &str) {
        out.push(b'/');
        for &byte in name.as_bytes() {
            let regular = byte > b' '
                && byte < 0x7F
                && byte != b'#'
                && !b"()<>[]{}/%".contains(&byte);
            if regular {
                out.push(byte);
            } else {
                out.extend_from_slice(format!("#{:02X}", byte).as_bytes());
            }
        }
    }

    fn write_dict(out: &mut Vec<u8>, dict: &Dict) {
        let mut keys: Vec<&String> = dict.keys().collect();
        keys.sort();
        out.extend_from_slice(b"<<");
        for key in keys {
            Self::write_name(out, key);
            out.push(b' ');
            Self::write_into(out, &dict[key]);
        }
        out.extend_from_slice(b">>");
    }

    fn write_indirect(out: &mut Vec<u8>, r: Ref, obj: &PDFObject) {
        out.extend_from_slice(format!("{} {} obj\n", r.num, r.generation).as_bytes());
        Self::write_into(out, obj);
        out.extend_from_slice(b"\nendobj\n");
    }

    /// Writes xref subsections for consecutive runs of object numbers.
    fn write_xref_section(out: &mut Vec<u8>, offsets: &[(Ref, usize)], with_free_head: bool) {
        let mut rows: Vec<(u32, String)> = offsets
            .iter()
            .map(|(r, offset)| (r.num, format!("{:010} {:05} n\r\n", offset, r.generation)))
            .collect();
        if with_free_head {
            rows.push((0, "0000000000 65535 f\r\n".to_string()));
        }
        rows.sort_by_key(|(num, _)| *num);
        rows.dedup_by_key(|(num, _)| *num);

        out.extend_from_slice(b"xref\n");
        let mut start = 0;
        while start < rows.len() {
            let mut end = start + 1;
            while end < rows.len() && rows[end].0 == rows[end - 1].0 + 1 {
                end += 1;
            }
            out.extend_from_slice(format!("{} {}\n", rows[start].0, end - start).as_bytes());
            for (_, row) in &rows[start..end] {
                out.extend_from_slice(row.as_bytes());
            }
            start = end;
        }
    }

    fn write_trailer(out: &mut Vec<u8>, trailer: &Dict, xref_offset: usize) {
        out.extend_from_slice(b"trailer\n");
        Self::write_dict(out, trailer);
        out.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());
    }

    /// Builds a complete PDF file.
    ///
    /// `objects` may be in any order; `root` becomes the trailer's `/Root`.
    pub fn write_document(objects: &[(Ref, PDFObject)], root: Ref) -> Vec<u8> {
        let mut out = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (r, obj) in objects {
            offsets.push((*r, out.len()));
            Self::write_indirect(&mut out, *r, obj);
        }

        let size = objects.iter().map(|(r, _)| r.num + 1).max().unwrap_or(1);
        let xref_offset = out.len();
        Self::write_xref_section(&mut out, &offsets, true);

        let mut trailer = Dict::default();
        trailer.insert("Size".into(), PDFObject::Number(size as f64));
        trailer.insert("Root".into(), PDFObject::Ref(root));
        Self::write_trailer(&mut out, &trailer, xref_offset);
        out
    }

    /// Writes `original` followed by an incremental update containing
    /// `changed`.
    ///
    /// `trailer` is the document's current trailer; its `/Prev`, `/Size`,
    /// `/XRefStm` and stream-only keys are replaced.
    pub fn write_incremental_update<W: Write>(
        original: &[u8],
        changed: &[(Ref, Arc<PDFObject>)],
        trailer: &Dict,
        size: u32,
        prev_xref_offset: usize,
        out: &mut W,
    ) -> PDFResult<()> {
        let mut update = Vec::new();
        if !original.ends_with(b"\n") && !original.ends_with(b"\r") {
            update.push(b'\n');
        }

        let base = original.len();
        let mut offsets = Vec::with_capacity(changed.len());
        for (r, obj) in changed {
            offsets.push((*r, base + update.len()));
            Self::write_indirect(&mut update, *r, obj);
        }

        let xref_offset = base + update.len();
        Self::write_xref_section(&mut update, &offsets, false);

        let mut new_trailer = Dict::default();
        for key in ["Root", "Info", "ID"] {
            if let Some(value) = trailer.get(key) {
                new_trailer.insert(key.into(), value.clone());
            }
        }
        new_trailer.insert("Size".into(), PDFObject::Number(size as f64));
        new_trailer.insert("Prev".into(), PDFObject::Number(prev_xref_offset as f64));
        Self::write_trailer(&mut update, &new_trailer, xref_offset);

        out.write_all(original).map_err(io_error)?;
        out.write_all(&update).map_err(io_error)?;
        out.flush().map_err(io_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::PDFStream;

    fn text(obj: &PDFObject) -> String {
        String::from_utf8(PDFWriter::serialize(obj)).unwrap()
    }

    #[test]
    fn test_serialize_scalars() {
        assert_eq!(text(&PDFObject::Number(612.0)), "612");
        assert_eq!(text(&PDFObject::Number(-0.5)), "-0.5");
        assert_eq!(text(&PDFObject::Number(1.0 / 3.0)), "0.333333");
        assert_eq!(text(&PDFObject::Boolean(true)), "true");
        assert_eq!(text(&PDFObject::Ref(Ref::new(4, 0))), "4 0 R");
        assert_eq!(text(&PDFObject::String(b"a(b)\\".to_vec())), "(a\\(b\\)\\\\)");
        assert_eq!(text(&PDFObject::HexString(vec![0xAB, 0x01])), "<AB01>");
        assert_eq!(text(&PDFObject::Name("A B#".into())), "/A#20B#23");
    }

    #[test]
    fn test_dictionary_keys_sorted() {
        let mut dict = Dict::default();
        dict.insert("Type".into(), PDFObject::Name("Page".into()));
        dict.insert("Count".into(), PDFObject::Number(2.0));
        dict.insert(
            "Kids".into(),
            PDFObject::array([PDFObject::Ref(Ref::new(3, 0))]),
        );
        assert_eq!(
            text(&PDFObject::Dictionary(dict)),
            "<</Count 2/Kids [3 0 R]/Type /Page>>"
        );
    }

    #[test]
    fn test_stream_length_is_recomputed() {
        let stream = PDFStream {
            dict: Dict::default(),
            data: b"0 0 m".to_vec(),
        };
        assert_eq!(
            text(&PDFObject::Stream(Arc::new(stream))),
            "<</Length 5>>\nstream\n0 0 m\nendstream"
        );
    }

    #[test]
    fn test_xref_subsections() {
        let mut out = Vec::new();
        let offsets = [
            (Ref::new(1, 0), 15),
            (Ref::new(2, 0), 60),
            (Ref::new(7, 1), 200),
        ];
        PDFWriter::write_xref_section(&mut out, &offsets, true);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("xref\n0 3\n0000000000 65535 f\r\n0000000015 00000 n\r\n"));
        assert!(text.contains("7 1\n0000000200 00001 n\r\n"));
    }

    #[test]
    fn test_incremental_update_keeps_original() {
        let original = b"%PDF-1.4\nbody\n".to_vec();
        let mut trailer = Dict::default();
        trailer.insert("Root".into(), PDFObject::Ref(Ref::new(1, 0)));
        trailer.insert("Prev".into(), PDFObject::Number(3.0));
        let changed = vec![(Ref::new(2, 0), Arc::new(PDFObject::Number(5.0)))];

        let mut out = Vec::new();
        PDFWriter::write_incremental_update(&original, &changed, &trailer, 3, 9, &mut out)
            .unwrap();

        assert!(out.starts_with(&original));
        let tail = String::from_utf8_lossy(&out[original.len()..]).to_string();
        assert!(tail.starts_with("2 0 obj\n5\nendobj\n"));
        assert!(tail.contains("/Prev 9"));
        assert!(tail.contains("/Size 3"));
        assert!(tail.ends_with("%%EOF\n"));
    }
}

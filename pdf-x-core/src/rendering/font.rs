//! Fonts as far as the renderer needs them.
//!
//! Type3 fonts carry their glyphs as content streams and are painted by the
//! interpreter. Every other font is drawn from glyph outlines (see
//! [`glyph`](super::glyph)); advances always come from the PDF widths.

use super::glyph::{
    self, BaseEncoding, FLAG_SYMBOLIC, FallbackFace, FontProgram, glyph_name_unicode,
    missing_glyph_box, symbolic_glyph,
};
use super::matrix::Matrix;
use super::path::Path;
use crate::core::content_stream::{self, Operation};
use crate::core::error::PDFResult;
use crate::core::parser::{Dict, DictExt, PDFObject};
use crate::core::xref::XRef;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, PoisonError};
use ttf_parser::{Face, GlyphId};

#[derive(Debug)]
enum FontKind {
    Type3 {
        font_matrix: Matrix,
        /// Glyph procedures by glyph name, parsed at load
        char_procs: FxHashMap<String, Arc<[Operation]>>,
        /// Code to glyph name, from `/Encoding /Differences`
        encoding: FxHashMap<u32, String>,
        resources: Option<Dict>,
    },
    Simple {
        base: BaseEncoding,
        differences: FxHashMap<u32, String>,
        symbolic: bool,
    },
    /// Type0 composite font with two-byte codes; CID to glyph id, identity
    /// when absent
    Composite { cid_to_gid: Option<Vec<u16>> },
}

/// A font loaded from a `/Font` resource.
#[derive(Debug)]
pub struct LoadedFont {
    base_font: String,
    kind: FontKind,
    first_char: u32,

    /// `/Widths` in glyph space (text space × 1000 except for Type3)
    widths: Vec<f64>,
    default_width: f64,

    /// Composite fonts: `/W` ranges as (first, last, width)
    cid_widths: Vec<(u32, u32, f64)>,

    /// Outline source; `None` draws boxes
    program: Option<FontProgram>,
    outlines: Mutex<FxHashMap<u32, Option<Arc<Path>>>>,
}

impl LoadedFont {
    pub fn load(xref: &mut XRef, dict: &Dict) -> PDFResult<Self> {
        let subtype = dict.get_name("Subtype").unwrap_or("Type1").to_string();
        let base_font = dict.get_name("BaseFont").unwrap_or("").to_string();

        if subtype == "Type0" {
            return Self::load_composite(xref, dict, base_font);
        }

        let first_char = dict.get_number("FirstChar").unwrap_or(0.0).max(0.0) as u32;
        let widths = match xref.get_resolved(dict, "Widths")? {
            Some(widths) => widths.as_number_array().unwrap_or_default(),
            None => Vec::new(),
        };
        let descriptor = font_descriptor(xref, dict)?;
        let default_width = descriptor.get_number("MissingWidth").unwrap_or(0.0);

        let (kind, program) = if subtype == "Type3" {
            (Self::load_type3(xref, dict)?, None)
        } else {
            let flags = descriptor.get_number("Flags").unwrap_or(0.0) as u32;
            let (base, differences) = parse_encoding(xref, dict)?;
            let default_base = if subtype == "TrueType" {
                BaseEncoding::WinAnsi
            } else {
                BaseEncoding::Standard
            };
            let program = match embedded_program(xref, &descriptor)? {
                Some(program) => Some(program),
                None => {
                    log::debug!("substituting a system face for {:?}", base_font);
                    glyph::system_program(FallbackFace::for_font(&base_font, flags))
                }
            };
            let kind = FontKind::Simple {
                base: base.unwrap_or(default_base),
                differences,
                symbolic: flags & FLAG_SYMBOLIC != 0,
            };
            (kind, program)
        };

        log::debug!("loaded {} font {:?}", subtype, base_font);
        Ok(LoadedFont {
            base_font,
            kind,
            first_char,
            widths,
            default_width,
            cid_widths: Vec::new(),
            program,
            outlines: Mutex::default(),
        })
    }

    fn load_type3(xref: &mut XRef, dict: &Dict) -> PDFResult<FontKind> {
        let font_matrix = dict
            .get("FontMatrix")
            .and_then(PDFObject::as_number_array)
            .filter(|m| m.len() == 6)
            .map(|m| Matrix::new(m[0], m[1], m[2], m[3], m[4], m[5]))
            .unwrap_or(Matrix::new(0.001, 0.0, 0.0, 0.001, 0.0, 0.0));

        let mut char_procs = FxHashMap::default();
        if let Some(procs) = xref.get_resolved(dict, "CharProcs")? {
            let entries: Vec<(String, PDFObject)> = procs
                .as_dict()
                .map(|d| d.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default();
            for (name, proc_obj) in entries {
                let proc_obj = xref.fetch_if_ref(&proc_obj)?;
                let Some(stream) = proc_obj.as_stream() else {
                    continue;
                };
                match xref.decode_stream_data(stream) {
                    Ok(data) => {
                        char_procs.insert(name, content_stream::parse_content(&data).into());
                    }
                    Err(e) => log::warn!("skipping Type3 glyph /{}: {}", name, e),
                }
            }
        }

        let (_, encoding) = parse_encoding(xref, dict)?;
        let resources = xref
            .get_resolved(dict, "Resources")?
            .and_then(|r| r.as_dict().cloned());

        Ok(FontKind::Type3 {
            font_matrix,
            char_procs,
            encoding,
            resources,
        })
    }

    fn load_composite(xref: &mut XRef, dict: &Dict, base_font: String) -> PDFResult<Self> {
        let descendant = match xref.get_resolved(dict, "DescendantFonts")? {
            Some(fonts) => match fonts.as_array().and_then(|a| a.first()) {
                Some(first) => xref.fetch_if_ref(first)?.as_dict().cloned(),
                None => None,
            },
            None => None,
        }
        .unwrap_or_default();

        let default_width = descendant.get_number("DW").unwrap_or(1000.0);
        let mut cid_widths = Vec::new();
        if let Some(w) = xref.get_resolved(&descendant, "W")? {
            let items = w.as_array().unwrap_or(&[]);
            let mut i = 0;
            while i < items.len() {
                let Some(first) = items[i].as_number().map(|n| n as u32) else {
                    break;
                };
                match items.get(i + 1).map(|b| &**b) {
                    Some(PDFObject::Array(list)) => {
                        for (offset, width) in list.iter().enumerate() {
                            let cid = first + offset as u32;
                            cid_widths.push((cid, cid, width.as_number().unwrap_or(default_width)));
                        }
                        i += 2;
                    }
                    Some(PDFObject::Number(last)) => {
                        let width = items.get(i + 2).and_then(|w| w.as_number());
                        cid_widths.push((first, *last as u32, width.unwrap_or(default_width)));
                        i += 3;
                    }
                    _ => break,
                }
            }
        }

        // CIDs index a substitute face meaninglessly, so only embedded
        // programs are used here
        let descriptor = font_descriptor(xref, &descendant)?;
        let program = embedded_program(xref, &descriptor)?;
        let cid_to_gid = match xref.get_resolved(&descendant, "CIDToGIDMap")? {
            Some(map) => match map.as_stream() {
                Some(stream) => Some(
                    xref.decode_stream_data(stream)?
                        .chunks_exact(2)
                        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                        .collect(),
                ),
                None => None,
            },
            None => None,
        };

        Ok(LoadedFont {
            base_font,
            kind: FontKind::Composite { cid_to_gid },
            first_char: 0,
            widths: Vec::new(),
            default_width,
            cid_widths,
            program,
            outlines: Mutex::default(),
        })
    }

    pub fn base_font(&self) -> &str {
        &self.base_font
    }

    pub fn is_type3(&self) -> bool {
        matches!(self.kind, FontKind::Type3 { .. })
    }

    /// Bytes per character code.
    pub fn code_length(&self) -> usize {
        match self.kind {
            FontKind::Composite { .. } => 2,
            _ => 1,
        }
    }

    /// Splits a string operand into character codes.
    pub fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        bytes
            .chunks(self.code_length())
            .map(|chunk| {
                chunk
                    .iter()
                    .fold(0u32, |code, byte| (code << 8) | *byte as u32)
            })
            .collect()
    }

    /// Horizontal advance of `code` in text space units (before font size).
    pub fn advance(&self, code: u32) -> f64 {
        match &self.kind {
            FontKind::Composite { .. } => {
                let width = self
                    .cid_widths
                    .iter()
                    .find(|(first, last, _)| (*first..=*last).contains(&code))
                    .map_or(self.default_width, |(_, _, w)| *w);
                width / 1000.0
            }
            // Standard fonts often come without `/Widths`
            FontKind::Simple { .. } if self.widths.is_empty() => {
                self.program_advance(code).unwrap_or(self.default_width) / 1000.0
            }
            FontKind::Simple { .. } => self.width(code) / 1000.0,
            FontKind::Type3 { font_matrix, .. } => {
                font_matrix.apply_vector(self.width(code), 0.0).0
            }
        }
    }

    fn width(&self, code: u32) -> f64 {
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .unwrap_or(self.default_width)
    }

    fn program_advance(&self, code: u32) -> Option<f64> {
        let program = self.program.as_ref()?;
        let face = program.face()?;
        let glyph = self.glyph_id(&face, code)?;
        program.advance(&face, glyph)
    }

    /// Glyph space to text space; identity-scaled 1/1000 for non-Type3 fonts.
    pub fn font_matrix(&self) -> Matrix {
        match &self.kind {
            FontKind::Type3 { font_matrix, .. } => *font_matrix,
            _ => Matrix::scale(0.001, 0.001),
        }
    }

    /// The glyph procedure of a Type3 code.
    pub fn glyph_procedure(&self, code: u32) -> Option<Arc<[Operation]>> {
        match &self.kind {
            FontKind::Type3 {
                char_procs,
                encoding,
                ..
            } => char_procs.get(encoding.get(&code)?).cloned(),
            _ => None,
        }
    }

    /// Type3 glyph resources, when the font has its own.
    pub fn resources(&self) -> Option<&Dict> {
        match &self.kind {
            FontKind::Type3 { resources, .. } => resources.as_ref(),
            _ => None,
        }
    }

    /// The outline of `code` in glyph space (see [`LoadedFont::font_matrix`]).
    /// `None` for blank glyphs and for Type3 fonts.
    pub fn glyph_outline(&self, code: u32) -> Option<Arc<Path>> {
        if self.is_type3() {
            return None;
        }
        let mut outlines = self.outlines.lock().unwrap_or_else(PoisonError::into_inner);
        outlines
            .entry(code)
            .or_insert_with(|| self.build_outline(code).map(Arc::new))
            .clone()
    }

    fn build_outline(&self, code: u32) -> Option<Path> {
        let Some(program) = &self.program else {
            if self.unicode(code).is_some_and(char::is_whitespace) {
                return None;
            }
            return Some(missing_glyph_box(self.advance(code) * 1000.0));
        };
        let face = program.face()?;
        let glyph = self.glyph_id(&face, code).filter(|g| g.0 != 0)?;
        program.outline(&face, glyph)
    }

    /// The character a simple font code stands for, when known.
    fn unicode(&self, code: u32) -> Option<char> {
        match &self.kind {
            FontKind::Simple {
                base, differences, ..
            } => match differences.get(&code) {
                Some(name) => glyph_name_unicode(name),
                None => base.unicode(code),
            },
            _ => None,
        }
    }

    fn glyph_id(&self, face: &Face<'_>, code: u32) -> Option<GlyphId> {
        match &self.kind {
            FontKind::Composite { cid_to_gid } => match cid_to_gid {
                Some(map) => map.get(code as usize).copied().map(GlyphId),
                None => u16::try_from(code).ok().map(GlyphId),
            },
            FontKind::Simple {
                differences,
                symbolic,
                ..
            } => {
                if let Some(glyph) = differences
                    .get(&code)
                    .and_then(|name| face.glyph_index_by_name(name))
                {
                    return Some(glyph);
                }
                let by_unicode = || self.unicode(code).and_then(|c| face.glyph_index(c));
                if *symbolic {
                    symbolic_glyph(face, code).or_else(by_unicode)
                } else {
                    by_unicode().or_else(|| symbolic_glyph(face, code))
                }
            }
            FontKind::Type3 { .. } => None,
        }
    }
}

fn font_descriptor(xref: &mut XRef, dict: &Dict) -> PDFResult<Dict> {
    Ok(xref
        .get_resolved(dict, "FontDescriptor")?
        .and_then(|d| d.as_dict().cloned())
        .unwrap_or_default())
}

/// `/Encoding`: the named base encoding and the `/Differences` names.
fn parse_encoding(
    xref: &mut XRef,
    dict: &Dict,
) -> PDFResult<(Option<BaseEncoding>, FxHashMap<u32, String>)> {
    let mut differences = FxHashMap::default();
    let Some(encoding) = xref.get_resolved(dict, "Encoding")? else {
        return Ok((None, differences));
    };
    if let Some(name) = encoding.as_name() {
        return Ok((BaseEncoding::from_name(name), differences));
    }
    let Some(encoding) = encoding.as_dict() else {
        return Ok((None, differences));
    };
    if let Some(items) = encoding.get_array("Differences") {
        let mut code = 0u32;
        for item in items {
            match &**item {
                PDFObject::Number(n) => code = n.max(0.0) as u32,
                PDFObject::Name(name) => {
                    differences.insert(code, name.clone());
                    code += 1;
                }
                _ => {}
            }
        }
    }
    let base = encoding.get_name("BaseEncoding").and_then(BaseEncoding::from_name);
    Ok((base, differences))
}

/// `/FontFile2`, or `/FontFile3` with an OpenType program. Type1 and bare
/// CFF programs are left to the substitute face.
fn embedded_program(xref: &mut XRef, descriptor: &Dict) -> PDFResult<Option<FontProgram>> {
    let file = match xref.get_resolved(descriptor, "FontFile2")? {
        Some(file) => Some(file),
        None => xref.get_resolved(descriptor, "FontFile3")?.filter(|file| {
            file.as_stream()
                .is_some_and(|s| s.dict.get_name("Subtype") == Some("OpenType"))
        }),
    };
    let Some(stream) = file.as_deref().and_then(PDFObject::as_stream) else {
        return Ok(None);
    };
    match xref.decode_stream_data(stream) {
        Ok(data) => Ok(FontProgram::parse(Arc::from(data), 0)),
        Err(e) => {
            log::warn!("cannot decode embedded font program: {}", e);
            Ok(None)
        }
    }
}

//! Glyph outlines from TrueType and OpenType font programs.
//!
//! Embedded programs come from `/FontFile2` and `/FontFile3 /Subtype
//! /OpenType`. Fonts without a usable program are drawn with a face found on
//! the system (feature `system-fonts`); when there is none either, each glyph
//! is drawn as a hollow box.

use super::path::Path;
use std::fmt;
use std::sync::Arc;
use ttf_parser::{Face, GlyphId, OutlineBuilder, PlatformId};

/// Glyph space units per em, the scale the font matrix expects.
const GLYPH_UNITS: f64 = 1000.0;

/// `/Flags` bits of a font descriptor.
pub const FLAG_FIXED_PITCH: u32 = 1;
pub const FLAG_SERIF: u32 = 1 << 1;
pub const FLAG_SYMBOLIC: u32 = 1 << 2;
pub const FLAG_ITALIC: u32 = 1 << 6;
pub const FLAG_FORCE_BOLD: u32 = 1 << 18;

/// A parsed font program and the face index inside it.
#[derive(Clone)]
pub struct FontProgram {
    data: Arc<[u8]>,
    index: u32,
    /// Glyph space units per font unit
    scale: f64,
}

impl fmt::Debug for FontProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontProgram")
            .field("len", &self.data.len())
            .field("index", &self.index)
            .finish()
    }
}

impl FontProgram {
    /// Validates `data` as a TrueType/OpenType face.
    pub fn parse(data: Arc<[u8]>, index: u32) -> Option<Self> {
        let units_per_em = match Face::parse(&data, index) {
            Ok(face) => face.units_per_em(),
            Err(e) => {
                log::warn!("cannot parse font program: {}", e);
                return None;
            }
        };
        Some(FontProgram {
            data,
            index,
            scale: GLYPH_UNITS / f64::from(units_per_em.max(1)),
        })
    }

    /// A face view over the program. Parsing only reads the table directory.
    pub fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, self.index).ok()
    }

    /// The outline of `glyph` in glyph space; `None` for empty glyphs.
    pub fn outline(&self, face: &Face<'_>, glyph: GlyphId) -> Option<Path> {
        let mut builder = GlyphPathBuilder {
            path: Path::new(),
            scale: self.scale,
        };
        face.outline_glyph(glyph, &mut builder)?;
        Some(builder.path).filter(|path| !path.is_empty())
    }

    /// Horizontal advance of `glyph` in glyph space.
    pub fn advance(&self, face: &Face<'_>, glyph: GlyphId) -> Option<f64> {
        face.glyph_hor_advance(glyph)
            .map(|advance| f64::from(advance) * self.scale)
    }
}

struct GlyphPathBuilder {
    path: Path,
    scale: f64,
}

impl GlyphPathBuilder {
    fn point(&self, x: f32, y: f32) -> (f64, f64) {
        (f64::from(x) * self.scale, f64::from(y) * self.scale)
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.point(x, y);
        self.path.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.point(x, y);
        self.path.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (qx, qy) = self.point(x1, y1);
        let (x, y) = self.point(x, y);
        let (x0, y0) = self.path.current_point().unwrap_or((qx, qy));
        self.path.curve_to(
            x0 + 2.0 / 3.0 * (qx - x0),
            y0 + 2.0 / 3.0 * (qy - y0),
            x + 2.0 / 3.0 * (qx - x),
            y + 2.0 / 3.0 * (qy - y),
            x,
            y,
        );
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.point(x1, y1);
        let (x2, y2) = self.point(x2, y2);
        let (x, y) = self.point(x, y);
        self.path.curve_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.path.close_path();
    }
}

/// Looks `code` up in the symbol and Mac Roman cmap subtables that symbolic
/// TrueType fonts carry.
pub fn symbolic_glyph(face: &Face<'_>, code: u32) -> Option<GlyphId> {
    let cmap = face.tables().cmap?;
    cmap.subtables.into_iter().find_map(|subtable| {
        match (subtable.platform_id, subtable.encoding_id) {
            (PlatformId::Windows, 0) => subtable
                .glyph_index(0xF000 | code)
                .or_else(|| subtable.glyph_index(code)),
            (PlatformId::Macintosh, 0) => subtable.glyph_index(code),
            _ => None,
        }
    })
}

/// A hollow box `width` glyph units wide, drawn for glyphs no face can
/// supply.
pub fn missing_glyph_box(width: f64) -> Path {
    let width = if width > 0.0 { width } else { 500.0 };
    let (left, right) = (width * 0.1, width * 0.9);
    let (bottom, top) = (0.0, 700.0);
    let t = (width * 0.08).clamp(20.0, 60.0);

    let mut path = Path::new();
    path.move_to(left, bottom);
    path.line_to(right, bottom);
    path.line_to(right, top);
    path.line_to(left, top);
    path.close_path();
    // Inner contour runs the other way so nonzero filling leaves it open
    path.move_to(left + t, bottom + t);
    path.line_to(left + t, top - t);
    path.line_to(right - t, top - t);
    path.line_to(right - t, bottom + t);
    path.close_path();
    path
}

/// Built-in simple font encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseEncoding {
    Standard,
    WinAnsi,
    /// Only the ASCII half is mapped
    MacRoman,
}

/// WinAnsi 0x80..=0x9F; the rest of the upper half is Latin-1.
const WIN_ANSI_HIGH: [u16; 32] = [
    0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160, 0x2039,
    0x0152, 0, 0x017D, 0, 0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, 0x02DC,
    0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
];

/// StandardEncoding codes above 0x7F that have a precomposed character.
const STANDARD_HIGH: &[(u32, char)] = &[
    (0xA1, '¡'),
    (0xA2, '¢'),
    (0xA3, '£'),
    (0xA4, '⁄'),
    (0xA5, '¥'),
    (0xA6, 'ƒ'),
    (0xA7, '§'),
    (0xA8, '¤'),
    (0xA9, '\''),
    (0xAA, '“'),
    (0xAB, '«'),
    (0xAC, '‹'),
    (0xAD, '›'),
    (0xAE, 'ﬁ'),
    (0xAF, 'ﬂ'),
    (0xB1, '–'),
    (0xB2, '†'),
    (0xB3, '‡'),
    (0xB4, '·'),
    (0xB6, '¶'),
    (0xB7, '•'),
    (0xB8, '‚'),
    (0xB9, '„'),
    (0xBA, '”'),
    (0xBB, '»'),
    (0xBC, '…'),
    (0xBD, '‰'),
    (0xBF, '¿'),
    (0xD0, '—'),
    (0xE1, 'Æ'),
    (0xE8, 'Ł'),
    (0xE9, 'Ø'),
    (0xEA, 'Œ'),
    (0xF1, 'æ'),
    (0xF5, 'ı'),
    (0xF8, 'ł'),
    (0xF9, 'ø'),
    (0xFA, 'œ'),
    (0xFB, 'ß'),
];

impl BaseEncoding {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "StandardEncoding" => Some(BaseEncoding::Standard),
            "WinAnsiEncoding" => Some(BaseEncoding::WinAnsi),
            "MacRomanEncoding" => Some(BaseEncoding::MacRoman),
            _ => None,
        }
    }

    /// The character a single-byte `code` stands for.
    pub fn unicode(self, code: u32) -> Option<char> {
        match (self, code) {
            (BaseEncoding::Standard, 0x27) => Some('’'),
            (BaseEncoding::Standard, 0x60) => Some('‘'),
            (_, 0x20..=0x7E) => char::from_u32(code),
            (BaseEncoding::WinAnsi, 0x80..=0x9F) => {
                match WIN_ANSI_HIGH[(code - 0x80) as usize] {
                    0 => None,
                    c => char::from_u32(u32::from(c)),
                }
            }
            (BaseEncoding::WinAnsi, 0xA0..=0xFF) => char::from_u32(code),
            (BaseEncoding::Standard, _) => STANDARD_HIGH
                .iter()
                .find(|(c, _)| *c == code)
                .map(|(_, ch)| *ch),
            _ => None,
        }
    }
}

/// Glyph names outside the letters and digits, in ASCII order.
const GLYPH_NAMES: &[(&str, char)] = &[
    ("space", ' '),
    ("exclam", '!'),
    ("quotedbl", '"'),
    ("numbersign", '#'),
    ("dollar", '$'),
    ("percent", '%'),
    ("ampersand", '&'),
    ("quotesingle", '\''),
    ("quoteright", '’'),
    ("parenleft", '('),
    ("parenright", ')'),
    ("asterisk", '*'),
    ("plus", '+'),
    ("comma", ','),
    ("hyphen", '-'),
    ("period", '.'),
    ("slash", '/'),
    ("zero", '0'),
    ("one", '1'),
    ("two", '2'),
    ("three", '3'),
    ("four", '4'),
    ("five", '5'),
    ("six", '6'),
    ("seven", '7'),
    ("eight", '8'),
    ("nine", '9'),
    ("colon", ':'),
    ("semicolon", ';'),
    ("less", '<'),
    ("equal", '='),
    ("greater", '>'),
    ("question", '?'),
    ("at", '@'),
    ("bracketleft", '['),
    ("backslash", '\\'),
    ("bracketright", ']'),
    ("asciicircum", '^'),
    ("underscore", '_'),
    ("grave", '`'),
    ("quoteleft", '‘'),
    ("braceleft", '{'),
    ("bar", '|'),
    ("braceright", '}'),
    ("asciitilde", '~'),
    ("bullet", '•'),
    ("endash", '–'),
    ("emdash", '—'),
    ("quotedblleft", '“'),
    ("quotedblright", '”'),
    ("ellipsis", '…'),
    ("fi", 'ﬁ'),
    ("fl", 'ﬂ'),
    ("nbspace", '\u{a0}'),
];

/// Maps a glyph name to its character: `uniXXXX`, `uXXXX[XX]`, single
/// letters and digits, and the common punctuation names.
pub fn glyph_name_unicode(name: &str) -> Option<char> {
    let hex = |digits: &str| {
        u32::from_str_radix(digits, 16)
            .ok()
            .and_then(char::from_u32)
    };
    if let Some(digits) = name.strip_prefix("uni")
        && digits.len() == 4
    {
        return hex(digits);
    }
    if let Some(digits) = name.strip_prefix('u')
        && (4..=6).contains(&digits.len())
        && digits.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return hex(digits);
    }
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next())
        && c.is_ascii_alphanumeric()
    {
        return Some(c);
    }
    GLYPH_NAMES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, c)| *c)
}

/// Face classes used to pick a substitute for a non-embedded font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackFamily {
    Sans,
    Serif,
    Mono,
}

/// The substitute face wanted for a non-embedded font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackFace {
    pub family: FallbackFamily,
    pub bold: bool,
    pub italic: bool,
}

impl FallbackFace {
    /// Classifies a `/BaseFont` name (subset tag ignored) and descriptor
    /// flags.
    pub fn for_font(base_font: &str, flags: u32) -> Self {
        let name = match base_font.split_once('+') {
            Some((tag, rest)) if tag.len() == 6 => rest,
            _ => base_font,
        }
        .to_ascii_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| name.contains(n));

        let family = if has(&["courier", "mono"]) || flags & FLAG_FIXED_PITCH != 0 {
            FallbackFamily::Mono
        } else if !has(&["sans", "arial", "helvetica"])
            && (has(&["times", "serif", "georgia", "garamond"]) || flags & FLAG_SERIF != 0)
        {
            FallbackFamily::Serif
        } else {
            FallbackFamily::Sans
        };
        FallbackFace {
            family,
            bold: has(&["bold", "black", "heavy"]) || flags & FLAG_FORCE_BOLD != 0,
            italic: has(&["italic", "oblique"]) || flags & FLAG_ITALIC != 0,
        }
    }
}

/// A system face standing in for a non-embedded font.
#[cfg(feature = "system-fonts")]
pub fn system_program(face: FallbackFace) -> Option<FontProgram> {
    system::program(face)
}

#[cfg(not(feature = "system-fonts"))]
pub fn system_program(_face: FallbackFace) -> Option<FontProgram> {
    None
}

#[cfg(feature = "system-fonts")]
mod system {
    use super::{FallbackFace, FallbackFamily, FontProgram};
    use fontdb::{Database, Family, ID, Query, Stretch, Style, Weight};
    use rustc_hash::FxHashMap;
    use std::sync::{Arc, LazyLock, Mutex, PoisonError};

    const SANS: &[Family<'static>] = &[
        Family::Name("Liberation Sans"),
        Family::Name("Arial"),
        Family::Name("Helvetica"),
        Family::Name("DejaVu Sans"),
        Family::SansSerif,
    ];
    const SERIF: &[Family<'static>] = &[
        Family::Name("Liberation Serif"),
        Family::Name("Times New Roman"),
        Family::Name("Times"),
        Family::Name("DejaVu Serif"),
        Family::Serif,
    ];
    const MONO: &[Family<'static>] = &[
        Family::Name("Liberation Mono"),
        Family::Name("Courier New"),
        Family::Name("Courier"),
        Family::Name("DejaVu Sans Mono"),
        Family::Monospace,
    ];

    static DATABASE: LazyLock<Database> = LazyLock::new(|| {
        let mut db = Database::new();
        db.load_system_fonts();
        log::debug!("{} system font faces", db.len());
        db
    });

    /// Loaded face data, shared by every document.
    static PROGRAMS: LazyLock<Mutex<FxHashMap<ID, Option<FontProgram>>>> =
        LazyLock::new(Default::default);

    pub fn program(face: FallbackFace) -> Option<FontProgram> {
        let db = &*DATABASE;
        let query = Query {
            families: match face.family {
                FallbackFamily::Sans => SANS,
                FallbackFamily::Serif => SERIF,
                FallbackFamily::Mono => MONO,
            },
            weight: if face.bold { Weight::BOLD } else { Weight::NORMAL },
            stretch: Stretch::Normal,
            style: if face.italic { Style::Italic } else { Style::Normal },
        };
        let Some(id) = db.query(&query).or_else(|| db.faces().next().map(|info| info.id)) else {
            log::warn!("no system font to substitute for {:?}", face);
            return None;
        };

        let mut programs = PROGRAMS.lock().unwrap_or_else(PoisonError::into_inner);
        programs
            .entry(id)
            .or_insert_with(|| {
                db.with_face_data(id, |data, index| FontProgram::parse(Arc::from(data), index))
                    .flatten()
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_encodings() {
        assert_eq!(BaseEncoding::WinAnsi.unicode(0x41), Some('A'));
        assert_eq!(BaseEncoding::WinAnsi.unicode(0x80), Some('€'));
        assert_eq!(BaseEncoding::WinAnsi.unicode(0x81), None);
        assert_eq!(BaseEncoding::WinAnsi.unicode(0xE9), Some('é'));
        assert_eq!(BaseEncoding::Standard.unicode(0x27), Some('’'));
        assert_eq!(BaseEncoding::Standard.unicode(0xAE), Some('ﬁ'));
        assert_eq!(BaseEncoding::MacRoman.unicode(0x8E), None);
        assert_eq!(BaseEncoding::from_name("Identity-H"), None);
    }

    #[test]
    fn test_glyph_names() {
        assert_eq!(glyph_name_unicode("H"), Some('H'));
        assert_eq!(glyph_name_unicode("seven"), Some('7'));
        assert_eq!(glyph_name_unicode("uni20AC"), Some('€'));
        assert_eq!(glyph_name_unicode("u1F600"), Some('😀'));
        assert_eq!(glyph_name_unicode("underscore"), Some('_'));
        assert_eq!(glyph_name_unicode("g123"), None);
    }

    #[test]
    fn test_fallback_classification() {
        let helvetica = FallbackFace::for_font("Helvetica-BoldOblique", 0);
        assert_eq!(helvetica.family, FallbackFamily::Sans);
        assert!(helvetica.bold && helvetica.italic);

        let times = FallbackFace::for_font("ABCDEF+Times-Roman", 0);
        assert_eq!(times, FallbackFace {
            family: FallbackFamily::Serif,
            bold: false,
            italic: false
        });

        assert_eq!(FallbackFace::for_font("Courier", 0).family, FallbackFamily::Mono);
        assert_eq!(FallbackFace::for_font("Custom", FLAG_SERIF).family, FallbackFamily::Serif);
        assert_eq!(
            FallbackFace::for_font("Custom", FLAG_FIXED_PITCH).family,
            FallbackFamily::Mono
        );
        assert!(FallbackFace::for_font("Custom", FLAG_FORCE_BOLD).bold);
    }

    #[test]
    fn test_missing_glyph_box_is_hollow() {
        let path = missing_glyph_box(600.0);
        assert_eq!(path.bounding_box(), Some((60.0, 0.0, 540.0, 700.0)));
        // Two closed contours
        let closes = path
            .elements()
            .iter()
            .filter(|e| matches!(e, crate::rendering::path::PathElement::ClosePath))
            .count();
        assert_eq!(closes, 2);
    }

    #[test]
    fn test_garbage_program_is_rejected() {
        assert!(FontProgram::parse(Arc::from(&b"not a font"[..]), 0).is_none());
    }
}

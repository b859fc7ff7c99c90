use super::error::{PDFError, PDFResult};
use super::lexer::{Lexer, Token};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::Arc;

/// Indirect object reference, written `N G R` in a file.
///
/// # Example
/// ```
/// use pdf_x_core::core::parser::Ref;
///
/// let r = Ref::new(5, 0);
/// assert_eq!(r.num, 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ref {
    /// Object number
    pub num: u32,

    /// Generation number
    pub generation: u32,
}

impl Ref {
    #[inline]
    pub const fn new(num: u32, generation: u32) -> Self {
        Self { num, generation }
    }
}

impl std::fmt::Display for Ref {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.num, self.generation)
    }
}

/// Dictionary type used throughout the engine.
pub type Dict = FxHashMap<String, PDFObject>;

/// A stream object: its dictionary and the raw (still encoded) bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct PDFStream {
    pub dict: Dict,
    pub data: Vec<u8>,
}

/// PDF object model.
#[derive(Debug, Clone, PartialEq)]
pub enum PDFObject {
    Null,

    Boolean(bool),

    /// Integers and reals share one representation
    Number(f64),

    /// Literal string `( ... )`
    String(Vec<u8>),

    /// Hex string `< ... >`
    HexString(Vec<u8>),

    Name(String),

    /// Most arrays in real files (boxes, matrices, colors) have few elements,
    /// so up to 4 are stored inline
    Array(SmallVec<[Box<PDFObject>; 4]>),

    Dictionary(Dict),

    /// Streams are shared, cloning a stream object never copies its data
    Stream(Arc<PDFStream>),

    /// Indirect reference `N G R`
    Ref(Ref),

    /// End of data, only produced while scanning
    EOF,

    /// Operator keyword, only produced while scanning content
    Command(String),
}

impl PDFObject {
    pub fn is_null(&self) -> bool {
        matches!(self, PDFObject::Null)
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, PDFObject::EOF)
    }

    /// Returns true if this is the given keyword.
    #[inline]
    pub fn is_command(&self, cmd: &str) -> bool {
        matches!(self, PDFObject::Command(c) if c == cmd)
    }

    /// Returns true if this is the given name.
    #[inline]
    pub fn is_name(&self, name: &str) -> bool {
        matches!(self, PDFObject::Name(n) if n == name)
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            PDFObject::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the bytes of a literal or hex string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PDFObject::String(data) | PDFObject::HexString(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            PDFObject::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            PDFObject::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the number if it is a non-negative integer that fits in `u32`.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            PDFObject::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64 => {
                Some(*n as u32)
            }
            _ => None,
        }
    }

    /// Returns the dictionary of a dictionary or stream object.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            PDFObject::Dictionary(dict) => Some(dict),
            PDFObject::Stream(stream) => Some(&stream.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Arc<PDFStream>> {
        match self {
            PDFObject::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Box<PDFObject>]> {
        match self {
            PDFObject::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<Ref> {
        match self {
            PDFObject::Ref(r) => Some(*r),
            _ => None,
        }
    }

    /// Reads an array of numbers; `None` if any element is not a number.
    pub fn as_number_array(&self) -> Option<Vec<f64>> {
        self.as_array()?.iter().map(|item| item.as_number()).collect()
    }

    /// Builds an array object from plain values.
    pub fn array<I: IntoIterator<Item = PDFObject>>(items: I) -> PDFObject {
        PDFObject::Array(items.into_iter().map(Box::new).collect())
    }
}

/// Typed lookups on dictionaries.
pub trait DictExt {
    fn get_name(&self, key: &str) -> Option<&str>;
    fn get_number(&self, key: &str) -> Option<f64>;
    fn get_array(&self, key: &str) -> Option<&[Box<PDFObject>]>;
    fn get_dict(&self, key: &str) -> Option<&Dict>;
    fn get_ref(&self, key: &str) -> Option<Ref>;
}

impl DictExt for Dict {
    fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PDFObject::as_name)
    }

    fn get_number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(PDFObject::as_number)
    }

    fn get_array(&self, key: &str) -> Option<&[Box<PDFObject>]> {
        self.get(key).and_then(PDFObject::as_array)
    }

    fn get_dict(&self, key: &str) -> Option<&Dict> {
        self.get(key).and_then(PDFObject::as_dict)
    }

    fn get_ref(&self, key: &str) -> Option<Ref> {
        self.get(key).and_then(PDFObject::as_reference)
    }
}

/// Result of parsing `N G obj ... endobj`.
#[derive(Debug)]
pub enum IndirectObject {
    /// A plain value
    Object(PDFObject),

    /// A stream whose data starts at `data_start`; the caller resolves
    /// `/Length` (which may itself be indirect) and reads the bytes.
    StreamHeader { dict: Dict, data_start: usize },
}

/// Builds objects from lexer tokens.
///
/// Indirect references are recognised by looking ahead two tokens after an
/// integer and seeking back when the pattern does not match, so the lexer is
/// always left exactly after the last consumed token. This matters for
/// `stream` keywords, where binary data follows immediately.
pub struct Parser<'s> {
    lexer: Lexer<'s>,

    /// Content streams never contain references
    allow_refs: bool,
}

/// Maximum nesting of arrays and dictionaries.
const MAX_NESTING: usize = 256;

impl<'s> Parser<'s> {
    /// Creates a parser for file-level objects.
    pub fn new(lexer: Lexer<'s>) -> Self {
        Parser {
            lexer,
            allow_refs: true,
        }
    }

    /// Creates a parser for content streams: no `N G R` lookahead.
    pub fn for_content(lexer: Lexer<'s>) -> Self {
        Parser {
            lexer,
            allow_refs: false,
        }
    }

    pub fn lexer_mut(&mut self) -> &mut Lexer<'s> {
        &mut self.lexer
    }

    /// Returns the next object. Keywords come back as [`PDFObject::Command`]
    /// and the end of data as [`PDFObject::EOF`].
    pub fn get_object(&mut self) -> PDFResult<PDFObject> {
        let token = self.lexer.get_object()?;
        self.object_from_token(token, 0)
    }

    fn object_from_token(&mut self, token: Token, depth: usize) -> PDFResult<PDFObject> {
        if depth > MAX_NESTING {
            return Err(PDFError::Format("objects nested too deeply".into()));
        }
        Ok(match token {
            Token::EOF => PDFObject::EOF,
            Token::Boolean(b) => PDFObject::Boolean(b),
            Token::Null => PDFObject::Null,
            Token::Number(n) => self.maybe_ref(n)?,
            Token::String(s) => PDFObject::String(s),
            Token::HexString(s) => PDFObject::HexString(s),
            Token::Name(n) => PDFObject::Name(n),
            Token::Command(c) => PDFObject::Command(c),
            Token::ArrayStart => self.parse_array(depth + 1)?,
            Token::DictStart => PDFObject::Dictionary(self.parse_dict(depth + 1)?),
            Token::ArrayEnd | Token::DictEnd => {
                return Err(PDFError::Format(format!(
                    "unexpected {:?} at offset {}",
                    token,
                    self.lexer.position()
                )));
            }
        })
    }

    fn maybe_ref(&mut self, num: f64) -> PDFResult<PDFObject> {
        if !self.allow_refs || num < 0.0 || num.fract() != 0.0 {
            return Ok(PDFObject::Number(num));
        }
        let mark = self.lexer.position();
        if let Token::Number(generation) = self.lexer.get_object()? {
            if generation >= 0.0 && generation.fract() == 0.0 {
                if let Token::Command(cmd) = self.lexer.get_object()? {
                    if cmd == "R" {
                        return Ok(PDFObject::Ref(Ref::new(num as u32, generation as u32)));
                    }
                }
            }
        }
        self.lexer.seek(mark)?;
        Ok(PDFObject::Number(num))
    }

    fn parse_array(&mut self, depth: usize) -> PDFResult<PDFObject> {
        let mut items: SmallVec<[Box<PDFObject>; 4]> = SmallVec::new();
        loop {
            let token = self.lexer.get_object()?;
            match token {
                Token::ArrayEnd => break,
                Token::EOF => return Err(PDFError::Format("unterminated array".into())),
                other => {
                    let obj = self.object_from_token(other, depth)?;
                    if let PDFObject::Command(cmd) = &obj {
                        log::warn!("ignoring keyword '{}' inside array", cmd);
                        continue;
                    }
                    items.push(Box::new(obj));
                }
            }
        }
        Ok(PDFObject::Array(items))
    }

    fn parse_dict(&mut self, depth: usize) -> PDFResult<Dict> {
        let mut dict = Dict::default();
        loop {
            match self.lexer.get_object()? {
                Token::DictEnd => break,
                Token::EOF => return Err(PDFError::Format("unterminated dictionary".into())),
                Token::Name(key) => {
                    let token = self.lexer.get_object()?;
                    if token == Token::DictEnd {
                        // Key without value
                        break;
                    }
                    let value = self.object_from_token(token, depth)?;
                    match value {
                        PDFObject::EOF => {
                            return Err(PDFError::Format("unterminated dictionary".into()));
                        }
                        PDFObject::Command(cmd) => {
                            log::warn!("dictionary key /{} has keyword value '{}'", key, cmd);
                        }
                        PDFObject::Null => {}
                        value => {
                            dict.insert(key, value);
                        }
                    }
                }
                other => {
                    log::warn!("skipping non-name dictionary key {:?}", other);
                }
            }
        }
        Ok(dict)
    }

    /// Parses `N G obj <value> [stream | endobj]` at the current position.
    ///
    /// When `expected` is given the object number must match.
    pub fn parse_indirect_object(&mut self, expected: Option<Ref>) -> PDFResult<IndirectObject> {
        let num = match self.lexer.get_object()? {
            Token::Number(n) if n >= 0.0 => n as u32,
            other => {
                return Err(PDFError::Format(format!(
                    "expected object number, got {:?}",
                    other
                )));
            }
        };
        let generation = match self.lexer.get_object()? {
            Token::Number(g) if g >= 0.0 => g as u32,
            other => {
                return Err(PDFError::Format(format!(
                    "expected generation number, got {:?}",
                    other
                )));
            }
        };
        match self.lexer.get_object()? {
            Token::Command(cmd) if cmd == "obj" => {}
            other => {
                return Err(PDFError::Format(format!("expected 'obj', got {:?}", other)));
            }
        }
        if let Some(expected) = expected {
            if expected.num != num {
                return Err(PDFError::Format(format!(
                    "xref points at object {} {} instead of {}",
                    num, generation, expected
                )));
            }
        }

        let value = self.get_object()?;
        let PDFObject::Dictionary(dict) = value else {
            return Ok(IndirectObject::Object(value));
        };

        let mark = self.lexer.position();
        match self.lexer.get_object()? {
            Token::Command(cmd) if cmd == "stream" => {
                let data_start = self.lexer.skip_to_stream_data()?;
                Ok(IndirectObject::StreamHeader { dict, data_start })
            }
            _ => {
                self.lexer.seek(mark)?;
                Ok(IndirectObject::Object(PDFObject::Dictionary(dict)))
            }
        }
    }
}

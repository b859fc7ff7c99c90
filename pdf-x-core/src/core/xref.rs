use super::base_stream::BaseStream;
use super::decode::{self, Decoded};
use super::error::{PDFError, PDFResult};
use super::lexer::{Lexer, Token};
use super::parser::{Dict, DictExt, IndirectObject, PDFObject, PDFStream, Parser, Ref};
use super::stream::Stream;
use lru::LruCache;
use rustc_hash::{FxHashMap, FxHashSet};
use std::num::NonZeroUsize;
use std::ops::Deref;
use std::sync::Arc;

/// Upper bound on the number of xref entries accepted from a `/Size` or
/// subsection header.
const MAX_XREF_ENTRIES: usize = 8_388_608;

/// Default number of parsed objects kept in the fetch cache.
pub const DEFAULT_OBJECT_CACHE_SIZE: usize = 1024;

/// Cross-reference table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Object number is available for reuse
    Free { next_free: u64, generation: u32 },

    /// Object stored at a byte offset in the file
    Uncompressed { offset: u64, generation: u32 },

    /// Object stored inside an object stream
    Compressed { obj_stream_num: u32, index: u32 },
}

impl XRefEntry {
    pub fn is_free(&self) -> bool {
        matches!(self, XRefEntry::Free { .. })
    }

    pub fn generation(&self) -> u32 {
        match self {
            XRefEntry::Free { generation, .. } | XRefEntry::Uncompressed { generation, .. } => {
                *generation
            }
            XRefEntry::Compressed { .. } => 0,
        }
    }
}

/// An object resolved through [`XRef::fetch_if_ref`]: either the caller's own
/// value or a fetched, cached one.
pub enum Resolved<'o> {
    Borrowed(&'o PDFObject),
    Fetched(Arc<PDFObject>),
}

impl Deref for Resolved<'_> {
    type Target = PDFObject;

    fn deref(&self) -> &PDFObject {
        match self {
            Resolved::Borrowed(obj) => obj,
            Resolved::Fetched(obj) => obj,
        }
    }
}

/// A decoded object stream: shared data plus the `(object number, offset)`
/// header pairs.
struct ObjectStream {
    data: Arc<[u8]>,
    first: usize,
    offsets: Vec<(u32, usize)>,
}

/// One xref section read from the file, before merging.
struct XRefSection {
    entries: Vec<(u32, XRefEntry)>,
    trailer: Dict,
}

/// Cross-reference table and object loader.
///
/// Owns the document's byte stream. Objects are parsed on demand, cached in
/// an LRU, and can be replaced through overrides when the document is edited.
pub struct XRef {
    stream: Box<dyn BaseStream + Send>,

    /// Entries indexed by object number
    entries: Vec<Option<XRefEntry>>,

    /// Merged trailer (newest section wins)
    trailer: Dict,

    /// Offset of the newest xref section, `None` after reconstruction
    startxref: Option<usize>,

    cache: LruCache<u32, Arc<PDFObject>>,

    object_streams: FxHashMap<u32, Arc<ObjectStream>>,

    /// Objects replaced by edits, served before anything in the file
    overrides: FxHashMap<u32, (Ref, Arc<PDFObject>)>,

    /// Objects currently being loaded, to break reference cycles
    resolving: FxHashSet<u32>,

    /// Set when the table was rebuilt by scanning the file
    reconstructed: bool,
}

impl XRef {
    /// Loads the cross-reference data.
    ///
    /// Follows the `/Prev` chain from `startxref`; if that fails or yields no
    /// catalog, the table is rebuilt by scanning the whole file.
    pub fn open(
        stream: Box<dyn BaseStream + Send>,
        startxref: Option<usize>,
        cache_size: usize,
    ) -> PDFResult<Self> {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        let mut xref = XRef {
            stream,
            entries: Vec::new(),
            trailer: Dict::default(),
            startxref,
            cache: LruCache::new(capacity),
            object_streams: FxHashMap::default(),
            overrides: FxHashMap::default(),
            resolving: FxHashSet::default(),
            reconstructed: false,
        };

        let parsed = match startxref {
            Some(offset) => xref.parse_chain(offset),
            None => Err(PDFError::Format("startxref not found".into())),
        };

        let usable = match parsed {
            Ok(()) => xref.catalog_is_usable(),
            Err(e) => {
                log::warn!("xref chain unusable ({}), reconstructing", e);
                false
            }
        };
        if !usable {
            xref.reconstruct()?;
        }

        if xref.trailer.contains_key("Encrypt") {
            return Err(PDFError::Password(
                "encrypted documents are not supported".into(),
            ));
        }
        Ok(xref)
    }

    fn catalog_is_usable(&mut self) -> bool {
        match self.catalog() {
            Ok(catalog) => catalog.as_dict().is_some(),
            Err(e) => {
                log::warn!("catalog cannot be loaded: {}", e);
                false
            }
        }
    }

    /// Returns the trailer dictionary.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Offset of the newest xref section in the file.
    pub fn startxref(&self) -> Option<usize> {
        self.startxref
    }

    /// True when the table was rebuilt by scanning the file.
    pub fn is_reconstructed(&self) -> bool {
        self.reconstructed
    }

    /// Number of object slots, including the trailer's `/Size`.
    pub fn size(&self) -> u32 {
        let trailer_size = self.trailer.get("Size").and_then(PDFObject::as_u32).unwrap_or(0);
        let override_max = self.overrides.keys().map(|n| n + 1).max().unwrap_or(0);
        trailer_size.max(self.entries.len() as u32).max(override_max)
    }

    /// Total length of the underlying file.
    pub fn file_len(&self) -> usize {
        self.stream.length()
    }

    pub fn get_entry(&self, num: u32) -> Option<XRefEntry> {
        self.entries.get(num as usize).copied().flatten()
    }

    /// Fetches the document catalog (`/Root`).
    pub fn catalog(&mut self) -> PDFResult<Arc<PDFObject>> {
        let root = self
            .trailer
            .get_ref("Root")
            .ok_or_else(|| PDFError::Format("trailer has no /Root".into()))?;
        let catalog = self.fetch(root)?;
        if catalog.as_dict().is_none() {
            return Err(PDFError::Format(format!("catalog {} is not a dictionary", root)));
        }
        Ok(catalog)
    }

    // ========================================================================
    // Section parsing
    // ========================================================================

    fn parse_chain(&mut self, startxref: usize) -> PDFResult<()> {
        let mut visited = FxHashSet::default();
        let mut pending = vec![startxref];

        while let Some(offset) = pending.pop() {
            if !visited.insert(offset) {
                log::warn!("xref /Prev loop at offset {}", offset);
                continue;
            }
            let section = self.read_section(offset)?;

            for (num, entry) in section.entries {
                self.merge_entry(num, entry)?;
            }

            // Hybrid files: the table's /XRefStm is consulted before /Prev
            let prev = section.trailer.get("Prev").and_then(PDFObject::as_u32);
            let xref_stm = section.trailer.get("XRefStm").and_then(PDFObject::as_u32);

            for (key, value) in section.trailer {
                self.trailer.entry(key).or_insert(value);
            }

            if let Some(prev) = prev {
                pending.push(prev as usize);
            }
            if let Some(stm) = xref_stm {
                if visited.insert(stm as usize) {
                    match self.read_section(stm as usize) {
                        Ok(extra) => {
                            for (num, entry) in extra.entries {
                                self.merge_entry(num, entry)?;
                            }
                        }
                        Err(e) => log::warn!("ignoring broken /XRefStm at {}: {}", stm, e),
                    }
                }
            }
        }
        Ok(())
    }

    fn merge_entry(&mut self, num: u32, entry: XRefEntry) -> PDFResult<()> {
        let index = num as usize;
        if index >= MAX_XREF_ENTRIES {
            return Err(PDFError::Format(format!("object number {} out of range", num)));
        }
        if self.entries.len() <= index {
            self.entries.resize(index + 1, None);
        }
        // Newer sections are read first and win
        if self.entries[index].is_none() {
            self.entries[index] = Some(entry);
        }
        Ok(())
    }

    fn read_section(&mut self, offset: usize) -> PDFResult<XRefSection> {
        self.stream.set_pos(offset)?;
        let mut lexer = Lexer::new(&mut *self.stream)?;
        let mark = lexer.position();
        if lexer.get_object()? == Token::Command("xref".into()) {
            return Self::read_table(lexer);
        }
        lexer.seek(mark)?;

        let mut parser = Parser::new(lexer);
        let IndirectObject::StreamHeader { dict, data_start } =
            parser.parse_indirect_object(None)?
        else {
            return Err(PDFError::Format(format!(
                "no xref table or stream at offset {}",
                offset
            )));
        };
        drop(parser);

        if dict.get_name("Type") != Some("XRef") {
            return Err(PDFError::Format(format!(
                "object at offset {} is not an xref stream",
                offset
            )));
        }
        let stream = self.read_stream_body(dict, data_start)?;
        let decoded = self.decode_stream(&stream)?;
        let entries = Self::parse_xref_stream(&stream.dict, &decoded.data)?;
        let mut trailer = stream.dict.clone();
        trailer.remove("Length");
        trailer.remove("Filter");
        trailer.remove("DecodeParms");
        Ok(XRefSection { entries, trailer })
    }

    /// Parses a classic table whose `xref` keyword was just consumed.
    fn read_table(mut lexer: Lexer<'_>) -> PDFResult<XRefSection> {
        let mut entries = Vec::new();
        loop {
            let first = match lexer.get_object()? {
                Token::Command(cmd) if cmd == "trailer" => break,
                Token::Number(n) if n >= 0.0 => n as u32,
                other => {
                    return Err(PDFError::Format(format!(
                        "expected xref subsection or 'trailer', got {:?}",
                        other
                    )));
                }
            };
            let count = match lexer.get_object()? {
                Token::Number(n) if n >= 0.0 => n as usize,
                other => {
                    return Err(PDFError::Format(format!(
                        "expected xref subsection count, got {:?}",
                        other
                    )));
                }
            };
            if count > MAX_XREF_ENTRIES {
                return Err(PDFError::Format(format!("xref subsection of {} entries", count)));
            }

            for i in 0..count {
                let field = lexer.get_object()?;
                let generation = lexer.get_object()?;
                let kind = lexer.get_object()?;
                let (Token::Number(field), Token::Number(generation)) = (field, generation) else {
                    return Err(PDFError::Format("malformed xref entry".into()));
                };
                let entry = match kind {
                    Token::Command(k) if k == "n" => XRefEntry::Uncompressed {
                        offset: field as u64,
                        generation: generation as u32,
                    },
                    Token::Command(k) if k == "f" => XRefEntry::Free {
                        next_free: field as u64,
                        generation: generation as u32,
                    },
                    other => {
                        return Err(PDFError::Format(format!(
                            "expected 'n' or 'f' in xref entry, got {:?}",
                            other
                        )));
                    }
                };
                entries.push((first + i as u32, entry));
            }
        }

        let mut parser = Parser::new(lexer);
        let PDFObject::Dictionary(trailer) = parser.get_object()? else {
            return Err(PDFError::Format("trailer is not a dictionary".into()));
        };
        Ok(XRefSection { entries, trailer })
    }

    fn parse_xref_stream(dict: &Dict, data: &[u8]) -> PDFResult<Vec<(u32, XRefEntry)>> {
        let widths: Vec<usize> = dict
            .get("W")
            .and_then(PDFObject::as_number_array)
            .filter(|w| w.len() >= 3)
            .ok_or_else(|| PDFError::Format("xref stream without /W".into()))?
            .iter()
            .map(|w| *w as usize)
            .collect();
        if widths.iter().any(|w| *w > 8) {
            return Err(PDFError::Format("xref stream field wider than 8 bytes".into()));
        }
        let row_len: usize = widths.iter().sum();
        if row_len == 0 {
            return Err(PDFError::Format("xref stream with zero-width rows".into()));
        }

        let size = dict.get("Size").and_then(PDFObject::as_u32).unwrap_or(0);
        let index = dict
            .get("Index")
            .and_then(PDFObject::as_number_array)
            .unwrap_or_else(|| vec![0.0, size as f64]);

        let read_field = |row: &[u8], start: usize, width: usize| -> u64 {
            row[start..start + width]
                .iter()
                .fold(0u64, |acc, b| (acc << 8) | *b as u64)
        };

        let mut entries = Vec::new();
        let mut rows = data.chunks_exact(row_len);
        for pair in index.chunks(2) {
            let [start, count] = pair else {
                break;
            };
            for i in 0..(*count as u32) {
                let Some(row) = rows.next() else {
                    log::warn!("xref stream shorter than its /Index");
                    return Ok(entries);
                };
                let kind = if widths[0] == 0 { 1 } else { read_field(row, 0, widths[0]) };
                let f2 = read_field(row, widths[0], widths[1]);
                let f3 = read_field(row, widths[0] + widths[1], widths[2]);
                let entry = match kind {
                    0 => XRefEntry::Free {
                        next_free: f2,
                        generation: f3 as u32,
                    },
                    1 => XRefEntry::Uncompressed {
                        offset: f2,
                        generation: f3 as u32,
                    },
                    2 => XRefEntry::Compressed {
                        obj_stream_num: f2 as u32,
                        index: f3 as u32,
                    },
                    // Unknown types are treated as references to the null object
                    _ => continue,
                };
                entries.push((*start as u32 + i, entry));
            }
        }
        Ok(entries)
    }

    // ========================================================================
    // Object loading
    // ========================================================================

    /// Fetches an indirect object. Missing and free objects resolve to null.
    pub fn fetch(&mut self, r: Ref) -> PDFResult<Arc<PDFObject>> {
        if let Some((_, obj)) = self.overrides.get(&r.num) {
            return Ok(obj.clone());
        }
        if let Some(obj) = self.cache.get(&r.num) {
            return Ok(obj.clone());
        }
        if !self.resolving.insert(r.num) {
            return Err(PDFError::Format(format!("circular reference to {}", r)));
        }

        let loaded = match self.get_entry(r.num) {
            None | Some(XRefEntry::Free { .. }) => Ok(PDFObject::Null),
            Some(XRefEntry::Uncompressed { offset, .. }) => {
                self.fetch_uncompressed(r, offset as usize)
            }
            Some(XRefEntry::Compressed {
                obj_stream_num,
                index,
            }) => self.fetch_compressed(r, obj_stream_num, index as usize),
        };
        self.resolving.remove(&r.num);

        let obj = Arc::new(loaded?);
        self.cache.put(r.num, obj.clone());
        Ok(obj)
    }

    /// Resolves `obj` if it is a reference, otherwise borrows it.
    pub fn fetch_if_ref<'o>(&mut self, obj: &'o PDFObject) -> PDFResult<Resolved<'o>> {
        match obj {
            PDFObject::Ref(r) => Ok(Resolved::Fetched(self.fetch(*r)?)),
            other => Ok(Resolved::Borrowed(other)),
        }
    }

    /// Looks up `key` in `dict` and resolves it; missing keys give `None`.
    pub fn get_resolved(&mut self, dict: &Dict, key: &str) -> PDFResult<Option<Arc<PDFObject>>> {
        match dict.get(key) {
            None => Ok(None),
            Some(PDFObject::Ref(r)) => {
                let obj = self.fetch(*r)?;
                Ok((!obj.is_null()).then_some(obj))
            }
            Some(other) => Ok(Some(Arc::new(other.clone()))),
        }
    }

    fn fetch_uncompressed(&mut self, r: Ref, offset: usize) -> PDFResult<PDFObject> {
        self.stream.set_pos(offset)?;
        let mut parser = Parser::new(Lexer::new(&mut *self.stream)?);
        let parsed = parser.parse_indirect_object(Some(r))?;
        drop(parser);

        match parsed {
            IndirectObject::Object(obj) => Ok(obj),
            IndirectObject::StreamHeader { dict, data_start } => Ok(PDFObject::Stream(Arc::new(
                self.read_stream_body(dict, data_start)?,
            ))),
        }
    }

    fn fetch_compressed(&mut self, r: Ref, stream_num: u32, index: usize) -> PDFResult<PDFObject> {
        let obj_stream = self.object_stream(stream_num)?;

        let offset = match obj_stream.offsets.get(index) {
            Some((num, offset)) if *num == r.num => *offset,
            _ => obj_stream
                .offsets
                .iter()
                .find(|(num, _)| *num == r.num)
                .map(|(_, offset)| *offset)
                .ok_or_else(|| {
                    PDFError::Format(format!("{} not found in object stream {}", r, stream_num))
                })?,
        };

        let start = obj_stream.first + offset;
        if start > obj_stream.data.len() {
            return Err(PDFError::Format(format!("{} lies outside its object stream", r)));
        }
        let mut sub = Stream::sub_stream(
            obj_stream.data.clone(),
            start,
            obj_stream.data.len() - start,
        )?;
        let mut parser = Parser::new(Lexer::new(&mut sub)?);
        parser.get_object()
    }

    fn object_stream(&mut self, num: u32) -> PDFResult<Arc<ObjectStream>> {
        if let Some(cached) = self.object_streams.get(&num) {
            return Ok(cached.clone());
        }

        let obj = self.fetch(Ref::new(num, 0))?;
        let stream = obj
            .as_stream()
            .ok_or_else(|| PDFError::Format(format!("object stream {} is not a stream", num)))?;
        let count = stream.dict.get("N").and_then(PDFObject::as_u32).unwrap_or(0) as usize;
        let first = stream.dict.get("First").and_then(PDFObject::as_u32).unwrap_or(0) as usize;
        let decoded = self.decode_stream(stream)?;
        let data: Arc<[u8]> = Arc::from(decoded.data);

        let mut header = Stream::sub_stream(data.clone(), 0, first.min(data.len()))?;
        let mut parser = Parser::for_content(Lexer::new(&mut header)?);
        let mut offsets = Vec::with_capacity(count);
        for _ in 0..count {
            let (Some(obj_num), Some(offset)) = (
                parser.get_object()?.as_u32(),
                parser.get_object()?.as_u32(),
            ) else {
                break;
            };
            offsets.push((obj_num, offset as usize));
        }
        drop(parser);

        let obj_stream = Arc::new(ObjectStream {
            data,
            first,
            offsets,
        });
        self.object_streams.insert(num, obj_stream.clone());
        Ok(obj_stream)
    }

    /// Reads stream data starting at `data_start`.
    ///
    /// `/Length` is trusted when `endstream` follows it; otherwise the data
    /// runs up to the next `endstream` keyword.
    fn read_stream_body(&mut self, mut dict: Dict, data_start: usize) -> PDFResult<PDFStream> {
        let declared = match dict.get("Length") {
            Some(PDFObject::Number(n)) if *n >= 0.0 => Some(*n as usize),
            Some(PDFObject::Ref(r)) => {
                let r = *r;
                self.fetch(r)?.as_number().filter(|n| *n >= 0.0).map(|n| n as usize)
            }
            _ => None,
        };

        let file_len = self.stream.length();
        let length = match declared {
            Some(len) if self.endstream_follows(data_start.saturating_add(len))? => len,
            _ => {
                let end = self
                    .find_forward(data_start, b"endstream")?
                    .unwrap_or(file_len);
                let mut len = end.saturating_sub(data_start);
                // Drop the EOL in front of the keyword
                let tail = self.stream.get_byte_range(data_start + len.saturating_sub(2), end)?;
                if tail.ends_with(b"\r\n") {
                    len -= 2;
                } else if tail.ends_with(b"\n") || tail.ends_with(b"\r") {
                    len -= 1;
                }
                if declared.is_some() {
                    log::warn!("stream /Length is wrong, using {} bytes", len);
                }
                len
            }
        };

        let data = self.stream.get_byte_range(data_start, data_start + length)?;
        dict.insert("Length".into(), PDFObject::Number(data.len() as f64));
        Ok(PDFStream { dict, data })
    }

    fn endstream_follows(&mut self, pos: usize) -> PDFResult<bool> {
        if pos > self.stream.length() {
            return Ok(false);
        }
        let window = self.stream.get_byte_range(pos, pos + 32)?;
        let start = window
            .iter()
            .position(|b| !Lexer::is_whitespace(*b))
            .unwrap_or(window.len());
        Ok(window[start..].starts_with(b"endstream"))
    }

    /// Finds the next occurrence of `needle` at or after `from`.
    fn find_forward(&mut self, from: usize, needle: &[u8]) -> PDFResult<Option<usize>> {
        const WINDOW: usize = 8192;
        let len = self.stream.length();
        let mut pos = from;
        while pos < len {
            let block = self.stream.get_byte_range(pos, pos + WINDOW + needle.len())?;
            if let Some(i) = block.windows(needle.len()).position(|w| w == needle) {
                return Ok(Some(pos + i));
            }
            pos += WINDOW;
        }
        Ok(None)
    }

    /// Decodes a stream's filter chain, resolving indirect filter entries.
    pub fn decode_stream(&mut self, stream: &PDFStream) -> PDFResult<Decoded> {
        let filters = match stream.dict.get("Filter") {
            Some(obj) => self.fetch_if_ref(obj)?.deref().clone(),
            None => PDFObject::Null,
        };
        let params = match stream.dict.get("DecodeParms").or_else(|| stream.dict.get("DP")) {
            Some(obj) => self.fetch_if_ref(obj)?.deref().clone(),
            None => PDFObject::Null,
        };

        let names: Vec<String> = match &filters {
            PDFObject::Name(name) => vec![name.clone()],
            PDFObject::Array(items) => items
                .iter()
                .filter_map(|item| item.as_name().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        let mut chain = Vec::with_capacity(names.len());
        for (i, name) in names.into_iter().enumerate() {
            let param = match &params {
                PDFObject::Array(items) => items.get(i).map(|p| PDFObject::clone(p)),
                PDFObject::Null => None,
                single if i == 0 => Some(single.clone()),
                _ => None,
            };
            let param = match param {
                Some(obj) => self.fetch_if_ref(&obj)?.as_dict().cloned(),
                None => None,
            };
            chain.push((name, param));
        }
        decode::decode_filters(&stream.data, &chain)
    }

    /// Decodes a stream that must not end in an image codec.
    pub fn decode_stream_data(&mut self, stream: &PDFStream) -> PDFResult<Vec<u8>> {
        let decoded = self.decode_stream(stream)?;
        if let Some((codec, _)) = decoded.image_codec {
            return Err(PDFError::Unsupported(format!(
                "{:?} codec in a non-image stream",
                codec
            )));
        }
        Ok(decoded.data)
    }

    // ========================================================================
    // Reconstruction
    // ========================================================================

    /// Rebuilds the table by scanning for `N G obj` headers and trailers.
    fn reconstruct(&mut self) -> PDFResult<()> {
        log::warn!("reconstructing cross-reference table");
        let len = self.stream.length();
        let data = self.stream.get_byte_range(0, len)?;

        self.entries.clear();
        self.cache.clear();
        self.object_streams.clear();
        self.trailer = Dict::default();
        self.startxref = None;
        self.reconstructed = true;

        let mut trailers = Vec::new();
        let mut pos = 0;
        while let Some(found) = find(&data[pos..], b"obj").map(|i| pos + i) {
            pos = found + 3;
            if data.get(pos).is_some_and(|b| !Lexer::is_whitespace(*b) && !Lexer::is_delimiter(*b)) {
                continue;
            }
            if let Some((num, generation, start)) = object_header_before(&data, found) {
                let index = num as usize;
                if index >= MAX_XREF_ENTRIES {
                    continue;
                }
                if self.entries.len() <= index {
                    self.entries.resize(index + 1, None);
                }
                // Later definitions (incremental updates) win
                self.entries[index] = Some(XRefEntry::Uncompressed {
                    offset: start as u64,
                    generation,
                });
            }
        }

        let mut pos = 0;
        while let Some(found) = find(&data[pos..], b"trailer").map(|i| pos + i) {
            pos = found + 7;
            let mut sub = Stream::from_bytes(data[pos..].to_vec());
            let mut parser = Parser::new(Lexer::new(&mut sub)?);
            if let Ok(PDFObject::Dictionary(dict)) = parser.get_object() {
                trailers.push(dict);
            }
        }

        // Register objects living in object streams
        for num in 0..self.entries.len() as u32 {
            let Ok(obj) = self.fetch(Ref::new(num, 0)) else {
                continue;
            };
            let Some(stream) = obj.as_stream() else {
                continue;
            };
            match stream.dict.get_name("Type") {
                Some("ObjStm") => {
                    if let Ok(obj_stream) = self.object_stream(num) {
                        for (i, (member, _)) in obj_stream.offsets.iter().enumerate() {
                            let slot = *member as usize;
                            if slot >= MAX_XREF_ENTRIES {
                                continue;
                            }
                            if self.entries.len() <= slot {
                                self.entries.resize(slot + 1, None);
                            }
                            if self.entries[slot].is_none() {
                                self.entries[slot] = Some(XRefEntry::Compressed {
                                    obj_stream_num: num,
                                    index: i as u32,
                                });
                            }
                        }
                    }
                }
                Some("XRef") => trailers.push(stream.dict.clone()),
                _ => {}
            }
        }

        if let Some(trailer) = trailers.into_iter().rev().find(|t| t.contains_key("Root")) {
            self.trailer = trailer;
        }

        if self.catalog().is_err() {
            let mut root = None;
            for num in 0..self.entries.len() as u32 {
                if let Ok(obj) = self.fetch(Ref::new(num, 0)) {
                    if obj.as_dict().and_then(|d| d.get_name("Type")) == Some("Catalog") {
                        root = Some(Ref::new(num, 0));
                    }
                }
            }
            let root = root.ok_or_else(|| PDFError::Format("no document catalog found".into()))?;
            self.trailer.insert("Root".into(), PDFObject::Ref(root));
        }
        self.cache.clear();
        Ok(())
    }

    // ========================================================================
    // Editing
    // ========================================================================

    /// Replaces an object; the change is served by [`XRef::fetch`] and
    /// written by incremental saves.
    pub fn set_override(&mut self, r: Ref, obj: PDFObject) {
        self.cache.pop(&r.num);
        self.overrides.insert(r.num, (r, Arc::new(obj)));
    }

    /// Edited objects in object-number order.
    pub fn overrides(&self) -> Vec<(Ref, Arc<PDFObject>)> {
        let mut out: Vec<_> = self.overrides.values().cloned().collect();
        out.sort_by_key(|(r, _)| r.num);
        out
    }

    /// Reads the whole original file.
    pub fn read_all(&mut self) -> PDFResult<Vec<u8>> {
        let len = self.stream.length();
        self.stream.get_byte_range(0, len)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Given the offset of an `obj` keyword, walks back over `N G ` and returns
/// the object number, generation and header start.
fn object_header_before(data: &[u8], keyword: usize) -> Option<(u32, u32, usize)> {
    let mut i = keyword;
    let skip_ws = |i: &mut usize| {
        while *i > 0 && Lexer::is_whitespace(data[*i - 1]) {
            *i -= 1;
        }
    };
    let read_digits = |i: &mut usize| -> Option<u32> {
        let end = *i;
        while *i > 0 && data[*i - 1].is_ascii_digit() {
            *i -= 1;
        }
        if *i == end || end - *i > 10 {
            return None;
        }
        std::str::from_utf8(&data[*i..end]).ok()?.parse().ok()
    };

    skip_ws(&mut i);
    if i == keyword {
        return None;
    }
    let generation = read_digits(&mut i)?;
    let gen_start = i;
    skip_ws(&mut i);
    if i == gen_start {
        return None;
    }
    let num = read_digits(&mut i)?;
    if i > 0 && !Lexer::is_whitespace(data[i - 1]) && !Lexer::is_delimiter(data[i - 1]) {
        return None;
    }
    Some((num, generation, i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_header_before() {
        let data = b"junk\n12 0 obj\n<<>>";
        let keyword = find(data, b"obj").unwrap();
        assert_eq!(object_header_before(data, keyword), Some((12, 0, 5)));

        let data = b"x12 0 obj";
        let keyword = find(data, b"obj").unwrap();
        assert_eq!(object_header_before(data, keyword), None);
    }

    #[test]
    fn test_parse_xref_stream_rows() {
        let mut dict = Dict::default();
        dict.insert(
            "W".into(),
            PDFObject::array([1.0, 2.0, 1.0].map(PDFObject::Number)),
        );
        dict.insert("Size".into(), PDFObject::Number(3.0));
        let data = [0, 0, 0, 255, 1, 0, 15, 0, 2, 0, 5, 1];
        let entries = XRef::parse_xref_stream(&dict, &data).unwrap();
        assert_eq!(
            entries,
            vec![
                (
                    0,
                    XRefEntry::Free {
                        next_free: 0,
                        generation: 255
                    }
                ),
                (
                    1,
                    XRefEntry::Uncompressed {
                        offset: 15,
                        generation: 0
                    }
                ),
                (
                    2,
                    XRefEntry::Compressed {
                        obj_stream_num: 5,
                        index: 1
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_parse_xref_stream_with_index() {
        let mut dict = Dict::default();
        dict.insert(
            "W".into(),
            PDFObject::array([1.0, 1.0, 0.0].map(PDFObject::Number)),
        );
        dict.insert(
            "Index".into(),
            PDFObject::array([7.0, 1.0].map(PDFObject::Number)),
        );
        let entries = XRef::parse_xref_stream(&dict, &[1, 42]).unwrap();
        assert_eq!(
            entries,
            vec![(
                7,
                XRefEntry::Uncompressed {
                    offset: 42,
                    generation: 0
                }
            )]
        );
    }
}

use super::chunked_stream::ChunkedStream;
use super::error::{self, PDFError, PDFResult};
use super::file_access::{FileAccess, MemoryAccess};
use super::page::{Page, PageGeometry};
use super::parser::{Dict, DictExt, PDFObject, Ref};
use super::writer::PDFWriter;
use super::xref::XRef;
use crate::library;
use rustc_hash::FxHashSet;
use std::io::Write;

/// How far from the end of the file `startxref` is searched for.
const STARTXREF_SEARCH_WINDOW: usize = 1024;

/// Deepest page tree accepted.
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// PDF document reader.
///
/// The entry point for reading a document: it owns the cross-reference table
/// and the flattened page tree. Every public operation records its outcome
/// in the per-thread [`last_error`](super::error::last_error).
pub struct PDFDocument {
    /// The cross-reference table
    xref: XRef,

    /// Page objects in document order
    pages: Vec<Ref>,
}

impl PDFDocument {
    /// Loads a document from a file access adapter.
    ///
    /// The engine must be initialized; chunk and cache sizes come from its
    /// configuration.
    pub fn load(access: Box<dyn FileAccess>) -> PDFResult<Self> {
        error::track(Self::load_inner(access))
    }

    /// Loads a document held in memory.
    pub fn load_memory(data: Vec<u8>) -> PDFResult<Self> {
        Self::load(Box::new(MemoryAccess::new(data)))
    }

    fn load_inner(access: Box<dyn FileAccess>) -> PDFResult<Self> {
        let config = library::config().ok_or(PDFError::NotInitialized)?;
        if access.file_len() == 0 {
            return Err(PDFError::Format("empty file".into()));
        }

        let mut stream = ChunkedStream::new(
            access,
            Some(config.chunk_size),
            Some(config.max_cached_chunks),
        );
        let startxref = Self::find_startxref(&mut stream)?;
        let mut xref = XRef::open(Box::new(stream), startxref, config.max_object_cache)?;
        let pages = Self::collect_pages(&mut xref)?;
        log::debug!(
            "document loaded: {} pages{}",
            pages.len(),
            if xref.is_reconstructed() { " (reconstructed xref)" } else { "" }
        );
        Ok(PDFDocument { xref, pages })
    }

    /// Finds the offset after the last `startxref` keyword near the end of
    /// the file.
    ///
    /// ```text
    /// startxref
    /// 12345
    /// %%EOF
    /// ```
    fn find_startxref(stream: &mut ChunkedStream) -> PDFResult<Option<usize>> {
        use super::base_stream::BaseStream;

        let len = stream.length();
        let tail_start = len.saturating_sub(STARTXREF_SEARCH_WINDOW);
        let tail = stream.get_byte_range(tail_start, len)?;

        let keyword = b"startxref";
        let Some(pos) = tail.windows(keyword.len()).rposition(|w| w == keyword) else {
            return Ok(None);
        };
        let digits: String = tail[pos + keyword.len()..]
            .iter()
            .skip_while(|b| b.is_ascii_whitespace())
            .take_while(|b| b.is_ascii_digit())
            .map(|b| *b as char)
            .collect();
        Ok(digits.parse::<usize>().ok().filter(|offset| *offset < len))
    }

    /// Flattens the page tree into page references, depth first.
    fn collect_pages(xref: &mut XRef) -> PDFResult<Vec<Ref>> {
        let catalog = xref.catalog()?;
        let root = catalog
            .as_dict()
            .and_then(|c| c.get_ref("Pages"))
            .ok_or_else(|| PDFError::Format("catalog has no /Pages reference".into()))?;

        let mut pages = Vec::new();
        let mut visited = FxHashSet::default();
        // (node, depth), kids pushed in reverse to keep document order
        let mut stack = vec![(root, 0usize)];
        while let Some((node_ref, depth)) = stack.pop() {
            if !visited.insert(node_ref) {
                log::warn!("page tree cycle at {}", node_ref);
                continue;
            }
            if depth > MAX_PAGE_TREE_DEPTH {
                return Err(PDFError::Format("page tree too deep".into()));
            }
            let node = xref.fetch(node_ref)?;
            let Some(dict) = node.as_dict() else {
                log::warn!("page tree node {} is not a dictionary", node_ref);
                continue;
            };

            let is_pages = dict.get_name("Type") == Some("Pages")
                || (dict.get_name("Type") != Some("Page") && dict.contains_key("Kids"));
            if !is_pages {
                pages.push(node_ref);
                continue;
            }
            let kids = match dict.get("Kids") {
                Some(kids) => xref.fetch_if_ref(kids)?.as_array().map(|k| k.to_vec()),
                None => None,
            };
            for kid in kids.unwrap_or_default().iter().rev() {
                match kid.as_reference() {
                    Some(r) => stack.push((r, depth + 1)),
                    None => log::warn!("ignoring direct object in /Kids of {}", node_ref),
                }
            }
        }
        Ok(pages)
    }

    pub fn xref(&self) -> &XRef {
        &self.xref
    }

    pub fn xref_mut(&mut self) -> &mut XRef {
        &mut self.xref
    }

    /// Returns the document catalog.
    pub fn catalog(&mut self) -> PDFResult<Dict> {
        let catalog = self.xref.catalog()?;
        Ok(catalog.as_dict().cloned().unwrap_or_default())
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_ref(&self, index: usize) -> PDFResult<Ref> {
        self.pages
            .get(index)
            .copied()
            .ok_or(PDFError::PageNotFound { index })
    }

    /// Loads a page and parses its content.
    pub fn load_page(&mut self, index: usize) -> PDFResult<Page> {
        let result = self
            .page_ref(index)
            .and_then(|r| Page::load(&mut self.xref, index, r));
        error::track(result)
    }

    /// Width and height of a page in points, without loading its content.
    ///
    /// Fails for a page whose explicit MediaBox is malformed or empty.
    pub fn page_size_by_index(&mut self, index: usize) -> PDFResult<(f64, f64)> {
        let result = self.page_ref(index).and_then(|r| {
            let obj = self.xref.fetch(r)?;
            let dict = obj
                .as_dict()
                .ok_or_else(|| PDFError::Format(format!("page {} is not a dictionary", r)))?;
            PageGeometry::resolve(&mut self.xref, dict)?.size()
        });
        error::track(result)
    }

    /// Whether printing should scale content to the paper. False only when
    /// `/ViewerPreferences /PrintScaling` is `/None`.
    pub fn viewer_pref_print_scaling(&mut self) -> bool {
        let Ok(catalog) = self.catalog() else {
            return true;
        };
        let prefs = match self.xref.get_resolved(&catalog, "ViewerPreferences") {
            Ok(Some(prefs)) => prefs,
            _ => return true,
        };
        prefs
            .as_dict()
            .and_then(|p| p.get_name("PrintScaling"))
            .is_none_or(|scaling| scaling != "None")
    }

    /// The resolved `/OCProperties` dictionary, if the document has layers.
    pub fn oc_properties(&mut self) -> PDFResult<Option<Dict>> {
        let catalog = self.catalog()?;
        let props = self.xref.get_resolved(&catalog, "OCProperties")?;
        Ok(props.and_then(|p| p.as_dict().cloned()))
    }

    /// Removes a page from the page tree and returns the new page count.
    ///
    /// The parent's `/Kids` and every ancestor's `/Count` are rewritten as
    /// edits; they are persisted by [`PDFDocument::save_incremental`].
    pub fn remove_page(&mut self, index: usize) -> PDFResult<usize> {
        let result = self.remove_page_inner(index);
        error::track(result)
    }

    fn remove_page_inner(&mut self, index: usize) -> PDFResult<usize> {
        let page_ref = self.page_ref(index)?;
        let page = self.xref.fetch(page_ref)?;
        let parent_ref = page
            .as_dict()
            .and_then(|d| d.get_ref("Parent"))
            .ok_or_else(|| PDFError::Format(format!("page {} has no /Parent", page_ref)))?;

        let parent = self.xref.fetch(parent_ref)?;
        let mut parent_dict = parent
            .as_dict()
            .cloned()
            .ok_or_else(|| PDFError::Format(format!("page node {} is not a dictionary", parent_ref)))?;
        let kids = match parent_dict.get("Kids") {
            Some(kids) => self.xref.fetch_if_ref(kids)?.as_array().map(|k| k.to_vec()),
            None => None,
        }
        .unwrap_or_default();
        let remaining: Vec<PDFObject> = kids
            .into_iter()
            .filter(|kid| kid.as_reference() != Some(page_ref))
            .map(|kid| *kid)
            .collect();
        parent_dict.insert("Kids".into(), PDFObject::array(remaining));

        // Walk up the tree decrementing /Count
        let mut visited = FxHashSet::default();
        let mut node_ref = Some(parent_ref);
        let mut node_dict = Some(parent_dict);
        while let (Some(r), Some(mut dict)) = (node_ref, node_dict.take()) {
            if !visited.insert(r) {
                break;
            }
            let count = dict.get_number("Count").unwrap_or(1.0);
            dict.insert("Count".into(), PDFObject::Number((count - 1.0).max(0.0)));
            node_ref = dict.get_ref("Parent");
            self.xref.set_override(r, PDFObject::Dictionary(dict));
            if let Some(next) = node_ref {
                node_dict = self.xref.fetch(next)?.as_dict().cloned();
            }
        }

        self.pages.remove(index);
        log::debug!("removed page {} ({}), {} left", index, page_ref, self.pages.len());
        Ok(self.pages.len())
    }

    /// Writes the original file followed by an incremental update holding
    /// every edit made through this document.
    pub fn save_incremental<W: Write>(&mut self, out: &mut W) -> PDFResult<()> {
        let result = self.save_incremental_inner(out);
        error::track(result)
    }

    fn save_incremental_inner<W: Write>(&mut self, out: &mut W) -> PDFResult<()> {
        let Some(prev) = self.xref.startxref() else {
            return Err(PDFError::Unsupported(
                "cannot append an update to a file with a damaged xref".into(),
            ));
        };
        let original = self.xref.read_all()?;
        let changed = self.xref.overrides();
        let size = self.xref.size();
        let trailer = self.xref.trailer().clone();
        PDFWriter::write_incremental_update(&original, &changed, &trailer, size, prev, out)
    }
}

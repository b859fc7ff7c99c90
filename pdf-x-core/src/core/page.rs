use super::content_stream::{self, Operation};
use super::error::{PDFError, PDFResult};
use super::parser::{Dict, DictExt, PDFObject, Ref};
use super::xref::XRef;
use crate::rendering::matrix::Matrix;
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// US Letter, used when no page box is inherited.
pub const LETTER: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Longest `/Parent` chain followed when resolving inherited attributes.
const MAX_INHERITANCE_DEPTH: usize = 64;

/// Page boxes and rotation, resolved through the page tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// `[x0, y0, x1, y1]`, normalized so `x0 <= x1` and `y0 <= y1`
    pub media_box: [f64; 4],

    /// MediaBox intersected with CropBox
    pub view_box: [f64; 4],

    /// Clockwise rotation: 0, 90, 180 or 270
    pub rotate: i32,

    /// False when an explicit MediaBox is malformed or has no area
    pub valid: bool,
}

impl PageGeometry {
    /// Resolves the geometry of a page dictionary.
    pub fn resolve(xref: &mut XRef, page_dict: &Dict) -> PDFResult<Self> {
        let media = inherited(xref, page_dict, "MediaBox")?;
        let (media_box, valid) = match &media {
            None => (LETTER, true),
            Some(obj) => match normalize_rect(obj) {
                Some(rect) if rect[2] > rect[0] && rect[3] > rect[1] => (rect, true),
                Some(rect) => (rect, false),
                None => ([0.0; 4], false),
            },
        };

        let crop_box = inherited(xref, page_dict, "CropBox")?
            .as_ref()
            .and_then(normalize_rect)
            .unwrap_or(media_box);
        let intersection = [
            media_box[0].max(crop_box[0]),
            media_box[1].max(crop_box[1]),
            media_box[2].min(crop_box[2]),
            media_box[3].min(crop_box[3]),
        ];
        let view_box = if intersection[2] > intersection[0] && intersection[3] > intersection[1] {
            intersection
        } else {
            media_box
        };

        let rotate = inherited(xref, page_dict, "Rotate")?
            .and_then(|obj| obj.as_number())
            .map(|r| r as i32)
            .unwrap_or(0);
        let rotate = if rotate % 90 == 0 { rotate.rem_euclid(360) } else { 0 };

        Ok(PageGeometry {
            media_box,
            view_box,
            rotate,
            valid,
        })
    }

    /// Displayed width and height in points, accounting for rotation.
    pub fn size(&self) -> PDFResult<(f64, f64)> {
        if !self.valid {
            return Err(PDFError::Format(format!(
                "degenerate page box {:?}",
                self.media_box
            )));
        }
        let w = self.view_box[2] - self.view_box[0];
        let h = self.view_box[3] - self.view_box[1];
        Ok(if self.rotate % 180 == 0 { (w, h) } else { (h, w) })
    }

    /// Maps user space to page space: the view box origin moves to (0, 0)
    /// and the rotation is applied, so the displayed page spans
    /// `[0, width] x [0, height]`.
    pub fn page_matrix(&self) -> Matrix {
        let [x0, y0, x1, y1] = self.view_box;
        let (w, h) = (x1 - x0, y1 - y0);
        match self.rotate {
            90 => Matrix::new(0.0, -1.0, 1.0, 0.0, -y0, x0 + w),
            180 => Matrix::new(-1.0, 0.0, 0.0, -1.0, x0 + w, y0 + h),
            270 => Matrix::new(0.0, 1.0, -1.0, 0.0, y0 + h, -x0),
            _ => Matrix::new(1.0, 0.0, 0.0, 1.0, -x0, -y0),
        }
    }
}

/// A loaded page: its dictionary, geometry, resources and parsed content.
#[derive(Debug, Clone)]
pub struct Page {
    index: usize,
    page_ref: Ref,
    dict: Dict,
    geometry: PageGeometry,
    resources: Dict,
    operations: Arc<[Operation]>,
}

impl Page {
    /// Loads the page at `index` whose dictionary is object `page_ref`.
    ///
    /// Content streams that fail to decode are skipped with a warning.
    pub fn load(xref: &mut XRef, index: usize, page_ref: Ref) -> PDFResult<Self> {
        let obj = xref.fetch(page_ref)?;
        let dict = obj
            .as_dict()
            .cloned()
            .ok_or_else(|| PDFError::Format(format!("page {} is not a dictionary", page_ref)))?;

        let geometry = PageGeometry::resolve(xref, &dict)?;
        let resources = match inherited(xref, &dict, "Resources")? {
            Some(PDFObject::Dictionary(d)) => d,
            Some(_) | None => Dict::default(),
        };
        let content = Self::read_contents(xref, &dict)?;
        let operations: Arc<[Operation]> = content_stream::parse_content(&content).into();
        log::debug!(
            "loaded page {} ({}): {} operations",
            index,
            page_ref,
            operations.len()
        );

        Ok(Page {
            index,
            page_ref,
            dict,
            geometry,
            resources,
            operations,
        })
    }

    /// Concatenates the page's content streams.
    fn read_contents(xref: &mut XRef, dict: &Dict) -> PDFResult<Vec<u8>> {
        let Some(contents) = dict.get("Contents") else {
            return Ok(Vec::new());
        };
        let contents = xref.fetch_if_ref(contents)?;
        let parts: Vec<PDFObject> = match &*contents {
            PDFObject::Array(items) => items.iter().map(|i| PDFObject::clone(i)).collect(),
            other => vec![other.clone()],
        };

        let mut data = Vec::new();
        for part in parts {
            let part = xref.fetch_if_ref(&part)?;
            let Some(stream) = part.as_stream() else {
                continue;
            };
            match xref.decode_stream_data(stream) {
                Ok(bytes) => {
                    data.extend_from_slice(&bytes);
                    data.push(b'\n');
                }
                Err(e) => log::warn!("skipping undecodable content stream: {}", e),
            }
        }
        Ok(data)
    }

    /// Returns the page index (0-based).
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn reference(&self) -> Ref {
        self.page_ref
    }

    pub fn dict(&self) -> &Dict {
        &self.dict
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    /// Width in points after rotation; 0 for a degenerate page box.
    pub fn width(&self) -> f64 {
        self.geometry.size().map(|(w, _)| w).unwrap_or(0.0)
    }

    /// Height in points after rotation; 0 for a degenerate page box.
    pub fn height(&self) -> f64 {
        self.geometry.size().map(|(_, h)| h).unwrap_or(0.0)
    }

    pub fn rotation(&self) -> i32 {
        self.geometry.rotate
    }

    pub fn page_matrix(&self) -> Matrix {
        self.geometry.page_matrix()
    }

    pub fn resources(&self) -> &Dict {
        &self.resources
    }

    /// The parsed content stream, shared with render contexts.
    pub fn operations(&self) -> Arc<[Operation]> {
        self.operations.clone()
    }
}

/// Resolves an inheritable attribute by walking the `/Parent` chain. The
/// nearest definition wins.
pub(crate) fn inherited(xref: &mut XRef, dict: &Dict, key: &str) -> PDFResult<Option<PDFObject>> {
    if let Some(value) = dict.get(key) {
        return Ok(Some(PDFObject::clone(&*xref.fetch_if_ref(value)?)));
    }

    let mut visited = FxHashSet::default();
    let mut parent = dict.get_ref("Parent");
    while let Some(r) = parent {
        if !visited.insert(r) || visited.len() > MAX_INHERITANCE_DEPTH {
            log::warn!("page tree loop while looking up /{}", key);
            return Ok(None);
        }
        let node = xref.fetch(r)?;
        let Some(node) = node.as_dict() else {
            return Ok(None);
        };
        if let Some(value) = node.get(key) {
            return Ok(Some(PDFObject::clone(&*xref.fetch_if_ref(value)?)));
        }
        parent = node.get_ref("Parent");
    }
    Ok(None)
}

/// Reads `[x0 y0 x1 y1]` and orders the corners.
pub(crate) fn normalize_rect(obj: &PDFObject) -> Option<[f64; 4]> {
    let values = obj.as_number_array()?;
    let [a, b, c, d] = values.get(..4)? else {
        return None;
    };
    Some([a.min(*c), b.min(*d), a.max(*c), b.max(*d)])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(view_box: [f64; 4], rotate: i32) -> PageGeometry {
        PageGeometry {
            media_box: view_box,
            view_box,
            rotate,
            valid: true,
        }
    }

    #[test]
    fn test_normalize_rect() {
        let rect = PDFObject::array([612.0, 792.0, 0.0, 0.0].map(PDFObject::Number));
        assert_eq!(normalize_rect(&rect), Some([0.0, 0.0, 612.0, 792.0]));
        let short = PDFObject::array([1.0, 2.0].map(PDFObject::Number));
        assert_eq!(normalize_rect(&short), None);
    }

    #[test]
    fn test_rotated_size() {
        let g = geometry([0.0, 0.0, 612.0, 792.0], 90);
        assert_eq!(g.size().unwrap(), (792.0, 612.0));
        let g = geometry([0.0, 0.0, 612.0, 792.0], 180);
        assert_eq!(g.size().unwrap(), (612.0, 792.0));
    }

    #[test]
    fn test_degenerate_box_fails_size() {
        let mut g = geometry([0.0, 0.0, 0.0, 792.0], 0);
        g.valid = false;
        assert!(matches!(g.size(), Err(PDFError::Format(_))));
    }

    #[test]
    fn test_page_matrix_maps_view_box_corners() {
        let view = [10.0, 20.0, 110.0, 220.0];
        for (rotate, expected_origin) in [(0, (0.0, 0.0)), (90, (0.0, 100.0)), (180, (100.0, 200.0)), (270, (200.0, 0.0))] {
            let m = geometry(view, rotate).page_matrix();
            let (x, y) = m.apply(10.0, 20.0);
            assert!(
                (x - expected_origin.0).abs() < 1e-9 && (y - expected_origin.1).abs() < 1e-9,
                "rotate {}: ({}, {})",
                rotate,
                x,
                y
            );
        }
    }
}

//! Page-level geometry
//!
//! Placement clamping and the coordinate mapper both need the page's
//! MediaBox, which may be inherited anywhere up the page tree.

use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::Serialize;

/// Inheritable page attributes (ISO 32000-1, 7.7.3.4)
pub(crate) const INHERITABLE_KEYS: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Guard against malformed cyclic page trees
const MAX_TREE_DEPTH: usize = 64;

/// Information about a single PDF page
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Page number (1-indexed)
    pub page_num: u32,
    /// Lower-left corner of the MediaBox
    pub origin_x: f64,
    pub origin_y: f64,
    /// Page width in points (1 point = 1/72 inch)
    pub width: f64,
    /// Page height in points
    pub height: f64,
    /// Page rotation in degrees (0, 90, 180, 270)
    pub rotation: i32,
}

impl PageInfo {
    /// Extract page info from a document
    pub fn from_document(doc: &Document, page_num: u32) -> Option<Self> {
        let page_id = *doc.get_pages().get(&page_num)?;
        Self::from_page_id(doc, page_num, page_id)
    }

    pub(crate) fn from_page_id(doc: &Document, page_num: u32, page_id: ObjectId) -> Option<Self> {
        let page_dict = doc.get_object(page_id).ok()?.as_dict().ok()?;

        let [x1, y1, x2, y2] = inherited_attribute(doc, page_dict, b"MediaBox")
            .and_then(|obj| resolve(doc, obj).as_array().ok())
            .and_then(|array| parse_box_array(array))
            // Default to US Letter size
            .unwrap_or([0.0, 0.0, 612.0, 792.0]);

        let rotation = inherited_attribute(doc, page_dict, b"Rotate")
            .and_then(|obj| resolve(doc, obj).as_i64().ok())
            .map(|angle| normalize_rotation(angle as i32))
            .unwrap_or(0);

        Some(Self {
            page_num,
            origin_x: x1.min(x2),
            origin_y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
            rotation,
        })
    }

    /// Width and height as the page is shown, after `/Rotate`
    pub fn displayed_size(&self) -> (f64, f64) {
        match self.rotation {
            90 | 270 => (self.height, self.width),
            _ => (self.width, self.height),
        }
    }

    /// Map a point on the displayed page back onto the unrotated MediaBox.
    ///
    /// Both points are relative to the lower-left corner with Y up. `/Rotate`
    /// turns the page clockwise for display.
    pub fn unrotate(&self, x: f64, y: f64) -> (f64, f64) {
        match self.rotation {
            90 => (self.width - y, x),
            180 => (self.width - x, self.height - y),
            270 => (y, self.height - x),
            _ => (x, y),
        }
    }

    /// Clamp a point given relative to the MediaBox corner into page bounds
    pub fn clamp(&self, x: f64, y: f64) -> (f64, f64) {
        let x = if x.is_finite() { x } else { 0.0 };
        let y = if y.is_finite() { y } else { 0.0 };
        (x.clamp(0.0, self.width), y.clamp(0.0, self.height))
    }
}

/// Look up a page attribute, walking up the `Parent` chain when absent
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = page_dict;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        let parent_id = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_object(parent_id).ok()?.as_dict().ok()?;
    }
    None
}

/// Follow a single indirect reference
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

/// Parse a box array [x1, y1, x2, y2]
fn parse_box_array(array: &[Object]) -> Option<[f64; 4]> {
    if array.len() != 4 {
        return None;
    }

    let mut result = [0.0; 4];
    for (i, obj) in array.iter().enumerate() {
        result[i] = match obj {
            Object::Integer(n) => *n as f64,
            Object::Real(n) => *n as f64,
            _ => return None,
        };
    }
    Some(result)
}

/// Normalize rotation to 0, 90, 180, or 270
fn normalize_rotation(angle: i32) -> i32 {
    angle.rem_euclid(360)
}

//! Seal stamping
//!
//! Seals are added as `/Stamp` annotations whose normal appearance is a Form
//! XObject from [`render_seal`]. Page content streams are left untouched.
//! Riding seals are split into two half-width annotations, one on each page
//! of every seam, sharing the same cut line.

use std::collections::{BTreeMap, HashMap};

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use serde::Serialize;

use crate::cancel::{self, CancelFlag};
use crate::document::{
    find_seams, read_page_origins, DocumentId, MergedDocument, PageOrigin, StampedDocument,
};
use crate::error::SealJoinError;
use crate::page_info::PageInfo;
use crate::placement::SealPlacement;
use crate::seal::{
    render_seal, utf16_text_string, SealAppearance, SealCatalog, SealDefinition, SealId,
};
use crate::store::ObjectStore;

/// Annotation flags: Print (bit 3) and Locked (bit 8)
const STAMP_FLAGS: i64 = 4 | 128;

/// Non-fatal outcomes of a stamp request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StampNotice {
    /// A riding placement on a document with no seams; nothing was drawn
    RidingWithoutSeam { index: usize, seal_id: SealId },
    /// Coordinates were pulled back onto the page
    Clamped {
        index: usize,
        page: u32,
        requested_x: f64,
        requested_y: f64,
        x: f64,
        y: f64,
    },
}

/// Which part of a seal an annotation shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slice {
    Whole,
    Left,
    Right,
}

impl Slice {
    /// Horizontal extent relative to the cut line or centre
    fn span(self, size: f64) -> (f64, f64) {
        match self {
            Slice::Whole => (-size / 2.0, size / 2.0),
            Slice::Left => (-size / 2.0, 0.0),
            Slice::Right => (0.0, size / 2.0),
        }
    }

    fn bbox(self, size: f64) -> [f64; 4] {
        match self {
            Slice::Whole => [0.0, 0.0, size, size],
            Slice::Left => [0.0, 0.0, size / 2.0, size],
            Slice::Right => [size / 2.0, 0.0, size, size],
        }
    }

    fn name(self) -> &'static str {
        match self {
            Slice::Whole => "whole",
            Slice::Left => "left",
            Slice::Right => "right",
        }
    }
}

/// Draws seals onto merged documents and publishes the stamped copy
pub struct StampEngine<'a> {
    store: &'a dyn ObjectStore,
    catalog: &'a dyn SealCatalog,
    cancel: Option<&'a CancelFlag>,
}

impl<'a> StampEngine<'a> {
    pub fn new(store: &'a dyn ObjectStore, catalog: &'a dyn SealCatalog) -> Self {
        Self {
            store,
            catalog,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: Option<&'a CancelFlag>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Stamp a stored document, recovering its page-origin map from the bytes
    pub fn stamp(
        &self,
        merged_id: &DocumentId,
        placements: &[SealPlacement],
    ) -> Result<StampedDocument, SealJoinError> {
        let bytes = self.store.get(merged_id)?;
        let doc = load(&bytes)?;
        // Documents that never went through a merge count as one source
        let origins = read_page_origins(&doc).unwrap_or_else(|| {
            (0..doc.get_pages().len() as u32)
                .map(|i| PageOrigin::new(merged_id.clone(), i, 0))
                .collect()
        });
        self.stamp_document(merged_id, doc, &origins, placements)
    }

    /// Stamp an in-memory merge result using its origin map
    pub fn stamp_merged(
        &self,
        merged: &MergedDocument,
        placements: &[SealPlacement],
    ) -> Result<StampedDocument, SealJoinError> {
        let doc = load(&merged.bytes)?;
        self.stamp_document(&merged.id, doc, &merged.page_origins, placements)
    }

    fn stamp_document(
        &self,
        source: &DocumentId,
        mut doc: Document,
        origins: &[PageOrigin],
        placements: &[SealPlacement],
    ) -> Result<StampedDocument, SealJoinError> {
        let pages = doc.get_pages();
        let page_count = pages.len() as u32;
        if origins.len() as u32 != page_count {
            return Err(SealJoinError::InternalInvariantViolation(format!(
                "page-origin map has {} entries for {} pages",
                origins.len(),
                page_count
            )));
        }

        let seals = self.validate(placements, page_count)?;
        let seams = find_seams(origins);

        let mut renderer = AppearanceCache::default();
        let mut applied = Vec::with_capacity(placements.len());
        let mut notices = Vec::new();

        for (index, (placement, seal)) in placements.iter().zip(&seals).enumerate() {
            cancel::check(self.cancel)?;

            let target_id = page_id(&pages, placement.page)?;
            let info = page_info(&doc, placement.page, target_id)?;
            let (x, y) = info.clamp(placement.x, placement.y);
            if (x, y) != (placement.x, placement.y) {
                tracing::warn!(
                    index,
                    page = placement.page,
                    requested_x = placement.x,
                    requested_y = placement.y,
                    x,
                    y,
                    "clamped seal placement onto page"
                );
                notices.push(StampNotice::Clamped {
                    index,
                    page: placement.page,
                    requested_x: placement.x,
                    requested_y: placement.y,
                    x,
                    y,
                });
            }
            applied.push(SealPlacement {
                x,
                y,
                ..placement.clone()
            });

            if !placement.riding {
                let appearance = renderer.xobject(&mut doc, seal, Slice::Whole)?;
                draw(&mut doc, &info, target_id, seal, appearance, Slice::Whole, (x, y), index)?;
                continue;
            }

            if seams.is_empty() {
                tracing::warn!(
                    index,
                    seal_id = %seal.id,
                    "riding seal requested on a document without seams"
                );
                notices.push(StampNotice::RidingWithoutSeam {
                    index,
                    seal_id: seal.id,
                });
                continue;
            }

            for seam in &seams {
                let halves = [(seam.left_page, Slice::Left), (seam.right_page, Slice::Right)];
                for (page, slice) in halves {
                    let seam_page_id = page_id(&pages, page)?;
                    let seam_info = page_info(&doc, page, seam_page_id)?;
                    let at = seam_info.clamp(x, y);
                    let appearance = renderer.xobject(&mut doc, seal, slice)?;
                    draw(&mut doc, &seam_info, seam_page_id, seal, appearance, slice, at, index)?;
                }
            }
        }

        doc.compress();
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).map_err(|e| {
            SealJoinError::OperationError(format!("Failed to save stamped PDF: {}", e))
        })?;

        cancel::check(self.cancel)?;
        let id = self.store.put(bytes.clone())?;
        tracing::info!(
            stamped_id = %id,
            source = %source,
            placements = applied.len(),
            notices = notices.len(),
            "published stamped document"
        );

        Ok(StampedDocument {
            id,
            bytes,
            placements: applied,
            source: source.clone(),
            notices,
        })
    }

    /// Check every placement before anything is drawn
    fn validate(
        &self,
        placements: &[SealPlacement],
        page_count: u32,
    ) -> Result<Vec<SealDefinition>, SealJoinError> {
        placements
            .iter()
            .map(|placement| {
                let seal = self.catalog.get(placement.seal_id)?;
                if !seal.is_active() {
                    return Err(SealJoinError::InactiveSeal(seal.id));
                }
                if placement.page == 0 || placement.page > page_count {
                    return Err(SealJoinError::PageOutOfRange {
                        page: placement.page,
                        page_count,
                    });
                }
                Ok(seal)
            })
            .collect()
    }
}

/// Renders each seal once and each (seal, slice) XObject once per document
#[derive(Default)]
struct AppearanceCache {
    rendered: HashMap<SealId, SealAppearance>,
    xobjects: HashMap<(SealId, Slice), ObjectId>,
}

impl AppearanceCache {
    fn xobject(
        &mut self,
        doc: &mut Document,
        seal: &SealDefinition,
        slice: Slice,
    ) -> Result<ObjectId, SealJoinError> {
        if let Some(id) = self.xobjects.get(&(seal.id, slice)) {
            return Ok(*id);
        }
        let appearance = self
            .rendered
            .entry(seal.id)
            .or_insert_with(|| render_seal(seal));
        let stream = appearance.to_form_xobject(slice.bbox(appearance.size))?;
        let id = doc.add_object(Object::Stream(stream));
        self.xobjects.insert((seal.id, slice), id);
        Ok(id)
    }
}

fn load(bytes: &[u8]) -> Result<Document, SealJoinError> {
    Document::load_mem(bytes).map_err(|e| SealJoinError::ParseError(e.to_string()))
}

fn page_id(pages: &BTreeMap<u32, ObjectId>, page: u32) -> Result<ObjectId, SealJoinError> {
    pages.get(&page).copied().ok_or(SealJoinError::PageOutOfRange {
        page,
        page_count: pages.len() as u32,
    })
}

fn page_info(doc: &Document, page: u32, page_id: ObjectId) -> Result<PageInfo, SealJoinError> {
    PageInfo::from_page_id(doc, page, page_id)
        .ok_or_else(|| SealJoinError::OperationError(format!("Page {} is not a dictionary", page)))
}

/// Add one seal annotation centred vertically on `at.1`.
///
/// `at.0` is the seal centre for whole seals and the cut line for halves.
#[allow(clippy::too_many_arguments)]
fn draw(
    doc: &mut Document,
    info: &PageInfo,
    page_id: ObjectId,
    seal: &SealDefinition,
    appearance_id: ObjectId,
    slice: Slice,
    at: (f64, f64),
    index: usize,
) -> Result<(), SealJoinError> {
    let size = seal.footprint();
    let (left, right) = slice.span(size);
    let x = info.origin_x + at.0;
    let y = info.origin_y + at.1;

    let mut ap_dict = Dictionary::new();
    ap_dict.set("N", Object::Reference(appearance_id));

    let mut annot_dict = Dictionary::new();
    annot_dict.set("Type", Object::Name(b"Annot".to_vec()));
    annot_dict.set("Subtype", Object::Name(b"Stamp".to_vec()));
    annot_dict.set(
        "Rect",
        Object::Array(vec![
            Object::Real((x + left) as f32),
            Object::Real((y - size / 2.0) as f32),
            Object::Real((x + right) as f32),
            Object::Real((y + size / 2.0) as f32),
        ]),
    );
    annot_dict.set("F", Object::Integer(STAMP_FLAGS));
    annot_dict.set("AP", Object::Dictionary(ap_dict));
    annot_dict.set("P", Object::Reference(page_id));
    annot_dict.set("Contents", utf16_text_string(&seal.label));
    annot_dict.set(
        "NM",
        Object::String(
            format!("sealjoin-{}-{}", index, slice.name()).into_bytes(),
            StringFormat::Literal,
        ),
    );

    let annot_id = doc.add_object(Object::Dictionary(annot_dict));
    add_annotation_to_page(doc, page_id, annot_id)?;
    tracing::debug!(page = info.page_num, seal_id = %seal.id, slice = slice.name(), "drew seal");
    Ok(())
}

/// Append to the page's `/Annots`, which may be inline or indirect
fn add_annotation_to_page(
    doc: &mut Document,
    page_id: ObjectId,
    annot_id: ObjectId,
) -> Result<(), SealJoinError> {
    let indirect_annots = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .ok()
        .and_then(|page| page.get(b"Annots").ok())
        .and_then(|annots| annots.as_reference().ok());

    if let Some(annots_id) = indirect_annots {
        if let Ok(Object::Array(ref mut arr)) = doc.get_object_mut(annots_id) {
            arr.push(Object::Reference(annot_id));
            return Ok(());
        }
    }

    let page_dict = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| SealJoinError::OperationError(e.to_string()))?;

    if let Ok(Object::Array(ref mut arr)) = page_dict.get_mut(b"Annots") {
        arr.push(Object::Reference(annot_id));
    } else {
        page_dict.set("Annots", Object::Array(vec![Object::Reference(annot_id)]));
    }
    Ok(())
}

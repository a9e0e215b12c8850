//! PDF Merge algorithm
//!
//! Combines a primary document and its attachments into a single document,
//! recording where every output page came from.

use lopdf::{Document, Object, ObjectId};

use crate::cancel::{self, CancelFlag};
use crate::document::{tag_page_origin, DocumentId, MergeSpec, MergedDocument, PageOrigin};
use crate::error::SealJoinError;
use crate::page_info::{inherited_attribute, PageInfo, INHERITABLE_KEYS};
use crate::store::ObjectStore;

/// Result of the pure merge step, before publication
#[derive(Debug)]
pub struct MergeOutput {
    pub bytes: Vec<u8>,
    pub page_origins: Vec<PageOrigin>,
    pub pages: Vec<PageInfo>,
}

/// Merges documents held in an [`ObjectStore`] and publishes the result
pub struct MergeEngine<'a> {
    store: &'a dyn ObjectStore,
    cancel: Option<&'a CancelFlag>,
}

impl<'a> MergeEngine<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self {
            store,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: Option<&'a CancelFlag>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Merge `spec` into a new stored document.
    ///
    /// Every id is resolved before any parsing starts, so the first missing
    /// id (primary first) is the one reported. Nothing is stored unless the
    /// whole merge succeeds.
    pub fn merge(&self, spec: &MergeSpec) -> Result<MergedDocument, SealJoinError> {
        let sources = spec
            .parts()
            .map(|id| self.store.source(id).map_err(SealJoinError::from))
            .collect::<Result<Vec<_>, _>>()?;
        let expected_pages: u32 = sources.iter().map(|s| s.page_count).sum();

        let mut inputs = Vec::with_capacity(sources.len());
        for source in &sources {
            cancel::check(self.cancel)?;
            inputs.push((source.id.clone(), self.store.get(&source.id)?));
        }

        let output = merge_documents(&inputs, self.cancel)?;
        let page_count = output.page_origins.len() as u32;
        if page_count != expected_pages {
            return Err(SealJoinError::InternalInvariantViolation(format!(
                "merged document has {} pages, sources declare {}",
                page_count, expected_pages
            )));
        }

        cancel::check(self.cancel)?;
        let id = self.store.put(output.bytes.clone())?;
        tracing::info!(
            merged_id = %id,
            sources = sources.len(),
            pages = page_count,
            "published merged document"
        );

        Ok(MergedDocument {
            id,
            bytes: output.bytes,
            page_count,
            page_origins: output.page_origins,
            pages: output.pages,
        })
    }
}

/// Concatenate documents in order.
///
/// The algorithm:
/// 1. Load each source, rejecting encrypted ones
/// 2. Copy inherited page attributes onto each page so they survive
///    re-parenting
/// 3. Import objects with IDs shifted past the destination's `max_id`
/// 4. Hang every page directly off the destination's page-tree root and tag
///    it with its origin
/// 5. Prune what the old page trees left behind, compress, and re-check the
///    page count on the serialized result
pub fn merge_documents(
    parts: &[(DocumentId, Vec<u8>)],
    cancel: Option<&CancelFlag>,
) -> Result<MergeOutput, SealJoinError> {
    if parts.is_empty() {
        return Err(SealJoinError::OperationError(
            "No documents to merge".into(),
        ));
    }

    let mut dest: Option<Document> = None;
    let mut kids: Vec<ObjectId> = Vec::new();
    let mut page_origins = Vec::new();

    for (part, (id, bytes)) in parts.iter().enumerate() {
        cancel::check(cancel)?;

        let mut source = load_source(id, bytes)?;
        let source_pages = materialize_inherited_attributes(&mut source);
        tracing::debug!(source = %id, part, pages = source_pages.len(), "importing source");

        page_origins.extend(
            (0..source_pages.len()).map(|i| PageOrigin::new(id.clone(), i as u32, part as u32)),
        );

        match dest.as_mut() {
            None => {
                kids.extend(source_pages);
                dest = Some(source);
            }
            Some(dest) => {
                let id_offset = dest.max_id;
                let source_max_id = source.max_id;
                for (old_id, mut object) in source.objects {
                    remap_object_refs(&mut object, id_offset);
                    dest.objects.insert((old_id.0 + id_offset, old_id.1), object);
                }
                kids.extend(
                    source_pages
                        .into_iter()
                        .map(|(num, gen)| (num + id_offset, gen)),
                );
                dest.max_id = dest.max_id.max(source_max_id + id_offset);
            }
        }
    }

    let mut dest =
        dest.ok_or_else(|| SealJoinError::OperationError("No documents to merge".into()))?;
    let modified = chrono::Utc::now().format("D:%Y%m%d%H%M%SZ").to_string();
    rebuild_page_tree(&mut dest, &kids, &page_origins, &modified)?;

    dest.prune_objects();
    dest.compress();

    let mut buffer = Vec::new();
    dest.save_to(&mut buffer).map_err(|e| {
        SealJoinError::OperationError(format!("Failed to save merged PDF: {}", e))
    })?;

    let reparsed = Document::load_mem(&buffer).map_err(|e| {
        SealJoinError::InternalInvariantViolation(format!("merged PDF unreadable: {}", e))
    })?;
    let pages = reparsed
        .get_pages()
        .into_iter()
        .map(|(num, id)| {
            PageInfo::from_page_id(&reparsed, num, id).ok_or_else(|| {
                SealJoinError::InternalInvariantViolation(format!(
                    "merged page {} is not a dictionary",
                    num
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if pages.len() != page_origins.len() {
        return Err(SealJoinError::InternalInvariantViolation(format!(
            "merged PDF has {} pages, expected {}",
            pages.len(),
            page_origins.len()
        )));
    }

    Ok(MergeOutput {
        bytes: buffer,
        page_origins,
        pages,
    })
}

fn load_source(id: &DocumentId, bytes: &[u8]) -> Result<Document, SealJoinError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| SealJoinError::ParseError(format!("Failed to load document {}: {}", id, e)))?;
    if doc.is_encrypted() {
        return Err(SealJoinError::ParseError(format!(
            "Document {} is encrypted",
            id
        )));
    }
    Ok(doc)
}

/// Copy attributes a page inherits from its ancestors onto the page itself.
///
/// Returns the page ids in document order.
fn materialize_inherited_attributes(doc: &mut Document) -> Vec<ObjectId> {
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();

    for &page_id in &page_ids {
        let page = match doc.get_object(page_id).and_then(Object::as_dict) {
            Ok(page) => page,
            Err(_) => continue,
        };
        let inherited: Vec<(&[u8], Object)> = INHERITABLE_KEYS
            .into_iter()
            .filter(|key| !page.has(key))
            .filter_map(|key| {
                inherited_attribute(doc, page, key).map(|value| (key, value.clone()))
            })
            .collect();

        if inherited.is_empty() {
            continue;
        }
        if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
            for (key, value) in inherited {
                page.set(key, value);
            }
        }
    }

    page_ids
}

/// Shift every indirect reference inside `obj` by `offset`
fn remap_object_refs(obj: &mut Object, offset: u32) {
    match obj {
        Object::Reference(id) => id.0 += offset,
        Object::Array(items) => {
            for item in items.iter_mut() {
                remap_object_refs(item, offset);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                remap_object_refs(value, offset);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                remap_object_refs(value, offset);
            }
        }
        _ => {}
    }
}

/// Replace the destination page tree with a single flat node over `kids`
fn rebuild_page_tree(
    doc: &mut Document,
    kids: &[ObjectId],
    origins: &[PageOrigin],
    modified: &str,
) -> Result<(), SealJoinError> {
    let pages_id = page_tree_root(doc)?;

    for (page_id, origin) in kids.iter().zip(origins) {
        let page = doc
            .get_object_mut(*page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| {
                SealJoinError::OperationError(format!("Invalid page {:?}: {}", page_id, e))
            })?;
        page.set("Parent", Object::Reference(pages_id));
        tag_page_origin(page, origin, modified);
    }

    if let Some(Object::Dictionary(ref mut pages_dict)) = doc.objects.get_mut(&pages_id) {
        pages_dict.set(
            "Kids",
            Object::Array(kids.iter().map(|&id| Object::Reference(id)).collect()),
        );
        pages_dict.set("Count", Object::Integer(kids.len() as i64));
        pages_dict.remove(b"Parent");
    } else {
        return Err(SealJoinError::OperationError(
            "Invalid pages dictionary".into(),
        ));
    }

    Ok(())
}

fn page_tree_root(doc: &Document) -> Result<ObjectId, SealJoinError> {
    let catalog = doc
        .catalog()
        .map_err(|e| SealJoinError::OperationError(format!("Catalog not found: {}", e)))?;
    catalog
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|_| SealJoinError::OperationError("Pages is not a reference".into()))
}

//! Document handles shared by every pipeline stage
//!
//! Raw uploads, merged documents and stamped documents are all stored in the
//! object store and referenced by [`DocumentId`]. The in-memory handles here
//! carry the structural information later stages rely on, most importantly
//! the page-origin map of a merge.

use std::fmt;

use lopdf::{Dictionary, Document, Object, StringFormat};
use serde::{Deserialize, Serialize};

use crate::page_info::PageInfo;
use crate::placement::SealPlacement;
use crate::stamp::StampNotice;

/// PieceInfo key under which merge provenance is recorded on every page
const PIECE_INFO_APP: &[u8] = b"SealJoin";

/// Opaque identifier of a stored document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// An uploaded document as known to the object store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDocument {
    pub id: DocumentId,
    pub page_count: u32,
    pub byte_size: u64,
}

/// Ordered merge request: the primary always leads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSpec {
    pub primary: DocumentId,
    #[serde(default)]
    pub attachments: Vec<DocumentId>,
}

impl MergeSpec {
    pub fn new(primary: DocumentId, attachments: Vec<DocumentId>) -> Self {
        Self {
            primary,
            attachments,
        }
    }

    /// All ids in merge order
    pub fn parts(&self) -> impl Iterator<Item = &DocumentId> {
        std::iter::once(&self.primary).chain(self.attachments.iter())
    }
}

/// Where a merged page came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageOrigin {
    pub source: DocumentId,
    /// Zero-based page index within the source document
    pub source_page: u32,
    /// Position of the source within the merge order (0 = primary)
    pub part: u32,
}

impl PageOrigin {
    pub fn new(source: DocumentId, source_page: u32, part: u32) -> Self {
        Self {
            source,
            source_page,
            part,
        }
    }
}

/// A boundary between merged pages whose origins belong to different sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Seam {
    /// 1-based page number left of the boundary
    pub left_page: u32,
    /// 1-based page number right of the boundary (`left_page + 1`)
    pub right_page: u32,
}

/// Locate every seam in a page-origin map
pub fn find_seams(origins: &[PageOrigin]) -> Vec<Seam> {
    origins
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[0].part != pair[1].part)
        .map(|(i, _)| Seam {
            left_page: i as u32 + 1,
            right_page: i as u32 + 2,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct MergedDocument {
    pub id: DocumentId,
    pub bytes: Vec<u8>,
    pub page_count: u32,
    pub page_origins: Vec<PageOrigin>,
    /// Geometry of each merged page, read before publication
    pub pages: Vec<PageInfo>,
}

impl MergedDocument {
    pub fn seams(&self) -> Vec<Seam> {
        find_seams(&self.page_origins)
    }

    pub fn summary(&self) -> MergedSummary {
        MergedSummary {
            id: self.id.clone(),
            page_count: self.page_count,
            page_origins: self.page_origins.clone(),
        }
    }
}

/// Byte-free view of a merged document, kept by workflow sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedSummary {
    pub id: DocumentId,
    pub page_count: u32,
    pub page_origins: Vec<PageOrigin>,
}

impl MergedSummary {
    pub fn seams(&self) -> Vec<Seam> {
        find_seams(&self.page_origins)
    }
}

#[derive(Debug, Clone)]
pub struct StampedDocument {
    pub id: DocumentId,
    pub bytes: Vec<u8>,
    /// Placements as drawn, after coordinate clamping
    pub placements: Vec<SealPlacement>,
    pub source: DocumentId,
    pub notices: Vec<StampNotice>,
}

/// Record merge provenance on a page dictionary.
///
/// Uses the page-level `/PieceInfo` private data dictionary so the origin
/// map survives storage and can be recovered by id alone.
pub(crate) fn tag_page_origin(page: &mut Dictionary, origin: &PageOrigin, modified: &str) {
    let mut private = Dictionary::new();
    private.set(
        "Source",
        Object::String(
            origin.source.as_str().as_bytes().to_vec(),
            StringFormat::Literal,
        ),
    );
    private.set("SourcePage", Object::Integer(origin.source_page as i64));
    private.set("Part", Object::Integer(origin.part as i64));

    let mut app = Dictionary::new();
    app.set(
        "LastModified",
        Object::String(modified.as_bytes().to_vec(), StringFormat::Literal),
    );
    app.set("Private", Object::Dictionary(private));

    let mut piece_info = match page.get(b"PieceInfo") {
        Ok(Object::Dictionary(existing)) => existing.clone(),
        _ => Dictionary::new(),
    };
    piece_info.set(PIECE_INFO_APP, Object::Dictionary(app));

    page.set("PieceInfo", Object::Dictionary(piece_info));
    page.set(
        "LastModified",
        Object::String(modified.as_bytes().to_vec(), StringFormat::Literal),
    );
}

/// Recover the page-origin map recorded by a merge.
///
/// Returns `None` when any page lacks provenance (e.g. a raw upload), in
/// which case the document is treated as a single source.
pub fn read_page_origins(doc: &Document) -> Option<Vec<PageOrigin>> {
    doc.get_pages()
        .values()
        .map(|page_id| {
            let page = doc.get_object(*page_id).ok()?.as_dict().ok()?;
            let app = page
                .get(b"PieceInfo")
                .ok()?
                .as_dict()
                .ok()?
                .get(PIECE_INFO_APP)
                .ok()?
                .as_dict()
                .ok()?;
            let private = app.get(b"Private").ok()?.as_dict().ok()?;
            let source = match private.get(b"Source").ok()? {
                Object::String(bytes, _) => String::from_utf8(bytes.clone()).ok()?,
                _ => return None,
            };
            let source_page = private.get(b"SourcePage").ok()?.as_i64().ok()?;
            let part = private.get(b"Part").ok()?.as_i64().ok()?;
            Some(PageOrigin::new(
                DocumentId::new(source),
                u32::try_from(source_page).ok()?,
                u32::try_from(part).ok()?,
            ))
        })
        .collect()
}

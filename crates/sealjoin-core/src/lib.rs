//! Contract merge and seal stamping
//!
//! This crate assembles a primary PDF and its attachments into one document
//! and overlays seal graphics at caller-specified positions using lopdf.
//!
//! - [`merge::MergeEngine`]: concatenates documents and records each page's origin
//! - [`stamp::StampEngine`]: draws seals, including riding seals across seams
//! - [`workflow::Workflow`]: the per-session state machine tying both together
//!
//! Storage and the seal catalog are collaborators behind the [`ObjectStore`]
//! and [`SealCatalog`] traits.

pub mod cancel;
pub mod coords;
pub mod document;
pub mod error;
pub mod merge;
pub mod page_info;
pub mod placement;
pub mod seal;
pub mod stamp;
pub mod store;
pub mod validation;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use cancel::CancelFlag;
pub use coords::{to_pdf_space, to_viewer_space, Viewport};
pub use document::{
    DocumentId, MergeSpec, MergedDocument, MergedSummary, PageOrigin, Seam, SourceDocument,
    StampedDocument,
};
pub use error::SealJoinError;
pub use merge::{merge_documents, MergeEngine};
pub use placement::{
    PlacementSuggester, SealPlacement, SignatureCornerSuggester, SubmitOutcome, ViewerPlacement,
};
pub use seal::{render_seal, LabelFont, MemorySealCatalog, SealCatalog, SealDefinition, SealId};
pub use stamp::{StampEngine, StampNotice};
pub use store::{FsObjectStore, MemoryObjectStore, ObjectMetadata, ObjectStore, StoreError};
pub use validation::{validate_pdf, PdfInfo};
pub use workflow::{MergeStatus, Stage, Workflow, WorkflowSession};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, SealJoinError> {
    let doc =
        lopdf::Document::load_mem(bytes).map_err(|e| SealJoinError::ParseError(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}

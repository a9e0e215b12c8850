//! Session workflow state machine
//!
//! A [`WorkflowSession`] is a plain value owned by the caller. [`Workflow`]
//! borrows the collaborators and drives one session through
//! `Empty → PrimaryUploaded → Merged → PositionsSet → Stamped`. Every
//! transition validates and does its work before touching the session, so a
//! failed call leaves the session exactly as it was.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cancel::CancelFlag;
use crate::document::{
    DocumentId, MergeSpec, MergedSummary, Seam, SourceDocument, StampedDocument,
};
use crate::error::SealJoinError;
use crate::merge::MergeEngine;
use crate::page_info::PageInfo;
use crate::placement::{PlacementSuggester, SealPlacement, SubmitOutcome, ViewerPlacement};
use crate::seal::SealCatalog;
use crate::stamp::{StampEngine, StampNotice};
use crate::store::ObjectStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    #[default]
    Empty,
    PrimaryUploaded,
    Merged,
    PositionsSet,
    Stamped,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Empty => "empty",
            Stage::PrimaryUploaded => "primary uploaded",
            Stage::Merged => "merged",
            Stage::PositionsSet => "positions set",
            Stage::Stamped => "stamped",
        };
        f.write_str(name)
    }
}

/// Everything one user's workflow has produced so far
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowSession {
    stage: Stage,
    primary: Option<SourceDocument>,
    attachments: Vec<SourceDocument>,
    merged: Option<MergedSummary>,
    /// Geometry of each merged page
    pages: Vec<PageInfo>,
    placements: Vec<SealPlacement>,
    stamped: Option<DocumentId>,
    notices: Vec<StampNotice>,
}

impl WorkflowSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn primary(&self) -> Option<&SourceDocument> {
        self.primary.as_ref()
    }

    pub fn attachments(&self) -> &[SourceDocument] {
        &self.attachments
    }

    pub fn merged(&self) -> Option<&MergedSummary> {
        self.merged.as_ref()
    }

    pub fn placements(&self) -> &[SealPlacement] {
        &self.placements
    }

    pub fn notices(&self) -> &[StampNotice] {
        &self.notices
    }

    /// Stage, merged id and page count; never fails
    pub fn merge_status(&self) -> MergeStatus {
        MergeStatus {
            stage: self.stage,
            primary: self.primary.as_ref().map(|p| p.id.clone()),
            attachments: self.attachments.iter().map(|a| a.id.clone()).collect(),
            merged_doc_id: self.merged.as_ref().map(|m| m.id.clone()),
            page_count: self.merged.as_ref().map(|m| m.page_count),
            seams: self.merged.as_ref().map(MergedSummary::seams).unwrap_or_default(),
            placements: self.placements.len(),
            stamped_doc_id: self.final_artifact().cloned(),
        }
    }

    /// The stamped document, once the session reached `Stamped`
    pub fn final_artifact(&self) -> Option<&DocumentId> {
        match self.stage {
            Stage::Stamped => self.stamped.as_ref(),
            _ => None,
        }
    }

    /// Drop everything derived from the current inputs
    fn rewind_to_uploaded(&mut self) {
        self.stage = Stage::PrimaryUploaded;
        self.merged = None;
        self.pages.clear();
        self.clear_placements();
    }

    fn clear_placements(&mut self) {
        self.placements.clear();
        self.stamped = None;
        self.notices.clear();
    }

    fn require(&self, allowed: &[Stage], operation: &str) -> Result<(), SealJoinError> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(SealJoinError::invalid_transition(self.stage, operation))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeStatus {
    pub stage: Stage,
    pub primary: Option<DocumentId>,
    pub attachments: Vec<DocumentId>,
    pub merged_doc_id: Option<DocumentId>,
    pub page_count: Option<u32>,
    pub seams: Vec<Seam>,
    pub placements: usize,
    pub stamped_doc_id: Option<DocumentId>,
}

const BEFORE_MERGE: &[Stage] = &[Stage::Empty, Stage::PrimaryUploaded];
const AFTER_UPLOAD: &[Stage] = &[
    Stage::PrimaryUploaded,
    Stage::Merged,
    Stage::PositionsSet,
    Stage::Stamped,
];
const AFTER_MERGE: &[Stage] = &[Stage::Merged, Stage::PositionsSet, Stage::Stamped];

/// Drives sessions using borrowed collaborators
pub struct Workflow<'a> {
    store: &'a dyn ObjectStore,
    catalog: &'a dyn SealCatalog,
    suggester: Option<&'a dyn PlacementSuggester>,
    cancel: Option<&'a CancelFlag>,
}

impl<'a> Workflow<'a> {
    pub fn new(store: &'a dyn ObjectStore, catalog: &'a dyn SealCatalog) -> Self {
        Self {
            store,
            catalog,
            suggester: None,
            cancel: None,
        }
    }

    pub fn with_suggester(mut self, suggester: &'a dyn PlacementSuggester) -> Self {
        self.suggester = Some(suggester);
        self
    }

    pub fn with_cancel(mut self, cancel: &'a CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Set the primary document; a second upload before merging replaces it
    pub fn upload(
        &self,
        session: &mut WorkflowSession,
        id: &DocumentId,
    ) -> Result<SourceDocument, SealJoinError> {
        session.require(BEFORE_MERGE, "upload a primary document")?;
        let source = self.store.source(id)?;

        tracing::debug!(primary = %source.id, pages = source.page_count, "primary uploaded");
        session.primary = Some(source.clone());
        session.stage = Stage::PrimaryUploaded;
        Ok(source)
    }

    /// Store `bytes` and make them the primary document.
    ///
    /// The stage is checked first; a refused upload stores nothing.
    pub fn upload_bytes(
        &self,
        session: &mut WorkflowSession,
        bytes: Vec<u8>,
    ) -> Result<SourceDocument, SealJoinError> {
        session.require(BEFORE_MERGE, "upload a primary document")?;
        let id = self.store.put(bytes)?;
        self.upload(session, &id)
    }

    pub fn add_attachment(
        &self,
        session: &mut WorkflowSession,
        id: &DocumentId,
    ) -> Result<SourceDocument, SealJoinError> {
        session.require(AFTER_UPLOAD, "add an attachment")?;
        let source = self.store.source(id)?;

        session.attachments.push(source.clone());
        if session.stage != Stage::PrimaryUploaded {
            session.rewind_to_uploaded();
        }
        Ok(source)
    }

    /// Store `bytes` and append them as an attachment; nothing is stored
    /// when the session cannot take attachments
    pub fn add_attachment_bytes(
        &self,
        session: &mut WorkflowSession,
        bytes: Vec<u8>,
    ) -> Result<SourceDocument, SealJoinError> {
        session.require(AFTER_UPLOAD, "add an attachment")?;
        let id = self.store.put(bytes)?;
        self.add_attachment(session, &id)
    }

    pub fn remove_attachment(
        &self,
        session: &mut WorkflowSession,
        index: usize,
    ) -> Result<SourceDocument, SealJoinError> {
        session.require(AFTER_UPLOAD, "remove an attachment")?;
        if index >= session.attachments.len() {
            return Err(SealJoinError::invalid_transition(
                session.stage,
                format!(
                    "remove attachment {} of {}",
                    index,
                    session.attachments.len()
                ),
            ));
        }

        let removed = session.attachments.remove(index);
        if session.stage != Stage::PrimaryUploaded {
            session.rewind_to_uploaded();
        }
        Ok(removed)
    }

    /// Merge the primary and attachments; always yields a fresh id
    pub fn request_merge(
        &self,
        session: &mut WorkflowSession,
    ) -> Result<MergedSummary, SealJoinError> {
        session.require(AFTER_UPLOAD, "merge")?;
        let primary = session.primary.as_ref().ok_or_else(|| {
            SealJoinError::invalid_transition(session.stage, "merge without a primary document")
        })?;
        let spec = MergeSpec::new(
            primary.id.clone(),
            session.attachments.iter().map(|a| a.id.clone()).collect(),
        );

        let merged = MergeEngine::new(self.store)
            .with_cancel(self.cancel)
            .merge(&spec)?;
        let summary = merged.summary();

        session.merged = Some(summary.clone());
        session.pages = merged.pages;
        session.clear_placements();
        session.stage = Stage::Merged;
        Ok(summary)
    }

    /// Replace the placement list with PDF-space placements
    pub fn set_placements(
        &self,
        session: &mut WorkflowSession,
        placements: Vec<SealPlacement>,
    ) -> Result<(), SealJoinError> {
        session.require(AFTER_MERGE, "set placements")?;
        session.clear_placements();
        session.placements = placements;
        session.stage = Stage::PositionsSet;
        Ok(())
    }

    /// Convert viewer-space placements and store them.
    ///
    /// Viewer coordinates describe the page as displayed, so rotated pages
    /// are mapped back onto their MediaBox. Placements that could never be
    /// stamped (missing page, unknown or inactive seal) are rejected as a
    /// whole with a reason; the session is left unchanged in that case.
    pub fn submit_placements(
        &self,
        session: &mut WorkflowSession,
        viewer_placements: &[ViewerPlacement],
    ) -> Result<SubmitOutcome, SealJoinError> {
        session.require(AFTER_MERGE, "submit placements")?;

        let mut converted = Vec::with_capacity(viewer_placements.len());
        for (index, viewer) in viewer_placements.iter().enumerate() {
            let Some(page) = (viewer.page as usize)
                .checked_sub(1)
                .and_then(|i| session.pages.get(i))
            else {
                return Ok(SubmitOutcome::Rejected {
                    reason: format!(
                        "placement {}: page {} is out of range (document has {} pages)",
                        index,
                        viewer.page,
                        session.pages.len()
                    ),
                });
            };
            match self.catalog.get(viewer.seal_id) {
                Ok(seal) if seal.is_active() => {}
                Ok(seal) => {
                    return Ok(SubmitOutcome::Rejected {
                        reason: format!("placement {}: seal {} is inactive", index, seal.id),
                    })
                }
                Err(e) => {
                    return Ok(SubmitOutcome::Rejected {
                        reason: format!("placement {}: {}", index, e),
                    })
                }
            }
            converted.push(viewer.to_page_placement(page));
        }

        self.set_placements(session, converted.clone())?;
        Ok(SubmitOutcome::Accepted {
            placements: converted,
        })
    }

    /// Ask the configured suggester for placements and adopt them
    pub fn suggest_placements(
        &self,
        session: &mut WorkflowSession,
    ) -> Result<Vec<SealPlacement>, SealJoinError> {
        session.require(AFTER_MERGE, "suggest placements")?;
        let suggester = self.suggester.ok_or_else(|| {
            SealJoinError::OperationError("No placement suggester configured".into())
        })?;
        let merged = session.merged.as_ref().ok_or_else(|| {
            SealJoinError::InternalInvariantViolation("merged stage without a merge".into())
        })?;

        let page_sizes: Vec<(f64, f64)> =
            session.pages.iter().map(|p| (p.width, p.height)).collect();
        let suggestions = suggester.suggest(merged, &page_sizes);
        self.set_placements(session, suggestions.clone())?;
        Ok(suggestions)
    }

    /// Stamp the merged document with the current placements
    pub fn request_stamp(
        &self,
        session: &mut WorkflowSession,
    ) -> Result<StampedDocument, SealJoinError> {
        session.require(&[Stage::PositionsSet, Stage::Stamped], "stamp")?;
        if session.placements.is_empty() {
            return Err(SealJoinError::invalid_transition(
                session.stage,
                "stamp without placements",
            ));
        }
        let merged = session.merged.as_ref().ok_or_else(|| {
            SealJoinError::InternalInvariantViolation("positions set without a merge".into())
        })?;

        let stamped = StampEngine::new(self.store, self.catalog)
            .with_cancel(self.cancel)
            .stamp(&merged.id, &session.placements)?;

        session.placements = stamped.placements.clone();
        session.stamped = Some(stamped.id.clone());
        session.notices = stamped.notices.clone();
        session.stage = Stage::Stamped;
        Ok(stamped)
    }

    /// Back to `Empty`; stored documents are left in place
    pub fn reset(&self, session: &mut WorkflowSession) {
        *session = WorkflowSession::default();
    }
}

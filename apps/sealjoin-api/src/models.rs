//! Request and response bodies

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sealjoin_core::{
    DocumentId, MergedSummary, PageOrigin, SealDefinition, SealPlacement, Seam, SourceDocument,
    StampNotice, StampedDocument, ViewerPlacement,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub success: bool,
    pub session_id: String,
}

/// A PDF upload
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    /// Original file name, for logging only
    #[serde(default)]
    pub name: Option<String>,
    pub pdf_base64: String,
}

impl UploadRequest {
    /// Decode the payload, refusing anything above `limit` bytes
    pub fn decode(&self, limit: usize) -> Result<Vec<u8>, ApiError> {
        // base64 inflates by 4/3; reject before allocating
        let estimated = self.pdf_base64.len() / 4 * 3;
        if estimated > limit.saturating_add(3) {
            return Err(ApiError::PayloadTooLarge {
                size: estimated,
                limit,
            });
        }
        let bytes = STANDARD
            .decode(self.pdf_base64.trim())
            .map_err(|e| {
                ApiError::InvalidRequest(format!("pdfBase64 is not valid base64: {}", e))
            })?;
        if bytes.len() > limit {
            return Err(ApiError::PayloadTooLarge {
                size: bytes.len(),
                limit,
            });
        }
        Ok(bytes)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub document: SourceDocument,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResponse {
    pub success: bool,
    pub merged_doc_id: DocumentId,
    pub page_count: u32,
    pub page_origins: Vec<PageOrigin>,
    pub seams: Vec<Seam>,
}

impl From<MergedSummary> for MergeResponse {
    fn from(summary: MergedSummary) -> Self {
        let seams = summary.seams();
        Self {
            success: true,
            merged_doc_id: summary.id,
            page_count: summary.page_count,
            page_origins: summary.page_origins,
            seams,
        }
    }
}

#[derive(Deserialize)]
pub struct SubmitPlacementsRequest {
    pub placements: Vec<ViewerPlacement>,
}

#[derive(Deserialize)]
pub struct SetPlacementsRequest {
    pub placements: Vec<SealPlacement>,
}

#[derive(Serialize)]
pub struct PlacementsResponse {
    pub success: bool,
    pub placements: Vec<SealPlacement>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StampResponse {
    pub success: bool,
    pub stamped_doc_id: DocumentId,
    pub source_doc_id: DocumentId,
    pub placements: Vec<SealPlacement>,
    pub notices: Vec<StampNotice>,
}

impl From<StampedDocument> for StampResponse {
    fn from(stamped: StampedDocument) -> Self {
        Self {
            success: true,
            stamped_doc_id: stamped.id,
            source_doc_id: stamped.source,
            placements: stamped.placements,
            notices: stamped.notices,
        }
    }
}

#[derive(Serialize)]
pub struct SealListResponse {
    pub success: bool,
    pub seals: Vec<SealDefinition>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

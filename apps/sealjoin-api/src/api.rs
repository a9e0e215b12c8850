//! API handlers for the SealJoin server
//!
//! Session endpoints forward to [`sealjoin_core::Workflow`] through
//! [`with_session`]; document and seal endpoints read the shared store and
//! catalog directly.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sealjoin_core::{DocumentId, MergeStatus, SealDefinition, SealId, SubmitOutcome};
use tracing::info;

use crate::error::ApiError;
use crate::models::{
    Ack, HealthResponse, MergeResponse, PlacementsResponse, SealListResponse, SessionCreated,
    SetPlacementsRequest, StampResponse, SubmitPlacementsRequest, UploadRequest, UploadResponse,
};
use crate::state::{with_session, AppState};

type AppStateRef = State<Arc<AppState>>;

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "sealjoin-api",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Handler: POST /api/sessions
pub async fn handle_create_session(
    State(state): AppStateRef,
) -> (StatusCode, Json<SessionCreated>) {
    let session_id = state.create_session().await;
    info!(session = %session_id, "session created");
    (
        StatusCode::CREATED,
        Json(SessionCreated {
            success: true,
            session_id,
        }),
    )
}

/// Handler: DELETE /api/sessions/:id
pub async fn handle_close_session(
    State(state): AppStateRef,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    state.close_session(&id).await?;
    Ok(Json(Ack::ok()))
}

/// Handler: GET /api/sessions/:id/status
pub async fn handle_status(
    State(state): AppStateRef,
    Path(id): Path<String>,
) -> Result<Json<MergeStatus>, ApiError> {
    let status = with_session(&state, &id, |_, session| Ok(session.merge_status())).await?;
    Ok(Json(status))
}

/// Handler: POST /api/sessions/:id/primary
pub async fn handle_upload_primary(
    State(state): AppStateRef,
    Path(id): Path<String>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, ApiError> {
    let bytes = req.decode(state.max_upload_bytes)?;
    info!(
        session = %id,
        name = req.name.as_deref().unwrap_or("-"),
        bytes = bytes.len(),
        "primary upload"
    );

    let document = with_session(&state, &id, move |workflow, session| {
        workflow.upload_bytes(session, bytes)
    })
    .await?;

    Ok(Json(UploadResponse {
        success: true,
        document,
    }))
}

/// Handler: POST /api/sessions/:id/attachments
pub async fn handle_add_attachment(
    State(state): AppStateRef,
    Path(id): Path<String>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, ApiError> {
    let bytes = req.decode(state.max_upload_bytes)?;
    info!(
        session = %id,
        name = req.name.as_deref().unwrap_or("-"),
        bytes = bytes.len(),
        "attachment upload"
    );

    let document = with_session(&state, &id, move |workflow, session| {
        workflow.add_attachment_bytes(session, bytes)
    })
    .await?;

    Ok(Json(UploadResponse {
        success: true,
        document,
    }))
}

/// Handler: DELETE /api/sessions/:id/attachments/:index
pub async fn handle_remove_attachment(
    State(state): AppStateRef,
    Path((id, index)): Path<(String, usize)>,
) -> Result<Json<UploadResponse>, ApiError> {
    let document = with_session(&state, &id, move |workflow, session| {
        workflow.remove_attachment(session, index)
    })
    .await?;

    Ok(Json(UploadResponse {
        success: true,
        document,
    }))
}

/// Handler: POST /api/sessions/:id/merge
pub async fn handle_merge(
    State(state): AppStateRef,
    Path(id): Path<String>,
) -> Result<Json<MergeResponse>, ApiError> {
    let summary =
        with_session(&state, &id, |workflow, session| workflow.request_merge(session)).await?;
    Ok(Json(summary.into()))
}

/// Handler: POST /api/sessions/:id/placements
///
/// Viewer-space placements. A rejected submission answers 422 and leaves the
/// session untouched.
pub async fn handle_submit_placements(
    State(state): AppStateRef,
    Path(id): Path<String>,
    Json(req): Json<SubmitPlacementsRequest>,
) -> Result<Response, ApiError> {
    let outcome = with_session(&state, &id, move |workflow, session| {
        workflow.submit_placements(session, &req.placements)
    })
    .await?;

    let status = match outcome {
        SubmitOutcome::Accepted { .. } => StatusCode::OK,
        SubmitOutcome::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    };
    Ok((status, Json(outcome)).into_response())
}

/// Handler: PUT /api/sessions/:id/placements
pub async fn handle_set_placements(
    State(state): AppStateRef,
    Path(id): Path<String>,
    Json(req): Json<SetPlacementsRequest>,
) -> Result<Json<PlacementsResponse>, ApiError> {
    let placements = with_session(&state, &id, move |workflow, session| {
        workflow.set_placements(session, req.placements)?;
        Ok(session.placements().to_vec())
    })
    .await?;

    Ok(Json(PlacementsResponse {
        success: true,
        placements,
    }))
}

/// Handler: POST /api/sessions/:id/placements/suggest
pub async fn handle_suggest_placements(
    State(state): AppStateRef,
    Path(id): Path<String>,
) -> Result<Json<PlacementsResponse>, ApiError> {
    let placements = with_session(&state, &id, |workflow, session| {
        workflow.suggest_placements(session)
    })
    .await?;

    Ok(Json(PlacementsResponse {
        success: true,
        placements,
    }))
}

/// Handler: POST /api/sessions/:id/stamp
pub async fn handle_stamp(
    State(state): AppStateRef,
    Path(id): Path<String>,
) -> Result<Json<StampResponse>, ApiError> {
    let stamped =
        with_session(&state, &id, |workflow, session| workflow.request_stamp(session)).await?;
    info!(
        session = %id,
        stamped = %stamped.id,
        notices = stamped.notices.len(),
        "stamp complete"
    );
    Ok(Json(stamped.into()))
}

/// Handler: POST /api/sessions/:id/reset
pub async fn handle_reset(
    State(state): AppStateRef,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    with_session(&state, &id, |workflow, session| {
        workflow.reset(session);
        Ok(())
    })
    .await?;
    Ok(Json(Ack::ok()))
}

/// Handler: GET /api/documents/:id
pub async fn handle_get_document(
    State(state): AppStateRef,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let doc_id = DocumentId::from(id);
    let store = Arc::clone(&state.store);
    let bytes = tokio::task::spawn_blocking(move || store.get(&doc_id))
        .await
        .map_err(|e| ApiError::Internal(format!("Document read failed: {}", e)))??;

    Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes).into_response())
}

/// Handler: GET /api/seals
pub async fn handle_list_seals(State(state): AppStateRef) -> Json<SealListResponse> {
    let seals = state.catalog.list();
    let count = seals.len();
    Json(SealListResponse {
        success: true,
        seals,
        count,
    })
}

/// Handler: GET /api/seals/:id
pub async fn handle_get_seal(
    State(state): AppStateRef,
    Path(id): Path<u64>,
) -> Result<Json<SealDefinition>, ApiError> {
    Ok(Json(state.catalog.get(SealId(id))?))
}

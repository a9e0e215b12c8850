//! Tests for the SealJoin server
//!
//! - Property tests for upload decoding
//! - HTTP endpoint tests driving the full router with axum-test

#[cfg(test)]
mod fixtures {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Dictionary, Document, Object, Stream};

    /// A letter-size PDF with `num_pages` pages of labelled text
    pub fn create_test_pdf(num_pages: u32, label: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut kids = Vec::new();
        for i in 0..num_pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new(
                        "Tj",
                        vec![Object::string_literal(format!("{}-{}", label, i + 1))],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
            });
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => num_pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    pub fn encoded_pdf(num_pages: u32, label: &str) -> String {
        STANDARD.encode(create_test_pdf(num_pages, label))
    }
}

#[cfg(test)]
mod property_tests {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use proptest::prelude::*;

    use crate::error::ApiError;
    use crate::models::UploadRequest;

    proptest! {
        #[test]
        fn decode_respects_limit(
            data in prop::collection::vec(any::<u8>(), 0..512),
            limit in 0usize..512,
        ) {
            let request = UploadRequest {
                name: None,
                pdf_base64: STANDARD.encode(&data),
            };
            match request.decode(limit) {
                Ok(bytes) => {
                    prop_assert!(bytes.len() <= limit);
                    prop_assert_eq!(bytes, data);
                }
                Err(ApiError::PayloadTooLarge { .. }) => prop_assert!(data.len() > limit),
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }
    }
}

#[cfg(test)]
mod http_endpoint_tests {
    //! HTTP endpoint integration tests using axum-test

    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum_test::TestServer;
    use sealjoin_core::{MemoryObjectStore, MemorySealCatalog, SealId, SignatureCornerSuggester};
    use serde_json::{json, Value};

    use super::fixtures::{create_test_pdf, encoded_pdf};
    use crate::app;
    use crate::state::AppState;

    /// Create a test server with the full router and in-memory collaborators
    fn create_test_server() -> TestServer {
        let state = AppState::new(
            Arc::new(MemoryObjectStore::new()),
            Arc::new(MemorySealCatalog::builtin()),
            Arc::new(SignatureCornerSuggester::new(SealId(1))),
            1024 * 1024,
        );
        TestServer::new(app(Arc::new(state))).unwrap()
    }

    async fn create_session(server: &TestServer) -> String {
        let response = server.post("/api/sessions").await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["sessionId"]
            .as_str()
            .unwrap()
            .to_string()
    }

    async fn upload(server: &TestServer, session: &str, kind: &str, pages: u32, label: &str) {
        server
            .post(&format!("/api/sessions/{}/{}", session, kind))
            .json(&json!({
                "name": format!("{}.pdf", label),
                "pdfBase64": encoded_pdf(pages, label),
            }))
            .await
            .assert_status_ok();
    }

    /// Session with a merged primary(2) + A(1) + B(3)
    async fn merged_session(server: &TestServer) -> (String, Value) {
        let session = create_session(server).await;
        upload(server, &session, "primary", 2, "Contract").await;
        upload(server, &session, "attachments", 1, "ScheduleA").await;
        upload(server, &session, "attachments", 3, "ScheduleB").await;

        let response = server
            .post(&format!("/api/sessions/{}/merge", session))
            .await;
        response.assert_status_ok();
        (session, response.json::<Value>())
    }

    fn annotation_counts(bytes: &[u8]) -> Vec<usize> {
        let doc = lopdf::Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .map(|id| {
                let page = doc.get_dictionary(*id).unwrap();
                match page.get(b"Annots") {
                    Ok(annots) => annots.as_array().map(Vec::len).unwrap_or(0),
                    Err(_) => 0,
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_health_returns_200() {
        let server = create_test_server();
        let response = server.get("/health").await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "sealjoin-api");
    }

    #[tokio::test]
    async fn test_new_session_is_empty() {
        let server = create_test_server();
        let session = create_session(&server).await;

        let response = server
            .get(&format!("/api/sessions/{}/status", session))
            .await;
        response.assert_status_ok();
        let json = response.json::<Value>();
        assert_eq!(json["stage"], "empty");
        assert!(json["mergedDocId"].is_null());
        assert_eq!(json["placements"], 0);
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let server = create_test_server();
        let response = server.get("/api/sessions/nope/status").await;
        response.assert_status(StatusCode::NOT_FOUND);
        let json = response.json::<Value>();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "SESSION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_merge_reports_origins_and_seams() {
        let server = create_test_server();
        let (_, json) = merged_session(&server).await;

        assert_eq!(json["success"], true);
        assert_eq!(json["pageCount"], 6);
        let origins = json["pageOrigins"].as_array().unwrap();
        let parts: Vec<u64> = origins
            .iter()
            .map(|o| o["part"].as_u64().unwrap())
            .collect();
        assert_eq!(parts, vec![0, 0, 1, 2, 2, 2]);
        assert_eq!(
            json["seams"],
            json!([
                {"leftPage": 2, "rightPage": 3},
                {"leftPage": 3, "rightPage": 4}
            ])
        );
    }

    #[tokio::test]
    async fn test_merge_before_upload_conflicts() {
        let server = create_test_server();
        let session = create_session(&server).await;
        let response = server
            .post(&format!("/api/sessions/{}/merge", session))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        assert_eq!(response.json::<Value>()["code"], "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn test_conflicting_uploads_store_nothing() {
        let store = Arc::new(MemoryObjectStore::new());
        let state = AppState::new(
            store.clone(),
            Arc::new(MemorySealCatalog::builtin()),
            Arc::new(SignatureCornerSuggester::new(SealId(1))),
            1024 * 1024,
        );
        let server = TestServer::new(app(Arc::new(state))).unwrap();
        let session = create_session(&server).await;

        let response = server
            .post(&format!("/api/sessions/{}/attachments", session))
            .json(&json!({ "pdfBase64": encoded_pdf(1, "Orphan") }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        assert_eq!(store.len(), 0);

        upload(&server, &session, "primary", 1, "Contract").await;
        server
            .post(&format!("/api/sessions/{}/merge", session))
            .await
            .assert_status_ok();
        let stored = store.len();

        server
            .post(&format!("/api/sessions/{}/primary", session))
            .json(&json!({ "pdfBase64": encoded_pdf(2, "Late") }))
            .await
            .assert_status(StatusCode::CONFLICT);
        assert_eq!(store.len(), stored);
    }

    #[tokio::test]
    async fn test_status_reads_are_repeatable() {
        let server = create_test_server();
        let (session, _) = merged_session(&server).await;

        let path = format!("/api/sessions/{}/status", session);
        let first = server.get(&path).await.json::<Value>();
        let second = server.get(&path).await.json::<Value>();
        assert_eq!(first, second);
        assert_eq!(first["stage"], "merged");
    }

    #[tokio::test]
    async fn test_second_placement_list_is_the_one_stamped() {
        let server = create_test_server();
        let (session, _) = merged_session(&server).await;
        let path = format!("/api/sessions/{}/placements", session);

        server
            .put(&path)
            .json(&json!({
                "placements": [
                    {"sealId": 1, "page": 1, "x": 100, "y": 100},
                    {"sealId": 2, "page": 6, "x": 200, "y": 200}
                ]
            }))
            .await
            .assert_status_ok();
        server
            .put(&path)
            .json(&json!({
                "placements": [{"sealId": 2, "page": 4, "x": 300, "y": 300}]
            }))
            .await
            .assert_status_ok();

        let response = server
            .post(&format!("/api/sessions/{}/stamp", session))
            .await;
        response.assert_status_ok();
        let stamped = response.json::<Value>();
        assert_eq!(stamped["placements"].as_array().unwrap().len(), 1);
        let stamped_id = stamped["stampedDocId"].as_str().unwrap().to_string();

        let bytes = server
            .get(&format!("/api/documents/{}", stamped_id))
            .await
            .as_bytes()
            .to_vec();
        assert_eq!(annotation_counts(&bytes), vec![0, 0, 0, 1, 0, 0]);
    }

    #[tokio::test]
    async fn test_idle_session_expires() {
        let state = AppState::new(
            Arc::new(MemoryObjectStore::new()),
            Arc::new(MemorySealCatalog::builtin()),
            Arc::new(SignatureCornerSuggester::new(SealId(1))),
            1024 * 1024,
        )
        .with_session_ttl(Duration::from_millis(20));
        let server = TestServer::new(app(Arc::new(state))).unwrap();
        let session = create_session(&server).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        let response = server
            .get(&format!("/api/sessions/{}/status", session))
            .await;
        response.assert_status(StatusCode::GONE);
        assert_eq!(response.json::<Value>()["code"], "SESSION_EXPIRED");

        server
            .get(&format!("/api/sessions/{}/status", session))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_pdf_upload_is_400() {
        let server = create_test_server();
        let session = create_session(&server).await;
        let response = server
            .post(&format!("/api/sessions/{}/primary", session))
            .json(&json!({ "pdfBase64": "bm90IGEgcGRm" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "INVALID_DOCUMENT");
    }

    #[tokio::test]
    async fn test_oversized_upload_is_413() {
        let state = AppState::new(
            Arc::new(MemoryObjectStore::new()),
            Arc::new(MemorySealCatalog::builtin()),
            Arc::new(SignatureCornerSuggester::new(SealId(1))),
            64,
        );
        let server = TestServer::new(app(Arc::new(state))).unwrap();
        let session = create_session(&server).await;

        let response = server
            .post(&format!("/api/sessions/{}/primary", session))
            .json(&json!({ "pdfBase64": encoded_pdf(1, "Big") }))
            .await;
        // Either the decoder or the body limit layer refuses it
        assert_eq!(response.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_full_workflow_with_riding_seal() {
        let server = create_test_server();
        let (session, _) = merged_session(&server).await;

        let response = server
            .post(&format!("/api/sessions/{}/placements", session))
            .json(&json!({
                "placements": [
                    {"sealId": 2, "page": 1, "viewerX": 306, "viewerY": 396},
                    {"sealId": 1, "page": 2, "viewerX": 500, "viewerY": 400, "riding": true}
                ]
            }))
            .await;
        response.assert_status_ok();
        let json = response.json::<Value>();
        assert_eq!(json["status"], "accepted");
        assert_eq!(json["placements"][1]["x"], 500.0);
        assert_eq!(json["placements"][1]["y"], 392.0);

        let response = server
            .post(&format!("/api/sessions/{}/stamp", session))
            .await;
        response.assert_status_ok();
        let stamped = response.json::<Value>();
        assert_eq!(stamped["success"], true);
        let stamped_id = stamped["stampedDocId"].as_str().unwrap().to_string();

        let status = server
            .get(&format!("/api/sessions/{}/status", session))
            .await
            .json::<Value>();
        assert_eq!(status["stage"], "stamped");
        assert_eq!(status["stampedDocId"], stamped_id.as_str());

        let response = server.get(&format!("/api/documents/{}", stamped_id)).await;
        response.assert_status_ok();
        assert_eq!(
            response.header("content-type").to_str().unwrap(),
            "application/pdf"
        );
        let counts = annotation_counts(response.as_bytes());
        assert_eq!(counts, vec![1, 1, 2, 1, 0, 0]);
    }

    #[tokio::test]
    async fn test_rejected_submission_leaves_session_unchanged() {
        let server = create_test_server();
        let (session, _) = merged_session(&server).await;

        let response = server
            .post(&format!("/api/sessions/{}/placements", session))
            .json(&json!({
                "placements": [{"sealId": 3, "page": 1, "viewerX": 10, "viewerY": 10}]
            }))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let json = response.json::<Value>();
        assert_eq!(json["status"], "rejected");
        assert!(json["reason"].as_str().unwrap().contains("inactive"));

        let status = server
            .get(&format!("/api/sessions/{}/status", session))
            .await
            .json::<Value>();
        assert_eq!(status["stage"], "merged");
    }

    #[tokio::test]
    async fn test_stamp_on_missing_page_is_422() {
        let server = create_test_server();
        let (session, _) = merged_session(&server).await;

        server
            .put(&format!("/api/sessions/{}/placements", session))
            .json(&json!({
                "placements": [{"sealId": 1, "page": 7, "x": 100, "y": 100}]
            }))
            .await
            .assert_status_ok();

        let response = server
            .post(&format!("/api/sessions/{}/stamp", session))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json::<Value>()["code"], "PAGE_OUT_OF_RANGE");
    }

    #[tokio::test]
    async fn test_suggested_placements_can_be_stamped() {
        let server = create_test_server();
        let (session, _) = merged_session(&server).await;

        let response = server
            .post(&format!("/api/sessions/{}/placements/suggest", session))
            .await;
        response.assert_status_ok();
        let placements = response.json::<Value>()["placements"].clone();
        assert_eq!(placements.as_array().unwrap().len(), 2);
        assert_eq!(placements[1]["riding"], true);

        server
            .post(&format!("/api/sessions/{}/stamp", session))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_remove_attachment_rewinds_merge() {
        let server = create_test_server();
        let (session, _) = merged_session(&server).await;

        let response = server
            .delete(&format!("/api/sessions/{}/attachments/0", session))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["document"]["pageCount"], 1);

        let status = server
            .get(&format!("/api/sessions/{}/status", session))
            .await
            .json::<Value>();
        assert_eq!(status["stage"], "primaryUploaded");
        assert_eq!(status["attachments"].as_array().unwrap().len(), 1);

        server
            .delete(&format!("/api/sessions/{}/attachments/5", session))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_reset_keeps_artifacts() {
        let server = create_test_server();
        let (session, merged) = merged_session(&server).await;
        let merged_id = merged["mergedDocId"].as_str().unwrap().to_string();

        server
            .post(&format!("/api/sessions/{}/reset", session))
            .await
            .assert_status_ok();

        let status = server
            .get(&format!("/api/sessions/{}/status", session))
            .await
            .json::<Value>();
        assert_eq!(status["stage"], "empty");

        server
            .get(&format!("/api/documents/{}", merged_id))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_deleted_session_is_gone() {
        let server = create_test_server();
        let session = create_session(&server).await;

        server
            .delete(&format!("/api/sessions/{}", session))
            .await
            .assert_status_ok();
        server
            .get(&format!("/api/sessions/{}/status", session))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_document_is_404() {
        let server = create_test_server();
        let response = server.get("/api/documents/does-not-exist").await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>()["code"], "UNRESOLVED_REFERENCE");
    }

    #[tokio::test]
    async fn test_seal_catalog_endpoints() {
        let server = create_test_server();

        let response = server.get("/api/seals").await;
        response.assert_status_ok();
        let json = response.json::<Value>();
        assert_eq!(json["count"], 3);

        let response = server.get("/api/seals/2").await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["shape"], "square");

        server
            .get("/api/seals/99")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let server = create_test_server();
        let (first, _) = merged_session(&server).await;
        let second = create_session(&server).await;

        server
            .post(&format!("/api/sessions/{}/primary", second))
            .json(&json!({ "pdfBase64": encoded_pdf(4, "Other") }))
            .await
            .assert_status_ok();

        let first_status = server
            .get(&format!("/api/sessions/{}/status", first))
            .await
            .json::<Value>();
        let second_status = server
            .get(&format!("/api/sessions/{}/status", second))
            .await
            .json::<Value>();
        assert_eq!(first_status["pageCount"], 6);
        assert_eq!(second_status["stage"], "primaryUploaded");
        assert!(second_status["pageCount"].is_null());
    }

    #[test]
    fn test_fixture_is_valid_pdf() {
        let bytes = create_test_pdf(2, "Fixture");
        assert_eq!(sealjoin_core::get_page_count(&bytes).unwrap(), 2);
    }
}

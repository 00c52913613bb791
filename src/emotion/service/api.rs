//! Axum handlers for the emotion analysis routes.
//!
//! Error responses use the `{"detail": ...}` shape the original service
//! exposed; the bot-side client and the service are a matched pair.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::warn;

use super::backend::BackendError;
use super::ServiceState;
use crate::emotion::Analysis;

/// Build a `{"detail": ...}` error response.
fn detail(status: StatusCode, msg: impl std::fmt::Display) -> Response {
    (status, Json(json!({ "detail": format!("{msg}") }))).into_response()
}

/// GET /
pub(super) async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Palitra emotion analysis API is running",
        "status": "healthy",
    }))
}

/// GET /health — backend self-test with model status.
///
/// Always HTTP 200; the body carries the verdict.
pub(super) async fn health(State(state): State<ServiceState>) -> Json<serde_json::Value> {
    match state.backend.health().await {
        Ok(()) => Json(json!({
            "status": "healthy",
            "model_loaded": true,
            "backend": state.backend.name(),
            "message": "emotion API is ready to process images",
        })),
        Err(e) => {
            warn!(backend = state.backend.name(), error = %e, "health self-test failed");
            Json(json!({
                "status": "unhealthy",
                "model_loaded": false,
                "backend": state.backend.name(),
                "error": e.to_string(),
            }))
        }
    }
}

/// POST /analyze_emotion — multipart upload, field `file`.
pub(super) async fn analyze_emotion(
    State(state): State<ServiceState>,
    mut multipart: Multipart,
) -> Response {
    // Find the `file` field; anything else in the form is ignored. Each
    // field is consumed within its iteration — `Field` borrows the stream.
    let mut upload = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return detail(StatusCode::BAD_REQUEST, format!("invalid multipart body: {e}"))
            }
        };
        if field.name() != Some("file") {
            continue;
        }

        let is_image = field
            .content_type()
            .map(|ct| ct.starts_with("image/"))
            .unwrap_or(false);
        if !is_image {
            return detail(StatusCode::BAD_REQUEST, "File must be an image");
        }

        match field.bytes().await {
            Ok(bytes) => {
                upload = Some(bytes);
                break;
            }
            Err(e) => {
                return detail(StatusCode::BAD_REQUEST, format!("failed to read upload: {e}"))
            }
        }
    }

    let Some(bytes) = upload else {
        return detail(StatusCode::BAD_REQUEST, "missing 'file' field");
    };
    if bytes.is_empty() {
        return detail(StatusCode::BAD_REQUEST, "Empty image file");
    }

    match state.backend.analyze(bytes.to_vec()).await {
        Ok(Analysis::Detected { scores }) => {
            let Some((dominant, confidence)) = scores.dominant() else {
                return detail(StatusCode::INTERNAL_SERVER_ERROR, "classifier returned no scores");
            };
            Json(json!({
                "status": "success",
                "dominant_emotion": dominant,
                "emotions": scores,
                "confidence": confidence,
            }))
            .into_response()
        }
        Ok(Analysis::NoFace) => Json(json!({
            "status": "no_face_detected",
            "message": "No face detected in the image",
            "dominant_emotion": "neutral",
            "emotions": {},
        }))
        .into_response(),
        Err(BackendError::InvalidImage(e)) => {
            detail(StatusCode::BAD_REQUEST, format!("Error processing image: {e}"))
        }
        Err(e) => {
            warn!(error = %e, "emotion analysis failed");
            detail(StatusCode::INTERNAL_SERVER_ERROR, format!("Error processing image: {e}"))
        }
    }
}

//! HTTP request handlers for the web server.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::templates;
use super::AppState;
use crate::pipeline::{PipelineError, PipelineSnapshot};
use crate::upload::UploadError;

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

/// The single-page front-end.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(templates::index_page(&state.policy))
}

/// Replace the selected image. Body is the raw file, `Content-Type` its type.
pub async fn upload_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let declared = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    match state.policy.admit(declared, body.to_vec()) {
        Ok(payload) => {
            let response = json!({
                "mime": payload.mime(),
                "size": payload.len(),
            });
            tracing::info!("Selected {} byte {} image", payload.len(), payload.mime());
            *state.image.write().await = Some(payload);
            Json(response).into_response()
        }
        Err(e) => {
            let status = match e {
                UploadError::Empty => StatusCode::BAD_REQUEST,
                UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                UploadError::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                UploadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error_response(status, &e.to_string())
        }
    }
}

/// Serve the selected image for preview.
pub async fn preview_image(State(state): State<AppState>) -> Response {
    match state.image.read().await.as_ref() {
        Some(payload) => (
            [(header::CONTENT_TYPE, payload.mime().to_string())],
            payload.bytes().to_vec(),
        )
            .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "No image selected"),
    }
}

/// Run recognition on the selected image and wait for the result.
///
/// Progress is observed separately through `/api/status`.
pub async fn recognize(State(state): State<AppState>) -> Response {
    let Some(image) = state.image.read().await.clone() else {
        return error_response(StatusCode::BAD_REQUEST, "No image selected");
    };

    // Detached so a client disconnect does not cancel the engine mid-call
    let pipeline = state.pipeline.clone();
    let outcome = tokio::spawn(async move { pipeline.recognize(&image).await }).await;

    match outcome {
        Ok(Ok(result)) => Json(json!({
            "text": result.text,
            "backend": result.backend.as_str(),
            "confidence": result.confidence,
            "processing_time_ms": result.processing_time_ms,
        }))
        .into_response(),
        Ok(Err(e)) => {
            let status = match e {
                PipelineError::Busy => StatusCode::CONFLICT,
                PipelineError::EngineInit(_) => StatusCode::SERVICE_UNAVAILABLE,
                PipelineError::Recognition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            };
            error_response(status, &e.to_string())
        }
        Err(e) => {
            tracing::error!("Recognition task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Recognition task failed")
        }
    }
}

/// Current pipeline state, progress, result and error.
pub async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let has_image = state.image.read().await.is_some();
    Json(status_json(&state.pipeline.snapshot(), has_image))
}

fn status_json(snapshot: &PipelineSnapshot, has_image: bool) -> serde_json::Value {
    json!({
        "state": snapshot.state,
        "progress": {
            "fraction": snapshot.progress.fraction,
            "percent": snapshot.progress.percent(),
            "label": snapshot.progress.label,
            "display_label": snapshot.progress.display_label(),
            "indeterminate": snapshot.progress.indeterminate,
        },
        "text": snapshot.text,
        "error": snapshot.error,
        "has_image": has_image,
    })
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

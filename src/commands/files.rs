use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use super::{ApiError, ApiResult, AppState};

const VIDEO_MIME: &str = "video/mp4";

#[derive(Debug, Deserialize)]
pub struct CleanupRequest {
    #[serde(default)]
    pub filename: String,
}

pub async fn serve_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    if state.store.path_for(&filename).is_none() {
        return Err(ApiError::bad_request("invalid filename"));
    }
    let path = state
        .store
        .existing(&filename)
        .await
        .ok_or_else(|| ApiError::not_found("file not found"))?;

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;
    let length = file.metadata().await.ok().map(|m| m.len());

    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static(VIDEO_MIME));
    if let Some(length) = length {
        headers.insert(header::CONTENT_LENGTH, length.into());
    }
    if let Ok(value) = format!("attachment; filename=\"{}\"", filename.replace('"', "")).parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

pub async fn cleanup_file(
    State(state): State<AppState>,
    Json(request): Json<CleanupRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let filename = request.filename.trim();
    if state.store.path_for(filename).is_none() {
        return Err(ApiError::bad_request("invalid filename"));
    }

    match state.store.remove(filename).await {
        Ok(true) => Ok(Json(serde_json::json!({ "success": true }))),
        Ok(false) => Err(ApiError::not_found("file not found")),
        Err(e) => {
            tracing::warn!("Cleanup of {} failed: {}", filename, e);
            Err(ApiError::internal("cleanup failed"))
        }
    }
}

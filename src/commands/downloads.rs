use axum::extract::State;
use axum::Json;
use clipgrab_core::error::DOWNLOAD_FAILED;
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    /// Direct media URL from a previous parse.
    #[serde(default, alias = "video_url")]
    pub url: Option<String>,
    /// The link the user pasted; fed to yt-dlp when the media URL fails.
    #[serde(default)]
    pub original_url: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub success: bool,
    pub filename: String,
    pub download_url: String,
    pub file_size_bytes: u64,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub async fn start_download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> ApiResult<Json<DownloadResponse>> {
    let media_url = non_empty(&request.url);
    let page_url = non_empty(&request.original_url);
    if media_url.is_none() && page_url.is_none() {
        return Err(ApiError::bad_request("missing download URL"));
    }

    let platform = non_empty(&request.platform).unwrap_or("video");
    tracing::info!(
        "Download requested: platform={} video_id={}",
        platform,
        non_empty(&request.video_id).unwrap_or("-")
    );

    let result = state
        .downloader
        .download_any(media_url, page_url, platform, non_empty(&request.filename))
        .await;

    match (result.success, result.filename) {
        (true, Some(filename)) => Ok(Json(DownloadResponse {
            success: true,
            download_url: format!("/download/{}", filename),
            filename,
            file_size_bytes: result.file_size_bytes,
        })),
        _ => Err(ApiError::internal(
            result.error.unwrap_or_else(|| DOWNLOAD_FAILED.to_string()),
        )),
    }
}

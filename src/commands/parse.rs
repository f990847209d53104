use axum::extract::State;
use axum::Json;
use clipgrab_core::models::media::ParseOutcome;
use serde::Deserialize;

use super::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    #[serde(default)]
    pub url: String,
}

pub async fn parse_link(
    State(state): State<AppState>,
    Json(request): Json<ParseRequest>,
) -> ApiResult<Json<ParseOutcome>> {
    let outcome = state
        .pipeline
        .process(&request.url)
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    if !outcome.has_download_url {
        tracing::warn!(
            "{} {}: no media URL ({})",
            outcome.platform_name,
            outcome.video_id,
            outcome.video_info.error.as_deref().unwrap_or("no error reported")
        );
    }

    Ok(Json(outcome))
}

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clipgrab_core::core::downloader::MediaDownloader;
use clipgrab_core::Pipeline;

use crate::storage::downloads::DownloadStore;

pub mod downloads;
pub mod files;
pub mod parse;
pub mod platforms;
pub mod settings;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub downloader: Arc<MediaDownloader>,
    pub store: Arc<DownloadStore>,
    pub settings_path: PathBuf,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/platforms", get(platforms::list_platforms))
        .route("/api/parse", post(parse::parse_link))
        .route("/api/download", post(downloads::start_download))
        .route("/api/cleanup", post(files::cleanup_file))
        .route(
            "/api/settings",
            get(settings::get_settings).patch(settings::update_settings),
        )
        .route("/api/settings/reset", post(settings::reset_settings))
        .route("/download/{filename}", get(files::serve_file))
        .with_state(state)
}

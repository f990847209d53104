use axum::extract::State;
use axum::Json;

use super::AppState;

pub async fn list_platforms(State(state): State<AppState>) -> Json<serde_json::Value> {
    let platforms = state.pipeline.registry().supported();
    Json(serde_json::json!({ "platforms": platforms }))
}

#[cfg(test)]
mod tests {
    use crate::commands::test_support::{call_json, state};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn lists_builtin_platforms() {
        let dir = tempfile::tempdir().unwrap();
        let (status, json) = call_json(state(dir.path()).await, "GET", "/api/platforms", None).await;

        assert_eq!(status, StatusCode::OK);
        let platforms = json["platforms"].as_array().unwrap();
        assert!(platforms.iter().any(|p| p["key"] == "douyin" && p["name"] == "Douyin"));
        assert!(platforms.iter().any(|p| p["key"] == "tiktok"));
        assert!(platforms.iter().all(|p| p["icon"].is_string()));
    }
}

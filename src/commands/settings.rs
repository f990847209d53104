use axum::extract::State;
use axum::Json;
use clipgrab_core::models::settings::AppSettings;
use serde_json::Value;

use super::{ApiError, ApiResult, AppState};
use crate::storage::config;

/// Stands in for a stored proxy password in every response.
const REDACTED: &str = "********";

/// Paths the server executes or writes into. Editable in the settings file only.
const FILE_ONLY_FIELDS: &[&str] = &["/extractor/ytdlp_path", "/download/output_dir"];

fn redacted(mut settings: AppSettings) -> AppSettings {
    if !settings.proxy.password.is_empty() {
        settings.proxy.password = REDACTED.to_string();
    }
    settings
}

/// Stored settings. Changes apply on the next start.
pub async fn get_settings(State(state): State<AppState>) -> Json<AppSettings> {
    Json(redacted(config::load_settings(&state.settings_path)))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Json(mut patch): Json<Value>,
) -> ApiResult<Json<AppSettings>> {
    let current = config::load_settings(&state.settings_path);
    let mut current_val = serde_json::to_value(&current)
        .map_err(|e| ApiError::internal(format!("Serialize: {}", e)))?;

    // an unchanged echo of a GET response is fine
    for pointer in FILE_ONLY_FIELDS {
        if patch.pointer(pointer).is_some_and(|v| Some(v) != current_val.pointer(pointer)) {
            let field = pointer.trim_start_matches('/').replace('/', ".");
            return Err(ApiError::bad_request(format!(
                "{} can only be changed in the settings file",
                field
            )));
        }
    }
    if let Some(proxy) = patch.get_mut("proxy").and_then(Value::as_object_mut) {
        if proxy.get("password").and_then(Value::as_str) == Some(REDACTED) {
            proxy.remove("password");
        }
    }

    merge_json(&mut current_val, &patch);

    let updated: AppSettings = serde_json::from_value(current_val)
        .map_err(|e| ApiError::bad_request(format!("Invalid settings: {}", e)))?;
    config::save_settings(&state.settings_path, &updated)
        .map_err(|e| ApiError::internal(format!("Save: {}", e)))?;

    tracing::info!("Settings updated at {}", state.settings_path.display());
    Ok(Json(redacted(updated)))
}

pub async fn reset_settings(State(state): State<AppState>) -> ApiResult<Json<AppSettings>> {
    let defaults = AppSettings::default();
    config::save_settings(&state.settings_path, &defaults)
        .map_err(|e| ApiError::internal(format!("Save: {}", e)))?;
    Ok(Json(redacted(defaults)))
}

fn merge_json(base: &mut Value, patch: &Value) {
    if let (Some(base_obj), Some(patch_obj)) = (base.as_object_mut(), patch.as_object()) {
        for (key, value) in patch_obj {
            match base_obj.get_mut(key) {
                Some(existing) if value.is_object() && existing.is_object() => {
                    merge_json(existing, value)
                }
                _ => {
                    base_obj.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{call_json, state};
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn merge_keeps_untouched_keys() {
        let mut base = json!({ "server": { "host": "127.0.0.1", "port": 4000 }, "schema_version": 1 });
        merge_json(&mut base, &json!({ "server": { "port": 9000 } }));
        assert_eq!(base, json!({ "server": { "host": "127.0.0.1", "port": 9000 }, "schema_version": 1 }));
    }

    #[tokio::test]
    async fn patch_persists_and_reset_restores() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;

        let (status, body) = call_json(
            state.clone(),
            "PATCH",
            "/api/settings",
            Some(json!({ "download": { "max_retries": 5 } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["download"]["max_retries"], 5);
        assert_eq!(config::load_settings(&state.settings_path).download.max_retries, 5);

        let (_, body) = call_json(state.clone(), "GET", "/api/settings", None).await;
        assert_eq!(body["download"]["max_retries"], 5);

        let (status, body) = call_json(state.clone(), "POST", "/api/settings/reset", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["download"]["max_retries"], 3);
    }

    #[tokio::test]
    async fn proxy_password_never_echoed() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;
        let mut stored = AppSettings::default();
        stored.proxy.password = "hunter2".into();
        config::save_settings(&state.settings_path, &stored).unwrap();

        let (_, body) = call_json(state.clone(), "GET", "/api/settings", None).await;
        assert_eq!(body["proxy"]["password"], REDACTED);

        let (status, body) = call_json(
            state.clone(),
            "PATCH",
            "/api/settings",
            Some(json!({ "proxy": { "password": REDACTED, "port": 8080 } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["proxy"]["password"], REDACTED);
        let saved = config::load_settings(&state.settings_path);
        assert_eq!(saved.proxy.password, "hunter2");
        assert_eq!(saved.proxy.port, 8080);

        let (_, body) = call_json(
            state.clone(),
            "PATCH",
            "/api/settings",
            Some(json!({ "proxy": { "password": "s3cret" } })),
        )
        .await;
        assert_eq!(body["proxy"]["password"], REDACTED);
        assert_eq!(config::load_settings(&state.settings_path).proxy.password, "s3cret");
    }

    #[tokio::test]
    async fn executable_and_output_paths_are_file_only() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;

        for (patch, field) in [
            (json!({ "extractor": { "ytdlp_path": "/tmp/not-yt-dlp" } }), "extractor.ytdlp_path"),
            (json!({ "download": { "output_dir": "/etc" } }), "download.output_dir"),
        ] {
            let (status, body) = call_json(state.clone(), "PATCH", "/api/settings", Some(patch)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(
                body["error"],
                format!("{} can only be changed in the settings file", field)
            );
        }
        let saved = config::load_settings(&state.settings_path);
        assert_eq!(saved.extractor.ytdlp_path, None);
        assert_eq!(saved.download.output_dir, AppSettings::default().download.output_dir);
    }

    #[tokio::test]
    async fn full_settings_echo_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;

        let (_, mut body) = call_json(state.clone(), "GET", "/api/settings", None).await;
        body["download"]["max_retries"] = json!(4);
        let (status, body) = call_json(state.clone(), "PATCH", "/api/settings", Some(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["download"]["max_retries"], 4);
    }

    #[tokio::test]
    async fn wrong_types_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _) = call_json(
            state(dir.path()).await,
            "PATCH",
            "/api/settings",
            Some(json!({ "server": { "port": "not a port" } })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde_json::Value;

use super::{parse_aweme_detail, ACCEPT_LANGUAGE, REFERER};
use crate::core::http_client::{self, BROWSER_USER_AGENT};
use crate::core::redirect::ResolvedLink;
use crate::models::media::MediaInfo;
use crate::platforms::traits::ExtractionStrategy;

const APP_USER_AGENT: &str =
    "com.ss.android.ugc.aweme/494 (Linux; U; Android 10; zh_CN; Pixel 4; Build/QQ3A.200805.001; Cronet/58.0.2991.0)";

fn require_id(link: &ResolvedLink) -> anyhow::Result<&str> {
    link.content_id
        .as_deref()
        .ok_or_else(|| anyhow!("content id not resolved for {}", link.url))
}

/// Pulls `aweme_detail` out of an API response, surfacing the API's own
/// status message when it is missing.
fn take_detail(body: &Value) -> anyhow::Result<&Value> {
    if let Some(detail) = body.get("aweme_detail").filter(|d| d.is_object()) {
        return Ok(detail);
    }
    let code = body.get("status_code").and_then(|v| v.as_i64()).unwrap_or(-1);
    let msg = body
        .get("status_msg")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("no aweme_detail");
    Err(anyhow!("{} (status {})", msg, code))
}

async fn fetch_json(request: reqwest::RequestBuilder) -> anyhow::Result<Value> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("HTTP {}", status));
    }

    let body = response.text().await?;
    if body.trim().is_empty() {
        return Err(anyhow!("empty response body"));
    }
    serde_json::from_str(&body).context("response is not JSON")
}

/// Queries the Android app's detail endpoint.
pub struct MobileApiStrategy {
    client: reqwest::Client,
    base: String,
}

impl MobileApiStrategy {
    pub fn new(client: reqwest::Client, base: &str) -> Self {
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ExtractionStrategy for MobileApiStrategy {
    fn name(&self) -> &str {
        "douyin-mobile-api"
    }

    async fn extract(&self, link: &ResolvedLink) -> anyhow::Result<MediaInfo> {
        let id = require_id(link)?;
        let url = format!("{}/aweme/v1/aweme/detail/", self.base);
        let ticket = chrono::Utc::now().timestamp_millis().to_string();

        tracing::debug!("Douyin: mobile API for {}", id);

        let headers = http_client::header_map(&[
            ("User-Agent", APP_USER_AGENT),
            ("Accept", "application/json"),
            ("Accept-Language", ACCEPT_LANGUAGE),
            ("X-SS-REQ-TICKET", ticket.as_str()),
            ("sdk-version", "2"),
            ("passport-sdk-version", "5.12.1"),
        ]);

        let request = self.client.get(&url).headers(headers).query(&[
            ("aweme_id", id),
            ("aid", "1128"),
            ("app_name", "aweme"),
            ("version_name", "23.5.0"),
            ("device_platform", "android"),
            ("os_version", "10"),
            ("channel", "googleplay"),
        ]);

        let body = fetch_json(request).await?;
        Ok(parse_aweme_detail(take_detail(&body)?, id))
    }
}

/// Queries the desktop site's detail endpoint with browser headers.
pub struct WebApiStrategy {
    client: reqwest::Client,
    base: String,
}

impl WebApiStrategy {
    pub fn new(client: reqwest::Client, base: &str) -> Self {
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn cookie_header() -> String {
        let token = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );
        format!("msToken={}", token)
    }
}

#[async_trait]
impl ExtractionStrategy for WebApiStrategy {
    fn name(&self) -> &str {
        "douyin-web-api"
    }

    async fn extract(&self, link: &ResolvedLink) -> anyhow::Result<MediaInfo> {
        let id = require_id(link)?;
        let url = format!("{}/aweme/v1/web/aweme/detail/", self.base);
        let cookie = Self::cookie_header();

        tracing::debug!("Douyin: web API for {}", id);

        let headers = http_client::header_map(&[
            ("User-Agent", BROWSER_USER_AGENT),
            ("Accept", "application/json, text/plain, */*"),
            ("Accept-Language", ACCEPT_LANGUAGE),
            ("Referer", REFERER),
            ("Origin", REFERER.trim_end_matches('/')),
            ("X-Requested-With", "XMLHttpRequest"),
            ("Cookie", cookie.as_str()),
        ]);

        let request = self.client.get(&url).headers(headers).query(&[
            ("device_platform", "webapp"),
            ("aid", "6383"),
            ("channel", "channel_pc_web"),
            ("aweme_id", id),
            ("pc_client_type", "1"),
            ("version_code", "190500"),
            ("cookie_enabled", "true"),
        ]);

        let body = fetch_json(request).await?;
        Ok(parse_aweme_detail(take_detail(&body)?, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::HeaderMap, routing::get, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn link(id: Option<&str>) -> ResolvedLink {
        ResolvedLink {
            url: "https://v.douyin.com/iRNBho6u/".into(),
            platform_key: "douyin",
            platform_name: "Douyin",
            content_id: id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn mobile_api_sends_app_headers_and_parses_detail() {
        let app = Router::new().route(
            "/aweme/v1/aweme/detail/",
            get(|headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                let ok = headers.get("sdk-version").is_some()
                    && headers.get("x-ss-req-ticket").is_some()
                    && q.get("aweme_id").map(String::as_str) == Some("7301")
                    && q.get("aid").map(String::as_str) == Some("1128");
                if !ok {
                    return Json(json!({"status_code": 8, "status_msg": "bad request"}));
                }
                Json(json!({
                    "status_code": 0,
                    "aweme_detail": {
                        "desc": "title",
                        "author": {"nickname": "someone"},
                        "video": {"play_addr": {"url_list": ["https://cdn/play/v.mp4"]}, "duration": 9000},
                        "statistics": {"digg_count": 3}
                    }
                }))
            }),
        );
        let base = serve(app).await;

        let strategy = MobileApiStrategy::new(reqwest::Client::new(), &base);
        let info = strategy.extract(&link(Some("7301"))).await.unwrap();
        assert_eq!(info.media_url, "https://cdn/play/v.mp4");
        assert_eq!(info.author, "someone");
        assert_eq!(info.duration, 9);
        assert_eq!(info.like_count, 3);
    }

    #[tokio::test]
    async fn web_api_empty_body_is_failure() {
        let app = Router::new().route("/aweme/v1/web/aweme/detail/", get(|| async { "" }));
        let base = serve(app).await;

        let strategy = WebApiStrategy::new(reqwest::Client::new(), &base);
        let err = strategy.extract(&link(Some("7301"))).await.unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[tokio::test]
    async fn missing_detail_reports_status_message() {
        let app = Router::new().route(
            "/aweme/v1/web/aweme/detail/",
            get(|| async { Json(json!({"status_code": 2053, "status_msg": "video not found"})) }),
        );
        let base = serve(app).await;

        let strategy = WebApiStrategy::new(reqwest::Client::new(), &base);
        let err = strategy.extract(&link(Some("7301"))).await.unwrap_err();
        assert!(err.to_string().contains("video not found"));
    }

    #[tokio::test]
    async fn pending_id_fails_without_network() {
        let strategy = MobileApiStrategy::new(reqwest::Client::new(), "http://127.0.0.1:1");
        let err = strategy.extract(&link(None)).await.unwrap_err();
        assert!(err.to_string().contains("content id not resolved"));
    }
}

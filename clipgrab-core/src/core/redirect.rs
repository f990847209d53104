use std::time::Duration;

use crate::core::http_client;
use crate::core::registry::Detection;
use crate::models::media::PENDING_CONTENT_ID;
use crate::models::settings::ProxySettings;
use crate::platforms::PlatformDescriptor;

const MAX_REDIRECTS: usize = 10;

pub async fn resolve_redirect(client: &reqwest::Client, url: &str) -> anyhow::Result<String> {
    let response = client.get(url).send().await?;
    let final_url = response.url().to_string();

    if final_url == url {
        tracing::debug!("No redirect for {}", url);
    }

    Ok(final_url)
}

/// Canonical form of one inbound link.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLink {
    pub url: String,
    pub platform_key: &'static str,
    pub platform_name: &'static str,
    pub content_id: Option<String>,
}

impl ResolvedLink {
    pub fn content_id_or_pending(&self) -> &str {
        self.content_id.as_deref().unwrap_or(PENDING_CONTENT_ID)
    }
}

/// Follows short links to their canonical page and reads the content ID.
pub struct LinkResolver {
    client: reqwest::Client,
}

impl LinkResolver {
    pub fn new(timeout: Duration, proxy: &ProxySettings) -> Self {
        let builder = reqwest::Client::builder()
            .default_headers(http_client::browser_headers("zh-CN,zh;q=0.9,en;q=0.8"))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .cookie_store(true)
            .timeout(timeout);

        let client = http_client::apply_proxy(builder, proxy)
            .build()
            .unwrap_or_default();

        Self { client }
    }

    /// Returns `None` on network failure, timeout, or when no ID pattern
    /// matches the final URL. Callers carry on with the original link.
    pub async fn resolve(&self, short_url: &str, platform: &PlatformDescriptor) -> Option<String> {
        let final_url = match resolve_redirect(&self.client, short_url).await {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!("{}: short link {} not resolved: {}", platform.name, short_url, e);
                return None;
            }
        };

        tracing::debug!("{}: {} -> {}", platform.name, short_url, final_url);

        let id = platform.extract_content_id(&final_url);
        if id.is_none() {
            tracing::warn!("{}: no content id in {}", platform.name, final_url);
        }
        id
    }

    pub async fn resolve_link(&self, url: &str, detection: Detection<'_>) -> ResolvedLink {
        let content_id = match detection.descriptor() {
            Some(platform) => match platform.extract_content_id(url) {
                Some(id) => Some(id),
                None if platform.uses_short_links => self.resolve(url, platform).await,
                None => None,
            },
            None => None,
        };

        ResolvedLink {
            url: url.to_string(),
            platform_key: detection.key(),
            platform_name: detection.name(),
            content_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::PlatformRegistry;
    use axum::{response::Redirect, routing::get, Router};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn resolver() -> LinkResolver {
        LinkResolver::new(Duration::from_secs(5), &ProxySettings::default())
    }

    #[tokio::test]
    async fn follows_short_link_to_numeric_id() {
        let app = Router::new()
            .route(
                "/iRNBho6u/",
                get(|| async { Redirect::temporary("/share/video/7301234567890123456/?region=CN") }),
            )
            .route("/share/video/{id}/", get(|| async { "ok" }));
        let base = serve(app).await;

        let registry = PlatformRegistry::builtin();
        let douyin = registry.get("douyin").unwrap();
        let id = resolver().resolve(&format!("{}/iRNBho6u/", base), douyin).await;
        assert_eq!(id.as_deref(), Some("7301234567890123456"));
    }

    #[tokio::test]
    async fn missing_id_is_none_not_error() {
        let app = Router::new().route("/abc", get(|| async { "no redirect here" }));
        let base = serve(app).await;

        let registry = PlatformRegistry::builtin();
        let douyin = registry.get("douyin").unwrap();
        assert_eq!(resolver().resolve(&format!("{}/abc", base), douyin).await, None);
    }

    #[tokio::test]
    async fn unreachable_host_is_none() {
        let registry = PlatformRegistry::builtin();
        let tiktok = registry.get("tiktok").unwrap();
        assert_eq!(resolver().resolve("http://127.0.0.1:1/x", tiktok).await, None);
    }

    #[tokio::test]
    async fn canonical_link_skips_network() {
        let registry = PlatformRegistry::builtin();
        let url = "https://www.douyin.com/video/7300000000000000001";
        let link = resolver().resolve_link(url, registry.detect(url)).await;
        assert_eq!(link.platform_key, "douyin");
        assert_eq!(link.content_id.as_deref(), Some("7300000000000000001"));
    }

    #[tokio::test]
    async fn non_short_link_platform_stays_pending() {
        let registry = PlatformRegistry::builtin();
        let url = "https://youtu.be/dQw4w9WgXcQ";
        let link = resolver().resolve_link(url, registry.detect(url)).await;
        assert_eq!(link.platform_key, "youtube");
        assert_eq!(link.content_id_or_pending(), PENDING_CONTENT_ID);
    }
}

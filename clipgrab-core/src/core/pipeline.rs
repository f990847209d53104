use std::sync::Arc;
use std::time::Duration;

use crate::core::chain::StrategyChain;
use crate::core::redirect::LinkResolver;
use crate::core::registry::{Detection, PlatformRegistry};
use crate::core::url_parser::extract_url;
use crate::error::ResolveError;
use crate::models::media::ParseOutcome;
use crate::models::settings::AppSettings;
use crate::platforms::{douyin, generic_ytdlp, tiktok};

/// Marker reported as the content id when only the extractor knew it.
pub const EXTRACTED_CONTENT_ID: &str = "extracted";

/// Share text in, media metadata out.
pub struct Pipeline {
    registry: Arc<PlatformRegistry>,
    resolver: LinkResolver,
    douyin: StrategyChain,
    tiktok: StrategyChain,
    generic: StrategyChain,
}

impl Pipeline {
    pub fn new(
        registry: Arc<PlatformRegistry>,
        resolver: LinkResolver,
        douyin: StrategyChain,
        tiktok: StrategyChain,
        generic: StrategyChain,
    ) -> Self {
        Self {
            registry,
            resolver,
            douyin,
            tiktok,
            generic,
        }
    }

    pub fn from_settings(registry: Arc<PlatformRegistry>, settings: &AppSettings) -> Self {
        let resolver = LinkResolver::new(
            Duration::from_secs(settings.extractor.resolve_timeout_secs),
            &settings.proxy,
        );

        Self::new(
            registry,
            resolver,
            douyin::chain(settings),
            tiktok::chain(settings),
            generic_ytdlp::chain(settings),
        )
    }

    pub fn registry(&self) -> &PlatformRegistry {
        &self.registry
    }

    pub fn chain_for(&self, platform_key: &str) -> &StrategyChain {
        match platform_key {
            "douyin" => &self.douyin,
            "tiktok" => &self.tiktok,
            _ => &self.generic,
        }
    }

    pub async fn process(&self, text: &str) -> Result<ParseOutcome, ResolveError> {
        if text.trim().is_empty() {
            return Err(ResolveError::EmptyInput);
        }

        let url = extract_url(&self.registry, text);
        let detection = self.registry.detect(&url);

        let looks_like_url = url.starts_with("http://") || url.starts_with("https://");
        match detection {
            Detection::Unknown => return Err(ResolveError::UnrecognizedPlatform),
            Detection::Other if !looks_like_url => return Err(ResolveError::UnrecognizedPlatform),
            _ => {}
        }

        tracing::info!("Processing {} link {}", detection.name(), url);

        let link = self.resolver.resolve_link(&url, detection).await;
        let info = self.chain_for(link.platform_key).run(&link).await;

        let video_id = match (&link.content_id, &info.content_id) {
            (Some(id), _) => id.clone(),
            (None, Some(_)) => EXTRACTED_CONTENT_ID.to_string(),
            (None, None) => link.content_id_or_pending().to_string(),
        };

        Ok(ParseOutcome {
            success: true,
            platform: link.platform_key.to_string(),
            platform_name: link.platform_name.to_string(),
            video_id,
            has_download_url: info.has_media_url(),
            video_info: info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::redirect::ResolvedLink;
    use crate::models::media::MediaInfo;
    use crate::models::settings::ProxySettings;
    use crate::platforms::traits::ExtractionStrategy;
    use async_trait::async_trait;
    use axum::{response::Redirect, routing::get, Router};

    struct Canned(&'static str);

    #[async_trait]
    impl ExtractionStrategy for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn extract(&self, link: &ResolvedLink) -> anyhow::Result<MediaInfo> {
            Ok(MediaInfo::new(&format!("{} clip", link.platform_name), "a", self.0)
                .with_content_id(Some("from-extractor".into())))
        }
    }

    struct Broken;

    #[async_trait]
    impl ExtractionStrategy for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn extract(&self, _link: &ResolvedLink) -> anyhow::Result<MediaInfo> {
            Err(anyhow::anyhow!("This video is private"))
        }
    }

    /// Reports the ID the resolver handed over as the title.
    struct EchoId;

    #[async_trait]
    impl ExtractionStrategy for EchoId {
        fn name(&self) -> &str {
            "echo-id"
        }

        async fn extract(&self, link: &ResolvedLink) -> anyhow::Result<MediaInfo> {
            Ok(MediaInfo::new(link.content_id_or_pending(), "a", "https://cdn/play/v.mp4"))
        }
    }

    /// Plays both the short-link host and the canonical host. The resolver
    /// reaches it as its HTTP proxy.
    async fn share_hosts_proxy() -> u16 {
        let app = Router::new()
            .route(
                "/AbC123/",
                get(|| async { Redirect::temporary("http://www.douyin.com/video/7301234567890123456/?region=CN") }),
            )
            .route("/video/{id}/", get(|| async { "ok" }))
            .route(
                "/ZMabc/",
                get(|| async {
                    Redirect::temporary("http://www.tiktok.com/@someone/video/7234567890123456789?is_from_webapp=1")
                }),
            )
            .route("/@someone/video/{id}", get(|| async { "ok" }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        port
    }

    fn pipeline(douyin: Box<dyn ExtractionStrategy>) -> Pipeline {
        Pipeline::new(
            Arc::new(PlatformRegistry::builtin()),
            LinkResolver::new(Duration::from_secs(2), &ProxySettings::default()),
            StrategyChain::new(vec![douyin]),
            StrategyChain::new(vec![Box::new(Canned("https://cdn/t.mp4"))]),
            StrategyChain::new(vec![Box::new(Canned(""))]),
        )
    }

    #[tokio::test]
    async fn empty_input_rejected() {
        let p = pipeline(Box::new(Broken));
        assert_eq!(p.process("   ").await.unwrap_err(), ResolveError::EmptyInput);
    }

    #[tokio::test]
    async fn text_without_link_rejected() {
        let p = pipeline(Box::new(Broken));
        assert_eq!(
            p.process("just some words").await.unwrap_err(),
            ResolveError::UnrecognizedPlatform
        );
    }

    #[tokio::test]
    async fn douyin_share_text_end_to_end() {
        let p = pipeline(Box::new(Canned("https://cdn/play/v.mp4")));
        let outcome = p
            .process("7.43 look at this https://www.douyin.com/video/7301234567890123456 copy and open")
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.platform, "douyin");
        assert_eq!(outcome.platform_name, "Douyin");
        assert_eq!(outcome.video_id, "7301234567890123456");
        assert!(outcome.has_download_url);
    }

    #[tokio::test]
    async fn short_links_resolved_before_extraction() {
        let proxy = ProxySettings {
            enabled: true,
            proxy_type: "http".into(),
            host: "127.0.0.1".into(),
            port: share_hosts_proxy().await,
            ..ProxySettings::default()
        };
        let p = Pipeline::new(
            Arc::new(PlatformRegistry::builtin()),
            LinkResolver::new(Duration::from_secs(5), &proxy),
            StrategyChain::new(vec![Box::new(EchoId)]),
            StrategyChain::new(vec![Box::new(EchoId)]),
            StrategyChain::new(vec![Box::new(EchoId)]),
        );

        let outcome = p
            .process("8.21 check this out http://v.douyin.com/AbC123/ copy and open")
            .await
            .unwrap();
        assert_eq!(outcome.platform, "douyin");
        assert_eq!(outcome.video_id, "7301234567890123456");
        assert_eq!(outcome.video_info.title, "7301234567890123456");
        assert!(outcome.has_download_url);

        let outcome = p.process("http://vm.tiktok.com/ZMabc/").await.unwrap();
        assert_eq!(outcome.platform, "tiktok");
        assert_eq!(outcome.video_id, "7234567890123456789");
        assert_eq!(outcome.video_info.title, "7234567890123456789");
    }

    #[tokio::test]
    async fn total_failure_is_partial_success() {
        let p = pipeline(Box::new(Broken));
        let outcome = p
            .process("https://www.douyin.com/video/7301234567890123456")
            .await
            .unwrap();

        assert!(outcome.success);
        assert!(!outcome.has_download_url);
        assert_eq!(outcome.video_info.title, "Douyin video 7301234567890123456");
        assert_eq!(
            outcome.video_info.error.as_deref(),
            Some("content is private or login-gated")
        );
    }

    #[tokio::test]
    async fn extractor_supplied_id_reported_as_extracted() {
        let p = pipeline(Box::new(Broken));
        let outcome = p.process("https://www.youtube.com/watch?v=dQw4w9WgXcQ").await.unwrap();

        assert_eq!(outcome.platform, "youtube");
        assert_eq!(outcome.video_id, EXTRACTED_CONTENT_ID);
        assert!(!outcome.has_download_url);
    }

    #[tokio::test]
    async fn unlisted_site_uses_generic_chain() {
        let p = pipeline(Box::new(Broken));
        let outcome = p.process("https://vimeo.com/123").await.unwrap();
        assert_eq!(outcome.platform, "other");
        assert_eq!(outcome.video_info.title, "Other platform clip");
    }
}

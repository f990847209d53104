use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::Value;

use crate::core::chain::StrategyChain;
use crate::core::formats::select_best_media_url;
use crate::core::http_client::BROWSER_USER_AGENT;
use crate::core::redirect::ResolvedLink;
use crate::core::scrape::{json_str, json_u64};
use crate::core::ytdlp::{self, YtdlpOptions};
use crate::models::media::{MediaInfo, UNKNOWN_AUTHOR};
use crate::models::settings::AppSettings;
use crate::platforms::referer_for;
use crate::platforms::traits::ExtractionStrategy;

/// Delegates extraction to yt-dlp's `--dump-json`.
pub struct YtdlpStrategy {
    ytdlp_path: Option<PathBuf>,
    douyin_cookies_browser: Option<String>,
}

impl YtdlpStrategy {
    pub fn new(ytdlp_path: Option<PathBuf>, douyin_cookies_browser: Option<String>) -> Self {
        Self {
            ytdlp_path,
            douyin_cookies_browser,
        }
    }

    pub fn from_settings(settings: &AppSettings) -> Self {
        Self::new(
            settings.extractor.ytdlp_path.clone(),
            settings.extractor.douyin_cookies_browser.clone(),
        )
    }

    pub fn options_for(&self, link: &ResolvedLink) -> YtdlpOptions {
        let mut opts = YtdlpOptions::metadata_only()
            .header("User-Agent", BROWSER_USER_AGENT)
            .header("Accept-Language", "en-US,en;q=0.9");

        if let Some(referer) = referer_for(link.platform_key) {
            opts = opts.header("Referer", referer);
        }
        if link.platform_key == "douyin" {
            opts.cookies_from_browser = self.douyin_cookies_browser.clone();
        }

        opts
    }
}

#[async_trait]
impl ExtractionStrategy for YtdlpStrategy {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn extract(&self, link: &ResolvedLink) -> anyhow::Result<MediaInfo> {
        let ytdlp_path = ytdlp::ensure_ytdlp(self.ytdlp_path.as_deref())
            .await
            .map_err(|e| anyhow!("yt-dlp unavailable: {}", e))?;

        let json = ytdlp::get_video_info(&ytdlp_path, &link.url, &self.options_for(link)).await?;
        Ok(parse_video_info(&json, link.platform_name))
    }
}

/// Chain for platforms without a dedicated scraper.
pub fn chain(settings: &AppSettings) -> StrategyChain {
    StrategyChain::new(vec![Box::new(YtdlpStrategy::from_settings(settings))])
        .with_timeout(Duration::from_secs(settings.extractor.strategy_timeout_secs))
}

pub fn parse_video_info(json: &Value, platform_name: &str) -> MediaInfo {
    let content_id = json_str(json, "/id");

    let title = json_str(json, "/title")
        .or_else(|| json_str(json, "/description"))
        .unwrap_or_else(|| {
            format!(
                "{} video {}",
                platform_name,
                content_id.as_deref().unwrap_or("unknown")
            )
        });

    let author = ["/uploader", "/channel", "/creator", "/uploader_id"]
        .iter()
        .find_map(|p| json_str(json, p))
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

    let media_url = select_best_media_url(&ytdlp::parse_formats(json))
        .or_else(|| json_str(json, "/url"))
        .unwrap_or_default();

    MediaInfo::new(&title, &author, &media_url)
        .with_cover(json_str(json, "/thumbnail").unwrap_or_default())
        // yt-dlp always reports seconds
        .with_duration(json_u64(json, "/duration"))
        .with_counts(
            json_u64(json, "/like_count"),
            json_u64(json, "/comment_count"),
            json_u64(json, "/view_count"),
            json_u64(json, "/repost_count"),
        )
        .with_content_id(content_id)
}

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::USER_AGENT;
use serde_json::Value;

use crate::core::chain::StrategyChain;
use crate::core::formats::select_best_media_url;
use crate::core::http_client;
use crate::core::redirect::ResolvedLink;
use crate::core::scrape::{json_first_str, json_str, json_u64, normalize_duration};
use crate::models::media::{CandidateFormat, MediaInfo, UNKNOWN_AUTHOR};
use crate::models::settings::AppSettings;
use crate::platforms::generic_ytdlp::YtdlpStrategy;
use crate::platforms::traits::ExtractionStrategy;

pub const PLATFORM_NAME: &str = "TikTok";

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36",
];

const REHYDRATION_ID: &str = "__UNIVERSAL_DATA_FOR_REHYDRATION__";
const REHYDRATION_OPEN: &str =
    "<script id=\"__UNIVERSAL_DATA_FOR_REHYDRATION__\" type=\"application/json\">";

/// Served instead of the video page when TikTok suspects a bot.
const CAPTCHA_MARKERS: &[&str] = &["verify-bar-close", "captcha_verify", "tiktok-verify-page", "verify/page"];

static POST_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/@[^/?#]+/(?:video|photo)/(\d+)(?:[/?#]|$)").unwrap());

#[derive(Debug, Clone)]
pub struct TikTokEndpoints {
    pub web: String,
    pub feed_api: String,
}

impl Default for TikTokEndpoints {
    fn default() -> Self {
        Self {
            web: "https://www.tiktok.com".to_string(),
            feed_api: "https://api22-normal-c-useast2a.tiktokv.com".to_string(),
        }
    }
}

pub fn chain(settings: &AppSettings) -> StrategyChain {
    chain_with(settings, TikTokEndpoints::default())
}

pub fn chain_with(settings: &AppSettings, endpoints: TikTokEndpoints) -> StrategyChain {
    let mut strategies: Vec<Box<dyn ExtractionStrategy>> =
        vec![Box::new(YtdlpStrategy::from_settings(settings))];

    let client = build_client(settings);
    strategies.push(Box::new(RehydrationPageStrategy::new(client.clone(), &endpoints.web)));
    strategies.push(Box::new(FeedApiStrategy::new(client, &endpoints.feed_api)));

    StrategyChain::new(strategies)
        .with_timeout(Duration::from_secs(settings.extractor.strategy_timeout_secs))
}

/// A different browser identity per request.
fn random_user_agent() -> &'static str {
    USER_AGENTS[(rand::random::<u64>() % USER_AGENTS.len() as u64) as usize]
}

fn build_client(settings: &AppSettings) -> reqwest::Client {
    let builder = reqwest::Client::builder()
        .cookie_store(true)
        .timeout(Duration::from_secs(30));

    http_client::apply_proxy(builder, &settings.proxy)
        .build()
        .unwrap_or_default()
}

/// Numeric post ID from a canonical `/@user/video/<id>` or `/@user/photo/<id>` URL.
pub fn extract_post_id(url: &str) -> Option<String> {
    POST_PATH_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Short links are expanded by the pipeline's resolver before extraction, so
/// by now the ID is either on the link or in its URL.
fn post_id_for(link: &ResolvedLink) -> anyhow::Result<String> {
    link.content_id
        .clone()
        .or_else(|| extract_post_id(&link.url))
        .ok_or_else(|| anyhow!("no post id in {}", link.url))
}

pub fn is_captcha_page(html: &str) -> bool {
    CAPTCHA_MARKERS.iter().any(|marker| html.contains(marker))
        || (html.contains("Verify to continue") && !html.contains(REHYDRATION_ID))
}

fn is_valid_play_addr(url: &str) -> bool {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return false;
    }
    // placeholder URLs handed to suspected bots
    !(url.contains("verify") || url.contains("captcha"))
}

/// Pulls `itemStruct` out of a video page.
pub fn parse_rehydration_page(html: &str) -> anyhow::Result<Value> {
    if is_captcha_page(html) {
        return Err(anyhow!("TikTok is rate limiting requests, try again in a few minutes"));
    }

    let raw = html
        .split(REHYDRATION_OPEN)
        .nth(1)
        .and_then(|s| s.split("</script>").next())
        .ok_or_else(|| anyhow!("rehydration data not found in page"))?;

    let data: Value = serde_json::from_str(raw)
        .map_err(|e| anyhow!("rehydration data is not JSON: {}", e))?;

    let video_detail = data
        .pointer("/__DEFAULT_SCOPE__/webapp.video-detail")
        .ok_or_else(|| anyhow!("webapp.video-detail missing"))?;

    if let Some(status_msg) = video_detail
        .get("statusMsg")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
    {
        return Err(anyhow!("post not available: {}", status_msg));
    }
    if let Some(code) = video_detail.get("statusCode").and_then(|v| v.as_u64()) {
        if code != 0 {
            return Err(anyhow!("post not available (status {})", code));
        }
    }

    let detail = video_detail
        .pointer("/itemInfo/itemStruct")
        .ok_or_else(|| anyhow!("itemStruct missing"))?;

    if detail
        .get("isContentClassified")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
    {
        return Err(anyhow!("age-restricted content requires login"));
    }

    Ok(detail.clone())
}

/// Every play address the item lists, best-first: web page shape, API shape,
/// then the per-bitrate streams.
fn play_candidates(detail: &Value) -> Vec<CandidateFormat> {
    let mut urls: Vec<&str> = Vec::new();
    for pointer in ["/video/playAddr", "/video/play_addr/url_list", "/video/downloadAddr"] {
        match detail.pointer(pointer) {
            Some(Value::String(s)) => urls.push(s),
            Some(Value::Array(items)) => urls.extend(items.iter().filter_map(Value::as_str)),
            _ => {}
        }
    }
    let rates = detail.pointer("/video/bitrateInfo").and_then(Value::as_array);
    for rate in rates.into_iter().flatten() {
        if let Some(list) = rate.pointer("/PlayAddr/UrlList").and_then(Value::as_array) {
            urls.extend(list.iter().filter_map(Value::as_str));
        }
    }

    urls.into_iter()
        .filter(|u| is_valid_play_addr(u))
        .map(|u| CandidateFormat::new("mp4", u))
        .collect()
}

fn extract_video_url(detail: &Value) -> Option<String> {
    select_best_media_url(&play_candidates(detail))
}

fn stat(detail: &Value, camel: &str, snake: &str) -> u64 {
    let web = json_u64(detail, &format!("/stats/{}", camel));
    if web > 0 {
        web
    } else {
        json_u64(detail, &format!("/statistics/{}", snake))
    }
}

/// Builds metadata from either the web `itemStruct` or an API `aweme` item.
pub fn media_from_detail(detail: &Value, post_id: &str) -> MediaInfo {
    let title = json_str(detail, "/desc")
        .unwrap_or_else(|| format!("{} video {}", PLATFORM_NAME, post_id));
    let author = json_str(detail, "/author/nickname")
        .or_else(|| json_str(detail, "/author/uniqueId"))
        .or_else(|| json_str(detail, "/author/unique_id"))
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
    let cover = json_str(detail, "/video/cover")
        .or_else(|| json_str(detail, "/video/originCover"))
        .or_else(|| json_first_str(detail, "/video/cover/url_list"))
        .unwrap_or_default();

    // web pages report seconds, the mobile API milliseconds
    let duration = json_u64(detail, "/video/duration");
    let duration = if detail.pointer("/video/play_addr").is_some() {
        normalize_duration(duration)
    } else {
        duration
    };

    MediaInfo::new(&title, &author, &extract_video_url(detail).unwrap_or_default())
        .with_cover(cover)
        .with_duration(duration)
        .with_counts(
            stat(detail, "diggCount", "digg_count"),
            stat(detail, "commentCount", "comment_count"),
            stat(detail, "playCount", "play_count"),
            stat(detail, "shareCount", "share_count"),
        )
        .with_content_id(Some(post_id.to_string()))
}

/// Scrapes the rehydration JSON embedded in the video page.
pub struct RehydrationPageStrategy {
    client: reqwest::Client,
    base: String,
}

impl RehydrationPageStrategy {
    pub fn new(client: reqwest::Client, base: &str) -> Self {
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ExtractionStrategy for RehydrationPageStrategy {
    fn name(&self) -> &str {
        "tiktok-page"
    }

    async fn extract(&self, link: &ResolvedLink) -> anyhow::Result<MediaInfo> {
        let post_id = post_id_for(link)?;
        let url = format!("{}/@i/video/{}", self.base, post_id);

        tracing::debug!("TikTok: fetching {}", url);

        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, random_user_agent())
            .header("Accept", http_client::PAGE_ACCEPT)
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("TikTok returned HTTP {}", status));
        }

        let html = response.text().await?;
        tracing::debug!("TikTok: HTML length {}", html.len());

        let detail = parse_rehydration_page(&html)?;
        Ok(media_from_detail(&detail, &post_id))
    }
}

/// Mobile feed endpoint, used when the web page is blocked.
pub struct FeedApiStrategy {
    client: reqwest::Client,
    base: String,
}

impl FeedApiStrategy {
    pub fn new(client: reqwest::Client, base: &str) -> Self {
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ExtractionStrategy for FeedApiStrategy {
    fn name(&self) -> &str {
        "tiktok-feed-api"
    }

    async fn extract(&self, link: &ResolvedLink) -> anyhow::Result<MediaInfo> {
        let post_id = post_id_for(link)?;

        let response = self
            .client
            .get(format!("{}/aweme/v1/feed/", self.base))
            .query(&[("aweme_id", post_id.as_str())])
            .header(USER_AGENT, random_user_agent())
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response.json().await?;

        // the feed pads the list with unrelated posts when the ID is gone
        body.get("aweme_list")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .find(|item| json_str(item, "/aweme_id").as_deref() == Some(post_id.as_str()))
            .map(|item| media_from_detail(item, &post_id))
            .ok_or_else(|| anyhow!("TikTok API: post {} not in feed", post_id))
    }
}

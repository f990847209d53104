use std::sync::LazyLock;

use anyhow::anyhow;
use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use super::{view_count, ACCEPT_LANGUAGE, PLATFORM_NAME, REFERER};
use crate::core::formats::select_best_media_url;
use crate::core::http_client;
use crate::core::redirect::ResolvedLink;
use crate::core::scrape::{decode_escapes, json_first_str, json_str, json_u64, normalize_duration};
use crate::models::media::{CandidateFormat, MediaInfo, UNKNOWN_AUTHOR};
use crate::platforms::traits::ExtractionStrategy;

const SSR_MARKER: &str = "window._SSR_HYDRATED_DATA";

static DESC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""desc"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap());
static NICKNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""nickname"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap());
static PLAY_ADDR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""playAddr"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap());
static SRC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""src"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap());
static COVER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""cover"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap());
static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""duration"\s*:\s*(\d+)"#).unwrap());
static DIGG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""diggCount"\s*:\s*(\d+)"#).unwrap());
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""commentCount"\s*:\s*(\d+)"#).unwrap());
static SHARE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""shareCount"\s*:\s*(\d+)"#).unwrap());
static PLAY_COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""playCount"\s*:\s*(\d+)"#).unwrap());

/// Scrapes the server-rendered video page.
pub struct SsrPageStrategy {
    client: reqwest::Client,
    base: String,
}

impl SsrPageStrategy {
    pub fn new(client: reqwest::Client, base: &str) -> Self {
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    async fn warm_cookies(&self) {
        let home = format!("{}/", self.base);
        match self
            .client
            .get(&home)
            .headers(http_client::browser_headers(ACCEPT_LANGUAGE))
            .send()
            .await
        {
            Ok(r) => tracing::debug!("Douyin: home page HTTP {}", r.status()),
            Err(e) => tracing::debug!("Douyin: home page warm-up failed: {}", e),
        }
    }
}

#[async_trait]
impl ExtractionStrategy for SsrPageStrategy {
    fn name(&self) -> &str {
        "douyin-page"
    }

    async fn extract(&self, link: &ResolvedLink) -> anyhow::Result<MediaInfo> {
        self.warm_cookies().await;

        let page_url = match &link.content_id {
            Some(id) => format!("{}/video/{}", self.base, id),
            None => link.url.clone(),
        };
        tracing::debug!("Douyin: fetching page {}", page_url);

        let response = self
            .client
            .get(&page_url)
            .headers(http_client::browser_headers(ACCEPT_LANGUAGE))
            .header("Referer", REFERER)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("page returned HTTP {}", status));
        }

        let html = response.text().await?;
        parse_ssr_page(&html, link.content_id_or_pending())
    }
}

/// Extracts metadata from a rendered page. Structured JSON first, regex over
/// the raw script when the blob is not valid JSON.
pub fn parse_ssr_page(html: &str, content_id: &str) -> anyhow::Result<MediaInfo> {
    let script = find_ssr_script(html).ok_or_else(|| anyhow!("SSR data not found in page"))?;
    let blob = ssr_blob(&script).ok_or_else(|| anyhow!("SSR data assignment not found"))?;
    let cleaned = null_out_undefined(blob);

    match serde_json::from_str::<Value>(&cleaned) {
        Ok(data) => {
            let detail = data
                .pointer("/app/initialState/aweme/detail")
                .filter(|d| d.is_object())
                .ok_or_else(|| anyhow!("no video detail in SSR data"))?;
            Ok(parse_ssr_detail(detail, content_id))
        }
        Err(e) => {
            tracing::debug!("Douyin: SSR blob is not JSON ({}), scraping fields", e);
            scrape_fields(blob, content_id)
        }
    }
}

fn find_ssr_script(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("script").unwrap();

    doc.select(&sel)
        .map(|el| el.text().collect::<String>())
        .find(|text| text.contains(SSR_MARKER))
}

fn ssr_blob(script: &str) -> Option<&str> {
    let after_marker = &script[script.find(SSR_MARKER)? + SSR_MARKER.len()..];
    let after_eq = &after_marker[after_marker.find('=')? + 1..];
    let blob = after_eq.trim().trim_end_matches(';').trim_end();
    (!blob.is_empty()).then_some(blob)
}

fn absolute(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{}", url)
    } else {
        url.to_string()
    }
}

fn stat(detail: &Value, field: &str) -> u64 {
    let primary = json_u64(detail, &format!("/statistics/{}", field));
    if primary > 0 {
        primary
    } else {
        json_u64(detail, &format!("/stats/{}", field))
    }
}

fn parse_ssr_detail(detail: &Value, content_id: &str) -> MediaInfo {
    let title = json_str(detail, "/desc")
        .unwrap_or_else(|| format!("{} video {}", PLATFORM_NAME, content_id));
    let author = json_str(detail, "/authorInfo/nickname")
        .or_else(|| json_str(detail, "/author/nickname"))
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

    let candidates: Vec<CandidateFormat> = match detail.pointer("/video/playAddr") {
        Some(Value::String(s)) => vec![CandidateFormat::new("mp4", &absolute(s))],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.get("src").and_then(|v| v.as_str()))
            .filter(|s| !s.is_empty())
            .map(|s| CandidateFormat::new("mp4", &absolute(s)))
            .collect(),
        _ => Vec::new(),
    };
    let media_url = select_best_media_url(&candidates).unwrap_or_default();

    let cover = json_str(detail, "/video/cover")
        .or_else(|| json_str(detail, "/video/originCover"))
        .or_else(|| json_first_str(detail, "/video/cover/urlList"))
        .map(|c| absolute(&c))
        .unwrap_or_default();

    MediaInfo::new(&title, &author, &media_url)
        .with_cover(cover)
        .with_duration(normalize_duration(json_u64(detail, "/video/duration")))
        .with_counts(
            stat(detail, "diggCount"),
            stat(detail, "commentCount"),
            view_count(stat(detail, "playCount"), stat(detail, "shareCount")),
            stat(detail, "shareCount"),
        )
}

/// Swaps bare `undefined` values for `null`. String contents are left alone.
fn null_out_undefined(blob: &str) -> String {
    const WORD: &str = "undefined";

    let mut out = String::with_capacity(blob.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut rest = blob;

    while let Some(c) = rest.chars().next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if rest.starts_with(WORD)
            && is_token_edge(out.chars().next_back())
            && is_token_edge(rest[WORD.len()..].chars().next())
        {
            out.push_str("null");
            rest = &rest[WORD.len()..];
            continue;
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }

    out
}

fn is_token_edge(c: Option<char>) -> bool {
    !c.is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| decode_escapes(m.as_str()).trim().to_string())
        .filter(|s| !s.is_empty())
}

fn capture_u64(re: &Regex, text: &str) -> u64 {
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

fn scrape_fields(raw: &str, content_id: &str) -> anyhow::Result<MediaInfo> {
    let desc = capture(&DESC_RE, raw);
    let nickname = capture(&NICKNAME_RE, raw);
    let media = capture(&PLAY_ADDR_RE, raw)
        .or_else(|| capture(&SRC_RE, raw))
        .map(|u| absolute(&u));

    if desc.is_none() && nickname.is_none() && media.is_none() {
        return Err(anyhow!("no recognisable fields in SSR data"));
    }

    let title = desc.unwrap_or_else(|| format!("{} video {}", PLATFORM_NAME, content_id));
    let author = nickname.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
    let cover = capture(&COVER_RE, raw).map(|c| absolute(&c)).unwrap_or_default();

    Ok(MediaInfo::new(&title, &author, media.as_deref().unwrap_or(""))
        .with_cover(cover)
        .with_duration(normalize_duration(capture_u64(&DURATION_RE, raw)))
        .with_counts(
            capture_u64(&DIGG_RE, raw),
            capture_u64(&COMMENT_RE, raw),
            view_count(capture_u64(&PLAY_COUNT_RE, raw), capture_u64(&SHARE_RE, raw)),
            capture_u64(&SHARE_RE, raw),
        ))
}

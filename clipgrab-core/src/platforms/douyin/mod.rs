mod api;
mod page;

use std::time::Duration;

use serde_json::Value;

pub use api::{MobileApiStrategy, WebApiStrategy};
pub use page::{parse_ssr_page, SsrPageStrategy};

use crate::core::chain::StrategyChain;
use crate::core::formats::select_best_media_url;
use crate::core::http_client;
use crate::core::scrape::{json_first_str, json_str, json_u64, normalize_duration};
use crate::models::media::{CandidateFormat, MediaInfo, UNKNOWN_AUTHOR};
use crate::models::settings::AppSettings;

pub const PLATFORM_NAME: &str = "Douyin";
pub const REFERER: &str = "https://www.douyin.com/";
pub const ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Hosts the Douyin strategies talk to. Overridable so tests can point them
/// at a local server.
#[derive(Debug, Clone)]
pub struct DouyinEndpoints {
    pub mobile_api: String,
    pub web: String,
}

impl Default for DouyinEndpoints {
    fn default() -> Self {
        Self {
            mobile_api: "https://api.amemv.com".to_string(),
            web: "https://www.douyin.com".to_string(),
        }
    }
}

/// Client shared by all Douyin strategies so cookies picked up while warming
/// the home page are reused.
pub fn build_client(settings: &AppSettings) -> reqwest::Client {
    let builder = reqwest::Client::builder()
        .cookie_store(true)
        .timeout(REQUEST_TIMEOUT);

    http_client::apply_proxy(builder, &settings.proxy)
        .build()
        .unwrap_or_default()
}

pub fn chain(settings: &AppSettings) -> StrategyChain {
    chain_with(settings, DouyinEndpoints::default())
}

pub fn chain_with(settings: &AppSettings, endpoints: DouyinEndpoints) -> StrategyChain {
    let client = build_client(settings);

    StrategyChain::new(vec![
        Box::new(MobileApiStrategy::new(client.clone(), &endpoints.mobile_api)),
        Box::new(WebApiStrategy::new(client.clone(), &endpoints.web)),
        Box::new(SsrPageStrategy::new(client, &endpoints.web)),
    ])
    .with_timeout(Duration::from_secs(settings.extractor.strategy_timeout_secs))
}

/// Reads an `aweme_detail` object as returned by both JSON APIs.
pub fn parse_aweme_detail(detail: &Value, content_id: &str) -> MediaInfo {
    let title = json_str(detail, "/desc")
        .unwrap_or_else(|| format!("{} video {}", PLATFORM_NAME, content_id));
    let author = json_str(detail, "/author/nickname").unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

    let mut candidates = Vec::new();
    if let Some(rates) = detail.pointer("/video/bit_rate").and_then(|v| v.as_array()) {
        for rate in rates {
            push_url_list(&mut candidates, rate, "/play_addr/url_list");
        }
    }
    push_url_list(&mut candidates, detail, "/video/play_addr/url_list");
    push_url_list(&mut candidates, detail, "/video/download_addr/url_list");

    let media_url = select_best_media_url(&candidates).unwrap_or_default();
    let cover = json_first_str(detail, "/video/cover/url_list")
        .or_else(|| json_first_str(detail, "/video/origin_cover/url_list"))
        .unwrap_or_default();

    MediaInfo::new(&title, &author, &media_url)
        .with_cover(cover)
        .with_duration(normalize_duration(json_u64(detail, "/video/duration")))
        .with_counts(
            json_u64(detail, "/statistics/digg_count"),
            json_u64(detail, "/statistics/comment_count"),
            view_count(
                json_u64(detail, "/statistics/play_count"),
                json_u64(detail, "/statistics/share_count"),
            ),
            json_u64(detail, "/statistics/share_count"),
        )
}

/// Douyin mostly reports zero plays; the share count stands in for views then.
pub(crate) fn view_count(plays: u64, shares: u64) -> u64 {
    if plays > 0 {
        plays
    } else {
        shares
    }
}

fn push_url_list(out: &mut Vec<CandidateFormat>, value: &Value, pointer: &str) {
    let Some(list) = value.pointer(pointer).and_then(|v| v.as_array()) else {
        return;
    };
    out.extend(
        list.iter()
            .filter_map(|u| u.as_str())
            .filter(|u| !u.is_empty())
            .map(|u| CandidateFormat::new("mp4", u)),
    );
}

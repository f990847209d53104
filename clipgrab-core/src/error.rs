use thiserror::Error;

/// Failures the pipeline surfaces to the user. Everything else is logged and
/// absorbed into degraded results.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("please provide a share link")]
    EmptyInput,
    #[error("unrecognised link, please check it belongs to a supported platform")]
    UnrecognizedPlatform,
}

pub const DOWNLOAD_FAILED: &str = "download failed, please retry later";

const DETAIL_LIMIT: usize = 100;

/// Maps a raw extractor error onto a short, user-facing category.
pub fn describe_failure(detail: &str) -> String {
    let lowered = detail.to_lowercase();
    if lowered.contains("login") || lowered.contains("private") {
        "content is private or login-gated".to_string()
    } else if lowered.contains("not found") || lowered.contains("404") {
        "content not found".to_string()
    } else {
        let short: String = detail.trim().chars().take(DETAIL_LIMIT).collect();
        format!("extraction failed: {}", short)
    }
}

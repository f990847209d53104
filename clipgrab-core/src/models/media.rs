use serde::{Deserialize, Serialize};

pub const MAX_TITLE_CHARS: usize = 200;
pub const PENDING_CONTENT_ID: &str = "pending";
pub const UNKNOWN_AUTHOR: &str = "Unknown author";

/// Metadata and (optionally) a direct media URL for one piece of content.
///
/// An empty `media_url` is a valid, informational-only result. Values are not
/// mutated once built: the `with_*` helpers consume `self` and return a new
/// value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub title: String,
    pub author: String,
    /// Sent as `video_url`, the name web clients read.
    #[serde(rename = "video_url", alias = "media_url")]
    pub media_url: String,
    pub cover_url: String,
    pub duration: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub view_count: u64,
    pub share_count: u64,
    /// ID reported by the extractor when the link itself did not carry one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MediaInfo {
    pub fn new(title: &str, author: &str, media_url: &str) -> Self {
        Self {
            title: truncate_title(title),
            author: author.to_string(),
            media_url: media_url.to_string(),
            ..Default::default()
        }
    }

    /// Placeholder returned when no strategy produced anything.
    pub fn degraded(platform_name: &str, content_id: &str, error: impl Into<String>) -> Self {
        Self {
            title: truncate_title(&format!("{} video {}", platform_name, content_id)),
            author: UNKNOWN_AUTHOR.to_string(),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn has_media_url(&self) -> bool {
        !self.media_url.trim().is_empty()
    }

    pub fn with_cover(self, cover_url: impl Into<String>) -> Self {
        Self {
            cover_url: cover_url.into(),
            ..self
        }
    }

    pub fn with_duration(self, duration: u64) -> Self {
        Self { duration, ..self }
    }

    pub fn with_counts(self, likes: u64, comments: u64, views: u64, shares: u64) -> Self {
        Self {
            like_count: likes,
            comment_count: comments,
            view_count: views,
            share_count: shares,
            ..self
        }
    }

    pub fn with_content_id(self, content_id: Option<String>) -> Self {
        Self { content_id, ..self }
    }
}

pub fn truncate_title(title: &str) -> String {
    title.trim().chars().take(MAX_TITLE_CHARS).collect()
}

/// One downloadable rendition reported by an extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateFormat {
    pub ext: String,
    pub url: String,
}

impl CandidateFormat {
    pub fn new(ext: &str, url: &str) -> Self {
        Self {
            ext: ext.to_string(),
            url: url.to_string(),
        }
    }
}

/// What the pipeline hands back for one share link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub success: bool,
    pub platform: String,
    pub platform_name: String,
    pub video_id: String,
    pub video_info: MediaInfo,
    pub has_download_url: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResult {
    pub success: bool,
    pub filename: Option<String>,
    pub file_size_bytes: u64,
    pub error: Option<String>,
}

impl DownloadResult {
    pub fn completed(filename: String, file_size_bytes: u64) -> Self {
        Self {
            success: true,
            filename: Some(filename),
            file_size_bytes,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            filename: None,
            file_size_bytes: 0,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_truncated_by_chars_not_bytes() {
        let long = "视".repeat(MAX_TITLE_CHARS + 50);
        let info = MediaInfo::new(&long, "a", "");
        assert_eq!(info.title.chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn degraded_has_placeholder_fields() {
        let info = MediaInfo::degraded("Douyin", "7301", "boom");
        assert_eq!(info.title, "Douyin video 7301");
        assert_eq!(info.author, UNKNOWN_AUTHOR);
        assert!(!info.has_media_url());
        assert_eq!(info.like_count + info.comment_count + info.view_count, 0);
        assert_eq!(info.error.as_deref(), Some("boom"));
    }

    #[test]
    fn builders_return_new_values() {
        let base = MediaInfo::new("t", "a", "https://cdn/x.mp4");
        let richer = base.clone().with_duration(12).with_counts(1, 2, 3, 4);
        assert_eq!(base.duration, 0);
        assert_eq!(richer.duration, 12);
        assert_eq!(richer.view_count, 3);
        assert_eq!(richer.share_count, 4);
    }

    #[test]
    fn error_field_omitted_when_absent() {
        let json = serde_json::to_value(MediaInfo::new("t", "a", "")).unwrap();
        assert!(json.get("error").is_none());
    }

    #[test]
    fn media_url_travels_as_video_url() {
        let json = serde_json::to_value(MediaInfo::new("t", "a", "https://cdn/x.mp4")).unwrap();
        assert_eq!(json["video_url"], "https://cdn/x.mp4");
        assert!(json.get("media_url").is_none());

        let old: MediaInfo = serde_json::from_value(serde_json::json!({
            "title": "t", "author": "a", "media_url": "https://cdn/y.mp4", "cover_url": "",
            "duration": 0, "like_count": 0, "comment_count": 0, "view_count": 0, "share_count": 0
        }))
        .unwrap();
        assert_eq!(old.media_url, "https://cdn/y.mp4");
    }
}

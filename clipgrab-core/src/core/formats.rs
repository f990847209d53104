use crate::models::media::CandidateFormat;

/// CDN URLs carrying this marker serve media with a visible overlay.
pub const WATERMARK_MARKER: &str = "wm";

fn is_mp4(format: &CandidateFormat) -> bool {
    format.ext.eq_ignore_ascii_case("mp4") && !format.url.is_empty()
}

fn has_watermark(format: &CandidateFormat) -> bool {
    format.url.to_lowercase().contains(WATERMARK_MARKER)
}

/// Picks the media URL to hand out from formats listed best-first.
///
/// Clean mp4 beats watermarked mp4, which beats any other non-empty URL.
/// `None` means the result is metadata-only.
pub fn select_best_media_url(formats: &[CandidateFormat]) -> Option<String> {
    formats
        .iter()
        .find(|f| is_mp4(f) && !has_watermark(f))
        .or_else(|| formats.iter().find(|f| is_mp4(f)))
        .or_else(|| formats.iter().find(|f| !f.url.is_empty()))
        .map(|f| f.url.clone())
}

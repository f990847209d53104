use async_trait::async_trait;

use crate::core::redirect::ResolvedLink;
use crate::models::media::MediaInfo;

/// One way of turning a resolved link into media metadata.
///
/// A returned `MediaInfo` without a media URL is a partial success; the chain
/// keeps going but remembers it.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &str;
    async fn extract(&self, link: &ResolvedLink) -> anyhow::Result<MediaInfo>;
}

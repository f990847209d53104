use std::time::Duration;

use crate::core::redirect::ResolvedLink;
use crate::error::describe_failure;
use crate::models::media::MediaInfo;
use crate::platforms::traits::ExtractionStrategy;

pub const DEFAULT_STRATEGY_TIMEOUT: Duration = Duration::from_secs(20);

/// Ordered fallback list of extraction strategies for one platform.
pub struct StrategyChain {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    timeout: Duration,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self {
            strategies,
            timeout: DEFAULT_STRATEGY_TIMEOUT,
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Runs strategies in order until one yields a media URL.
    ///
    /// Never fails: falls back to the first metadata-only result, then to a
    /// degraded placeholder carrying the last error.
    pub async fn run(&self, link: &ResolvedLink) -> MediaInfo {
        let mut partial: Option<MediaInfo> = None;
        let mut last_error = String::from("no extraction strategy available");

        for strategy in &self.strategies {
            tracing::debug!("{}: trying {}", link.platform_name, strategy.name());

            match tokio::time::timeout(self.timeout, strategy.extract(link)).await {
                Ok(Ok(info)) if info.has_media_url() => {
                    tracing::info!("{}: {} found media URL", link.platform_name, strategy.name());
                    return info;
                }
                Ok(Ok(info)) => {
                    tracing::debug!("{}: {} returned metadata only", link.platform_name, strategy.name());
                    partial.get_or_insert(info);
                }
                Ok(Err(e)) => {
                    tracing::warn!("{}: {} failed: {:#}", link.platform_name, strategy.name(), e);
                    last_error = format!("{:#}", e);
                }
                Err(_) => {
                    tracing::warn!(
                        "{}: {} timed out after {:?}",
                        link.platform_name,
                        strategy.name(),
                        self.timeout
                    );
                    last_error = format!("{} timed out", strategy.name());
                }
            }
        }

        if let Some(info) = partial {
            return info;
        }

        tracing::warn!("{}: every strategy failed, returning placeholder", link.platform_name);
        MediaInfo::degraded(
            link.platform_name,
            link.content_id_or_pending(),
            describe_failure(&last_error),
        )
    }
}

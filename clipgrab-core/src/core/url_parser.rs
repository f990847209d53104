use regex::Regex;
use std::sync::LazyLock;

use crate::core::registry::PlatformRegistry;

static GENERIC_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"]+"#).unwrap());

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '\'', '"'];

/// Pulls the shared link out of a pasted share message.
///
/// Platform share-link patterns are tried in registry order, then any
/// http(s) URL. Text without a URL is returned trimmed, since it may itself
/// be the link.
pub fn extract_url(registry: &PlatformRegistry, text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }

    let found = registry
        .iter()
        .flat_map(|p| p.link_patterns().iter())
        .chain(std::iter::once(&*GENERIC_URL_RE))
        .find_map(|re| re.find(text));

    match found {
        Some(m) => {
            let url = m.as_str().trim_end_matches(TRAILING_PUNCTUATION).to_string();
            tracing::debug!("Extracted URL from share text: {}", url);
            url
        }
        None => text.to_string(),
    }
}

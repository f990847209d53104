use regex::Regex;

pub mod douyin;
pub mod generic_ytdlp;
pub mod tiktok;
pub mod traits;

/// Static description of one supported platform.
#[derive(Debug)]
pub struct PlatformDescriptor {
    pub key: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    /// Origin sent as `Referer` when fetching media from this platform's CDN.
    pub referer: &'static str,
    pub uses_short_links: bool,
    host_patterns: Vec<Regex>,
    link_patterns: Vec<Regex>,
    id_patterns: Vec<Regex>,
}

impl PlatformDescriptor {
    pub fn matches_host(&self, lowered_url: &str) -> bool {
        self.host_patterns.iter().any(|re| re.is_match(lowered_url))
    }

    /// Share-link patterns, in the order they should be tried.
    pub fn link_patterns(&self) -> &[Regex] {
        &self.link_patterns
    }

    pub fn extract_content_id(&self, url: &str) -> Option<String> {
        self.id_patterns
            .iter()
            .find_map(|re| re.captures(url))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

/// Matches `domain` only at a host boundary, so `netflix.com` is not `x.com`.
fn host_pattern(domain: &str) -> Regex {
    Regex::new(&format!(r"(?:^|[/.@]){}(?:[/:?#]|$)", regex::escape(domain))).unwrap()
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

struct BuiltinPlatform {
    key: &'static str,
    name: &'static str,
    icon: &'static str,
    referer: &'static str,
    uses_short_links: bool,
    hosts: &'static [&'static str],
    links: &'static [&'static str],
    ids: &'static [&'static str],
}

const BUILTIN: &[BuiltinPlatform] = &[
    BuiltinPlatform {
        key: "tiktok",
        name: "TikTok",
        icon: "🎵",
        referer: "https://www.tiktok.com/",
        uses_short_links: true,
        hosts: &["tiktok.com"],
        links: &[
            r"https?://vm\.tiktok\.com/[\w-]+/?",
            r"https?://www\.tiktok\.com/t/[\w-]+/?",
            r"https?://www\.tiktok\.com/@[^/\s]+/video/\d+",
            r"https?://m\.tiktok\.com/v/\d+\.html",
        ],
        ids: &[r"/video/(\d+)", r"/v/(\d+)\.html"],
    },
    BuiltinPlatform {
        key: "douyin",
        name: "Douyin",
        icon: "🎶",
        referer: "https://www.douyin.com/",
        uses_short_links: true,
        hosts: &["douyin.com", "iesdouyin.com"],
        links: &[
            r"https?://v\.douyin\.com/[A-Za-z0-9_-]+/?",
            r"https?://www\.douyin\.com/video/\d+",
            r"https?://www\.iesdouyin\.com/share/video/\d+",
            r"https?://www\.douyin\.com/share/video/\d+",
        ],
        ids: &[
            r"/video/(\d+)",
            r"item_ids=(\d+)",
            r"aweme_id=(\d+)",
            r"/(\d+)\?",
            r"/share/video/(\d+)",
        ],
    },
    BuiltinPlatform {
        key: "instagram",
        name: "Instagram",
        icon: "📸",
        referer: "https://www.instagram.com/",
        uses_short_links: false,
        hosts: &["instagram.com", "instagr.am"],
        links: &[r"https?://(?:www\.)?instagram\.com/(?:p|reel)/[A-Za-z0-9_-]+/?"],
        ids: &[],
    },
    BuiltinPlatform {
        key: "youtube",
        name: "YouTube",
        icon: "🎬",
        referer: "https://www.youtube.com/",
        uses_short_links: false,
        hosts: &["youtube.com", "youtu.be"],
        links: &[
            r"https?://(?:www\.)?youtube\.com/watch\?v=[A-Za-z0-9_-]+",
            r"https?://youtu\.be/[A-Za-z0-9_-]+",
            r"https?://(?:www\.)?youtube\.com/shorts/[A-Za-z0-9_-]+",
        ],
        ids: &[],
    },
    BuiltinPlatform {
        key: "twitter",
        name: "Twitter/X",
        icon: "🐦",
        referer: "https://x.com/",
        uses_short_links: false,
        hosts: &["twitter.com", "x.com"],
        links: &[r"https?://(?:www\.)?(?:twitter|x)\.com/[^/\s]+/status/\d+"],
        ids: &[],
    },
    BuiltinPlatform {
        key: "facebook",
        name: "Facebook",
        icon: "📘",
        referer: "https://www.facebook.com/",
        uses_short_links: false,
        hosts: &["facebook.com", "fb.watch", "fb.com"],
        links: &[
            r"https?://(?:www\.)?facebook\.com/\S+/videos/\d+",
            r"https?://fb\.watch/[A-Za-z0-9_-]+/?",
        ],
        ids: &[],
    },
    BuiltinPlatform {
        key: "bilibili",
        name: "Bilibili",
        icon: "📺",
        referer: "https://www.bilibili.com/",
        uses_short_links: false,
        hosts: &["bilibili.com", "b23.tv"],
        links: &[
            r"https?://(?:www\.)?bilibili\.com/video/[A-Za-z0-9]+",
            r"https?://b23\.tv/[A-Za-z0-9]+",
        ],
        ids: &[],
    },
    BuiltinPlatform {
        key: "weibo",
        name: "Weibo",
        icon: "🔴",
        referer: "https://weibo.com/",
        uses_short_links: false,
        hosts: &["weibo.com", "weibo.cn"],
        links: &[
            r"https?://(?:www\.)?weibo\.com/tv/show/[\d:]+",
            r"https?://(?:m\.)?weibo\.cn/\S+",
        ],
        ids: &[],
    },
];

/// The built-in platform table, in classification order.
pub fn builtin_descriptors() -> Vec<PlatformDescriptor> {
    BUILTIN
        .iter()
        .map(|s| PlatformDescriptor {
            key: s.key,
            name: s.name,
            icon: s.icon,
            referer: s.referer,
            uses_short_links: s.uses_short_links,
            host_patterns: s.hosts.iter().map(|h| host_pattern(h)).collect(),
            link_patterns: compile(s.links),
            id_patterns: compile(s.ids),
        })
        .collect()
}

/// Origin referer for a platform key, for CDN requests made outside a chain.
pub fn referer_for(key: &str) -> Option<&'static str> {
    BUILTIN.iter().find(|s| s.key == key).map(|s| s.referer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn douyin() -> PlatformDescriptor {
        builtin_descriptors()
            .into_iter()
            .find(|d| d.key == "douyin")
            .unwrap()
    }

    #[test]
    fn host_pattern_respects_boundaries() {
        let re = host_pattern("x.com");
        assert!(re.is_match("https://x.com/user/status/1"));
        assert!(re.is_match("x.com"));
        assert!(!re.is_match("https://netflix.com/title/1"));
        assert!(!re.is_match("https://x.community/"));
    }

    #[test]
    fn douyin_id_patterns_in_order() {
        let d = douyin();
        assert_eq!(
            d.extract_content_id("https://www.douyin.com/video/7301234567890").as_deref(),
            Some("7301234567890")
        );
        assert_eq!(
            d.extract_content_id("https://www.iesdouyin.com/share/slides/?item_ids=42&x=1").as_deref(),
            Some("42")
        );
        assert_eq!(d.extract_content_id("https://v.douyin.com/AbC123/"), None);
    }

    #[test]
    fn every_descriptor_has_links_and_hosts() {
        for d in builtin_descriptors() {
            assert!(!d.link_patterns().is_empty(), "{} has no link patterns", d.key);
            assert!(!d.host_patterns.is_empty(), "{} has no host patterns", d.key);
        }
    }

    #[test]
    fn referer_lookup() {
        assert_eq!(referer_for("douyin"), Some("https://www.douyin.com/"));
        assert_eq!(referer_for("tiktok"), Some("https://www.tiktok.com/"));
        assert_eq!(referer_for("other"), None);
    }
}

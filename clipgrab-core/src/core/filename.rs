use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

pub const MEDIA_EXTENSION: &str = "mp4";

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Makes `name` safe as one path component on every desktop OS. Forbidden
/// characters become their full-width look-alikes.
pub fn sanitize_path_component(name: &str) -> String {
    let name: String = name.nfc().collect();
    let name = name.trim().replace(['\t', '\n', '\r'], "");
    let name = WS_RE.replace_all(&name, " ");

    let name = name.trim_start_matches('.').trim_end_matches([' ', '-', '.', ';']);

    let forbidden: &[(char, char)] = &[
        ('<', '＜'),
        ('>', '＞'),
        (':', '꞉'),
        ('"', '＂'),
        ('/', '⧸'),
        ('\\', '＼'),
        ('|', '｜'),
        ('?', '？'),
        ('*', ' '),
    ];

    let mut result = name.to_string();
    for (from, to) in forbidden {
        result = result.replace(*from, &to.to_string());
    }

    sanitize_filename::sanitize(result.trim())
}

fn platform_slug(platform: &str) -> String {
    let slug: String = platform
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if slug.is_empty() {
        "video".to_string()
    } else {
        slug
    }
}

/// `{prefix}_{unix_ts}_{8 hex}.mp4`.
fn unique_name(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}.{}",
        prefix,
        chrono::Utc::now().timestamp(),
        &suffix[..8],
        MEDIA_EXTENSION
    )
}

pub fn generated_filename(platform: &str) -> String {
    unique_name(&platform_slug(platform))
}

/// Last path component of a caller hint, sanitized and without `.mp4`.
fn hint_stem(hint: &str) -> Option<String> {
    let last = hint.rsplit(['/', '\\']).next().unwrap_or(hint);
    let clean = sanitize_path_component(last);

    let dotted = format!(".{}", MEDIA_EXTENSION);
    let stem = clean
        .len()
        .checked_sub(dotted.len())
        .filter(|&i| clean.get(i..).is_some_and(|tail| tail.eq_ignore_ascii_case(&dotted)))
        .map_or(clean.as_str(), |i| &clean[..i])
        .trim_end_matches([' ', '-', '.', ';']);

    (!stem.is_empty()).then(|| stem.to_string())
}

/// Destination file name for a download. A caller hint only picks the prefix;
/// the timestamp and random suffix keep every download in its own file.
pub fn download_filename(platform: &str, hint: Option<&str>) -> String {
    match hint.map(str::trim).filter(|h| !h.is_empty()).and_then(hint_stem) {
        Some(stem) => unique_name(&stem),
        None => generated_filename(platform),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_basic_forbidden_chars() {
        assert_eq!(sanitize_path_component("a:b?c"), "a꞉b？c");
    }

    #[test]
    fn sanitize_collapses_whitespace() {
        assert_eq!(sanitize_path_component("hello   world"), "hello world");
    }

    #[test]
    fn sanitize_trims_dots_and_trailing_punctuation() {
        assert_eq!(sanitize_path_component("file name - "), "file name");
        assert_eq!(sanitize_path_component(".."), "");
        assert_eq!(sanitize_path_component(".hidden"), "hidden");
    }

    #[test]
    fn sanitize_unicode_nfc_normalization() {
        let decomposed = "e\u{0301}";
        assert_eq!(sanitize_path_component(decomposed), "\u{00e9}");
    }

    #[test]
    fn generated_name_shape() {
        let name = download_filename("douyin", None);
        let parts: Vec<&str> = name.trim_end_matches(".mp4").split('_').collect();
        assert!(name.ends_with(".mp4"));
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "douyin");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_names_differ() {
        assert_ne!(download_filename("tiktok", None), download_filename("tiktok", None));
    }

    #[test]
    fn odd_platform_keys_fall_back() {
        assert!(download_filename("", None).starts_with("video_"));
        assert!(download_filename("../..", None).starts_with("video_"));
    }

    fn assert_unique_shape(name: &str, prefix: &str) {
        let rest = name
            .strip_prefix(prefix)
            .and_then(|r| r.strip_prefix('_'))
            .and_then(|r| r.strip_suffix(".mp4"))
            .unwrap_or_else(|| panic!("{} does not start with {}", name, prefix));
        let (ts, random) = rest.split_once('_').unwrap();
        assert!(ts.parse::<i64>().is_ok());
        assert_eq!(random.len(), 8);
    }

    #[test]
    fn hint_reduced_to_single_component() {
        assert_unique_shape(&download_filename("douyin", Some("../../etc/passwd")), "passwd");
        assert_unique_shape(&download_filename("douyin", Some("a\\b\\clip.MP4")), "clip");
        assert_unique_shape(&download_filename("douyin", Some("my clip")), "my clip");
    }

    #[test]
    fn same_hint_never_repeats_a_name() {
        let first = download_filename("douyin", Some("holiday.mp4"));
        let second = download_filename("douyin", Some("holiday.mp4"));
        assert_ne!(first, second);
        assert_ne!(first, "holiday.mp4");
    }

    #[test]
    fn useless_hint_generates_name() {
        assert!(download_filename("tiktok", Some("..")).starts_with("tiktok_"));
        assert!(download_filename("tiktok", Some("   ")).starts_with("tiktok_"));
        assert!(download_filename("tiktok", Some("dir/")).starts_with("tiktok_"));
    }
}

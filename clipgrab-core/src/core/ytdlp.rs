use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::anyhow;

use crate::fs_paths;
use crate::models::media::CandidateFormat;

fn bin_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    }
}

/// Options handed to yt-dlp, rendered to command-line flags by [`YtdlpOptions::to_args`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YtdlpOptions {
    pub quiet: bool,
    pub no_warnings: bool,
    pub extract_flat: bool,
    pub skip_download: bool,
    pub http_headers: Vec<(String, String)>,
    pub cookies_from_browser: Option<String>,
    pub outtmpl: Option<String>,
    pub format: Option<String>,
    pub retries: Option<u32>,
    pub fragment_retries: Option<u32>,
    pub skip_unavailable_fragments: bool,
    pub force_overwrites: bool,
}

impl YtdlpOptions {
    /// Metadata-only probing, as used by the extraction chain.
    pub fn metadata_only() -> Self {
        Self {
            quiet: true,
            no_warnings: true,
            skip_download: true,
            ..Default::default()
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.http_headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.quiet {
            args.push("--quiet".to_string());
        }
        if self.no_warnings {
            args.push("--no-warnings".to_string());
        }
        if self.extract_flat {
            args.push("--flat-playlist".to_string());
        } else {
            args.push("--no-playlist".to_string());
        }
        if self.skip_download {
            args.push("--skip-download".to_string());
        }
        for (name, value) in &self.http_headers {
            args.push("--add-header".to_string());
            args.push(format!("{}:{}", name, value));
        }
        if let Some(browser) = &self.cookies_from_browser {
            args.push("--cookies-from-browser".to_string());
            args.push(browser.clone());
        }
        if let Some(tmpl) = &self.outtmpl {
            args.push("-o".to_string());
            args.push(tmpl.clone());
        }
        if let Some(fmt) = &self.format {
            args.push("-f".to_string());
            args.push(fmt.clone());
        }
        if let Some(n) = self.retries {
            args.push("--retries".to_string());
            args.push(n.to_string());
        }
        if let Some(n) = self.fragment_retries {
            args.push("--fragment-retries".to_string());
            args.push(n.to_string());
        }
        if self.skip_unavailable_fragments {
            args.push("--skip-unavailable-fragments".to_string());
        }
        if self.force_overwrites {
            args.push("--force-overwrites".to_string());
        }

        args
    }
}

pub async fn find_ytdlp(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        tracing::warn!("Configured yt-dlp not found at {}", path.display());
    }

    if let Ok(status) = tokio::process::Command::new(bin_name())
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        if status.success() {
            return Some(PathBuf::from(bin_name()));
        }
    }

    let managed = fs_paths::bin_dir().join(bin_name());
    if managed.exists() {
        return Some(managed);
    }

    None
}

pub async fn ensure_ytdlp(configured: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(path) = find_ytdlp(configured).await {
        return Ok(path);
    }

    download_ytdlp_binary().await
}

async fn download_ytdlp_binary() -> anyhow::Result<PathBuf> {
    let target = fs_paths::bin_dir().join(bin_name());

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let download_url = if cfg!(target_os = "windows") {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp.exe"
    } else if cfg!(target_os = "macos") {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp_macos"
    } else {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp"
    };

    tracing::info!("Fetching yt-dlp into {}", target.display());

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()?;

    let response = client.get(download_url).send().await?;

    if !response.status().is_success() {
        return Err(anyhow!("yt-dlp download failed: HTTP {}", response.status()));
    }

    let bytes = response.bytes().await?;
    tokio::fs::write(&target, &bytes).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o755);
        tokio::fs::set_permissions(&target, perms).await?;
    }

    Ok(target)
}

pub async fn get_video_info(
    ytdlp: &Path,
    url: &str,
    opts: &YtdlpOptions,
) -> anyhow::Result<serde_json::Value> {
    let mut args = opts.to_args();
    args.push("--dump-json".to_string());
    args.push(url.to_string());

    let output = tokio::process::Command::new(ytdlp)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| anyhow!("failed to run yt-dlp: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("yt-dlp failed: {}", stderr.trim()));
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| anyhow!("yt-dlp returned invalid JSON: {}", e))?;

    Ok(json)
}

/// Runs a download and returns the file yt-dlp produced for `base`
/// (the output path without extension).
pub async fn download_video(
    ytdlp: &Path,
    url: &str,
    base: &Path,
    opts: &YtdlpOptions,
) -> anyhow::Result<PathBuf> {
    let opts = YtdlpOptions {
        outtmpl: Some(format!("{}.%(ext)s", base.to_string_lossy())),
        ..opts.clone()
    };

    let status = tokio::process::Command::new(ytdlp)
        .args(opts.to_args())
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|e| anyhow!("failed to start yt-dlp: {}", e))?;

    if !status.success() {
        return Err(anyhow!("yt-dlp exited with {}", status));
    }

    find_downloaded_file(base).await
}

/// Finds a finished, non-empty `<base>.<ext>` file.
pub async fn find_downloaded_file(base: &Path) -> anyhow::Result<PathBuf> {
    let dir = base
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let stem = base
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("invalid output path {:?}", base))?;
    let prefix = format!("{}.", stem);

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if !name.starts_with(&prefix) || name.ends_with(".part") || name.ends_with(".ytdl") {
            continue;
        }
        if let Ok(meta) = entry.metadata().await {
            if meta.is_file() && meta.len() > 0 {
                return Ok(path);
            }
        }
    }

    Err(anyhow!("downloaded file not found for {:?}", base))
}

/// Formats reported by yt-dlp, best first (yt-dlp lists them worst to best).
pub fn parse_formats(json: &serde_json::Value) -> Vec<CandidateFormat> {
    let formats = match json.get("formats").and_then(|v| v.as_array()) {
        Some(f) => f,
        None => return Vec::new(),
    };

    formats
        .iter()
        .rev()
        .filter_map(|f| {
            let url = f.get("url").and_then(|v| v.as_str())?;
            let ext = f.get("ext").and_then(|v| v.as_str()).unwrap_or("");
            Some(CandidateFormat::new(ext, url))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_options_render_flags() {
        let args = YtdlpOptions::metadata_only().to_args();
        assert_eq!(args, vec!["--quiet", "--no-warnings", "--no-playlist", "--skip-download"]);
    }

    #[test]
    fn download_options_render_all_flags() {
        let opts = YtdlpOptions {
            http_headers: vec![("Referer".into(), "https://www.douyin.com/".into())],
            cookies_from_browser: Some("chrome".into()),
            outtmpl: Some("downloads/x.%(ext)s".into()),
            format: Some("best[ext=mp4]/best".into()),
            retries: Some(3),
            fragment_retries: Some(3),
            skip_unavailable_fragments: true,
            ..Default::default()
        };
        let args = opts.to_args();
        let joined = args.join(" ");
        assert!(joined.contains("--add-header Referer:https://www.douyin.com/"));
        assert!(joined.contains("--cookies-from-browser chrome"));
        assert!(joined.contains("-o downloads/x.%(ext)s"));
        assert!(joined.contains("-f best[ext=mp4]/best"));
        assert!(joined.contains("--retries 3"));
        assert!(joined.contains("--fragment-retries 3"));
        assert!(joined.ends_with("--skip-unavailable-fragments"));
    }

    #[test]
    fn flat_playlist_toggle() {
        let opts = YtdlpOptions {
            extract_flat: true,
            ..Default::default()
        };
        assert_eq!(opts.to_args(), vec!["--flat-playlist"]);
    }

    #[test]
    fn formats_reversed_and_urlless_dropped() {
        let json = json!({"formats": [
            {"ext": "mp4", "url": "https://cdn/low.mp4"},
            {"ext": "mhtml"},
            {"ext": "mp4", "url": "https://cdn/high.mp4"}
        ]});
        let formats = parse_formats(&json);
        assert_eq!(formats.len(), 2);
        assert_eq!(formats[0].url, "https://cdn/high.mp4");
    }

    #[tokio::test]
    async fn finds_non_empty_output_only() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("douyin_1_abcd");
        tokio::fs::write(dir.path().join("douyin_1_abcd.mp4.part"), b"xx").await.unwrap();
        tokio::fs::write(dir.path().join("douyin_1_abcd.webm"), b"").await.unwrap();
        assert!(find_downloaded_file(&base).await.is_err());

        tokio::fs::write(dir.path().join("douyin_1_abcd.mp4"), b"data").await.unwrap();
        let found = find_downloaded_file(&base).await.unwrap();
        assert_eq!(found, dir.path().join("douyin_1_abcd.mp4"));
    }
}

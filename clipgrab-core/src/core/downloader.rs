use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use tokio::io::AsyncWriteExt;

use crate::core::filename::download_filename;
use crate::core::http_client;
use crate::core::ytdlp::{self, YtdlpOptions};
use crate::error::DOWNLOAD_FAILED;
use crate::models::media::DownloadResult;
use crate::models::settings::AppSettings;
use crate::platforms::referer_for;

const CHUNK_TIMEOUT: Duration = Duration::from_secs(45);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const WRITE_BUFFER: usize = 8 * 1024;
const PLAIN_MAX_REDIRECTS: usize = 3;
const YTDLP_FORMAT: &str = "best[ext=mp4]/best";
const RESERVE_ATTEMPTS: usize = 5;

/// Failures that retrying the same transport cannot fix.
#[derive(Debug, thiserror::Error)]
pub enum FatalFetchError {
    #[error("HTTP {0}")]
    ClientStatus(StatusCode),
    #[error("server returned HTML instead of media, the URL may have expired")]
    HtmlBody,
    #[error("server returned an empty body")]
    EmptyBody,
}

fn is_fatal(err: &anyhow::Error) -> bool {
    err.downcast_ref::<FatalFetchError>().is_some()
}

fn part_path_for(output: &Path) -> PathBuf {
    let mut part = output.as_os_str().to_owned();
    part.push(".part");
    PathBuf::from(part)
}

/// Claims a fresh destination in `dir` by creating it exclusively, so a
/// download never lands on a file it did not create.
async fn reserve_output(dir: &Path, platform: &str, hint: Option<&str>) -> std::io::Result<(String, PathBuf)> {
    let mut last_err = None;
    for _ in 0..RESERVE_ATTEMPTS {
        let filename = download_filename(platform, hint);
        let path = dir.join(&filename);
        match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(_) => return Ok((filename, path)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => last_err = Some(e),
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| std::io::ErrorKind::AlreadyExists.into()))
}

/// One way of getting bytes from `url` into `output`.
#[async_trait]
pub trait DownloadTransport: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the transport can take a platform page URL instead of a direct
    /// media URL.
    fn handles_pages(&self) -> bool {
        false
    }

    async fn fetch(&self, url: &str, platform: &str, output: &Path) -> anyhow::Result<u64>;
}

/// Streams a response body into `<output>.part`, then renames it.
async fn stream_to_file(response: reqwest::Response, output: &Path) -> anyhow::Result<u64> {
    let status = response.status();
    if status.is_client_error() {
        return Err(FatalFetchError::ClientStatus(status).into());
    }
    if !status.is_success() {
        return Err(anyhow!("HTTP {}", status));
    }

    if let Some(ct) = response.headers().get("content-type").and_then(|v| v.to_str().ok()) {
        if ct.contains("text/html") {
            return Err(FatalFetchError::HtmlBody.into());
        }
    }

    let part_path = part_path_for(output);
    let file = tokio::fs::File::create(&part_path).await?;
    let mut file = tokio::io::BufWriter::with_capacity(WRITE_BUFFER, file);
    let mut written = 0u64;
    let mut stream = response.bytes_stream();

    loop {
        match tokio::time::timeout(CHUNK_TIMEOUT, stream.next()).await {
            Ok(Some(Ok(chunk))) => {
                file.write_all(&chunk)
                    .await
                    .map_err(|e| anyhow!("write failed (disk full?): {}", e))?;
                written += chunk.len() as u64;
            }
            Ok(Some(Err(e))) => return Err(anyhow!("download stream error: {}", e)),
            Ok(None) => break,
            Err(_) => return Err(anyhow!("no data received for {:?}", CHUNK_TIMEOUT)),
        }
    }
    file.flush().await?;
    drop(file);

    if written == 0 {
        let _ = tokio::fs::remove_file(&part_path).await;
        return Err(FatalFetchError::EmptyBody.into());
    }

    tokio::fs::rename(&part_path, output).await?;
    Ok(written)
}

/// Primary transport: browser headers, platform referer, retries with backoff.
pub struct StreamTransport {
    client: reqwest::Client,
    max_retries: u32,
    overall_timeout: Duration,
}

impl StreamTransport {
    pub fn new(settings: &AppSettings) -> Self {
        let builder = reqwest::Client::builder()
            .default_headers(http_client::browser_headers("zh-CN,zh;q=0.9,en;q=0.8"))
            .cookie_store(true)
            .connect_timeout(CONNECT_TIMEOUT);

        Self {
            client: http_client::apply_proxy(builder, &settings.proxy)
                .build()
                .unwrap_or_default(),
            max_retries: settings.download.max_retries.max(1),
            overall_timeout: Duration::from_secs(settings.download.timeout_secs),
        }
    }

    async fn attempt(&self, url: &str, platform: &str, output: &Path) -> anyhow::Result<u64> {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "*/*")
            .header("Range", "bytes=0-");
        if let Some(referer) = referer_for(platform) {
            request = request.header("Referer", referer);
        }

        let response = request.send().await?;
        stream_to_file(response, output).await
    }
}

#[async_trait]
impl DownloadTransport for StreamTransport {
    fn name(&self) -> &str {
        "stream"
    }

    async fn fetch(&self, url: &str, platform: &str, output: &Path) -> anyhow::Result<u64> {
        let mut last_err = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let base = 500 * (attempt as u64);
                let jitter = rand::random::<u64>() % (base / 2 + 1);
                tokio::time::sleep(Duration::from_millis(base + jitter)).await;
            }

            let result = tokio::time::timeout(self.overall_timeout, self.attempt(url, platform, output))
                .await
                .unwrap_or_else(|_| Err(anyhow!("timed out after {:?}", self.overall_timeout)));

            match result {
                Ok(bytes) => return Ok(bytes),
                Err(e) if is_fatal(&e) => {
                    let _ = tokio::fs::remove_file(part_path_for(output)).await;
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        "[stream] attempt {}/{} failed: {}",
                        attempt + 1,
                        self.max_retries,
                        e
                    );
                    last_err = Some(e);
                }
            }
        }

        let _ = tokio::fs::remove_file(part_path_for(output)).await;
        Err(last_err.unwrap_or_else(|| anyhow!("no attempts made")))
    }
}

/// Secondary transport: bare user agent and referer, few redirects, one try.
pub struct PlainTransport {
    client: reqwest::Client,
}

impl PlainTransport {
    pub fn new(settings: &AppSettings) -> Self {
        let builder = reqwest::Client::builder()
            .user_agent(http_client::BROWSER_USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(PLAIN_MAX_REDIRECTS))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(settings.download.timeout_secs));

        Self {
            client: http_client::apply_proxy(builder, &settings.proxy)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl DownloadTransport for PlainTransport {
    fn name(&self) -> &str {
        "plain"
    }

    async fn fetch(&self, url: &str, platform: &str, output: &Path) -> anyhow::Result<u64> {
        let mut request = self.client.get(url);
        if let Some(referer) = referer_for(platform) {
            request = request.header("Referer", referer);
        }

        let result = match request.send().await {
            Ok(response) => stream_to_file(response, output).await,
            Err(e) => Err(e.into()),
        };
        if result.is_err() {
            let _ = tokio::fs::remove_file(part_path_for(output)).await;
        }
        result
    }
}

/// Last resort: lets yt-dlp fetch the URL, page URLs included.
pub struct YtdlpTransport {
    ytdlp_path: Option<PathBuf>,
    douyin_cookies_browser: Option<String>,
    max_retries: u32,
}

impl YtdlpTransport {
    pub fn new(settings: &AppSettings) -> Self {
        Self {
            ytdlp_path: settings.extractor.ytdlp_path.clone(),
            douyin_cookies_browser: settings.extractor.douyin_cookies_browser.clone(),
            max_retries: settings.download.max_retries,
        }
    }

    pub fn options_for(&self, platform: &str) -> YtdlpOptions {
        let mut opts = YtdlpOptions {
            quiet: true,
            no_warnings: true,
            format: Some(YTDLP_FORMAT.to_string()),
            retries: Some(self.max_retries),
            fragment_retries: Some(self.max_retries),
            skip_unavailable_fragments: true,
            force_overwrites: true,
            ..Default::default()
        }
        .header("User-Agent", http_client::BROWSER_USER_AGENT);

        if let Some(referer) = referer_for(platform) {
            opts = opts.header("Referer", referer);
        }
        if platform == "douyin" {
            opts.cookies_from_browser = self.douyin_cookies_browser.clone();
        }
        opts
    }
}

#[async_trait]
impl DownloadTransport for YtdlpTransport {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    fn handles_pages(&self) -> bool {
        true
    }

    async fn fetch(&self, url: &str, platform: &str, output: &Path) -> anyhow::Result<u64> {
        let ytdlp_path = ytdlp::ensure_ytdlp(self.ytdlp_path.as_deref()).await?;
        let base = output.with_extension("");

        let produced = ytdlp::download_video(&ytdlp_path, url, &base, &self.options_for(platform)).await?;
        if produced != output {
            tokio::fs::rename(&produced, output).await?;
        }

        Ok(tokio::fs::metadata(output).await?.len())
    }
}

/// Tries each transport in order until one leaves a non-empty file behind.
pub struct MediaDownloader {
    transports: Vec<Box<dyn DownloadTransport>>,
    output_dir: PathBuf,
}

impl MediaDownloader {
    pub fn new(transports: Vec<Box<dyn DownloadTransport>>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            transports,
            output_dir: output_dir.into(),
        }
    }

    pub fn from_settings(settings: &AppSettings, output_dir: impl Into<PathBuf>) -> Self {
        let mut transports: Vec<Box<dyn DownloadTransport>> = vec![
            Box::new(StreamTransport::new(settings)),
            Box::new(PlainTransport::new(settings)),
        ];
        if settings.download.ytdlp_fallback {
            transports.push(Box::new(YtdlpTransport::new(settings)));
        }
        Self::new(transports, output_dir)
    }

    pub fn transport_names(&self) -> Vec<&str> {
        self.transports.iter().map(|t| t.name()).collect()
    }

    /// Downloads a direct media URL.
    pub async fn download(&self, url: &str, platform: &str, hint: Option<&str>) -> DownloadResult {
        self.run(url, platform, hint, false).await
    }

    /// Downloads from a platform page URL, using only page-capable transports.
    pub async fn download_page(&self, page_url: &str, platform: &str, hint: Option<&str>) -> DownloadResult {
        self.run(page_url, platform, hint, true).await
    }

    /// Direct media URL first, then the page URL.
    pub async fn download_any(
        &self,
        media_url: Option<&str>,
        page_url: Option<&str>,
        platform: &str,
        hint: Option<&str>,
    ) -> DownloadResult {
        let media_url = media_url.map(str::trim).filter(|u| !u.is_empty());
        let page_url = page_url.map(str::trim).filter(|u| !u.is_empty());

        if let Some(url) = media_url {
            let result = self.download(url, platform, hint).await;
            if result.success {
                return result;
            }
        }
        match page_url {
            Some(url) => self.download_page(url, platform, hint).await,
            None => DownloadResult::failed(DOWNLOAD_FAILED),
        }
    }

    async fn run(&self, url: &str, platform: &str, hint: Option<&str>, pages_only: bool) -> DownloadResult {
        if let Err(e) = tokio::fs::create_dir_all(&self.output_dir).await {
            tracing::warn!("cannot create {}: {}", self.output_dir.display(), e);
            return DownloadResult::failed(DOWNLOAD_FAILED);
        }

        let (filename, output) = match reserve_output(&self.output_dir, platform, hint).await {
            Ok(reserved) => reserved,
            Err(e) => {
                tracing::warn!("cannot reserve a file in {}: {}", self.output_dir.display(), e);
                return DownloadResult::failed(DOWNLOAD_FAILED);
            }
        };

        for transport in self.transports.iter().filter(|t| !pages_only || t.handles_pages()) {
            tracing::debug!("[{}] fetching {} -> {}", transport.name(), url, filename);

            match transport.fetch(url, platform, &output).await {
                Ok(_) => match tokio::fs::metadata(&output).await {
                    Ok(meta) if meta.is_file() && meta.len() > 0 => {
                        tracing::info!("[{}] saved {} ({} bytes)", transport.name(), filename, meta.len());
                        return DownloadResult::completed(filename, meta.len());
                    }
                    _ => tracing::warn!("[{}] produced no usable file", transport.name()),
                },
                Err(e) => tracing::warn!("[{}] failed: {}", transport.name(), e),
            }
        }

        // Only ever the file reserved above.
        let _ = tokio::fs::remove_file(&output).await;
        DownloadResult::failed(DOWNLOAD_FAILED)
    }
}

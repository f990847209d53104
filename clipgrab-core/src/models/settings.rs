use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub download: DownloadSettings,
    #[serde(default)]
    pub extractor: ExtractorSettings,
    #[serde(default)]
    pub proxy: ProxySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSettings {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_download_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_true")]
    pub ytdlp_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorSettings {
    #[serde(default = "default_strategy_timeout_secs")]
    pub strategy_timeout_secs: u64,
    #[serde(default = "default_resolve_timeout_secs")]
    pub resolve_timeout_secs: u64,
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,
    /// Browser yt-dlp pulls sign-in cookies from for Douyin links.
    #[serde(default = "default_cookies_browser")]
    pub douyin_cookies_browser: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxySettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_proxy_type")]
    pub proxy_type: String,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_proxy_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_schema_version() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    4000
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_download_timeout_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_strategy_timeout_secs() -> u64 {
    20
}

fn default_resolve_timeout_secs() -> u64 {
    10
}

fn default_cookies_browser() -> Option<String> {
    Some("chrome".into())
}

fn default_proxy_type() -> String {
    "http".into()
}

fn default_proxy_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            timeout_secs: default_download_timeout_secs(),
            max_retries: default_max_retries(),
            ytdlp_fallback: true,
        }
    }
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            proxy_type: default_proxy_type(),
            host: String::new(),
            port: default_proxy_port(),
            username: String::new(),
            password: String::new(),
        }
    }
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            strategy_timeout_secs: default_strategy_timeout_secs(),
            resolve_timeout_secs: default_resolve_timeout_secs(),
            ytdlp_path: None,
            douyin_cookies_browser: default_cookies_browser(),
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            server: ServerSettings::default(),
            download: DownloadSettings::default(),
            extractor: ExtractorSettings::default(),
            proxy: ProxySettings::default(),
        }
    }
}

use std::path::{Path, PathBuf};

use clipgrab_core::fs_paths;
use clipgrab_core::models::settings::AppSettings;

const SETTINGS_FILE: &str = "settings.json";
pub const PORT_ENV: &str = "CLIPGRAB_PORT";
pub const HOST_ENV: &str = "CLIPGRAB_HOST";

pub fn settings_path() -> PathBuf {
    fs_paths::app_data_dir().join(SETTINGS_FILE)
}

/// Reads settings from `path`. A missing or unreadable file yields defaults.
pub fn load_settings(path: &Path) -> AppSettings {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return AppSettings::default(),
    };

    match serde_json::from_str::<AppSettings>(&raw) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Ignoring invalid {}: {}", path.display(), e);
            AppSettings::default()
        }
    }
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Applies `CLIPGRAB_HOST` / `CLIPGRAB_PORT` on top of the stored values.
pub fn apply_env_overrides(
    mut settings: AppSettings,
    host: Option<String>,
    port: Option<String>,
) -> AppSettings {
    if let Some(host) = host.filter(|h| !h.trim().is_empty()) {
        settings.server.host = host.trim().to_string();
    }
    if let Some(port) = port {
        match port.trim().parse::<u16>() {
            Ok(p) => settings.server.port = p,
            Err(_) => tracing::warn!("Ignoring invalid {}={}", PORT_ENV, port),
        }
    }
    settings
}

/// Settings for this process: the stored file (written with defaults on first
/// run) plus environment overrides.
pub fn effective_settings() -> AppSettings {
    let path = settings_path();
    if !path.exists() {
        if let Err(e) = save_settings(&path, &AppSettings::default()) {
            tracing::warn!("Could not write default settings to {}: {}", path.display(), e);
        }
    }

    apply_env_overrides(
        load_settings(&path),
        std::env::var(HOST_ENV).ok(),
        std::env::var(PORT_ENV).ok(),
    )
}

/// The download directory, resolved against the data dir when relative.
pub fn output_dir(settings: &AppSettings) -> PathBuf {
    let dir = &settings.download.output_dir;
    if dir.is_absolute() {
        dir.clone()
    } else {
        fs_paths::app_data_dir().join(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(&dir.path().join("nope.json"));
        assert_eq!(settings.server.port, 4000);
    }

    #[test]
    fn invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(load_settings(&path).download.max_retries, 3);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);
        let mut settings = AppSettings::default();
        settings.download.ytdlp_fallback = false;
        settings.extractor.douyin_cookies_browser = None;

        save_settings(&path, &settings).unwrap();
        let loaded = load_settings(&path);
        assert!(!loaded.download.ytdlp_fallback);
        assert_eq!(loaded.extractor.douyin_cookies_browser, None);
    }

    #[test]
    fn env_overrides() {
        let settings = apply_env_overrides(
            AppSettings::default(),
            Some("0.0.0.0".into()),
            Some("9000".into()),
        );
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 9000);

        let untouched = apply_env_overrides(AppSettings::default(), Some(" ".into()), Some("http".into()));
        assert_eq!(untouched.server.host, "127.0.0.1");
        assert_eq!(untouched.server.port, 4000);
    }

    #[test]
    fn absolute_output_dir_kept() {
        let mut settings = AppSettings::default();
        let dir = tempfile::tempdir().unwrap();
        settings.download.output_dir = dir.path().to_path_buf();
        assert_eq!(output_dir(&settings), dir.path());
    }
}

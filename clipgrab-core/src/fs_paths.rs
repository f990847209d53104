use std::path::PathBuf;

pub const DATA_DIR_ENV: &str = "CLIPGRAB_DATA_DIR";

pub fn app_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::data_dir()
        .map(|d| d.join("clipgrab"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Where a managed yt-dlp binary is kept.
pub fn bin_dir() -> PathBuf {
    app_data_dir().join("bin")
}

use std::path::{Component, Path, PathBuf};

/// Owns the directory finished downloads are written to and served from.
#[derive(Debug, Clone)]
pub struct DownloadStore {
    dir: PathBuf,
}

impl DownloadStore {
    pub async fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Maps a client-supplied name onto the store. Anything other than a
    /// single plain path component is refused.
    pub fn path_for(&self, filename: &str) -> Option<PathBuf> {
        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if !filename.contains('\\') => {
                Some(self.dir.join(name))
            }
            _ => None,
        }
    }

    /// Existing regular file for `filename`, if any.
    pub async fn existing(&self, filename: &str) -> Option<PathBuf> {
        let path = self.path_for(filename)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }

    /// Returns `false` when there was nothing to remove.
    pub async fn remove(&self, filename: &str) -> anyhow::Result<bool> {
        let Some(path) = self.existing(filename).await else {
            return Ok(false);
        };
        tokio::fs::remove_file(&path).await?;
        tracing::info!("Removed {}", path.display());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn only_single_components_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let store = DownloadStore::open(dir.path()).await.unwrap();

        assert_eq!(store.path_for("douyin_1_abcd1234.mp4"), Some(dir.path().join("douyin_1_abcd1234.mp4")));
        for bad in ["", ".", "..", "../x.mp4", "a/b.mp4", "/etc/passwd", "..\\x.mp4"] {
            assert_eq!(store.path_for(bad), None, "{bad} should be refused");
        }
    }

    #[tokio::test]
    async fn remove_existing_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = DownloadStore::open(dir.path().join("downloads")).await.unwrap();
        tokio::fs::write(store.dir().join("a.mp4"), b"x").await.unwrap();

        assert!(store.remove("a.mp4").await.unwrap());
        assert!(!store.remove("a.mp4").await.unwrap());
        assert!(store.existing("a.mp4").await.is_none());
    }

    #[tokio::test]
    async fn directories_are_not_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = DownloadStore::open(dir.path()).await.unwrap();
        tokio::fs::create_dir(dir.path().join("sub")).await.unwrap();
        assert!(store.existing("sub").await.is_none());
    }
}

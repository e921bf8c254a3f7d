//! Best-effort local cache for preview media, keyed by source url. Every
//! failure path falls back to the source url itself so callers always get
//! something renderable.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Where a piece of media should be rendered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Local(PathBuf),
    Remote(String),
}

impl MediaSource {
    /// A renderable location string regardless of variant.
    pub fn location(&self) -> String {
        match self {
            MediaSource::Local(path) => path.display().to_string(),
            MediaSource::Remote(url) => url.clone(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, MediaSource::Local(_))
    }
}

pub struct MediaCache {
    http: Client,
    dir: PathBuf,
}

impl MediaCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            http: Client::new(),
            dir: dir.into(),
        }
    }

    /// Resolves a url to a local cached file, fetching and storing it on a
    /// miss. Any failure returns the url unchanged.
    pub async fn resolve(&self, url: &str) -> MediaSource {
        let path = self.cache_path(url);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(url, path = %path.display(), "media cache hit");
            return MediaSource::Local(path);
        }
        match self.fetch_and_store(url, &path).await {
            Ok(()) => MediaSource::Local(path),
            Err(err) => {
                debug!(url, "media cache fill failed, serving source url: {err:#}");
                MediaSource::Remote(url.to_string())
            }
        }
    }

    async fn fetch_and_store(&self, url: &str, path: &Path) -> Result<()> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to reach {url}"))?
            .error_for_status()
            .with_context(|| format!("{url} answered with an error status"))?;
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("failed to read body from {url}"))?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create cache dir '{}'", self.dir.display()))?;
        tokio::fs::write(path, &bytes)
            .await
            .with_context(|| format!("failed to write '{}'", path.display()))?;
        debug!(url, bytes = bytes.len(), "media cached");
        Ok(())
    }

    /// Digest of the full url, keeping the original extension so viewers can
    /// sniff the type from the file name.
    fn cache_path(&self, url: &str) -> PathBuf {
        let mut name = hex::encode(Sha256::digest(url.as_bytes()));
        if let Some(extension) = url_extension(url) {
            name.push('.');
            name.push_str(&extension);
        }
        self.dir.join(name)
    }
}

fn url_extension(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    let extension = Path::new(parsed.path()).extension()?;
    Some(extension.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_path_is_stable_and_keeps_the_extension() {
        let cache = MediaCache::new("/tmp/media");
        let first = cache.cache_path("https://cdn.example/a/b/preview.png?sig=1");
        let second = cache.cache_path("https://cdn.example/a/b/preview.png?sig=1");
        assert_eq!(first, second);
        assert_eq!(first.extension().and_then(|e| e.to_str()), Some("png"));

        let other = cache.cache_path("https://cdn.example/a/b/other.png");
        assert_ne!(first, other);
    }

    #[test]
    fn extension_is_optional() {
        let cache = MediaCache::new("/tmp/media");
        let path = cache.cache_path("https://cdn.example/stream");
        assert!(path.extension().is_none());
    }
}

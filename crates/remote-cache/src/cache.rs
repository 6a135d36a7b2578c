//! On-disk cache of downloaded share-link assets.
//!
//! Layout: one file per asset plus `cache_metadata.json`, a map from the MD5
//! hex digest of the file identifier to a [`CacheEntry`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, SET_COOKIE};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use vidstack_common::error::{VidstackError, VidstackResult};

use crate::patterns::{confirm_token, extract_file_id, is_remote_link};

/// Metadata file name inside the cache directory.
pub const METADATA_FILE: &str = "cache_metadata.json";

/// Direct-download endpoint; the file identifier is appended.
pub const DOWNLOAD_ENDPOINT: &str = "https://drive.google.com/uc?export=download&id=";

/// Default freshness window.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

const HEAD_TIMEOUT: Duration = Duration::from_secs(5);

/// One cached asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub file_id: String,
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub url: String,
}

impl CacheEntry {
    /// Age at `now`; entries from the future count as new.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.timestamp).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Cache key for a file identifier.
pub fn cache_key(file_id: &str) -> String {
    format!("{:x}", md5::compute(file_id.as_bytes()))
}

/// File extension (with dot) for a `Content-Type`, or empty when unknown.
pub fn extension_for_content_type(content_type: &str) -> &'static str {
    let ct = content_type.to_ascii_lowercase();
    if ct.contains("video") {
        if ct.contains("mp4") {
            ".mp4"
        } else if ct.contains("webm") {
            ".webm"
        } else if ct.contains("quicktime") || ct.contains("mov") {
            ".mov"
        } else {
            ".mp4"
        }
    } else if ct.contains("image") {
        if ct.contains("jpeg") || ct.contains("jpg") {
            ".jpg"
        } else if ct.contains("png") {
            ".png"
        } else if ct.contains("gif") {
            ".gif"
        } else if ct.contains("webp") {
            ".webp"
        } else {
            ".jpg"
        }
    } else if ct.contains("audio") {
        if ct.contains("mpeg") || ct.contains("mp3") {
            ".mp3"
        } else if ct.contains("wav") {
            ".wav"
        } else {
            ".mp3"
        }
    } else {
        ""
    }
}

/// Share-link download cache.
#[derive(Debug)]
pub struct RemoteAssetCache {
    dir: PathBuf,
    max_age: Duration,
    endpoint: String,
    client: reqwest::Client,
    metadata: BTreeMap<String, CacheEntry>,
}

impl RemoteAssetCache {
    /// Open (and create) the cache at `dir`.
    ///
    /// An unreadable metadata file is treated as an empty cache.
    pub fn open(dir: impl Into<PathBuf>, max_age: Duration) -> VidstackResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let metadata = load_metadata(&dir.join(METADATA_FILE));
        tracing::debug!(
            dir = %dir.display(),
            entries = metadata.len(),
            max_age_secs = max_age.as_secs(),
            "Remote cache opened"
        );
        Ok(Self {
            dir,
            max_age,
            endpoint: DOWNLOAD_ENDPOINT.to_string(),
            client: reqwest::Client::new(),
            metadata,
        })
    }

    /// Override the download endpoint prefix.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &CacheEntry)> {
        self.metadata.iter()
    }

    /// Whether `entry` is within the freshness window and its file exists.
    pub fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        entry.age(now) < self.max_age && entry.path.is_file()
    }

    /// Fresh local path for `file_id`, if cached.
    pub fn lookup(&self, file_id: &str) -> Option<&Path> {
        let entry = self.metadata.get(&cache_key(file_id))?;
        self.is_fresh(entry, Utc::now())
            .then_some(entry.path.as_path())
    }

    /// Local path for a share link, downloading it when not freshly cached.
    pub async fn resolve(&mut self, url: &str) -> VidstackResult<PathBuf> {
        if !is_remote_link(url) {
            return Err(VidstackError::unsupported(format!(
                "Not a recognized share link: {url}"
            )));
        }
        let file_id = extract_file_id(url).ok_or_else(|| {
            VidstackError::cache(format!("Could not extract a file id from {url}"))
        })?;

        if let Some(path) = self.lookup(&file_id) {
            tracing::info!(file_id = %file_id, path = %path.display(), "Using cached file");
            return Ok(path.to_path_buf());
        }

        tracing::info!(file_id = %file_id, "Downloading remote asset");
        let path = self.download(&file_id).await?;
        self.record(&file_id, url, path.clone())?;
        tracing::info!(file_id = %file_id, path = %path.display(), "Downloaded remote asset");
        Ok(path)
    }

    /// Remove entries older than `older_than` (all entries when `None`),
    /// together with their files. Returns how many were removed.
    pub fn clear(&mut self, older_than: Option<Duration>) -> VidstackResult<usize> {
        let now = Utc::now();
        let doomed: Vec<String> = self
            .metadata
            .iter()
            .filter(|(_, entry)| older_than.map_or(true, |limit| entry.age(now) > limit))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            if let Some(entry) = self.metadata.remove(key) {
                if entry.path.exists() {
                    match std::fs::remove_file(&entry.path) {
                        Ok(()) => {
                            tracing::debug!(path = %entry.path.display(), "Deleted cached file")
                        }
                        Err(err) => tracing::warn!(
                            error = %err,
                            path = %entry.path.display(),
                            "Could not delete cached file"
                        ),
                    }
                }
            }
        }

        self.save_metadata()?;
        tracing::info!(removed = doomed.len(), "Cleared remote cache");
        Ok(doomed.len())
    }

    fn record(&mut self, file_id: &str, url: &str, path: PathBuf) -> VidstackResult<()> {
        self.metadata.insert(
            cache_key(file_id),
            CacheEntry {
                file_id: file_id.to_string(),
                path,
                timestamp: Utc::now(),
                url: url.to_string(),
            },
        );
        self.save_metadata()
    }

    fn save_metadata(&self) -> VidstackResult<()> {
        let path = self.metadata_path();
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(&self.metadata)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    async fn detect_extension(&self, url: &str) -> &'static str {
        let response = self.client.head(url).timeout(HEAD_TIMEOUT).send().await;
        match response {
            Ok(response) => response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(extension_for_content_type)
                .unwrap_or(""),
            Err(err) => {
                tracing::debug!(error = %err, "HEAD request for content type failed");
                ""
            }
        }
    }

    async fn download(&self, file_id: &str) -> VidstackResult<PathBuf> {
        let url = format!("{}{}", self.endpoint, file_id);
        let head_extension = self.detect_extension(&url).await;

        let mut response = self.get(&url).await?;
        if let Some(token) = cookie_confirm_token(&response) {
            tracing::debug!(file_id, "Following download confirmation cookie");
            response = self.get(&format!("{url}&confirm={token}")).await?;
        } else if is_html(&response) {
            let body = response.text().await.map_err(http_error)?;
            let token = confirm_token(&body).ok_or_else(|| {
                VidstackError::cache(format!(
                    "Download of {file_id} returned a page instead of the file"
                ))
            })?;
            tracing::debug!(file_id, "Following download confirmation page");
            response = self.get(&format!("{url}&confirm={token}")).await?;
        }

        let extension = if head_extension.is_empty() {
            content_type(&response)
                .map(extension_for_content_type)
                .unwrap_or("")
        } else {
            head_extension
        };

        let final_path = self.dir.join(format!("{file_id}{extension}"));
        let temp_path = self.dir.join(format!(".{file_id}.download"));

        if let Err(err) = stream_to_file(response, &temp_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(err);
        }
        move_into_place(&temp_path, &final_path).await?;
        Ok(final_path)
    }

    async fn get(&self, url: &str) -> VidstackResult<reqwest::Response> {
        let response = self.client.get(url).send().await.map_err(http_error)?;
        if !response.status().is_success() {
            return Err(VidstackError::cache(format!(
                "HTTP {}: {url}",
                response.status()
            )));
        }
        Ok(response)
    }
}

async fn stream_to_file(response: reqwest::Response, path: &Path) -> VidstackResult<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(http_error)?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
    }
    file.flush().await?;

    tracing::debug!(bytes = downloaded, path = %path.display(), "Download written");
    Ok(downloaded)
}

/// Rename a finished download, dropping the temp file if that fails.
async fn move_into_place(temp_path: &Path, final_path: &Path) -> VidstackResult<()> {
    if let Err(err) = tokio::fs::rename(temp_path, final_path).await {
        let _ = tokio::fs::remove_file(temp_path).await;
        return Err(err.into());
    }
    Ok(())
}

fn load_metadata(path: &Path) -> BTreeMap<String, CacheEntry> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return BTreeMap::new();
    };
    match serde_json::from_str(&content) {
        Ok(metadata) => metadata,
        Err(err) => {
            tracing::warn!(error = %err, path = %path.display(), "Ignoring unreadable cache metadata");
            BTreeMap::new()
        }
    }
}

fn cookie_confirm_token(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookie| {
            let pair = cookie.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            name.trim()
                .starts_with("download_warning")
                .then(|| value.trim().to_string())
        })
}

fn content_type(response: &reqwest::Response) -> Option<&str> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}

fn is_html(response: &reqwest::Response) -> bool {
    content_type(response).is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"))
}

fn http_error(err: reqwest::Error) -> VidstackError {
    VidstackError::cache(format!("HTTP request failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(dir: &Path, id: &str, age: Duration, with_file: bool) -> CacheEntry {
        let path = dir.join(format!("{id}.mp4"));
        if with_file {
            std::fs::write(&path, b"data").unwrap();
        }
        CacheEntry {
            file_id: id.to_string(),
            path,
            timestamp: Utc::now() - chrono::Duration::from_std(age).unwrap(),
            url: format!("https://drive.google.com/file/d/{id}/view"),
        }
    }

    #[test]
    fn test_cache_key_is_md5_hex() {
        assert_eq!(cache_key("abc"), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(cache_key("1ABC123xyz").len(), 32);
    }

    #[test]
    fn test_extension_table() {
        assert_eq!(extension_for_content_type("video/mp4"), ".mp4");
        assert_eq!(extension_for_content_type("video/webm"), ".webm");
        assert_eq!(extension_for_content_type("video/quicktime"), ".mov");
        assert_eq!(extension_for_content_type("video/x-matroska"), ".mp4");
        assert_eq!(extension_for_content_type("image/jpeg"), ".jpg");
        assert_eq!(extension_for_content_type("image/png"), ".png");
        assert_eq!(extension_for_content_type("image/svg+xml"), ".jpg");
        assert_eq!(extension_for_content_type("audio/mpeg"), ".mp3");
        assert_eq!(extension_for_content_type("audio/wav"), ".wav");
        assert_eq!(extension_for_content_type("application/octet-stream"), "");
    }

    #[test]
    fn test_lookup_respects_freshness_and_file_presence() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = RemoteAssetCache::open(dir.path(), DEFAULT_MAX_AGE).unwrap();

        let fresh = entry(dir.path(), "fresh", Duration::from_secs(60), true);
        let stale = entry(dir.path(), "stale", Duration::from_secs(2 * 86400), true);
        let gone = entry(dir.path(), "gone", Duration::from_secs(60), false);
        for e in [&fresh, &stale, &gone] {
            cache.metadata.insert(cache_key(&e.file_id), e.clone());
        }

        assert_eq!(cache.lookup("fresh"), Some(fresh.path.as_path()));
        assert_eq!(cache.lookup("stale"), None);
        assert_eq!(cache.lookup("gone"), None);
        assert_eq!(cache.lookup("unknown"), None);
    }

    #[test]
    fn test_clear_older_than_keeps_recent() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = RemoteAssetCache::open(dir.path(), DEFAULT_MAX_AGE).unwrap();
        let recent = entry(dir.path(), "recent", Duration::from_secs(60), true);
        let old = entry(dir.path(), "old", Duration::from_secs(3 * 3600), true);
        cache.metadata.insert(cache_key("recent"), recent.clone());
        cache.metadata.insert(cache_key("old"), old.clone());

        let removed = cache.clear(Some(Duration::from_secs(3600))).unwrap();
        assert_eq!(removed, 1);
        assert!(!old.path.exists());
        assert!(recent.path.exists());

        let reopened = RemoteAssetCache::open(dir.path(), DEFAULT_MAX_AGE).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.lookup("recent"), Some(recent.path.as_path()));
    }

    #[test]
    fn test_clear_all() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = RemoteAssetCache::open(dir.path(), DEFAULT_MAX_AGE).unwrap();
        let a = entry(dir.path(), "a", Duration::from_secs(1), true);
        cache.metadata.insert(cache_key("a"), a.clone());

        assert_eq!(cache.clear(None).unwrap(), 1);
        assert!(cache.is_empty());
        assert!(!a.path.exists());
    }

    #[test]
    fn test_corrupt_metadata_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(METADATA_FILE), "{ not json").unwrap();
        let cache = RemoteAssetCache::open(dir.path(), DEFAULT_MAX_AGE).unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let temp_path = dir.path().join(".abc.download");
        std::fs::write(&temp_path, b"partial").unwrap();
        // A non-empty directory cannot be replaced by a file.
        let final_path = dir.path().join("abc.mp4");
        std::fs::create_dir(&final_path).unwrap();
        std::fs::write(final_path.join("keep"), b"").unwrap();

        assert!(move_into_place(&temp_path, &final_path).await.is_err());
        assert!(!temp_path.exists());
        assert!(final_path.join("keep").exists());

        let other = dir.path().join(".def.download");
        std::fs::write(&other, b"done").unwrap();
        let target = dir.path().join("def.mp4");
        move_into_place(&other, &target).await.unwrap();
        assert!(!other.exists());
        assert_eq!(std::fs::read(&target).unwrap(), b"done");
    }
}

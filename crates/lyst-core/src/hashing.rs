use anyhow::Result;
use lyst_schema::Sha256Digest;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A single cached hash entry persisted to disk.
///
/// Stores the computed digest, the artifact size in bytes, and a UNIX
/// timestamp recording when the entry was created.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CachedEntry {
    /// SHA-256 of the artifact body.
    pub sha256: Sha256Digest,
    /// Body length in bytes.
    pub size: u64,
    /// UNIX epoch timestamp of when this entry was cached.
    pub timestamp: i64,
}

/// Persistent on-disk cache mapping artifact URLs to their digests.
///
/// Release artifacts are immutable once published, so a URL that was hashed
/// in an earlier run does not need to be downloaded again. The cache is
/// serialized as JSON, by default under `~/.lyst/cache/hashes.json`.
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct HashCache {
    /// Map of artifact URL to its [`CachedEntry`].
    pub entries: BTreeMap<String, CachedEntry>,

    #[serde(skip)]
    path: Option<PathBuf>,

    #[serde(skip)]
    dirty: bool,
}

impl HashCache {
    /// Load the hash cache from `path`.
    ///
    /// Returns an empty cache bound to `path` if the file does not exist or
    /// cannot be parsed.
    pub fn load(path: &Path) -> Self {
        let mut cache = fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str::<Self>(&content).ok())
            .unwrap_or_default();
        cache.path = Some(path.to_path_buf());
        cache
    }

    /// Persist the cache to the path it was loaded from.
    ///
    /// Does nothing for an in-memory cache or when nothing changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created, the cache
    /// cannot be serialized, or the file cannot be written.
    pub fn save(&mut self) -> Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        self.dirty = false;
        Ok(())
    }

    /// Look up the cached entry for the given artifact URL.
    pub fn get(&self, url: &str) -> Option<&CachedEntry> {
        self.entries.get(url)
    }

    /// Insert or update the entry for the given artifact URL.
    pub fn insert(&mut self, url: String, sha256: Sha256Digest, size: u64) {
        self.entries.insert(
            url,
            CachedEntry {
                sha256,
                size,
                timestamp: chrono::Utc::now().timestamp(),
            },
        );
        self.dirty = true;
    }

    /// Number of cached URLs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("hashes.json");

        let mut cache = HashCache::load(&path);
        assert!(cache.is_empty());
        cache.insert(
            "https://cdn/app.zip".to_string(),
            Sha256Digest::compute(b"app"),
            3,
        );
        cache.save().unwrap();

        let reloaded = HashCache::load(&path);
        let entry = reloaded.get("https://cdn/app.zip").unwrap();
        assert_eq!(entry.sha256, Sha256Digest::compute(b"app"));
        assert_eq!(entry.size, 3);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hashes.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(HashCache::load(&path).is_empty());
    }

    #[test]
    fn unchanged_cache_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hashes.json");

        let mut cache = HashCache::load(&path);
        cache.save().unwrap();
        assert!(!path.exists());
    }
}

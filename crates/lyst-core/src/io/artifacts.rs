//! Cache-aware access to remote artifacts.

use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use lyst_schema::Sha256Digest;
use reqwest::Client;

use super::download::{self, ArtifactInfo, DownloadError};
use crate::hashing::HashCache;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Probes, hashes and downloads release artifacts.
///
/// Checksums go through an optional [`HashCache`]; verification always
/// downloads so it can compare real bytes.
#[derive(Debug)]
pub struct ArtifactProbe {
    client: Client,
    timeout: Duration,
    cache: Option<Mutex<HashCache>>,
}

impl ArtifactProbe {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: HashCache) -> Self {
        self.cache = Some(Mutex::new(cache));
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Size in bytes, from the cache or a `HEAD` probe.
    pub async fn size(&self, url: &str) -> Option<u64> {
        if let Some(entry) = self.cached(url) {
            return Some(entry.size);
        }
        download::probe_size(&self.client, url, PROBE_TIMEOUT).await
    }

    /// Digest and size of the artifact, downloading it unless cached.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] when the artifact cannot be fetched.
    pub async fn checksum(&self, url: &str) -> Result<ArtifactInfo, DownloadError> {
        if let Some(entry) = self.cached(url) {
            tracing::debug!("Using cached SHA256 for {url}");
            return Ok(entry);
        }

        let info = download::hash_url(&self.client, url, self.timeout).await?;
        if let Some(cache) = &self.cache {
            cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(url.to_string(), info.sha256.clone(), info.size);
        }
        Ok(info)
    }

    /// Download and compare against `expected`, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::HashMismatch`] on a digest mismatch.
    pub async fn verify(
        &self,
        url: &str,
        expected: &Sha256Digest,
    ) -> Result<ArtifactInfo, DownloadError> {
        download::verify_url(&self.client, url, expected, self.timeout).await
    }

    /// # Errors
    ///
    /// Returns [`DownloadError`] when neither `HEAD` nor `GET` succeed.
    pub async fn reachable(&self, url: &str) -> Result<(), DownloadError> {
        download::check_reachable(&self.client, url, PROBE_TIMEOUT).await
    }

    /// Stream the artifact to `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on transport or filesystem errors.
    pub async fn download_to(&self, url: &str, dest: &Path) -> Result<ArtifactInfo, DownloadError> {
        download::download_to(&self.client, url, dest, self.timeout).await
    }

    /// Flush the hash cache to disk, if one is attached.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache file cannot be written.
    pub fn save_cache(&self) -> anyhow::Result<()> {
        if let Some(cache) = &self.cache {
            cache.lock().unwrap_or_else(PoisonError::into_inner).save()?;
        }
        Ok(())
    }

    fn cached(&self, url: &str) -> Option<ArtifactInfo> {
        let cache = self.cache.as_ref()?;
        let guard = cache.lock().unwrap_or_else(PoisonError::into_inner);
        guard.get(url).map(|entry| ArtifactInfo {
            sha256: entry.sha256.clone(),
            size: entry.size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn test_checksum_is_cached_between_calls() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/app.dmg")
            .with_status(200)
            .with_body("dmg bytes")
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let probe = ArtifactProbe::new(Client::new(), Duration::from_secs(5))
            .with_cache(HashCache::load(&dir.path().join("hashes.json")));
        let url = format!("{}/app.dmg", server.url());

        let first = probe.checksum(&url).await.unwrap();
        let second = probe.checksum(&url).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(probe.size(&url).await, Some(9));
        m.assert_async().await;

        probe.save_cache().unwrap();
        assert!(dir.path().join("hashes.json").exists());
    }

    #[tokio::test]
    async fn test_size_without_cache_uses_head() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("HEAD", "/app.apk")
            .with_status(404)
            .create_async()
            .await;

        let probe = ArtifactProbe::new(Client::new(), Duration::from_secs(5));
        let url = format!("{}/app.apk", server.url());
        assert_eq!(probe.size(&url).await, None);
    }
}

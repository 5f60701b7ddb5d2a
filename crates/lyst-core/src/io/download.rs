//! Streaming downloads with SHA-256 verification.

use std::path::Path;
use std::time::Duration;

use lyst_schema::Sha256Digest;
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        expected: Sha256Digest,
        actual: Sha256Digest,
    },
}

/// Digest and length of a downloaded artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactInfo {
    pub sha256: Sha256Digest,
    pub size: u64,
}

/// Size of a remote file without downloading it.
///
/// Issues a `HEAD` request (redirects are followed by the client) and reads
/// `Content-Length`. Any failure yields `None`.
pub async fn probe_size(client: &Client, url: &str, timeout: Duration) -> Option<u64> {
    let resp = match client.head(url).timeout(timeout).send().await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!("Could not determine file size for {url}: {e}");
            return None;
        }
    };
    if !resp.status().is_success() {
        tracing::debug!("HEAD {url} returned {}", resp.status());
        return None;
    }
    resp.headers()
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
}

/// Helper to stream-download and compute SHA256 (expensive but accurate)
///
/// # Errors
///
/// Returns [`DownloadError::Http`] on transport errors or a non-2xx status.
pub async fn hash_url(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<ArtifactInfo, DownloadError> {
    tracing::info!("Calculating SHA256 for {url}");
    let mut resp = client
        .get(url)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?;

    let mut hasher = Sha256::new();
    let mut size: u64 = 0;
    while let Some(chunk) = resp.chunk().await? {
        hasher.update(&chunk);
        size += chunk.len() as u64;
    }

    Ok(ArtifactInfo {
        sha256: Sha256Digest::from_hasher(hasher),
        size,
    })
}

/// Download `url` and check it hashes to `expected`.
///
/// # Errors
///
/// Returns [`DownloadError::HashMismatch`] when the body differs from the
/// declared checksum, or the errors of [`hash_url`].
pub async fn verify_url(
    client: &Client,
    url: &str,
    expected: &Sha256Digest,
    timeout: Duration,
) -> Result<ArtifactInfo, DownloadError> {
    let info = hash_url(client, url, timeout).await?;
    if &info.sha256 != expected {
        return Err(DownloadError::HashMismatch {
            expected: expected.clone(),
            actual: info.sha256,
        });
    }
    Ok(info)
}

/// Stream `url` into `dest`, hashing on the way.
///
/// The partially written file is removed on failure.
///
/// # Errors
///
/// Returns [`DownloadError`] on transport, status or filesystem errors.
pub async fn download_to(
    client: &Client,
    url: &str,
    dest: &Path,
    timeout: Duration,
) -> Result<ArtifactInfo, DownloadError> {
    let result = stream_to_file(client, url, dest, timeout).await;
    if result.is_err() {
        tokio::fs::remove_file(dest).await.ok();
    }
    result
}

async fn stream_to_file(
    client: &Client,
    url: &str,
    dest: &Path,
    timeout: Duration,
) -> Result<ArtifactInfo, DownloadError> {
    let mut resp = client
        .get(url)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?;

    let mut file = File::create(dest).await?;
    let mut hasher = Sha256::new();
    let mut size: u64 = 0;

    while let Some(chunk) = resp.chunk().await? {
        file.write_all(&chunk).await?;
        hasher.update(&chunk);
        size += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(ArtifactInfo {
        sha256: Sha256Digest::from_hasher(hasher),
        size,
    })
}

/// Whether `url` answers with a success status.
///
/// Tries `HEAD` first; some CDNs reject it, so a failed `HEAD` falls back to
/// a `GET` whose body is not read.
///
/// # Errors
///
/// Returns the error of the `GET` request when both attempts fail.
pub async fn check_reachable(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<(), DownloadError> {
    if let Ok(resp) = client.head(url).timeout(timeout).send().await {
        if resp.status().is_success() {
            return Ok(());
        }
    }
    client
        .get(url)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}

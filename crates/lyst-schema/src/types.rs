use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::hash::Sha256Digest;

/// A platform as spelled by the OpenLyst API.
///
/// The same spelling is used in the `platform` query parameter, in a
/// version's `platforms` list and as the key of its `downloads` object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    /// Apple iOS (AltStore source).
    #[serde(rename = "iOS")]
    Ios,
    /// Android (F-Droid repository).
    Android,
    /// macOS (Homebrew tap).
    #[serde(rename = "macOS")]
    MacOs,
    /// Linux (Homebrew tap, `-linux` formulae).
    Linux,
    /// Windows (Winget manifests).
    Windows,
}

impl Platform {
    /// All platforms in a stable order.
    pub const ALL: [Platform; 5] = [
        Platform::Ios,
        Platform::Android,
        Platform::MacOs,
        Platform::Linux,
        Platform::Windows,
    ];

    /// The API spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Ios => "iOS",
            Platform::Android => "Android",
            Platform::MacOs => "macOS",
            Platform::Linux => "Linux",
            Platform::Windows => "Windows",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown platform '{s}'"))
    }
}

/// One published manifest: a single app, on a single platform, for a single build.
///
/// Every target renders from this shape. The install step is always "copy
/// the unpacked files into place" and the test step always succeeds, so
/// neither is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Human-readable application name (e.g. "Doggy Days")
    pub name: String,

    /// One-line description
    pub desc: String,

    /// Project homepage
    pub homepage: String,

    /// Download URL of the prebuilt artifact
    pub url: String,

    /// Version string as published upstream
    pub version: String,

    /// Content checksum, when one was computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<Sha256Digest>,
}

/// Errors that can occur when validating a [`ManifestEntry`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    /// A required field (name, version, or URL) is empty.
    #[error("Empty field: {0}")]
    EmptyField(&'static str),

    /// The download URL does not use http(s).
    #[error("Invalid URL '{0}': must start with http:// or https://")]
    InvalidUrl(String),
}

impl ManifestEntry {
    /// Validates the entry's required fields.
    ///
    /// # Errors
    ///
    /// Returns [`EntryError::EmptyField`] if `name`, `version`, or `url` is
    /// blank, or [`EntryError::InvalidUrl`] if the URL is not http(s).
    pub fn validate(&self) -> Result<(), EntryError> {
        if self.name.trim().is_empty() {
            return Err(EntryError::EmptyField("name"));
        }
        if self.version.trim().is_empty() {
            return Err(EntryError::EmptyField("version"));
        }
        if self.url.trim().is_empty() {
            return Err(EntryError::EmptyField("url"));
        }
        if !is_http_url(&self.url) {
            return Err(EntryError::InvalidUrl(self.url.clone()));
        }
        Ok(())
    }
}

/// True for `http://` and `https://` URLs.
pub fn is_http_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> ManifestEntry {
        ManifestEntry {
            name: "Doggy Days".to_string(),
            desc: "Track your dog".to_string(),
            homepage: "https://openlyst.ink".to_string(),
            url: "https://cdn.example.com/doggy-1.2.0.zip".to_string(),
            version: "1.2.0".to_string(),
            sha256: None,
        }
    }

    #[test]
    fn valid_entry_passes() {
        assert_eq!(entry().validate(), Ok(()));
    }

    #[test]
    fn blank_version_is_rejected() {
        let mut e = entry();
        e.version = "  ".to_string();
        assert_eq!(e.validate(), Err(EntryError::EmptyField("version")));
    }

    #[test]
    fn non_http_url_is_rejected() {
        let mut e = entry();
        e.url = "ftp://example.com/a.zip".to_string();
        assert!(matches!(e.validate(), Err(EntryError::InvalidUrl(_))));
    }

    #[test]
    fn platform_round_trips_api_spelling() {
        assert_eq!("macos".parse::<Platform>(), Ok(Platform::MacOs));
        assert_eq!(Platform::Ios.to_string(), "iOS");
        let json = serde_json::to_string(&Platform::MacOs).unwrap();
        assert_eq!(json, "\"macOS\"");
    }
}

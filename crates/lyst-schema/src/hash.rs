use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors produced when parsing a [`Sha256Digest`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DigestError {
    /// The hex portion is not exactly 64 characters long.
    #[error("Invalid SHA256 digest: expected 64 hex characters, got {len} in '{input}'")]
    Length {
        /// Number of characters found.
        len: usize,
        /// The rejected input.
        input: String,
    },

    /// The input contains characters outside `[0-9a-fA-F]`.
    #[error("Invalid SHA256 digest: contains non-hex characters in '{0}'")]
    NonHex(String),
}

/// A validated SHA256 digest (64 hex characters)
///
/// Digests are validated at construction and deserialization time and stored
/// lowercase, so two digests of the same bytes always compare equal no matter
/// how the source spelled them. Winget wants the uppercase spelling; use
/// [`Sha256Digest::to_upper`] for that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Create a new `Sha256Digest`, validating the input.
    ///
    /// Accepts strings with or without a `sha256:` prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the hex portion is not exactly 64 ASCII hex characters.
    pub fn new(s: impl Into<String>) -> Result<Self, DigestError> {
        let s = s.into();
        let hex = s.strip_prefix("sha256:").unwrap_or(&s);

        if hex.len() != 64 {
            return Err(DigestError::Length {
                len: hex.len(),
                input: s.clone(),
            });
        }

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DigestError::NonHex(s.clone()));
        }

        Ok(Self(hex.to_lowercase()))
    }

    /// Hash a byte slice.
    pub fn compute(data: &[u8]) -> Self {
        Self::from_hasher(Sha256::new_with_prefix(data))
    }

    /// Finalize a streaming hasher into a digest.
    pub fn from_hasher(hasher: Sha256) -> Self {
        Self(hex::encode(hasher.finalize()))
    }

    /// Get the digest as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Uppercase hex, the spelling Winget manifests use.
    pub fn to_upper(&self) -> String {
        self.0.to_uppercase()
    }
}

impl<'de> Deserialize<'de> for Sha256Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Sha256Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Sha256Digest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn compute_matches_known_vector() {
        assert_eq!(Sha256Digest::compute(b"").as_str(), EMPTY);
    }

    #[test]
    fn prefix_and_case_are_normalized() {
        let upper = format!("sha256:{}", EMPTY.to_uppercase());
        let digest = Sha256Digest::new(upper).unwrap();
        assert_eq!(digest.as_str(), EMPTY);
        assert_eq!(digest.to_upper(), EMPTY.to_uppercase());
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            Sha256Digest::new("abc"),
            Err(DigestError::Length { len: 3, .. })
        ));
        let not_hex = "z".repeat(64);
        assert!(matches!(
            Sha256Digest::new(not_hex),
            Err(DigestError::NonHex(_))
        ));
    }

    #[test]
    fn deserialize_validates() {
        let ok: Result<Sha256Digest, _> = serde_json::from_str(&format!("\"{EMPTY}\""));
        assert!(ok.is_ok());
        let bad: Result<Sha256Digest, _> = serde_json::from_str("\"REPLACE_WITH_ACTUAL_SHA256\"");
        assert!(bad.is_err());
    }
}

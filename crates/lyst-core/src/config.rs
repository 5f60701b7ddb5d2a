//! Build configuration.
//!
//! Precedence, lowest to highest: built-in defaults, a `lyst.toml` file, then
//! command-line flags (which the CLI applies on top of the loaded value).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default OpenLyst API root.
pub const DEFAULT_API_URL: &str = "https://openlyst.ink/api/v1";

/// Default public base URL of the AltStore source.
pub const DEFAULT_REPO_URL: &str =
    "https://raw.githubusercontent.com/justacalico/Openlyst-more-builds/main/repo";

/// Config file looked up in the working directory when none is given.
pub const CONFIG_FILE_NAME: &str = "lyst.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Output directories, one per target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Outputs {
    pub altstore: PathBuf,
    pub fdroid: PathBuf,
    pub homebrew: PathBuf,
    pub winget: PathBuf,
}

impl Default for Outputs {
    fn default() -> Self {
        Self {
            altstore: PathBuf::from("repo"),
            fdroid: PathBuf::from("fdroid-repo"),
            homebrew: PathBuf::from("homebrew-tap"),
            winget: PathBuf::from("winget-repo"),
        }
    }
}

/// Everything a build needs to know that is not a per-run switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// OpenLyst API root, without a trailing slash.
    pub api_url: String,

    /// Public URL the AltStore source is served from.
    pub repo_url: String,

    /// Public URL of the F-Droid repository. Derived from `repo_url` when unset.
    pub fdroid_url: Option<String>,

    /// Publisher name used in Winget package identifiers and manifests.
    pub publisher: String,

    /// Homepage used when an app has none.
    pub homepage: String,

    /// Locale requested from the API.
    pub lang: String,

    /// Apps processed concurrently within a target.
    pub concurrency: usize,

    /// Timeout for catalogue requests, in seconds.
    pub api_timeout_secs: u64,

    /// Timeout for artifact downloads, in seconds.
    pub download_timeout_secs: u64,

    /// `icon.png` copied into the F-Droid repository root.
    pub fdroid_icon: Option<PathBuf>,

    pub outputs: Outputs,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            repo_url: DEFAULT_REPO_URL.to_string(),
            fdroid_url: None,
            publisher: "OpenLyst".to_string(),
            homepage: lyst_schema::DEFAULT_HOMEPAGE.to_string(),
            lang: "en".to_string(),
            concurrency: 4,
            api_timeout_secs: 30,
            download_timeout_secs: 300,
            fdroid_icon: None,
            outputs: Outputs::default(),
        }
    }
}

impl Config {
    /// Parse a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or is not valid TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `explicit` if given, else `./lyst.toml` if it exists, else defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the chosen file is unreadable or malformed.
    /// A missing `./lyst.toml` is not an error; a missing explicit path is.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let local = Path::new(CONFIG_FILE_NAME);
        if local.is_file() {
            tracing::debug!("Loading config from {}", local.display());
            return Self::load(local);
        }
        Ok(Self::default())
    }

    /// Address of the F-Droid repository.
    pub fn fdroid_address(&self) -> String {
        self.fdroid_url
            .clone()
            .unwrap_or_else(|| self.repo_url.replace("/repo", "/fdroid-repo"))
    }

    /// API root without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lyst.toml");
        std::fs::write(
            &path,
            r#"
publisher = "Acme"
concurrency = 8

[outputs]
homebrew = "tap"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.publisher, "Acme");
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.outputs.homebrew, PathBuf::from("tap"));
        assert_eq!(config.outputs.winget, PathBuf::from("winget-repo"));
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lyst.toml");
        std::fs::write(&path, "concurrency = \"lots\"").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("lyst.toml"));
    }

    #[test]
    fn fdroid_address_is_derived_from_repo_url() {
        let config = Config::default();
        assert_eq!(
            config.fdroid_address(),
            "https://raw.githubusercontent.com/justacalico/Openlyst-more-builds/main/fdroid-repo"
        );
    }
}

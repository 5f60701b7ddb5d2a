use dirs::home_dir;
use std::path::PathBuf;

/// Returns the lyst state directory, or None if the user's home cannot be resolved.
///
/// `LYST_HOME` overrides the default `~/.lyst`.
pub fn try_lyst_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("LYST_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".lyst"))
}

/// Cache path: ~/.lyst/cache
pub fn cache_path() -> Option<PathBuf> {
    try_lyst_home().map(|home| home.join("cache"))
}

/// Hash cache file: ~/.lyst/cache/hashes.json
pub fn hash_cache_path() -> Option<PathBuf> {
    cache_path().map(|dir| dir.join("hashes.json"))
}

/// Extract the filename from a URL, ignoring any query string or fragment.
pub fn filename_from_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or("");
    path.split('/').next_back().unwrap_or("")
}

/// Lowercased extension of the URL's file name, without the dot.
pub fn extension_from_url(url: &str) -> Option<String> {
    let name = filename_from_url(url);
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_strips_query() {
        assert_eq!(
            filename_from_url("https://example.com/dl/app-1.0.msi?token=abc"),
            "app-1.0.msi"
        );
        assert_eq!(filename_from_url(""), "");
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(
            extension_from_url("https://example.com/Setup.EXE").as_deref(),
            Some("exe")
        );
        assert_eq!(extension_from_url("https://example.com/download"), None);
    }
}

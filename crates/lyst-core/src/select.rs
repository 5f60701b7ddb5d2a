//! Artifact URL selection.
//!
//! `downloads` is keyed by platform and nests differently for each one:
//!
//! ```text
//! iOS      "https://.../app.ipa"
//! Android  "https://.../app.apk" | { "apk": ..., "arm64": ... }
//! macOS    { "universal": ..., "arm64": ..., "x86_64": ... }
//! Linux    { "appimage": { "x86_64": ... } | "https://...", "deb": ... }
//! Windows  { "exe": { "x86_64": ... } | "https://...", "msi": ... }
//! ```

use lyst_schema::{AppVersion, Platform, is_http_url};
use serde_json::Value;

const ANDROID_KEYS: [&str; 6] = ["apk", "universal", "arm64", "arm", "x86_64", "x86"];
const MACOS_ARCHES: [&str; 3] = ["universal", "arm64", "x86_64"];
const LINUX_PACKAGES: [&str; 4] = ["appimage", "zip", "deb", "rpm"];
const WINDOWS_PACKAGES: [&str; 4] = ["exe", "msi", "msix", "zip"];
const PACKAGE_ARCHES: [&str; 2] = ["x86_64", "arm64"];

/// Pick the artifact URL for `platform`, if the version has one.
pub fn artifact_url(version: &AppVersion, platform: Platform) -> Option<String> {
    match platform {
        Platform::Ios => ipa_url(version),
        Platform::Android => apk_url(version),
        Platform::MacOs => macos_url(version),
        Platform::Linux => linux_url(version),
        Platform::Windows => windows_url(version),
    }
}

/// iOS: `downloads.iOS`, then `platformInstall.iOS`, then `downloadURL`.
pub fn ipa_url(version: &AppVersion) -> Option<String> {
    version
        .downloads_for(Platform::Ios)
        .and_then(non_empty)
        .or_else(|| {
            version
                .platform_install
                .get(Platform::Ios.as_str())
                .and_then(http_string)
        })
        .or_else(|| top_level_url(version))
}

/// Android: a plain string, or the first populated key of a nested object.
pub fn apk_url(version: &AppVersion) -> Option<String> {
    let from_downloads = match version.downloads_for(Platform::Android) {
        Some(Value::Object(map)) => ANDROID_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(non_empty)),
        Some(other) => non_empty(other),
        None => None,
    };
    from_downloads.or_else(|| top_level_url(version))
}

/// macOS: prefer universal builds, then arm64, then x86_64.
pub fn macos_url(version: &AppVersion) -> Option<String> {
    let downloads = version.downloads_for(Platform::MacOs)?;
    match downloads {
        Value::Object(map) => MACOS_ARCHES
            .iter()
            .find_map(|arch| map.get(*arch).and_then(non_empty))
            .or_else(|| first_http(downloads)),
        other => http_string(other),
    }
}

/// Linux: package types in preference order, x86_64 before arm64.
pub fn linux_url(version: &AppVersion) -> Option<String> {
    let downloads = version.downloads_for(Platform::Linux)?;
    match downloads {
        Value::Object(map) => LINUX_PACKAGES
            .iter()
            .find_map(|kind| map.get(*kind).and_then(|pkg| package_url(pkg, false)))
            .or_else(|| first_http(downloads)),
        other => http_string(other),
    }
}

/// Windows: installers in preference order, x86_64 before arm64.
pub fn windows_url(version: &AppVersion) -> Option<String> {
    match version.downloads_for(Platform::Windows)? {
        Value::Object(map) => WINDOWS_PACKAGES
            .iter()
            .find_map(|kind| map.get(*kind).and_then(|pkg| package_url(pkg, true))),
        _ => None,
    }
}

/// A package entry is either a per-arch object or a bare URL.
fn package_url(pkg: &Value, require_http: bool) -> Option<String> {
    match pkg {
        Value::Object(arches) => PACKAGE_ARCHES
            .iter()
            .find_map(|arch| arches.get(*arch).and_then(non_empty)),
        other if require_http => http_string(other),
        other => non_empty(other),
    }
}

fn top_level_url(version: &AppVersion) -> Option<String> {
    version
        .download_url
        .as_deref()
        .map(str::trim)
        .filter(|url| is_http_url(url))
        .map(str::to_string)
}

/// First http(s) string one or two levels deep.
fn first_http(value: &Value) -> Option<String> {
    let Value::Object(map) = value else {
        return http_string(value);
    };
    map.values().find_map(|v| match v {
        Value::Object(inner) => inner.values().find_map(http_string),
        other => http_string(other),
    })
}

fn non_empty(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn http_string(value: &Value) -> Option<String> {
    non_empty(value).filter(|s| is_http_url(s))
}

//! OpenLyst API records.
//!
//! The catalogue is loosely typed: `buildVersion` shows up as a string or a
//! number, optional fields are sometimes `null`, and `downloads` nests
//! differently per platform. Everything here deserializes leniently so one
//! odd record never sinks a whole listing.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::types::Platform;

/// Response envelope used by every endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request succeeded server-side.
    #[serde(default)]
    pub success: bool,

    /// Payload, present when `success` is true.
    pub data: Option<T>,

    /// Server-provided error text, if any.
    #[serde(default, alias = "message")]
    pub error: Option<String>,
}

/// An app in the catalogue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    #[serde(default, deserialize_with = "lenient_string")]
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub subtitle: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub bundle_identifier: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub developer_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub localized_description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, rename = "iconURL", deserialize_with = "lenient_string")]
    pub icon_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tint_color: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub website: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub source_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub issue_tracker: Option<String>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub screenshots: Vec<Screenshot>,
}

impl App {
    /// Long description, falling back to the short `description` field.
    pub fn long_description(&self) -> Option<&str> {
        self.localized_description
            .as_deref()
            .or(self.description.as_deref())
    }
}

/// A screenshot reference: either a bare URL or an `{ "imageURL": ... }` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Screenshot {
    Url(String),
    Image {
        #[serde(rename = "imageURL")]
        image_url: String,
    },
}

impl Screenshot {
    /// The image URL regardless of shape.
    pub fn url(&self) -> &str {
        match self {
            Screenshot::Url(url) | Screenshot::Image { image_url: url } => url,
        }
    }
}

/// One published build of an app. Listings are newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppVersion {
    #[serde(default, deserialize_with = "lenient_string")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub build_version: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub localized_description: Option<String>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub platforms: Vec<String>,
    #[serde(default, deserialize_with = "lenient_object")]
    pub downloads: Map<String, Value>,
    #[serde(default, deserialize_with = "lenient_object")]
    pub platform_install: Map<String, Value>,
    #[serde(default, rename = "downloadURL", deserialize_with = "lenient_string")]
    pub download_url: Option<String>,
}

impl AppVersion {
    /// Whether this build lists `platform` among its supported platforms.
    pub fn supports(&self, platform: Platform) -> bool {
        self.platforms.iter().any(|p| p == platform.as_str())
    }

    /// The `downloads` entry for a platform.
    pub fn downloads_for(&self, platform: Platform) -> Option<&Value> {
        self.downloads.get(platform.as_str())
    }
}

/// Decode a JSON array into `T`s, dropping elements that do not fit.
///
/// Anything other than an array decodes to an empty list.
pub fn list_from_value<T: DeserializeOwned>(value: Value) -> Vec<T> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(list_from_value(Value::deserialize(deserializer)?))
}

fn lenient_object<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map,
        _ => Map::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn version_accepts_numeric_build_and_odd_fields() {
        let v: AppVersion = serde_json::from_value(json!({
            "version": "2.0.1",
            "buildVersion": 42,
            "platforms": ["macOS", 7, "Linux"],
            "downloads": "not-an-object",
            "downloadURL": null
        }))
        .unwrap();

        assert_eq!(v.build_version.as_deref(), Some("42"));
        assert_eq!(v.platforms, vec!["macOS", "Linux"]);
        assert!(v.downloads.is_empty());
        assert!(v.supports(Platform::Linux));
        assert!(!v.supports(Platform::Windows));
    }

    #[test]
    fn app_screenshots_accept_both_shapes() {
        let app: App = serde_json::from_value(json!({
            "slug": "doggy",
            "name": "Doggy Days",
            "iconURL": "https://cdn.example.com/icon.png",
            "screenshots": ["https://a/1.png", {"imageURL": "https://a/2.png"}, 3]
        }))
        .unwrap();

        let urls: Vec<&str> = app.screenshots.iter().map(Screenshot::url).collect();
        assert_eq!(urls, vec!["https://a/1.png", "https://a/2.png"]);
        assert_eq!(app.icon_url.as_deref(), Some("https://cdn.example.com/icon.png"));
    }

    #[test]
    fn non_list_data_is_empty() {
        let versions: Vec<AppVersion> = list_from_value(json!({"unexpected": true}));
        assert!(versions.is_empty());
    }
}
